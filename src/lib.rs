//! streamchat is a terminal client for LLM chat endpoints that answer
//! `POST /api/chat` with either one JSON object or a stream of SSE-style
//! `data:` frames.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the stream assembler, the conversation history, the
//!   request/stream service, configuration, and the session controller.
//! - [`api`] defines the request and response payloads.
//! - [`cli`] parses arguments and runs the interactive loop and one-shot
//!   commands.
//! - [`utils`] holds URL joining and the transcript log.
//!
//! The binary (`src/main.rs`) installs logging and hands off to
//! [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
