//! Reassembles a chunked response body into ordered text deltas.
//!
//! [`StreamAssembler`] is the synchronous core: bytes in, finished deltas out.
//! [`assemble_stream`] wraps it around any byte stream (a `reqwest` body in
//! practice) and yields the deltas lazily, suspending at each transport read.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::debug;

use crate::core::frame::{classify_line, decode_payload, decode_trailing, Frame, Payload};

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// `[DONE]` was seen; further input is discarded.
    Done,
    /// `finish` ran; the assembler is spent.
    Closed,
}

/// Incremental decoder for one response stream. Not restartable: build a new
/// one per request.
#[derive(Debug)]
pub struct StreamAssembler {
    /// Bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    /// Decoded text after the last newline.
    partial_line: String,
    assembled: String,
    last_event: Option<String>,
    /// Whether the first decoded character has been checked for a BOM.
    bom_checked: bool,
    state: State,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            partial_line: String::new(),
            assembled: String::new(),
            last_event: None,
            bom_checked: false,
            state: State::Open,
        }
    }

    /// Consume one transport chunk and return the deltas it completed, in
    /// arrival order. Empty chunks are fine and usually return nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.state != State::Open {
            return Vec::new();
        }

        self.decode_into_partial_line(chunk);
        self.strip_leading_bom();

        let buffer = std::mem::take(&mut self.partial_line);
        let mut deltas = Vec::new();
        let mut start = 0;

        while let Some(offset) = memchr(b'\n', &buffer.as_bytes()[start..]) {
            let end = start + offset;
            let line = buffer[start..end].trim();
            start = end + 1;

            if self.process_line(line, &mut deltas) {
                self.state = State::Done;
                self.pending.clear();
                return deltas;
            }
        }

        self.partial_line = buffer[start..].to_string();
        deltas
    }

    /// Signal end-of-stream. Leftover text without a newline gets a single
    /// best-effort look for a JSON `response` field; anything else is dropped.
    pub fn finish(&mut self) -> Vec<String> {
        let was_open = self.state == State::Open;
        self.state = State::Closed;

        if !was_open {
            return Vec::new();
        }

        if !self.pending.is_empty() {
            // A truncated sequence at EOF decodes to one replacement char.
            self.pending.clear();
            self.partial_line.push(char::REPLACEMENT_CHARACTER);
        }

        let remainder = std::mem::take(&mut self.partial_line);
        if remainder.trim().is_empty() {
            return Vec::new();
        }

        match decode_trailing(&remainder) {
            Some(delta) => {
                self.assembled.push_str(&delta);
                vec![delta]
            }
            None => {
                debug!(len = remainder.len(), "discarding unterminated stream tail");
                Vec::new()
            }
        }
    }

    /// True once `[DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Everything emitted so far, concatenated.
    pub fn assembled(&self) -> &str {
        &self.assembled
    }

    /// Most recent `event: ` name, if the server sends any.
    pub fn last_event(&self) -> Option<&str> {
        self.last_event.as_deref()
    }

    fn decode_into_partial_line(&mut self, chunk: &[u8]) {
        let owned;
        let mut bytes: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(chunk);
            owned = std::mem::take(&mut self.pending);
            &owned
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.partial_line.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.partial_line.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.partial_line.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[invalid_len..];
                        }
                        None => {
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// A byte order mark is only meaningful as the very first character of
    /// the body. It may arrive split, so wait until something decodes.
    fn strip_leading_bom(&mut self) {
        if self.bom_checked || self.partial_line.is_empty() {
            return;
        }
        self.bom_checked = true;
        if self.partial_line.starts_with(BOM) {
            self.partial_line.drain(..BOM.len_utf8());
        }
    }

    /// Returns true when the line ends the stream.
    fn process_line(&mut self, line: &str, deltas: &mut Vec<String>) -> bool {
        match classify_line(line) {
            Frame::Blank | Frame::Comment(_) => {}
            Frame::Event(name) => {
                debug!(event = name, "stream event");
                self.last_event = Some(name.to_string());
            }
            Frame::Data(payload) => match decode_payload(payload) {
                Payload::Done => return true,
                Payload::Delta(delta) => {
                    self.assembled.push_str(&delta);
                    deltas.push(delta);
                }
                Payload::Empty => {}
            },
            Frame::Unknown(other) => {
                debug!(line = other, "ignoring unrecognised stream line");
            }
        }
        false
    }
}

/// Failure that ends a turn. Decode problems never show up here; they are
/// absorbed by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The connection failed or the body stopped mid-read.
    Transport(String),
    /// The endpoint answered with a non-2xx status.
    Status {
        status: u16,
        /// Readable rendering of the response body.
        detail: String,
    },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(message) => write!(f, "transport error: {message}"),
            StreamError::Status { status, detail } => {
                write!(f, "HTTP error! status: {status}\n{detail}")
            }
        }
    }
}

impl StdError for StreamError {}

struct AssemblyState<S> {
    source: Option<std::pin::Pin<Box<S>>>,
    assembler: StreamAssembler,
    ready: VecDeque<String>,
}

/// Lazily turn a byte stream into deltas. A transport error is yielded once
/// and ends the sequence; `[DONE]` drops the source, closing the transport.
pub fn assemble_stream<S, B, E>(source: S) -> impl Stream<Item = Result<String, StreamError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let state = AssemblyState {
        source: Some(Box::pin(source)),
        assembler: StreamAssembler::new(),
        ready: VecDeque::new(),
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.ready.pop_front() {
                return Some((Ok(delta), state));
            }

            let source = state.source.as_mut()?;
            match source.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(state.assembler.feed(chunk.as_ref()));
                    if state.assembler.is_done() {
                        state.source = None;
                    }
                }
                Some(Err(err)) => {
                    state.source = None;
                    state.ready.clear();
                    return Some((Err(StreamError::Transport(err.to_string())), state));
                }
                None => {
                    state.source = None;
                    state.ready.extend(state.assembler.finish());
                }
            }
        }
    })
}
