use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_ENDPOINT: &str = "/api/chat";
pub const DEFAULT_GREETING: &str = "Hello! I'm an LLM chat app. How can I help you today?";
pub const DEFAULT_REFINE_PREFIX: &str = "REFINE:";
pub const DEFAULT_REFINE_INSTRUCTIONS: &str = "Messages that begin with REFINE: are instructions to regenerate the previous message, but with a change. The change is what follows after REFINE:. For example, REFINE: shorter means to shorten the previous message. Follow the instructions as closely as possible. Do NOT add any acknowledgment or question beyond the regenerated message; it fully replaces the previous one in the transcript, so it must be a seamless replacement.";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Scheme and host of the chat server, e.g. "http://127.0.0.1:8787"
    pub base_url: Option<String>,
    /// Path of the chat endpoint on that server
    pub endpoint: Option<String>,
    /// Ask for a streamed response (defaults to on)
    pub stream: Option<bool>,
    /// Assistant turn shown at the start of every session; empty disables it
    pub greeting: Option<String>,
    /// Optional system message sent ahead of the conversation
    pub system_prompt: Option<String>,
    pub refine_instructions: Option<String>,
    pub refine_prefix: Option<String>,
    /// TCP connect timeout for the HTTP client
    pub connect_timeout_secs: Option<u64>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
