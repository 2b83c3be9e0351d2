use std::time::Duration;

use crate::core::config::data::{
    Config, DEFAULT_BASE_URL, DEFAULT_ENDPOINT, DEFAULT_GREETING, DEFAULT_REFINE_INSTRUCTIONS,
    DEFAULT_REFINE_PREFIX,
};
use crate::utils::url::construct_api_url;

/// Keys accepted by `streamchat set` / `streamchat unset`.
pub const CONFIG_KEYS: &[&str] = &[
    "base-url",
    "endpoint",
    "stream",
    "greeting",
    "system-prompt",
    "refine-instructions",
    "refine-prefix",
    "connect-timeout",
];

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Full URL of the chat endpoint.
    pub fn chat_url(&self) -> String {
        construct_api_url(self.base_url(), self.endpoint())
    }

    pub fn stream_enabled(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    /// `None` when the greeting was set to an empty string.
    pub fn greeting(&self) -> Option<&str> {
        let greeting = self.greeting.as_deref().unwrap_or(DEFAULT_GREETING);
        (!greeting.trim().is_empty()).then_some(greeting)
    }

    pub fn refine_instructions(&self) -> &str {
        self.refine_instructions
            .as_deref()
            .unwrap_or(DEFAULT_REFINE_INSTRUCTIONS)
    }

    pub fn refine_prefix(&self) -> &str {
        self.refine_prefix.as_deref().unwrap_or(DEFAULT_REFINE_PREFIX)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Apply `streamchat set <key> <value>`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "base-url" => self.base_url = Some(value.to_string()),
            "endpoint" => self.endpoint = Some(value.to_string()),
            "stream" => self.stream = Some(parse_bool(value)?),
            "greeting" => self.greeting = Some(value.to_string()),
            "system-prompt" => self.system_prompt = Some(value.to_string()),
            "refine-instructions" => self.refine_instructions = Some(value.to_string()),
            "refine-prefix" => self.refine_prefix = Some(value.to_string()),
            "connect-timeout" => {
                let secs = value
                    .parse::<u64>()
                    .map_err(|_| format!("connect-timeout expects whole seconds, got '{value}'"))?;
                self.connect_timeout_secs = Some(secs);
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Apply `streamchat unset <key>`.
    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        match key {
            "base-url" => self.base_url = None,
            "endpoint" => self.endpoint = None,
            "stream" => self.stream = None,
            "greeting" => self.greeting = None,
            "system-prompt" => self.system_prompt = None,
            "refine-instructions" => self.refine_instructions = None,
            "refine-prefix" => self.refine_prefix = None,
            "connect-timeout" => self.connect_timeout_secs = None,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on/off, got '{value}'")),
    }
}

fn unknown_key(key: &str) -> String {
    format!(
        "Unknown config key: {key} (expected one of: {})",
        CONFIG_KEYS.join(", ")
    )
}
