use serde::{Deserialize, Serialize};

use crate::core::message::Turn;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: ChatResponseDelta,
}

/// Every payload shape the endpoint is known to send, in one struct.
///
/// Workers-style bodies carry `response`, OpenAI-style chunks carry
/// `choices[0].delta.content`, and some proxies flatten it to `content`.
/// Fields that are present with an unexpected type are treated as missing.
#[derive(Deserialize, Debug, Default)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "lenient::string")]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "lenient::choices")]
    pub choices: Vec<ChatResponseChoice>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: Option<String>,
}

impl ChatResponse {
    /// First non-empty text field, in `response`, `choices[0].delta.content`,
    /// `content` order.
    pub fn delta_text(&self) -> Option<&str> {
        let choice_content = self
            .choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref());

        [self.response.as_deref(), choice_content, self.content.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::ChatResponseChoice;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Some(text),
            _ => None,
        })
    }

    pub fn choices<'de, D>(deserializer: D) -> Result<Vec<ChatResponseChoice>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}
