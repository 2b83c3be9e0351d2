use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest};
use crate::core::assembler::{assemble_stream, StreamError};
use crate::core::frame::extract_delta;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Error(StreamError),
    End,
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body for display: JSON is pretty-printed with its
/// message pulled up front, markup and plain text are fenced as-is.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

async fn post_chat(
    client: &reqwest::Client,
    url: &str,
    messages: Vec<ChatMessage>,
    stream: bool,
) -> Result<reqwest::Response, StreamError> {
    let request = ChatRequest { messages, stream };

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "text/plain")
        .json(&request)
        .send()
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(StreamError::Status {
            status: status.as_u16(),
            detail: format_api_error(&error_text),
        });
    }

    Ok(response)
}

/// Send a streaming request and return the lazily assembled deltas.
pub async fn open_stream(
    client: &reqwest::Client,
    url: &str,
    messages: Vec<ChatMessage>,
) -> Result<impl Stream<Item = Result<String, StreamError>>, StreamError> {
    let response = post_chat(client, url, messages, true).await?;
    debug!(%url, status = %response.status(), "stream opened");
    Ok(assemble_stream(response.bytes_stream()))
}

/// Non-streaming request: one JSON object, text pulled from its
/// `response`-style field. Bodies that are not JSON are used verbatim.
pub async fn fetch_complete(
    client: &reqwest::Client,
    url: &str,
    messages: Vec<ChatMessage>,
) -> Result<String, StreamError> {
    let response = post_chat(client, url, messages, false).await?;
    let body = response
        .text()
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))?;

    let text = match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(value) => extract_delta(value).unwrap_or_default(),
        Err(_) => body.trim().to_string(),
    };
    Ok(text)
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub url: String,
    pub api_messages: Vec<ChatMessage>,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Run one request in the background. The receiver sees any number of
    /// `Chunk`s, at most one `Error`, then `End`. A cancelled stream sends
    /// nothing further; dropping the body closes the connection.
    pub fn spawn_stream(&self, params: StreamParams) -> tokio::task::JoinHandle<()> {
        let tx_clone = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                url,
                api_messages,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "chat stream cancelled");
                }
                _ = async {
                    let deltas = match open_stream(&client, &url, api_messages).await {
                        Ok(deltas) => deltas,
                        Err(err) => {
                            warn!(stream_id, error = %err, "chat request failed");
                            let _ = tx_clone.send((StreamMessage::Error(err), stream_id));
                            let _ = tx_clone.send((StreamMessage::End, stream_id));
                            return;
                        }
                    };
                    let mut deltas = std::pin::pin!(deltas);

                    while let Some(item) = deltas.next().await {
                        match item {
                            Ok(content) => {
                                let _ = tx_clone.send((StreamMessage::Chunk(content), stream_id));
                            }
                            Err(err) => {
                                warn!(stream_id, error = %err, "chat stream aborted");
                                let _ = tx_clone.send((StreamMessage::Error(err), stream_id));
                                break;
                            }
                        }
                    }

                    let _ = tx_clone.send((StreamMessage::End, stream_id));
                } => {}
            }
        })
    }
}
