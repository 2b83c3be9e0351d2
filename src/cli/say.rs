//! Non-interactive "say" command

use std::error::Error;
use std::io::{self, Write};

use tokio_util::sync::CancellationToken;

use crate::api::ChatMessage;
use crate::core::chat_stream::{fetch_complete, ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::message::Turn;

/// Messages for a one-shot prompt: the optional system prompt, then the
/// prompt itself. The greeting is only shown in interactive chats.
pub fn say_messages(prompt: &str, config: &Config) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = config
        .system_prompt
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        messages.push(ChatMessage::from(&Turn::system(system_prompt)));
    }
    messages.push(ChatMessage::from(&Turn::user(prompt)));
    messages
}

pub async fn run_say(prompt: String, config: &Config) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        eprintln!("Usage: streamchat say <prompt>");
        std::process::exit(1);
    }

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    let client = builder.build()?;
    let url = config.chat_url();
    let messages = say_messages(prompt, config);

    if !config.stream_enabled() {
        let text = fetch_complete(&client, &url, messages).await?;
        println!("{text}");
        return Ok(());
    }

    let (stream_service, mut rx) = ChatStreamService::new();
    stream_service.spawn_stream(StreamParams {
        client,
        url,
        api_messages: messages,
        cancel_token: CancellationToken::new(),
        stream_id: 1,
    });

    let mut wrote_any = false;
    while let Some((message, _)) = rx.recv().await {
        match message {
            StreamMessage::Chunk(content) => {
                print!("{content}");
                io::stdout().flush()?;
                wrote_any = true;
            }
            StreamMessage::Error(err) => {
                if wrote_any {
                    println!();
                }
                return Err(Box::new(err));
            }
            StreamMessage::End => break,
        }
    }
    println!();

    Ok(())
}
