//! Owns the conversation and runs one turn at a time against the endpoint.

use std::error::Error as StdError;
use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::assembler::StreamError;
use crate::core::chat_stream::{fetch_complete, ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::conversation::{Conversation, ConversationSink, Tee, CANCEL_NOTICE};
use crate::core::message::Turn;
use crate::utils::logging::LoggingState;

/// Why a turn was refused before any request went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    Empty,
    /// Another turn is still streaming.
    Busy,
    /// Refine/retry needs an earlier assistant answer.
    NothingToRegenerate,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty => write!(f, "Nothing to send."),
            SubmitError::Busy => write!(f, "Still waiting for the previous response."),
            SubmitError::NothingToRegenerate => write!(f, "No previous message to regenerate."),
        }
    }
}

impl StdError for SubmitError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(String),
    /// The stream finished without producing any text.
    Empty,
    Failed(StreamError),
}

/// Answer being regenerated: where it sat and what it said.
struct Replacing {
    index: usize,
    previous: Turn,
}

pub struct ChatSession {
    conversation: Conversation,
    client: reqwest::Client,
    chat_url: String,
    stream: bool,
    refine_instructions: String,
    refine_prefix: String,
    logging: LoggingState,
    busy: bool,
    /// Answer taken out for an in-flight refine/retry, put back unless the
    /// regeneration completes.
    regenerating: Option<Replacing>,
    stream_service: ChatStreamService,
    rx: mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    current_stream_id: u64,
    stream_cancel_token: Option<CancellationToken>,
}

impl ChatSession {
    pub fn new(config: &Config, logging: LoggingState) -> Result<Self, Box<dyn StdError>> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;
        let (stream_service, rx) = ChatStreamService::new();

        Ok(Self {
            conversation: Conversation::with_preamble(
                config.system_prompt.as_deref(),
                config.greeting(),
            ),
            client,
            chat_url: config.chat_url(),
            stream: config.stream_enabled(),
            refine_instructions: config.refine_instructions().to_string(),
            refine_prefix: config.refine_prefix().to_string(),
            logging,
            busy: false,
            regenerating: None,
            stream_service,
            rx,
            current_stream_id: 0,
            stream_cancel_token: None,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn logging(&self) -> &LoggingState {
        &self.logging
    }

    pub fn logging_mut(&mut self) -> &mut LoggingState {
        &mut self.logging
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Send a user message and stream the answer into `display`.
    pub async fn submit(
        &mut self,
        text: &str,
        display: &mut dyn ConversationSink,
    ) -> Result<TurnOutcome, SubmitError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }
        self.begin_turn()?;

        self.conversation.push_turn(Turn::user(text));
        if let Err(e) = self.logging.log_user(text) {
            warn!(error = %e, "failed to log user message");
        }

        let messages = self.conversation.api_messages();
        let outcome = self.run_turn(messages, display).await;
        self.finish_turn(&outcome);
        Ok(outcome)
    }

    /// Regenerate the last answer with an edit instruction. The new answer
    /// takes the old one's place; on failure the old one is restored.
    pub async fn refine(
        &mut self,
        instruction: &str,
        display: &mut dyn ConversationSink,
    ) -> Result<TurnOutcome, SubmitError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(SubmitError::Empty);
        }
        let (index, previous) = self.take_for_regeneration()?;

        let mut messages = vec![ChatMessage::from(&Turn::system(
            self.refine_instructions.clone(),
        ))];
        messages.extend(self.conversation.api_messages_before(index));
        messages.push(ChatMessage::from(&previous));
        messages.push(ChatMessage::from(&Turn::user(format!(
            "{} {}",
            self.refine_prefix, instruction
        ))));

        let outcome = self.run_turn(messages, display).await;
        self.finish_turn(&outcome);
        Ok(outcome)
    }

    /// Ask again for the last answer, unchanged prompt.
    pub async fn retry(
        &mut self,
        display: &mut dyn ConversationSink,
    ) -> Result<TurnOutcome, SubmitError> {
        let (index, _) = self.take_for_regeneration()?;
        let messages = self.conversation.api_messages_before(index);

        let outcome = self.run_turn(messages, display).await;
        self.finish_turn(&outcome);
        Ok(outcome)
    }

    /// Abandon an in-flight turn: close the transport and drop the
    /// placeholder without committing anything. A plain turn leaves a
    /// notice after the unanswered message; a regeneration puts the
    /// previous answer back.
    pub fn cancel(&mut self) {
        self.cancel_current_stream();
        if !self.busy {
            return;
        }
        self.busy = false;
        self.conversation.retract_placeholder();

        match self.regenerating.take() {
            Some(replacing) => self
                .conversation
                .restore_turn(replacing.index, replacing.previous),
            None => self.conversation.push_notice(CANCEL_NOTICE),
        }
    }

    fn begin_turn(&mut self) -> Result<(), SubmitError> {
        if self.busy {
            return Err(SubmitError::Busy);
        }
        self.busy = true;
        Ok(())
    }

    /// Take the last answer out of the history and remember it until the
    /// regeneration settles. Returns its index and a copy for the prompt.
    fn take_for_regeneration(&mut self) -> Result<(usize, Turn), SubmitError> {
        if !self.conversation.can_regenerate() {
            return Err(SubmitError::NothingToRegenerate);
        }
        self.begin_turn()?;
        let Some((index, previous)) = self.conversation.take_last_assistant() else {
            self.busy = false;
            return Err(SubmitError::NothingToRegenerate);
        };
        self.regenerating = Some(Replacing {
            index,
            previous: previous.clone(),
        });
        Ok((index, previous))
    }

    fn finish_turn(&mut self, outcome: &TurnOutcome) {
        self.stream_cancel_token = None;
        self.busy = false;

        match (outcome, self.regenerating.take()) {
            (TurnOutcome::Completed(text), None) => {
                if let Err(e) = self.logging.log_assistant(text) {
                    warn!(error = %e, "failed to log response");
                }
            }
            (TurnOutcome::Completed(_), Some(replacing)) => {
                self.conversation.relocate_last(replacing.index);
                if let Err(e) = self
                    .logging
                    .rewrite_from_entries(self.conversation.entries())
                {
                    warn!(error = %e, "failed to rewrite log file");
                }
            }
            (_, Some(replacing)) => {
                self.conversation
                    .restore_turn(replacing.index, replacing.previous);
            }
            (_, None) => {}
        }
    }

    fn cancel_current_stream(&mut self) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
    }

    fn start_new_stream(&mut self) -> (CancellationToken, u64) {
        self.cancel_current_stream();
        self.current_stream_id += 1;

        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        (token, self.current_stream_id)
    }

    async fn run_turn(
        &mut self,
        messages: Vec<ChatMessage>,
        display: &mut dyn ConversationSink,
    ) -> TurnOutcome {
        self.conversation.open_placeholder();

        if !self.stream {
            let result = fetch_complete(&self.client, &self.chat_url, messages).await;
            let mut sink = Tee::new(&mut self.conversation, display);
            return match result {
                Ok(text) => {
                    if !text.is_empty() {
                        sink.append_delta(&text);
                    }
                    sink.complete_turn(&text);
                    outcome_for(text)
                }
                Err(err) => {
                    sink.fail_turn(&err);
                    TurnOutcome::Failed(err)
                }
            };
        }

        let (cancel_token, stream_id) = self.start_new_stream();
        self.stream_service.spawn_stream(StreamParams {
            client: self.client.clone(),
            url: self.chat_url.clone(),
            api_messages: messages,
            cancel_token,
            stream_id,
        });

        let mut sink = Tee::new(&mut self.conversation, display);
        let mut assembled = String::new();
        let mut failure = None;

        while let Some((message, id)) = self.rx.recv().await {
            if id != stream_id {
                debug!(id, stream_id, "dropping message from stale stream");
                continue;
            }
            match message {
                StreamMessage::Chunk(content) => {
                    assembled.push_str(&content);
                    sink.append_delta(&content);
                }
                StreamMessage::Error(err) => failure = Some(err),
                StreamMessage::End => break,
            }
        }

        match failure {
            Some(err) => {
                sink.fail_turn(&err);
                TurnOutcome::Failed(err)
            }
            None => {
                sink.complete_turn(&assembled);
                outcome_for(assembled)
            }
        }
    }
}

fn outcome_for(text: String) -> TurnOutcome {
    if text.is_empty() {
        TurnOutcome::Empty
    } else {
        TurnOutcome::Completed(text)
    }
}
