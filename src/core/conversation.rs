//! Conversation history and the sink interface the stream feeds into.

use crate::api::ChatMessage;
use crate::core::assembler::StreamError;
use crate::core::message::Turn;

pub const ERROR_NOTICE: &str =
    "Sorry, there was an error processing your request. Please try again.";

pub const CANCEL_NOTICE: &str = "[cancelled]";

/// Receiver for one in-flight assistant turn.
///
/// `append_delta` fires zero or more times with non-empty text, then exactly
/// one of `complete_turn` or `fail_turn`.
pub trait ConversationSink {
    fn append_delta(&mut self, text: &str);

    /// `full_text` is everything appended so far. Empty means nothing worth
    /// recording was produced.
    fn complete_turn(&mut self, full_text: &str);

    fn fail_turn(&mut self, error: &StreamError);
}

/// Forwards every call to two sinks, the history first.
pub struct Tee<'a> {
    first: &'a mut dyn ConversationSink,
    second: &'a mut dyn ConversationSink,
}

impl<'a> Tee<'a> {
    pub fn new(first: &'a mut dyn ConversationSink, second: &'a mut dyn ConversationSink) -> Self {
        Self { first, second }
    }
}

impl ConversationSink for Tee<'_> {
    fn append_delta(&mut self, text: &str) {
        self.first.append_delta(text);
        self.second.append_delta(text);
    }

    fn complete_turn(&mut self, full_text: &str) {
        self.first.complete_turn(full_text);
        self.second.complete_turn(full_text);
    }

    fn fail_turn(&mut self, error: &StreamError) {
        self.first.fail_turn(error);
        self.second.fail_turn(error);
    }
}

/// Something shown to the user. Notices are never sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Turn(Turn),
    Notice(String),
}

/// Ordered record of the session. Only the unfinished placeholder can ever
/// be taken back out.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<Entry>,
    placeholder: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fresh conversation with an optional system prompt and greeting.
    pub fn with_preamble(system_prompt: Option<&str>, greeting: Option<&str>) -> Self {
        let mut conversation = Self::new();
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            conversation.push_turn(Turn::system(prompt));
        }
        if let Some(greeting) = greeting.filter(|g| !g.trim().is_empty()) {
            conversation.push_turn(Turn::assistant(greeting));
        }
        conversation
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Turn(turn) => Some(turn),
            Entry::Notice(_) => None,
        })
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.entries.push(Entry::Turn(turn));
    }

    pub fn push_notice(&mut self, notice: impl Into<String>) {
        self.entries.push(Entry::Notice(notice.into()));
    }

    /// Open an empty assistant placeholder for the next stream.
    pub fn open_placeholder(&mut self) {
        self.placeholder = Some(String::new());
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Drop the placeholder and whatever streamed into it.
    pub fn retract_placeholder(&mut self) -> Option<String> {
        self.placeholder.take()
    }

    /// History in request form. Notices and the placeholder are left out.
    pub fn api_messages(&self) -> Vec<ChatMessage> {
        self.turns().map(ChatMessage::from).collect()
    }

    /// Request form of the turns that precede entry `index`.
    pub fn api_messages_before(&self, index: usize) -> Vec<ChatMessage> {
        self.entries[..index.min(self.entries.len())]
            .iter()
            .filter_map(|entry| match entry {
                Entry::Turn(turn) => Some(ChatMessage::from(turn)),
                Entry::Notice(_) => None,
            })
            .collect()
    }

    /// Move the newest entry to `index`; regenerated answers go back where
    /// the answer they replace used to be.
    pub fn relocate_last(&mut self, index: usize) {
        if index >= self.entries.len() {
            return;
        }
        if let Some(entry) = self.entries.pop() {
            self.entries.insert(index, entry);
        }
    }

    /// Index into `entries` of the most recent non-empty assistant turn.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.entries.iter().rposition(|entry| {
            matches!(entry, Entry::Turn(turn) if turn.is_assistant() && !turn.content.is_empty())
        })
    }

    pub fn can_regenerate(&self) -> bool {
        self.last_assistant_index().is_some()
    }

    /// Remove and return the most recent assistant turn together with the
    /// entry index it occupied, so a failed regeneration can put it back.
    pub fn take_last_assistant(&mut self) -> Option<(usize, Turn)> {
        let index = self.last_assistant_index()?;
        match self.entries.remove(index) {
            Entry::Turn(turn) => Some((index, turn)),
            Entry::Notice(_) => None,
        }
    }

    /// Put a turn back at `index` (clamped to the end).
    pub fn restore_turn(&mut self, index: usize, turn: Turn) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, Entry::Turn(turn));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConversationSink for Conversation {
    fn append_delta(&mut self, text: &str) {
        if let Some(placeholder) = self.placeholder.as_mut() {
            placeholder.push_str(text);
        }
    }

    fn complete_turn(&mut self, full_text: &str) {
        self.placeholder = None;
        if !full_text.is_empty() {
            self.push_turn(Turn::assistant(full_text));
        }
    }

    fn fail_turn(&mut self, _error: &StreamError) {
        self.retract_placeholder();
        self.push_notice(ERROR_NOTICE);
    }
}
