//! Line classification and payload decoding for the streaming wire format.
//!
//! Everything here is pure: no I/O, no state. [`crate::core::assembler`]
//! owns the buffering and calls into these functions once per complete line.

use serde_json::Value;

use crate::api::ChatResponse;

pub const DONE_SENTINEL: &str = "[DONE]";

const COMMENT_PREFIX: char = ':';
const EVENT_PREFIX: &str = "event: ";
const DATA_PREFIX: &str = "data: ";

/// One newline-delimited unit of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Blank,
    Comment(&'a str),
    Event(&'a str),
    Data(&'a str),
    Unknown(&'a str),
}

/// Outcome of decoding a `data: ` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The `[DONE]` sentinel.
    Done,
    Delta(String),
    /// Parsed fine (or was blank) but carried no text.
    Empty,
}

/// Classify an already-trimmed line. Checks run in priority order, so a
/// line like `:data: x` is a comment.
pub fn classify_line(line: &str) -> Frame<'_> {
    if line.is_empty() {
        Frame::Blank
    } else if let Some(comment) = line.strip_prefix(COMMENT_PREFIX) {
        Frame::Comment(comment)
    } else if let Some(event) = line.strip_prefix(EVENT_PREFIX) {
        Frame::Event(event)
    } else if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        Frame::Data(payload)
    } else {
        Frame::Unknown(line)
    }
}

/// Structured decode first, raw text if that fails, no-op if nothing is left.
pub fn decode_payload(payload: &str) -> Payload {
    if payload == DONE_SENTINEL {
        return Payload::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => extract_delta(value).map_or(Payload::Empty, Payload::Delta),
        Err(_) if payload.is_empty() => Payload::Empty,
        Err(_) => Payload::Delta(payload.to_string()),
    }
}

/// Pull delta text out of a parsed payload: `response`, then
/// `choices[0].delta.content`, then `content`, then the value itself when it
/// is a bare string. Empty strings never count as a match.
pub fn extract_delta(value: Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text,
        Value::Object(_) => serde_json::from_value::<ChatResponse>(value)
            .ok()?
            .delta_text()?
            .to_string(),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// End-of-stream fallback for leftover bytes with no trailing newline.
/// Narrower than [`decode_payload`]: only the `response` field
/// of a JSON object is considered and anything else is dropped.
pub fn decode_trailing(remainder: &str) -> Option<String> {
    let response = serde_json::from_str::<Value>(remainder.trim())
        .ok()?
        .get("response")?
        .as_str()?
        .to_string();

    (!response.is_empty()).then_some(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_line_covers_each_frame_kind() {
        assert_eq!(classify_line(""), Frame::Blank);
        assert_eq!(classify_line(": keep-alive"), Frame::Comment(" keep-alive"));
        assert_eq!(classify_line("event: message"), Frame::Event("message"));
        assert_eq!(classify_line("data: hello"), Frame::Data("hello"));
        assert_eq!(classify_line("id: 7"), Frame::Unknown("id: 7"));
    }

    #[test]
    fn classify_line_requires_space_after_field_name() {
        assert_eq!(classify_line("data:hello"), Frame::Unknown("data:hello"));
        assert_eq!(classify_line("event:ping"), Frame::Unknown("event:ping"));
    }

    #[test]
    fn comment_takes_priority_over_data() {
        assert_eq!(classify_line(":data: x"), Frame::Comment("data: x"));
    }

    #[test]
    fn decode_payload_reads_response_field() {
        assert_eq!(
            decode_payload(r#"{"response":"Hi"}"#),
            Payload::Delta("Hi".to_string())
        );
    }

    #[test]
    fn decode_payload_reads_openai_choice_delta() {
        assert_eq!(
            decode_payload(r#"{"choices":[{"delta":{"content":"Yo"}}]}"#),
            Payload::Delta("Yo".to_string())
        );
    }

    #[test]
    fn decode_payload_reads_flat_content_and_bare_strings() {
        assert_eq!(
            decode_payload(r#"{"content":"flat"}"#),
            Payload::Delta("flat".to_string())
        );
        assert_eq!(
            decode_payload(r#""bare""#),
            Payload::Delta("bare".to_string())
        );
    }

    #[test]
    fn decode_payload_falls_back_to_plain_text() {
        assert_eq!(
            decode_payload("plain text"),
            Payload::Delta("plain text".to_string())
        );
        assert_eq!(
            decode_payload(r#"{"response": "unterminated"#),
            Payload::Delta(r#"{"response": "unterminated"#.to_string())
        );
    }

    #[test]
    fn decode_payload_treats_unresolvable_json_as_empty() {
        assert_eq!(decode_payload(r#"{"usage":{"total":3}}"#), Payload::Empty);
        assert_eq!(decode_payload(r#"{"response":""}"#), Payload::Empty);
        assert_eq!(decode_payload("42"), Payload::Empty);
        assert_eq!(decode_payload("null"), Payload::Empty);
        assert_eq!(decode_payload("[1,2]"), Payload::Empty);
        assert_eq!(decode_payload(""), Payload::Empty);
    }

    #[test]
    fn decode_payload_recognises_done_sentinel() {
        assert_eq!(decode_payload("[DONE]"), Payload::Done);
        assert_eq!(
            decode_payload("[DONE] "),
            Payload::Delta("[DONE] ".to_string())
        );
    }

    #[test]
    fn decode_trailing_only_considers_response() {
        assert_eq!(
            decode_trailing(r#"{"response":"tail"}"#),
            Some("tail".to_string())
        );
        assert_eq!(
            decode_trailing(r#"{"choices":[{"delta":{"content":"x"}}]}"#),
            None
        );
        assert_eq!(decode_trailing(r#"{"content":"x"}"#), None);
        assert_eq!(decode_trailing("data: partial"), None);
        assert_eq!(decode_trailing(r#""bare""#), None);
    }
}
