//! Frame Parser
//!
//! Splits Server-Sent-Events text into `data:` frames and decodes their JSON
//! payloads into [`ChatEvent`]s.
//!
//! # Wire Format
//!
//! ```text
//! data: {"event":"message","answer":"Hi","conversation_id":"c1"}\n
//! \n
//! data: {"event":"message_end","conversation_id":"c1"}\n
//! \n
//! ```
//!
//! A run of two or more consecutive line breaks (`\n`, `\r\n` or a bare `\r`)
//! ends a frame.
//! Only segments starting with `data:` carry payloads; comments and other SSE
//! fields (`event:`, `id:`, `retry:`) are dropped.
//!
//! [`consume`] is a pure function: it keeps no state between calls. Whatever
//! follows the last delimiter is handed back as the remainder, and the caller
//! prepends it to the next chunk of text. Only leading whitespace is trimmed
//! from the remainder: a trailing line break may be the first half of a
//! delimiter whose second half is still in flight.

use serde::{Deserialize, Serialize};

/// Field prefix of the only SSE line type this client understands
pub const DATA_PREFIX: &str = "data:";

/// Event kind that carries answer text
pub const MESSAGE_EVENT: &str = "message";

/// One complete `data:` frame with the prefix stripped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Payload text (normally a JSON object)
    pub payload: String,
}

impl Frame {
    /// Create a frame from payload text
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Decode the payload as a chat event
    ///
    /// Returns `None` when the payload is not a well-formed event. Truncated
    /// JSON is an ordinary occurrence while bytes are still arriving, so this
    /// is not treated as an error.
    #[must_use]
    pub fn decode(&self) -> Option<ChatEvent> {
        match serde_json::from_str(&self.payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::trace!(error = %e, len = self.payload.len(), "Dropping undecodable frame");
                None
            }
        }
    }
}

/// Structured form of a frame payload
///
/// Fields other than these are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Event kind (`message`, `message_end`, `workflow_started`, ...)
    pub event: String,
    /// Incremental answer text (present on `message` events)
    #[serde(default)]
    pub answer: Option<String>,
    /// Backend conversation id this event belongs to
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Backend message id
    #[serde(default)]
    pub message_id: Option<String>,
    /// Backend task id
    #[serde(default)]
    pub task_id: Option<String>,
}

impl ChatEvent {
    /// Answer text if this event is a `message` event carrying one
    #[must_use]
    pub fn delta(&self) -> Option<&str> {
        if self.event == MESSAGE_EVENT {
            self.answer.as_deref()
        } else {
            None
        }
    }
}

/// Split `buffer` into complete frames and an unconsumed remainder
///
/// Every segment before the last delimiter is trimmed and kept only if it
/// starts with `data:`. The remainder is the text after the last delimiter
/// with leading whitespace removed. Trailing line breaks stay in the
/// remainder since they may be the first half of a delimiter split across
/// chunks.
#[must_use]
pub fn consume(buffer: &str) -> (Vec<Frame>, String) {
    let bytes = buffer.as_bytes();
    let mut frames = Vec::new();
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let run_start = i;
        let mut breaks = 0;
        loop {
            match bytes.get(i) {
                Some(b'\n') => {
                    breaks += 1;
                    i += 1;
                }
                Some(b'\r') if bytes.get(i + 1) == Some(&b'\n') => {
                    breaks += 1;
                    i += 2;
                }
                Some(b'\r') => {
                    breaks += 1;
                    i += 1;
                }
                _ => break,
            }
        }

        if breaks >= 2 {
            push_segment(&buffer[segment_start..run_start], &mut frames);
            segment_start = i;
        } else if breaks == 0 {
            i += 1;
        }
    }

    (frames, buffer[segment_start..].trim_start().to_string())
}

fn push_segment(raw: &str, frames: &mut Vec<Frame>) {
    let segment = raw.trim();
    if let Some(payload) = segment.strip_prefix(DATA_PREFIX) {
        frames.push(Frame::new(payload.trim()));
    } else if !segment.is_empty() {
        tracing::trace!(segment = %segment, "Ignoring non-data SSE segment");
    }
}
