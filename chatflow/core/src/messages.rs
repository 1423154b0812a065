//! Chat Updates
//!
//! Messages sent from the controller to the rendering surface. The surface
//! holds no chat logic of its own: it draws whatever these updates describe
//! and forwards user actions back as [`UserAction`](crate::events::UserAction)s.
//!
//! # Streaming Protocol
//!
//! A single exchange produces, in order:
//!
//! ```text
//! MessageAppended(user) -> SessionState(Sending) -> SessionState(Streaming)
//!     -> StreamingText* -> MessageAppended(assistant) -> SessionState(Completed)
//! ```
//!
//! A cancelled exchange ends with `SessionState(Cancelled)` and no assistant
//! message. A failed exchange appends an assistant message starting with
//! `Error: ` before `SessionState(Failed)`.

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationSummary;
use crate::session::SessionState;

/// Updates from controller to rendering surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ChatUpdate {
    // ============================================
    // Conversation Content
    // ============================================
    /// A finalized message was appended to the active conversation
    MessageAppended {
        /// Conversation the message belongs to (`None` for an unsaved draft)
        conversation_id: Option<String>,
        /// The appended message
        message: Message,
    },

    /// Running total of the answer currently being streamed
    StreamingText {
        /// Session producing the text
        session_id: SessionId,
        /// Everything received so far (not just the latest delta)
        text: String,
    },

    /// The active conversation was replaced wholesale
    ConversationLoaded {
        /// New active conversation (`None` for a fresh draft)
        conversation_id: Option<String>,
        /// Complete finalized history
        messages: Vec<Message>,
    },

    /// A draft conversation received its backend-assigned id
    ConversationAdopted {
        /// The id assigned by the backend
        conversation_id: String,
    },

    /// Conversation directory changed (refresh started or finished)
    ConversationList {
        /// Cached summaries
        conversations: Vec<ConversationSummary>,
        /// Whether a refresh is in flight
        loading: bool,
    },

    // ============================================
    // Session Lifecycle
    // ============================================
    /// Session state transition
    SessionState {
        /// Session that transitioned
        session_id: SessionId,
        /// The new state
        state: SessionState,
    },

    // ============================================
    // System Messages
    // ============================================
    /// Notification for the status line
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Message content
        message: String,
    },
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Next process-unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Next session ID (`session_<ms>_<n>`)
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("session_{}_{count}", now_ms()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Backend answer (streamed, loaded from history, or a failure notice)
    Assistant,
    /// Local placeholder text
    System,
}

impl MessageRole {
    /// Label used when rendering transcripts
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A finalized message in a conversation
///
/// Role and content never change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was created (Unix timestamp ms)
    pub timestamp: u64,
}

impl Message {
    /// Create a new message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: now_ms(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

/// Get current timestamp in milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
        assert!(id1.0.starts_with("session_"));
    }

    #[test]
    fn test_message_constructors_fix_role() {
        assert_eq!(Message::user("hi").role, MessageRole::User);
        assert_eq!(Message::assistant("hello").role, MessageRole::Assistant);
        assert_eq!(Message::system("...").role, MessageRole::System);
    }

    #[test]
    fn test_message_timestamp_is_wall_clock_millis() {
        // 2020-01-01 in milliseconds
        let message = Message::user("hi");
        assert!(message.timestamp > 1_577_836_800_000);
        assert!(message.timestamp < u64::MAX);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
