//! Session Management
//!
//! A session is one user query's lifecycle: submit the question, stream the
//! answer, and finalize it into a message.
//!
//! ```text
//! Idle ──submit──> Sending ──body──> Streaming ──end-of-stream──> Completed
//!                     │                  │
//!                     ├──────────────────┴──cancel──> Cancelled
//!                     └──────────────────┴──error───> Failed
//! ```
//!
//! [`Session`] is the pure state machine. [`spawn_exchange`] runs the network
//! side in a task and reports back through [`SessionEvent`]s, which the
//! controller folds into the session it owns.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, ChatRequest};
use crate::messages::{Message, SessionId};
use crate::streaming::{Delta, StreamConsumer, StreamOutcome};

/// Prefix of the synthetic message appended when an exchange fails
pub const ERROR_PREFIX: &str = "Error: ";

/// Session state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, nothing submitted yet
    Idle,
    /// Request issued, waiting for the response body
    Sending,
    /// Receiving answer deltas
    Streaming,
    /// Answer finalized into a message
    Completed,
    /// Stopped by the user or a conversation switch; nothing appended
    Cancelled,
    /// Network or protocol failure; an error message was appended
    Failed,
}

impl SessionState {
    /// Whether the session can no longer change
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether an exchange is in flight
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// Short human readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Progress reported by the exchange task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A response body is available
    Streaming,
    /// Next piece of answer text
    Delta(Delta),
    /// The transport ended cleanly
    Completed,
    /// The exchange failed
    Failed(String),
}

/// One query/answer exchange
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    query: String,
    accumulated_answer: String,
    /// Conversation the query was sent to (`None` starts a new one)
    conversation_id: Option<String>,
    /// Conversation id reported by the backend while streaming
    assigned_conversation_id: Option<String>,
    cancel: CancellationToken,
}

impl Session {
    /// Create an idle session bound to `conversation_id`
    pub fn new(conversation_id: Option<String>) -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Idle,
            query: String::new(),
            accumulated_answer: String::new(),
            conversation_id,
            assigned_conversation_id: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Session ID
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The submitted query
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Answer text received so far
    #[must_use]
    pub fn accumulated_answer(&self) -> &str {
        &self.accumulated_answer
    }

    /// Conversation the query was sent to
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Conversation id the backend reported, if it differs from the bound one
    #[must_use]
    pub fn assigned_conversation_id(&self) -> Option<&str> {
        self.assigned_conversation_id.as_deref()
    }

    /// Token that stops the exchange task
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request body for the submitted query
    #[must_use]
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.query.clone()).with_conversation(self.conversation_id.clone())
    }

    /// Submit `text` and move to `Sending`
    ///
    /// Returns the user's message, or `None` if the session was not idle.
    pub fn submit(&mut self, text: impl Into<String>) -> Option<Message> {
        if self.state != SessionState::Idle {
            return None;
        }
        self.query = text.into();
        self.state = SessionState::Sending;
        Some(Message::user(self.query.clone()))
    }

    /// The response body arrived
    pub fn mark_streaming(&mut self) -> bool {
        if self.state != SessionState::Sending {
            return false;
        }
        self.state = SessionState::Streaming;
        true
    }

    /// Append a delta and return the running total
    ///
    /// Ignored outside `Streaming`, so the answer never grows after a
    /// terminal state.
    pub fn push_delta(&mut self, delta: &Delta) -> Option<&str> {
        if self.state != SessionState::Streaming {
            return None;
        }
        if self.assigned_conversation_id.is_none() {
            if let Some(id) = delta.conversation_id.as_deref().filter(|id| !id.is_empty()) {
                if self.conversation_id.as_deref() != Some(id) {
                    self.assigned_conversation_id = Some(id.to_string());
                }
            }
        }
        self.accumulated_answer.push_str(&delta.text);
        Some(&self.accumulated_answer)
    }

    /// Finalize the answer into an assistant message
    pub fn complete(&mut self) -> Option<Message> {
        if self.state != SessionState::Streaming {
            return None;
        }
        self.state = SessionState::Completed;
        Some(Message::assistant(self.accumulated_answer.clone()))
    }

    /// Stop the exchange, discarding any partial answer
    ///
    /// Returns `false` if the session was not in flight.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.cancel.cancel();
        self.state = SessionState::Cancelled;
        self.accumulated_answer.clear();
        true
    }

    /// Fail the exchange and produce the synthetic error message
    pub fn fail(&mut self, error: &str) -> Option<Message> {
        if !self.state.is_active() {
            return None;
        }
        self.cancel.cancel();
        self.state = SessionState::Failed;
        Some(Message::assistant(format!("{ERROR_PREFIX}{error}")))
    }
}

/// Run one exchange against `backend` in a background task
///
/// Both waits (for the response and for each chunk) are raced against
/// `cancel`. The task stops quietly once cancelled or once the receiving
/// side is dropped, and closes the byte source on the way out.
pub fn spawn_exchange<B>(
    backend: Arc<B>,
    request: ChatRequest,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()>
where
    B: ChatBackend + ?Sized + 'static,
{
    tokio::spawn(async move {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("Exchange cancelled before response");
                return;
            }
            opened = backend.open_stream(&request) => opened,
        };

        let source = match opened {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "Chat request failed");
                let _ = tx.send(SessionEvent::Failed(e.to_string())).await;
                return;
            }
        };

        if tx.send(SessionEvent::Streaming).await.is_err() {
            return;
        }

        let mut consumer = StreamConsumer::new(source, cancel).with_idle_timeout(idle_timeout);
        while let Some(item) = consumer.next_delta().await {
            match item {
                Ok(delta) => {
                    if tx.send(SessionEvent::Delta(delta)).await.is_err() {
                        // Receiver dropped, dropping the consumer closes the body
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Chat stream failed");
                    let _ = tx.send(SessionEvent::Failed(e.to_string())).await;
                    return;
                }
            }
        }

        if consumer.outcome() == Some(StreamOutcome::Completed) {
            let _ = tx.send(SessionEvent::Completed).await;
        }
    })
}
