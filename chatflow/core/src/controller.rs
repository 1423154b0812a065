//! Session Controller
//!
//! The single owner of the conversation store and the active session. It
//! starts sessions on send, cancels them on conversation switch or dispose,
//! folds streamed deltas into the session, and merges finished answers into
//! history. Every observable change goes out to the surface as a
//! [`ChatUpdate`].
//!
//! ```text
//!  UserAction ──> SessionController ──spawn──> exchange task
//!                   │    ^                         │
//!                   │    └──── SessionEvent ───────┘
//!                   v
//!               ChatUpdate ──> surface
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::backend::ChatBackend;
use crate::config::ClientConfig;
use crate::conversation::{ConversationStore, StoreError};
use crate::events::UserAction;
use crate::messages::{ChatUpdate, Message, NotifyLevel, SessionId};
use crate::session::{spawn_exchange, Session, SessionEvent, SessionState};

/// Why a send was refused
///
/// A refused send changes no state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SendRejected {
    /// Nothing but whitespace
    #[error("message is empty")]
    Empty,

    /// Longer than the configured limit
    #[error("message is too long ({len} > {max} characters)")]
    TooLong {
        /// Length of the rejected text in characters
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// An answer is still being requested or streamed
    #[error("an answer is still streaming")]
    Busy,

    /// The controller was disposed
    #[error("controller has been disposed")]
    Disposed,
}

/// Controller settings
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Maximum question length in characters (0 = unlimited)
    pub max_input_length: usize,
    /// Fail a stream when no chunk arrives for this long
    pub idle_timeout: Option<Duration>,
    /// Capacity of the exchange task's event channel
    pub event_buffer: usize,
    /// Conversations fetched per directory refresh
    pub list_limit: u32,
    /// History entries requested per page when loading a conversation
    pub history_limit: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_input_length: 10_000,
            idle_timeout: Some(Duration::from_secs(120)),
            event_buffer: 64,
            list_limit: 20,
            history_limit: 50,
        }
    }
}

impl From<&ClientConfig> for ControllerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_input_length: config.input.max_input_length,
            idle_timeout: config.idle_timeout(),
            event_buffer: config.stream.event_buffer.max(1),
            list_limit: config.conversations.list_limit,
            history_limit: config.conversations.history_limit,
        }
    }
}

/// Orchestrates the conversation store and the active session
pub struct SessionController<B: ChatBackend> {
    config: ControllerConfig,
    backend: Arc<B>,
    store: ConversationStore,
    /// Most recent session (possibly terminal)
    session: Option<Session>,
    /// Events from the exchange task of an in-flight session
    events_rx: Option<mpsc::Receiver<SessionEvent>>,
    task: Option<JoinHandle<()>>,
    /// Channel to the rendering surface
    tx: mpsc::Sender<ChatUpdate>,
    disposed: bool,
}

impl<B: ChatBackend> SessionController<B> {
    /// The conversation store
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// The most recent session
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// State of the most recent session
    #[must_use]
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(Session::state)
    }

    /// Whether an exchange is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.session_state().is_some_and(SessionState::is_active)
    }

    /// Whether [`dispose`](Self::dispose) was called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Cancel any in-flight session and refuse further sends
    ///
    /// Safe when idle and when called more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(session) = self.session.as_mut() {
            if session.cancel() {
                let update = ChatUpdate::SessionState {
                    session_id: session.id().clone(),
                    state: SessionState::Cancelled,
                };
                if let Err(e) = self.tx.try_send(update) {
                    tracing::debug!(error = %e, "Surface missed cancellation on dispose");
                }
            }
        }
        self.events_rx = None;
        // The task stops on the cancelled token; it is not awaited here
        self.task = None;
        tracing::debug!("Controller disposed");
    }
}

impl<B: ChatBackend + 'static> SessionController<B> {
    /// Create a controller over `backend`, publishing updates to `tx`
    pub fn new(backend: B, config: ControllerConfig, tx: mpsc::Sender<ChatUpdate>) -> Self {
        Self::with_shared_backend(Arc::new(backend), config, tx)
    }

    /// Create a controller over an already shared backend
    pub fn with_shared_backend(
        backend: Arc<B>,
        config: ControllerConfig,
        tx: mpsc::Sender<ChatUpdate>,
    ) -> Self {
        Self {
            config,
            backend,
            store: ConversationStore::new(),
            session: None,
            events_rx: None,
            task: None,
            tx,
            disposed: false,
        }
    }

    /// Dispatch a surface action
    pub async fn handle_action(&mut self, action: UserAction) -> anyhow::Result<()> {
        match action {
            UserAction::Send { text } => {
                if let Err(reason) = self.send(&text).await {
                    tracing::warn!(reason = %reason, "Rejected user message");
                    self.notify(NotifyLevel::Warning, reason.to_string()).await;
                }
            }
            UserAction::SwitchConversation { conversation_id } => {
                self.switch_conversation(&conversation_id).await?;
            }
            UserAction::NewConversation => self.new_conversation().await,
            UserAction::RefreshConversations => self.refresh_conversations().await?,
            UserAction::Cancel => {
                self.cancel().await;
            }
            UserAction::Dispose => self.dispose(),
        }
        Ok(())
    }

    /// Ask `text` in the active conversation
    ///
    /// The user's message is appended before this returns. The answer
    /// arrives through [`poll_session`](Self::poll_session) or
    /// [`wait_session`](Self::wait_session).
    pub async fn send(&mut self, text: &str) -> Result<SessionId, SendRejected> {
        if self.disposed {
            return Err(SendRejected::Disposed);
        }
        if text.trim().is_empty() {
            return Err(SendRejected::Empty);
        }
        let len = text.chars().count();
        let max = self.config.max_input_length;
        if max > 0 && len > max {
            return Err(SendRejected::TooLong { len, max });
        }
        if self.is_busy() {
            return Err(SendRejected::Busy);
        }

        let conversation_id = self.store.active_id().map(String::from);
        let mut session = Session::new(conversation_id.clone());
        let Some(user_message) = session.submit(text) else {
            return Err(SendRejected::Busy);
        };
        let session_id = session.id().clone();

        self.store.append(conversation_id.as_deref(), user_message.clone());

        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let task = spawn_exchange(
            Arc::clone(&self.backend),
            session.request(),
            session.cancel_token(),
            self.config.idle_timeout,
            events_tx,
        );

        tracing::info!(
            session_id = %session_id,
            conversation_id = ?conversation_id,
            "Session started"
        );

        if let Some(previous) = self.task.replace(task) {
            previous.abort();
        }
        self.session = Some(session);
        self.events_rx = Some(events_rx);

        self.publish(ChatUpdate::MessageAppended {
            conversation_id,
            message: user_message,
        })
        .await;
        self.publish_state(&session_id, SessionState::Sending).await;

        Ok(session_id)
    }

    /// Fold whatever session events are ready, without waiting
    ///
    /// Returns `true` if there was activity.
    pub async fn poll_session(&mut self) -> bool {
        let mut events = Vec::new();
        let mut closed = false;
        if let Some(rx) = self.events_rx.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => {
                        let terminal =
                            matches!(event, SessionEvent::Completed | SessionEvent::Failed(_));
                        events.push(event);
                        if terminal {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }

        let active = !events.is_empty() || closed;
        for event in events {
            self.apply_event(event).await;
        }
        if closed {
            self.exchange_closed().await;
        }
        active
    }

    /// Fold session events until the session reaches a terminal state
    ///
    /// Returns the final state, or `None` if no session was started.
    pub async fn wait_session(&mut self) -> Option<SessionState> {
        loop {
            let event = match self.events_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => break,
            };
            match event {
                Some(event) => self.apply_event(event).await,
                None => self.exchange_closed().await,
            }
        }
        self.session_state()
    }

    /// Stop the in-flight session, discarding its partial answer
    ///
    /// Returns `false` if nothing was in flight. When this returns the
    /// exchange task has stopped and its byte source is closed.
    pub async fn cancel(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.cancel() {
            return false;
        }
        let session_id = session.id().clone();
        tracing::info!(session_id = %session_id, "Session cancelled");

        self.events_rx = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Exchange task ended abnormally");
            }
        }

        self.publish_state(&session_id, SessionState::Cancelled).await;
        true
    }

    /// Cancel any in-flight session, then load `conversation_id`
    ///
    /// If the history cannot be loaded the conversation is still activated
    /// (with whatever was cached for it) and the error is returned.
    pub async fn switch_conversation(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        self.cancel().await;

        let result = self
            .store
            .select(self.backend.as_ref(), conversation_id, self.config.history_limit)
            .await
            .map(|_| ());

        let messages = self.store.messages().to_vec();
        self.publish(ChatUpdate::ConversationLoaded {
            conversation_id: Some(conversation_id.to_string()),
            messages,
        })
        .await;

        if let Err(e) = &result {
            self.notify(NotifyLevel::Error, e.to_string()).await;
        }
        result
    }

    /// Cancel any in-flight session and activate an empty draft
    pub async fn new_conversation(&mut self) {
        self.cancel().await;
        self.store.start_draft();
        self.publish(ChatUpdate::ConversationLoaded {
            conversation_id: None,
            messages: Vec::new(),
        })
        .await;
    }

    /// Re-fetch the conversation directory
    pub async fn refresh_conversations(&mut self) -> Result<(), StoreError> {
        self.store.begin_refresh();
        self.publish(ChatUpdate::ConversationList {
            conversations: self.store.list().to_vec(),
            loading: true,
        })
        .await;

        let result = self
            .store
            .refresh_list(self.backend.as_ref(), self.config.list_limit)
            .await
            .map(|_| ());

        self.publish(ChatUpdate::ConversationList {
            conversations: self.store.list().to_vec(),
            loading: false,
        })
        .await;

        if let Err(e) = &result {
            self.notify(NotifyLevel::Warning, e.to_string()).await;
        }
        result
    }

    async fn apply_event(&mut self, event: SessionEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let session_id = session.id().clone();

        match event {
            SessionEvent::Streaming => {
                if session.mark_streaming() {
                    self.publish_state(&session_id, SessionState::Streaming).await;
                }
            }
            SessionEvent::Delta(delta) => {
                let Some(text) = session.push_delta(&delta).map(String::from) else {
                    return;
                };
                self.publish(ChatUpdate::StreamingText { session_id, text })
                    .await;
            }
            SessionEvent::Completed => {
                let Some(answer) = session.complete() else {
                    return;
                };
                let bound = session.conversation_id().map(String::from);
                let assigned = session.assigned_conversation_id().map(String::from);
                tracing::info!(
                    session_id = %session_id,
                    answer_len = answer.content.len(),
                    "Session completed"
                );
                self.finish_exchange();

                self.append(bound.as_deref(), answer).await;
                if bound.is_none() {
                    if let Some(id) = assigned {
                        if self.store.active_id().is_none() && self.store.adopt(&id) {
                            self.publish(ChatUpdate::ConversationAdopted {
                                conversation_id: id,
                            })
                            .await;
                        }
                    }
                }
                self.publish_state(&session_id, SessionState::Completed).await;
            }
            SessionEvent::Failed(error) => {
                let Some(message) = session.fail(&error) else {
                    return;
                };
                let bound = session.conversation_id().map(String::from);
                tracing::warn!(session_id = %session_id, error = %error, "Session failed");
                self.finish_exchange();

                self.append(bound.as_deref(), message).await;
                self.notify(NotifyLevel::Error, error).await;
                self.publish_state(&session_id, SessionState::Failed).await;
            }
        }
    }

    /// The exchange task went away without a terminal event
    async fn exchange_closed(&mut self) {
        self.finish_exchange();
        if self.is_busy() {
            self.apply_event(SessionEvent::Failed("stream closed unexpectedly".to_string()))
                .await;
        }
    }

    fn finish_exchange(&mut self) {
        self.events_rx = None;
        self.task = None;
    }

    async fn append(&mut self, conversation_id: Option<&str>, message: Message) {
        if self.store.append(conversation_id, message.clone()) {
            self.publish(ChatUpdate::MessageAppended {
                conversation_id: conversation_id.map(String::from),
                message,
            })
            .await;
        }
    }

    async fn publish_state(&self, session_id: &SessionId, state: SessionState) {
        self.publish(ChatUpdate::SessionState {
            session_id: session_id.clone(),
            state,
        })
        .await;
    }

    async fn notify(&self, level: NotifyLevel, message: String) {
        self.publish(ChatUpdate::Notify { level, message }).await;
    }

    /// Send an update to the surface
    async fn publish(&self, update: ChatUpdate) {
        if let Err(e) = self.tx.send(update).await {
            tracing::warn!("Failed to send update to surface: {}", e);
        }
    }
}

impl<B: ChatBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::mock::{MockBackend, Script};
    use crate::backend::{ChatRequest, HistoryEntry};
    use crate::messages::MessageRole;
    use crate::streaming::MemoryByteSource;

    const ANSWER: &str = concat!(
        "data: {\"event\":\"message\",\"answer\":\"Kuber\",\"conversation_id\":\"c9\"}\n\n",
        "data: {\"event\":\"message\",\"answer\":\"netes\",\"conversation_id\":\"c9\"}\n\n",
        "data: {\"event\":\"message_end\",\"conversation_id\":\"c9\"}\n\n",
    );

    fn controller(backend: MockBackend) -> (SessionController<MockBackend>, mpsc::Receiver<ChatUpdate>) {
        let (tx, rx) = mpsc::channel(256);
        (
            SessionController::new(backend, ControllerConfig::default(), tx),
            rx,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ChatUpdate>) -> Vec<ChatUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn states(updates: &[ChatUpdate]) -> Vec<SessionState> {
        updates
            .iter()
            .filter_map(|u| match u {
                ChatUpdate::SessionState { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn contents(messages: &[Message]) -> Vec<(MessageRole, &str)> {
        messages.iter().map(|m| (m.role, m.content.as_str())).collect()
    }

    #[tokio::test]
    async fn test_send_streams_and_completes() {
        let (mut controller, mut rx) =
            controller(MockBackend::new().with_stream(Script::body(ANSWER)));

        controller.send("what is k8s").await.unwrap();
        // User message is there before any answer
        assert_eq!(
            contents(controller.store().messages()),
            vec![(MessageRole::User, "what is k8s")]
        );

        assert_eq!(controller.wait_session().await, Some(SessionState::Completed));
        assert_eq!(controller.session().unwrap().accumulated_answer(), "Kubernetes");
        assert_eq!(
            contents(controller.store().messages()),
            vec![
                (MessageRole::User, "what is k8s"),
                (MessageRole::Assistant, "Kubernetes"),
            ]
        );

        let updates = drain(&mut rx);
        assert_eq!(
            states(&updates),
            vec![SessionState::Sending, SessionState::Streaming, SessionState::Completed]
        );
        let streamed: Vec<&str> = updates
            .iter()
            .filter_map(|u| match u {
                ChatUpdate::StreamingText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, vec!["Kuber", "Kubernetes"]);
    }

    #[tokio::test]
    async fn test_draft_adopts_backend_conversation() {
        let backend = MockBackend::new()
            .with_stream(Script::body(ANSWER))
            .with_stream(Script::body(ANSWER));
        let (mut controller, mut rx) = controller(backend);

        controller.send("first").await.unwrap();
        controller.wait_session().await;
        assert_eq!(controller.store().active_id(), Some("c9"));
        assert!(drain(&mut rx)
            .iter()
            .any(|u| matches!(u, ChatUpdate::ConversationAdopted { conversation_id } if conversation_id == "c9")));

        controller.send("second").await.unwrap();
        controller.wait_session().await;
        assert_eq!(
            controller.backend().requests(),
            vec![
                ChatRequest::new("first"),
                ChatRequest::new("second").with_conversation(Some("c9".to_string())),
            ]
        );
        assert_eq!(controller.store().messages().len(), 4);
    }

    #[tokio::test]
    async fn test_send_rejections_change_nothing() {
        let source = MemoryByteSource::new(Vec::<Vec<u8>>::new()).stalled();
        let (tx, mut rx) = mpsc::channel(256);
        let mut controller = SessionController::new(
            MockBackend::new().with_stream(Script::Body(source)),
            ControllerConfig {
                max_input_length: 5,
                ..Default::default()
            },
            tx,
        );

        assert_eq!(controller.send("   \n").await, Err(SendRejected::Empty));
        assert_eq!(
            controller.send("too long").await,
            Err(SendRejected::TooLong { len: 8, max: 5 })
        );
        assert!(controller.session().is_none());
        assert!(drain(&mut rx).is_empty());

        controller.send("hi").await.unwrap();
        let messages_before = controller.store().messages().len();
        assert_eq!(controller.send("again").await, Err(SendRejected::Busy));
        assert_eq!(controller.store().messages().len(), messages_before);
        assert_eq!(controller.backend().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_appends_error_message() {
        // Scenario D: non-success status
        let (mut controller, mut rx) =
            controller(MockBackend::new().with_stream(Script::status(500, "upstream down")));

        controller.send("hello").await.unwrap();
        assert_eq!(controller.wait_session().await, Some(SessionState::Failed));

        let messages = controller.store().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages[1].content.starts_with("Error: "));
        assert!(messages[1].content.contains("500"));

        let updates = drain(&mut rx);
        assert_eq!(states(&updates), vec![SessionState::Sending, SessionState::Failed]);
        assert!(updates
            .iter()
            .any(|u| matches!(u, ChatUpdate::Notify { level: NotifyLevel::Error, .. })));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_appends_nothing() {
        let source = MemoryByteSource::new(vec![
            "data: {\"event\":\"message\",\"answer\":\"partial\"}\n\n",
        ])
        .stalled();
        let flag = source.cancel_flag();
        let (mut controller, mut rx) =
            controller(MockBackend::new().with_stream(Script::Body(source)));

        controller.send("q").await.unwrap();
        while controller.session().unwrap().accumulated_answer().is_empty() {
            controller.poll_session().await;
            tokio::task::yield_now().await;
        }

        assert!(controller.cancel().await);
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(controller.session_state(), Some(SessionState::Cancelled));
        assert_eq!(contents(controller.store().messages()), vec![(MessageRole::User, "q")]);
        assert!(!controller.poll_session().await);
        assert_eq!(controller.wait_session().await, Some(SessionState::Cancelled));

        let updates = drain(&mut rx);
        assert_eq!(states(&updates).last(), Some(&SessionState::Cancelled));
        assert!(!controller.cancel().await);
    }

    #[tokio::test]
    async fn test_switch_cancels_before_loading_history() {
        let source = MemoryByteSource::new(Vec::<Vec<u8>>::new()).stalled();
        let backend = MockBackend::new()
            .with_stream(Script::Body(source))
            .with_conversation("c7", "Alerts", vec![HistoryEntry::new("q1", "a1")]);
        let (mut controller, mut rx) = controller(backend);

        controller.send("draft question").await.unwrap();
        while controller.session_state() != Some(SessionState::Streaming) {
            controller.poll_session().await;
            tokio::task::yield_now().await;
        }

        controller.switch_conversation("c7").await.unwrap();

        assert_eq!(controller.session_state(), Some(SessionState::Cancelled));
        assert_eq!(
            controller.backend().history_calls(),
            vec![("c7".to_string(), true)]
        );
        assert_eq!(
            contents(controller.store().messages()),
            vec![(MessageRole::User, "q1"), (MessageRole::Assistant, "a1")]
        );

        let updates = drain(&mut rx);
        let cancelled_at = updates
            .iter()
            .position(|u| matches!(u, ChatUpdate::SessionState { state: SessionState::Cancelled, .. }))
            .unwrap();
        let loaded_at = updates
            .iter()
            .position(|u| matches!(u, ChatUpdate::ConversationLoaded { .. }))
            .unwrap();
        assert!(cancelled_at < loaded_at);
    }

    #[tokio::test]
    async fn test_new_conversation_starts_empty_draft() {
        let backend = MockBackend::new()
            .with_conversation("c1", "One", vec![HistoryEntry::new("q", "a")]);
        let (mut controller, _rx) = controller(backend);

        controller.switch_conversation("c1").await.unwrap();
        controller.new_conversation().await;

        assert_eq!(controller.store().active_id(), None);
        assert!(controller.store().messages().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_conversations_publishes_loading() {
        let backend = MockBackend::new().with_conversation("c1", "One", Vec::new());
        let (mut controller, mut rx) = controller(backend);

        controller.refresh_conversations().await.unwrap();

        let flags: Vec<(usize, bool)> = drain(&mut rx)
            .into_iter()
            .filter_map(|u| match u {
                ChatUpdate::ConversationList { conversations, loading } => {
                    Some((conversations.len(), loading))
                }
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![(0, true), (1, false)]);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let source = MemoryByteSource::new(Vec::<Vec<u8>>::new()).stalled();
        let (mut controller, _rx) =
            controller(MockBackend::new().with_stream(Script::Body(source)));

        // Safe when idle
        controller.dispose();
        assert!(controller.is_disposed());
        controller.dispose();
        assert_eq!(controller.send("hi").await, Err(SendRejected::Disposed));
    }

    #[tokio::test]
    async fn test_dispose_cancels_in_flight_session() {
        let source = MemoryByteSource::new(Vec::<Vec<u8>>::new()).stalled();
        let (mut controller, _rx) =
            controller(MockBackend::new().with_stream(Script::Body(source)));

        controller.send("hi").await.unwrap();
        controller.handle_action(UserAction::Dispose).await.unwrap();

        assert_eq!(controller.session_state(), Some(SessionState::Cancelled));
        assert_eq!(controller.store().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_action_notifies() {
        let (mut controller, mut rx) = controller(MockBackend::new());

        controller.handle_action(UserAction::send("  ")).await.unwrap();

        let updates = drain(&mut rx);
        assert!(matches!(
            updates.as_slice(),
            [ChatUpdate::Notify { level: NotifyLevel::Warning, message }] if message == "message is empty"
        ));
    }

    #[test]
    fn test_config_from_client_config() {
        let mut client = ClientConfig::default();
        client.stream.idle_timeout_ms = 0;
        client.input.max_input_length = 42;

        let config = ControllerConfig::from(&client);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.max_input_length, 42);
    }
}
