//! Conversation Store
//!
//! Maps conversation ids to their finalized message history and tracks which
//! conversation is active.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   ConversationStore                       │
//! │  summaries (directory)      conversations (cached history)│
//! │  ┌──────┐┌──────┐┌──────┐   ┌────────────┐┌────────────┐ │
//! │  │  c1  ││  c2  ││  c3  │   │ c1: [msgs] ││ c2: [msgs] │ │
//! │  └──────┘└──────┘└──────┘   └────────────┘└────────────┘ │
//! │                                                           │
//! │  active_id + active messages  <── select / start_draft   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The active sequence only ever holds finalized messages. Streaming text
//! lives in the session until it completes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendError, ChatBackend, HistoryEntry};
use crate::messages::{Message, MessageId, MessageRole};

/// Errors loading conversation data
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conversation directory could not be fetched
    #[error("failed to list conversations: {0}")]
    List(#[source] BackendError),

    /// A conversation's history could not be fetched
    #[error("failed to load conversation {id}: {source}")]
    History {
        /// Conversation that failed to load
        id: String,
        /// Underlying backend error
        #[source]
        source: BackendError,
    },
}

/// Directory entry for a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Backend conversation id
    pub id: String,
    /// Display name, if the backend has one
    #[serde(default)]
    pub name: Option<String>,
}

impl ConversationSummary {
    /// Create a summary
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(String::from),
        }
    }

    /// Name to show, falling back to the id
    #[must_use]
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// A conversation and its finalized history
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    /// Backend conversation id
    pub id: String,
    /// Display name
    pub display_name: Option<String>,
    /// Messages in insertion order
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id: id.into(),
            display_name,
            messages: Vec::new(),
        }
    }

    /// Append unless a message with the same id is already present
    pub fn push(&mut self, message: Message) -> bool {
        push_unique(&mut self.messages, message)
    }
}

/// Owner of the active conversation and the cached directory
#[derive(Debug, Default)]
pub struct ConversationStore {
    summaries: Vec<ConversationSummary>,
    loading: bool,
    active_id: Option<String>,
    active: Vec<Message>,
    conversations: HashMap<String, Conversation>,
}

impl ConversationStore {
    /// Create a store whose active conversation is an empty draft
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached conversation summaries
    #[must_use]
    pub fn list(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    /// Whether a directory refresh is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Mark a directory refresh as started
    pub fn begin_refresh(&mut self) {
        self.loading = true;
    }

    /// Store a refreshed directory
    pub fn finish_refresh(&mut self, summaries: Vec<ConversationSummary>) {
        for summary in &summaries {
            if let Some(conversation) = self.conversations.get_mut(&summary.id) {
                conversation.display_name = summary.name.clone();
            }
        }
        self.summaries = summaries;
        self.loading = false;
    }

    /// Fetch the directory from `backend`
    ///
    /// On failure the previous summaries are kept.
    pub async fn refresh_list<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        limit: u32,
    ) -> Result<&[ConversationSummary], StoreError> {
        self.begin_refresh();
        match backend.list_conversations(limit).await {
            Ok(summaries) => {
                self.finish_refresh(summaries);
                Ok(&self.summaries)
            }
            Err(e) => {
                self.loading = false;
                Err(StoreError::List(e))
            }
        }
    }

    /// Load the full history of `id` from `backend` and make it active
    ///
    /// History is fetched in pages of `page_size` entries. The active sequence
    /// is replaced in one step. If the history cannot be fetched, the
    /// previously cached history for `id` (or an empty one) is activated
    /// instead and the error is returned.
    pub async fn select<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        id: &str,
        page_size: u32,
    ) -> Result<&[Message], StoreError> {
        let fetched = backend.message_history(id, page_size).await;

        self.stash_active();
        let display_name = self.display_name_of(id);
        let conversation = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, display_name));

        let result = match fetched {
            Ok(entries) => {
                conversation.messages = expand_history(&entries);
                tracing::debug!(
                    conversation_id = id,
                    messages = conversation.messages.len(),
                    "Conversation loaded"
                );
                Ok(())
            }
            Err(source) => {
                tracing::warn!(conversation_id = id, error = %source, "Failed to load history");
                Err(StoreError::History {
                    id: id.to_string(),
                    source,
                })
            }
        };

        self.active = conversation.messages.clone();
        self.active_id = Some(id.to_string());
        result.map(|()| self.active.as_slice())
    }

    /// Make an empty, not yet saved conversation active
    pub fn start_draft(&mut self) {
        self.stash_active();
        self.active_id = None;
        self.active.clear();
    }

    /// Give the active draft the id the backend assigned to it
    ///
    /// Returns `false` if the active conversation already has an id.
    pub fn adopt(&mut self, id: &str) -> bool {
        if self.active_id.is_some() || id.is_empty() {
            return false;
        }
        self.active_id = Some(id.to_string());
        if !self.summaries.iter().any(|s| s.id == id) {
            self.summaries.insert(0, ConversationSummary::new(id, None));
        }
        tracing::debug!(conversation_id = id, "Draft adopted backend conversation id");
        true
    }

    /// Append a finalized message to `conversation_id`
    ///
    /// `None` addresses the active draft. Re-appending a message id that is
    /// already present is a no-op. Returns whether the message was added.
    pub fn append(&mut self, conversation_id: Option<&str>, message: Message) -> bool {
        if conversation_id == self.active_id.as_deref() {
            return push_unique(&mut self.active, message);
        }
        match conversation_id {
            Some(id) => self
                .conversations
                .entry(id.to_string())
                .or_insert_with(|| Conversation::new(id, None))
                .push(message),
            None => {
                tracing::debug!("Dropping message for an inactive draft");
                false
            }
        }
    }

    /// Finalized messages of the active conversation
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.active
    }

    /// Id of the active conversation (`None` for a draft)
    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Cached conversation by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    fn stash_active(&mut self) {
        let Some(id) = self.active_id.clone() else {
            return;
        };
        let display_name = self.display_name_of(&id);
        let conversation = self
            .conversations
            .entry(id.clone())
            .or_insert_with(|| Conversation::new(id, display_name));
        conversation.messages = std::mem::take(&mut self.active);
    }

    fn display_name_of(&self, id: &str) -> Option<String> {
        self.summaries
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.name.clone())
    }
}

fn push_unique(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    messages.push(message);
    true
}

/// Expand question/answer pairs into user and assistant messages
fn expand_history(entries: &[HistoryEntry]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        let mut query = Message::new(MessageRole::User, entry.query.clone());
        let mut answer = Message::new(MessageRole::Assistant, entry.answer.clone());
        if let Some(id) = &entry.id {
            query.id = MessageId(format!("{id}:query"));
            answer.id = MessageId(format!("{id}:answer"));
        }
        if let Some(created_at) = entry.created_at.and_then(|s| u64::try_from(s).ok()) {
            let millis = created_at.saturating_mul(1000);
            query.timestamp = millis;
            answer.timestamp = millis;
        }
        messages.push(query);
        messages.push(answer);
    }
    messages
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::mock::MockBackend;

    fn contents(messages: &[Message]) -> Vec<(MessageRole, &str)> {
        messages.iter().map(|m| (m.role, m.content.as_str())).collect()
    }

    #[test]
    fn test_summary_title() {
        assert_eq!(ConversationSummary::new("c1", Some("Deploys")).title(), "Deploys");
        assert_eq!(ConversationSummary::new("c1", Some("  ")).title(), "c1");
        assert_eq!(ConversationSummary::new("c1", None).title(), "c1");
    }

    #[test]
    fn test_summary_tolerates_extra_fields() {
        let summary: ConversationSummary = serde_json::from_str(
            r#"{"id":"c1","name":"Alerts","inputs":{},"status":"normal","created_at":1}"#,
        )
        .unwrap();
        assert_eq!(summary, ConversationSummary::new("c1", Some("Alerts")));
    }

    #[test]
    fn test_append_is_idempotent() {
        let mut store = ConversationStore::new();
        let message = Message::user("hi");

        assert!(store.append(None, message.clone()));
        assert!(!store.append(None, message));
        assert!(store.append(None, Message::assistant("hello")));

        assert_eq!(
            contents(store.messages()),
            vec![(MessageRole::User, "hi"), (MessageRole::Assistant, "hello")]
        );
    }

    #[tokio::test]
    async fn test_select_loads_history() {
        // Two prior exchanges expand to four messages in order
        let backend = MockBackend::new().with_conversation(
            "c7",
            "Alerts",
            vec![HistoryEntry::new("q1", "a1"), HistoryEntry::new("q2", "a2")],
        );
        let mut store = ConversationStore::new();

        let loaded = store.select(&backend, "c7", 20).await.unwrap();
        assert_eq!(
            contents(loaded),
            vec![
                (MessageRole::User, "q1"),
                (MessageRole::Assistant, "a1"),
                (MessageRole::User, "q2"),
                (MessageRole::Assistant, "a2"),
            ]
        );
        assert_eq!(store.active_id(), Some("c7"));
    }

    #[tokio::test]
    async fn test_select_replaces_active_sequence() {
        let backend = MockBackend::new()
            .with_conversation("c1", "One", vec![HistoryEntry::new("q1", "a1")])
            .with_conversation("c2", "Two", vec![HistoryEntry::new("q2", "a2")]);
        let mut store = ConversationStore::new();

        store.select(&backend, "c1", 20).await.unwrap();
        store.append(Some("c1"), Message::user("follow-up"));
        store.select(&backend, "c2", 20).await.unwrap();

        assert_eq!(
            contents(store.messages()),
            vec![(MessageRole::User, "q2"), (MessageRole::Assistant, "a2")]
        );
        // The left conversation keeps what was appended to it
        assert_eq!(store.get("c1").unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_select_failure_activates_cached_history() {
        let backend = MockBackend::new();
        let mut store = ConversationStore::new();
        store.append(None, Message::user("draft text"));

        let err = store.select(&backend, "missing", 20).await.unwrap_err();
        assert!(matches!(err, StoreError::History { ref id, .. } if id == "missing"));
        assert_eq!(store.active_id(), Some("missing"));
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn test_history_ids_are_stable() {
        let mut entry = HistoryEntry::new("q", "a");
        entry.id = Some("m1".to_string());
        entry.created_at = Some(1_700_000_000);
        let backend = MockBackend::new().with_conversation("c1", "One", vec![entry]);
        let mut store = ConversationStore::new();

        store.select(&backend, "c1", 20).await.unwrap();
        let first: Vec<MessageId> = store.messages().iter().map(|m| m.id.clone()).collect();
        store.select(&backend, "c1", 20).await.unwrap();
        let second: Vec<MessageId> = store.messages().iter().map(|m| m.id.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], MessageId("m1:query".to_string()));
        assert_eq!(store.messages()[1].timestamp, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_select_reads_every_history_page() {
        let entries: Vec<HistoryEntry> = (0..60)
            .map(|i| {
                let mut entry = HistoryEntry::new(format!("q{i}"), format!("a{i}"));
                entry.id = Some(format!("m{i}"));
                entry
            })
            .collect();
        let backend = MockBackend::new().with_conversation("c1", "Long", entries);
        let mut store = ConversationStore::new();

        let loaded = store.select(&backend, "c1", 50).await.unwrap();
        assert_eq!(loaded.len(), 120);
        assert_eq!(loaded[0].content, "q0");
        assert_eq!(loaded[1].content, "a0");
        assert_eq!(loaded[119].content, "a59");
        // One load, however many pages it took
        assert_eq!(backend.history_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_saturates() {
        let mut huge = HistoryEntry::new("q", "a");
        huge.created_at = Some(i64::MAX);
        let mut negative = HistoryEntry::new("q2", "a2");
        negative.created_at = Some(-5);
        let backend = MockBackend::new().with_conversation("c1", "One", vec![huge, negative]);
        let mut store = ConversationStore::new();

        let loaded = store.select(&backend, "c1", 20).await.unwrap();
        assert_eq!(loaded[0].timestamp, u64::MAX);
        assert_eq!(loaded[1].timestamp, u64::MAX);
        // Negative times are ignored and keep the local creation time
        assert!(loaded[2].timestamp > 0 && loaded[2].timestamp < u64::MAX);
    }

    #[tokio::test]
    async fn test_refresh_list() {
        let backend = MockBackend::new()
            .with_conversation("c1", "One", Vec::new())
            .with_conversation("c2", "Two", Vec::new());
        let mut store = ConversationStore::new();

        let list = store.refresh_list(&backend, 1).await.unwrap();
        assert_eq!(list, &[ConversationSummary::new("c1", Some("One"))]);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_loading_flag() {
        let mut store = ConversationStore::new();
        store.begin_refresh();
        assert!(store.is_loading());
        store.finish_refresh(vec![ConversationSummary::new("c1", None)]);
        assert!(!store.is_loading());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_adopt_draft() {
        let mut store = ConversationStore::new();
        store.append(None, Message::user("hi"));

        assert!(store.adopt("c9"));
        assert_eq!(store.active_id(), Some("c9"));
        assert_eq!(store.list()[0].id, "c9");
        assert_eq!(store.messages().len(), 1);

        // Already has an id
        assert!(!store.adopt("c10"));
        assert_eq!(store.active_id(), Some("c9"));
    }

    #[test]
    fn test_start_draft_stashes_active() {
        let mut store = ConversationStore::new();
        store.adopt("c1");
        store.append(Some("c1"), Message::user("kept"));

        store.start_draft();
        assert_eq!(store.active_id(), None);
        assert!(store.messages().is_empty());
        assert_eq!(store.get("c1").unwrap().messages[0].content, "kept");
    }

    #[test]
    fn test_append_to_inactive_draft_is_dropped() {
        let mut store = ConversationStore::new();
        store.adopt("c1");
        assert!(!store.append(None, Message::user("orphan")));
        assert!(store.messages().is_empty());
    }
}
