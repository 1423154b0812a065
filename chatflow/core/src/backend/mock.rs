//! Scripted backend for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{BackendError, ChatBackend, ChatRequest, HistoryEntry, Page};
use crate::conversation::ConversationSummary;
use crate::streaming::{ByteSource, MemoryByteSource};

/// What the next `open_stream` call does
pub(crate) enum Script {
    /// Answer with this body
    Body(MemoryByteSource),
    /// Fail the request
    Error(BackendError),
    /// Never answer
    Hang,
}

impl Script {
    pub(crate) fn body(text: &str) -> Self {
        Self::Body(MemoryByteSource::new(vec![text]))
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::Error(BackendError::Status {
            status,
            body: body.to_string(),
        })
    }
}

#[derive(Default)]
pub(crate) struct MockBackend {
    streams: Mutex<VecDeque<Script>>,
    conversations: Vec<ConversationSummary>,
    histories: HashMap<String, Vec<HistoryEntry>>,
    requests: Mutex<Vec<ChatRequest>>,
    served: Mutex<Vec<Arc<AtomicBool>>>,
    /// Conversation id per history call, with whether every served body was closed by then
    history_calls: Mutex<Vec<(String, bool)>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stream(self, script: Script) -> Self {
        self.streams.lock().unwrap().push_back(script);
        self
    }

    pub(crate) fn with_conversation(mut self, id: &str, name: &str, entries: Vec<HistoryEntry>) -> Self {
        self.conversations.push(ConversationSummary::new(id, Some(name)));
        self.histories.insert(id.to_string(), entries);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn history_calls(&self) -> Vec<(String, bool)> {
        self.history_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(Script::Body(source)) => {
                self.served.lock().unwrap().push(source.cancel_flag());
                Ok(Box::new(source))
            }
            Some(Script::Error(e)) => Err(e),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(BackendError::Status {
                status: 503,
                body: "no scripted stream".to_string(),
            }),
        }
    }

    async fn list_conversations(&self, limit: u32) -> Result<Vec<ConversationSummary>, BackendError> {
        Ok(self.conversations.iter().take(limit as usize).cloned().collect())
    }

    async fn history_page(
        &self,
        conversation_id: &str,
        limit: u32,
        first_id: Option<&str>,
    ) -> Result<Page<HistoryEntry>, BackendError> {
        if first_id.is_none() {
            let closed = self
                .served
                .lock()
                .unwrap()
                .iter()
                .all(|flag| flag.load(Ordering::SeqCst));
            self.history_calls
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), closed));
        }

        let entries = self
            .histories
            .get(conversation_id)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                body: "conversation not found".to_string(),
            })?;

        // Entries are oldest first; a page ends just before `first_id`
        let end = match first_id {
            Some(id) => entries
                .iter()
                .position(|e| e.id.as_deref() == Some(id))
                .unwrap_or(0),
            None => entries.len(),
        };
        let start = end.saturating_sub(limit as usize);
        Ok(Page {
            data: entries[start..end].to_vec(),
            has_more: start > 0,
            limit: Some(limit),
        })
    }
}
