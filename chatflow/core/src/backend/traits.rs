//! Chat Backend Traits
//!
//! The backend is everything on the far side of HTTP: the streaming query
//! endpoint, the conversation directory and the message history. Sessions
//! and the conversation store only see this trait, so tests and alternative
//! transports can stand in for the real proxy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::ConversationSummary;
use crate::streaming::ByteSource;

/// Errors talking to the chat backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the response could not be read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The response carried no body to stream
    #[error("response has no body")]
    MissingBody,

    /// A JSON response did not have the expected shape
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Body of a streaming query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question
    pub query: String,
    /// Conversation to continue; omitted to start a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Create a request that starts a new conversation
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: None,
        }
    }

    /// Continue an existing conversation (or start one for `None`)
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }
}

/// One question/answer pair from the history endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What the user asked
    pub query: String,
    /// What the backend answered
    pub answer: String,
    /// Backend message id
    #[serde(default)]
    pub id: Option<String>,
    /// Conversation the entry belongs to
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Creation time (Unix seconds)
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl HistoryEntry {
    /// Create an entry from a question and its answer
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            ..Default::default()
        }
    }
}

/// `{ "data": [...] }` envelope used by the list and history endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub data: Vec<T>,
    /// Whether more items exist
    #[serde(default)]
    pub has_more: bool,
    /// Page size the backend applied
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Chat backend trait
///
/// Implement this trait to point the client at a different backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Check if the backend is healthy and reachable
    async fn health_check(&self) -> bool;

    /// Submit a query and return the streaming body
    ///
    /// Fails on network errors, non-success statuses, or a missing body.
    async fn open_stream(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, BackendError>;

    /// Fetch the conversation directory
    async fn list_conversations(&self, limit: u32) -> Result<Vec<ConversationSummary>, BackendError>;

    /// Fetch one page of a conversation's question/answer history
    ///
    /// Without `first_id` this is the newest page. With it, the page holds
    /// the entries just before that entry. Entries within a page are oldest
    /// first.
    async fn history_page(
        &self,
        conversation_id: &str,
        limit: u32,
        first_id: Option<&str>,
    ) -> Result<Page<HistoryEntry>, BackendError>;

    /// Fetch the full history of one conversation, oldest first
    ///
    /// Pages of `page_size` entries are requested backwards from the newest
    /// until the backend reports no more.
    async fn message_history(
        &self,
        conversation_id: &str,
        page_size: u32,
    ) -> Result<Vec<HistoryEntry>, BackendError> {
        let mut entries: Vec<HistoryEntry> = Vec::new();
        let mut first_id: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .history_page(conversation_id, page_size, first_id.as_deref())
                .await?;
            pages += 1;

            let has_more = page.has_more;
            let oldest = page.data.first().and_then(|entry| entry.id.clone());
            let mut older = page.data;
            older.append(&mut entries);
            entries = older;

            if !has_more {
                break;
            }
            match oldest {
                Some(id) if first_id.as_deref() != Some(id.as_str()) => first_id = Some(id),
                _ => {
                    tracing::warn!(
                        conversation_id,
                        loaded = entries.len(),
                        "History reports more entries but gives no cursor to continue from"
                    );
                    break;
                }
            }
        }

        tracing::debug!(conversation_id, pages, count = entries.len(), "Loaded message history");
        Ok(entries)
    }
}

/// Chat proxy connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Scheme, host and port of the proxy (no trailing slash needed)
    pub base_url: String,
    /// Path of the streaming query endpoint
    pub chat_path: String,
    /// Path of the conversation list endpoint
    pub conversations_path: String,
    /// Path of the message history endpoint
    pub history_path: String,
    /// Path of the health endpoint
    pub ping_path: String,
    /// Sort order requested from the conversation list endpoint
    pub conversation_sort: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

/// Resource prefix of the proxy plugin
pub const DEFAULT_RESOURCE_PREFIX: &str = "/api/plugins/cloudorg-difychatflow-app/resources";

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            chat_path: format!("{DEFAULT_RESOURCE_PREFIX}/difyChatProxy"),
            conversations_path: format!("{DEFAULT_RESOURCE_PREFIX}/difyGetConversations"),
            history_path: format!("{DEFAULT_RESOURCE_PREFIX}/difyMessageHistoryProxy"),
            ping_path: format!("{DEFAULT_RESOURCE_PREFIX}/ping"),
            conversation_sort: "-updated_at".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Default settings pointed at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Join the base URL and an endpoint path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
