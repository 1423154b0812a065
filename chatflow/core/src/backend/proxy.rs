//! Chat Proxy Backend
//!
//! HTTP client for the chat proxy that fronts the chatflow service.
//!
//! # Proxy API
//!
//! - `POST {chat_path}` - streaming query, answered with `text/event-stream`
//! - `GET {conversations_path}?limit=&sort_by=` - conversation directory
//! - `GET {history_path}?conversation_id=&limit=&first_id=` - question/answer
//!   history, paged backwards from the newest entry
//! - `GET {ping_path}` - liveness
//!
//! The proxy injects the user identity and API key itself, so requests carry
//! neither.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::traits::{BackendConfig, BackendError, ChatBackend, ChatRequest, HistoryEntry, Page};
use crate::conversation::ConversationSummary;
use crate::streaming::{ByteSource, HttpByteSource};

const EVENT_STREAM: &str = "text/event-stream";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat proxy backend client
#[derive(Clone)]
pub struct ProxyBackend {
    config: BackendConfig,
    /// HTTP client
    http_client: reqwest::Client,
}

impl ProxyBackend {
    /// Create a client for the proxy described by `config`
    ///
    /// Only connecting is time-limited. A streamed answer may legitimately
    /// take minutes, so there is no whole-request timeout.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Settings this client was built with
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        self.config.url(&self.config.chat_path)
    }

    fn conversations_url(&self) -> String {
        self.config.url(&self.config.conversations_path)
    }

    fn history_url(&self) -> String {
        self.config.url(&self.config.history_path)
    }

    fn ping_url(&self) -> String {
        self.config.url(&self.config.ping_path)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<Page<T>, BackendError> {
        let response = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Default for ProxyBackend {
    fn default() -> Self {
        Self {
            config: BackendConfig::default(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for ProxyBackend {
    fn name(&self) -> &str {
        "chat-proxy"
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(self.ping_url())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, BackendError> {
        tracing::debug!(
            url = %self.chat_url(),
            conversation_id = ?request.conversation_id,
            query_len = request.query.len(),
            "Opening chat stream"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .header(ACCEPT, EVENT_STREAM)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(BackendError::MissingBody);
        }

        Ok(Box::new(HttpByteSource::new(response)))
    }

    async fn list_conversations(&self, limit: u32) -> Result<Vec<ConversationSummary>, BackendError> {
        let page: Page<ConversationSummary> = self
            .get_page(
                self.conversations_url(),
                &[
                    ("limit", limit.to_string()),
                    ("sort_by", self.config.conversation_sort.clone()),
                ],
            )
            .await?;

        tracing::debug!(count = page.data.len(), has_more = page.has_more, "Listed conversations");
        Ok(page.data)
    }

    async fn history_page(
        &self,
        conversation_id: &str,
        limit: u32,
        first_id: Option<&str>,
    ) -> Result<Page<HistoryEntry>, BackendError> {
        let mut query = vec![
            ("conversation_id", conversation_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(first_id) = first_id {
            query.push(("first_id", first_id.to_string()));
        }

        let page: Page<HistoryEntry> = self.get_page(self.history_url(), &query).await?;
        tracing::trace!(
            conversation_id,
            first_id = ?first_id,
            count = page.data.len(),
            has_more = page.has_more,
            "Fetched history page"
        );
        Ok(page)
    }
}

/// Turn a non-success response into [`BackendError::Status`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}
