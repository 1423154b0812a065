//! Chat Backend Integration
//!
//! Abstracted access to the chat service through a common trait, so the
//! session and conversation layers never touch HTTP directly.
//!
//! # Available Backends
//!
//! - **Proxy**: the chat proxy HTTP endpoints (default)
//!
//! # Usage
//!
//! ```ignore
//! use chatflow_core::backend::{BackendConfig, ChatBackend, ChatRequest, ProxyBackend};
//!
//! let backend = ProxyBackend::new(BackendConfig::with_base_url("http://localhost:3000"))?;
//! let source = backend.open_stream(&ChatRequest::new("Hello!")).await?;
//! ```

#[cfg(test)]
pub(crate) mod mock;
mod proxy;
mod traits;

pub use proxy::ProxyBackend;
pub use traits::{
    BackendConfig, BackendError, ChatBackend, ChatRequest, HistoryEntry, Page,
    DEFAULT_RESOURCE_PREFIX,
};
