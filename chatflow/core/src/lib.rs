//! Chatflow Core - Streaming Chat Client
//!
//! This crate is the client core for a conversational backend that answers
//! over Server-Sent Events. It turns an arbitrarily fragmented HTTP body into
//! answer deltas, folds them into a live, cancellable session, and keeps the
//! result consistent with the backend's persisted conversation history.
//!
//! It has no UI of its own: a surface renders [`ChatUpdate`]s and feeds
//! [`UserAction`]s back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                               │
//! │            UserAction (up)          ChatUpdate (down)             │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                        CHATFLOW CORE                              │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                    SessionController                        │  │
//! │  │  ┌───────────────────┐   ┌──────────┐   ┌───────────────┐  │  │
//! │  │  │ ConversationStore │   │ Session  │──>│ exchange task │  │  │
//! │  │  └───────────────────┘   └──────────┘   └───────┬───────┘  │  │
//! │  └─────────────────────────────────────────────────┼──────────┘  │
//! │                                                    │             │
//! │   ChatBackend ──> ByteSource ──> StreamConsumer ──> Delta        │
//! │                                  (Utf8Decoder + frame::consume)  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use chatflow_core::{BackendConfig, ControllerConfig, ProxyBackend, SessionController};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel(100);
//! let backend = ProxyBackend::new(BackendConfig::with_base_url("http://localhost:3000"))?;
//! let mut controller = SessionController::new(backend, ControllerConfig::default(), tx);
//!
//! controller.send("What is Kubernetes?").await?;
//! controller.wait_session().await;
//!
//! while let Ok(update) = rx.try_recv() {
//!     // Render update
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`frame`]: Splits buffered SSE text into `data:` frames and decodes them
//! - [`streaming`]: Byte sources, incremental UTF-8 decoding, the stream consumer
//! - [`backend`]: Chat backend abstraction and the HTTP proxy client
//! - [`session`]: One query's lifecycle and the exchange task
//! - [`conversation`]: Conversation directory and history store
//! - [`controller`]: Orchestration of store and session
//! - [`events`]: Actions from the surface
//! - [`messages`]: Updates to the surface
//! - [`config`]: TOML/env/CLI configuration

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod frame;
pub mod messages;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use backend::{BackendConfig, BackendError, ChatBackend, ChatRequest, ProxyBackend};
pub use config::{load_config, ClientConfig, ConfigOverrides};
pub use controller::{ControllerConfig, SendRejected, SessionController};
pub use conversation::{ConversationStore, ConversationSummary};
pub use events::UserAction;
pub use messages::{ChatUpdate, Message, MessageRole, NotifyLevel};
pub use session::{Session, SessionState};
pub use streaming::{Delta, StreamConsumer, StreamError};
