//! Streaming Infrastructure
//!
//! Consumes a chunked Server-Sent-Events body and yields answer deltas.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      StreamConsumer                           │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────────┐  │
//! │  │ ByteSource │──>│ Utf8Decoder │──>│ buffer + frame parser │──> Delta
//! │  │ (HTTP/mem) │   │ (carry)     │   │ (remainder kept)      │  │
//! │  └────────────┘   └─────────────┘   └──────────────────────┘  │
//! │        ^                                                      │
//! │        └──────── cancel() on CancellationToken                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chatflow_core::streaming::{MemoryByteSource, StreamConsumer};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = MemoryByteSource::new(vec!["data: {\"event\":\"message\",\"answer\":\"Hi\"}\n\n"]);
//! let mut consumer = StreamConsumer::new(source, CancellationToken::new());
//! while let Some(delta) = consumer.next_delta().await {
//!     print!("{}", delta?.text);
//! }
//! ```

mod consumer;
mod source;
mod utf8;

use std::time::Duration;

use thiserror::Error;

pub use consumer::{CompletionCallback, Delta, StreamConsumer, StreamOutcome, StreamStats};
pub use source::{ByteSource, HttpByteSource, MemoryByteSource};
pub use utf8::Utf8Decoder;

/// Errors that end a stream
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The connection failed while reading the body
    #[error("transport error: {0}")]
    Transport(String),

    /// No chunk arrived within the idle limit
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),
}
