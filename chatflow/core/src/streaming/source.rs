//! Byte Sources
//!
//! The transport side of a stream: something that hands out byte chunks until
//! end-of-stream and can be closed early.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use super::StreamError;

/// Chunked byte transport
///
/// `next_chunk` returns `Ok(None)` exactly once, at end-of-stream. Chunks may
/// be empty and may cut through multi-byte characters.
#[async_trait]
pub trait ByteSource: Send {
    /// Wait for the next chunk
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError>;

    /// Close the source and release the underlying connection
    ///
    /// After this call `next_chunk` returns `Ok(None)`.
    fn cancel(&mut self);
}

#[async_trait]
impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        (**self).next_chunk().await
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }
}

/// Byte source over a streaming HTTP response body
pub struct HttpByteSource {
    body: Option<BoxStream<'static, Result<Vec<u8>, reqwest::Error>>>,
}

impl HttpByteSource {
    /// Wrap a response whose status has already been checked
    #[must_use]
    pub fn new(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self { body: Some(body) }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };

        match body.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => {
                self.body = None;
                Err(StreamError::Transport(e.to_string()))
            }
            None => {
                self.body = None;
                Ok(None)
            }
        }
    }

    fn cancel(&mut self) {
        // Dropping the body stream closes the connection
        if self.body.take().is_some() {
            tracing::debug!("Closed HTTP response body");
        }
    }
}

/// In-memory byte source
///
/// Replays a fixed list of chunks. Useful for embedding and tests: it can
/// pause between chunks, end with a transport error, or stall forever after
/// the last chunk like a hung connection.
#[derive(Debug, Default)]
pub struct MemoryByteSource {
    chunks: VecDeque<Vec<u8>>,
    delay: Option<Duration>,
    failure: Option<String>,
    stall: bool,
    closed: bool,
    cancelled: Arc<AtomicBool>,
}

impl MemoryByteSource {
    /// Create a source that yields `chunks` and then ends
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Split `data` into chunks of at most `size` bytes
    pub fn chunked(data: impl AsRef<[u8]>, size: usize) -> Self {
        Self::new(data.as_ref().chunks(size.max(1)).map(<[u8]>::to_vec))
    }

    /// Sleep before handing out each chunk
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail with a transport error after the last chunk
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Never signal end-of-stream after the last chunk
    #[must_use]
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    /// Flag that flips to `true` when [`ByteSource::cancel`] is called
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

#[async_trait]
impl ByteSource for MemoryByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        if self.closed {
            return Ok(None);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        if let Some(message) = self.failure.take() {
            self.closed = true;
            return Err(StreamError::Transport(message));
        }
        if self.stall {
            std::future::pending::<()>().await;
        }
        self.closed = true;
        Ok(None)
    }

    fn cancel(&mut self) {
        self.closed = true;
        self.chunks.clear();
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
