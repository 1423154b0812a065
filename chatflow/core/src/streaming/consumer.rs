//! Stream Consumer
//!
//! Turns a [`ByteSource`] into an ordered sequence of answer [`Delta`]s.
//!
//! ```text
//! bytes ──> Utf8Decoder ──> buffer ──> frame::consume ──> ChatEvent ──> Delta
//!                              ^              │
//!                              └── remainder ─┘
//! ```
//!
//! A chunk is only pulled once every delta of the previous chunk has been
//! handed out, so memory stays bounded by the text since the last delimiter.

use std::collections::VecDeque;
use std::time::Duration;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::source::ByteSource;
use super::utf8::Utf8Decoder;
use super::StreamError;
use crate::frame;

/// An incremental piece of answer text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta {
    /// Answer text carried by one `message` event
    pub text: String,
    /// Backend conversation id reported with the event
    pub conversation_id: Option<String>,
    /// Backend message id reported with the event
    pub message_id: Option<String>,
}

impl Delta {
    /// Create a delta with no backend ids
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            message_id: None,
        }
    }
}

/// How a stream ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Transport signalled end-of-stream
    Completed,
    /// Cancellation was observed before end-of-stream
    Cancelled,
    /// Transport error or idle timeout
    Failed,
}

/// Counters for one stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunks pulled from the source
    pub chunks: usize,
    /// Bytes pulled from the source
    pub bytes: usize,
    /// Complete `data:` frames found
    pub frames: usize,
    /// Frames whose payload failed to decode
    pub dropped_frames: usize,
    /// Deltas handed to the caller
    pub deltas: usize,
}

/// Callback run once when a stream terminates
pub type CompletionCallback = Box<dyn FnOnce(StreamOutcome, &StreamStats) + Send>;

/// Owned parsing state for one streamed response
pub struct StreamConsumer<S: ByteSource> {
    source: S,
    decoder: Utf8Decoder,
    buffer: String,
    pending: VecDeque<Delta>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
    outcome: Option<StreamOutcome>,
    on_complete: Option<CompletionCallback>,
    stats: StreamStats,
}

impl<S: ByteSource> StreamConsumer<S> {
    /// Create a consumer over `source`, stopped by `cancel`
    pub fn new(source: S, cancel: CancellationToken) -> Self {
        Self {
            source,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            pending: VecDeque::new(),
            cancel,
            idle_timeout: None,
            outcome: None,
            on_complete: None,
            stats: StreamStats::default(),
        }
    }

    /// Fail the stream when no chunk arrives within `timeout`
    ///
    /// `None` or a zero duration disables the limit.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Run `callback` once when the stream terminates
    #[must_use]
    pub fn on_complete(
        mut self,
        callback: impl FnOnce(StreamOutcome, &StreamStats) + Send + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// How the stream ended, if it has
    #[must_use]
    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.outcome
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Wait for the next delta
    ///
    /// Returns `None` once the stream has ended (completed or cancelled).
    /// A transport failure is returned once as `Some(Err(_))`, after which
    /// the stream is over.
    pub async fn next_delta(&mut self) -> Option<Result<Delta, StreamError>> {
        loop {
            if self.outcome.is_some() {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finish(StreamOutcome::Cancelled);
                return None;
            }
            if let Some(delta) = self.pending.pop_front() {
                self.stats.deltas += 1;
                return Some(Ok(delta));
            }

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                chunk = read_chunk(&mut self.source, self.idle_timeout) => Some(chunk),
            };

            match read {
                None => {
                    self.finish(StreamOutcome::Cancelled);
                    return None;
                }
                Some(Ok(Some(bytes))) => self.ingest(&bytes),
                Some(Ok(None)) => {
                    self.finish(StreamOutcome::Completed);
                    return None;
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Stream failed");
                    self.finish(StreamOutcome::Failed);
                    return Some(Err(e));
                }
            }
        }
    }

    /// Adapt the consumer into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<Delta, StreamError>> {
        futures::stream::unfold(self, |mut consumer| async move {
            consumer
                .next_delta()
                .await
                .map(|item| (item, consumer))
        })
    }

    fn ingest(&mut self, bytes: &[u8]) {
        self.stats.chunks += 1;
        self.stats.bytes += bytes.len();

        let text = self.decoder.decode(bytes);
        if text.is_empty() {
            return;
        }
        self.buffer.push_str(&text);

        let (frames, remainder) = frame::consume(&self.buffer);
        self.buffer = remainder;

        for frame in frames {
            self.stats.frames += 1;
            let Some(event) = frame.decode() else {
                self.stats.dropped_frames += 1;
                continue;
            };
            match event.delta() {
                Some(text) => self.pending.push_back(Delta {
                    text: text.to_string(),
                    conversation_id: event.conversation_id.clone(),
                    message_id: event.message_id.clone(),
                }),
                None => tracing::trace!(kind = %event.event, "Event carries no delta"),
            }
        }
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(outcome);

        if outcome != StreamOutcome::Completed {
            self.source.cancel();
        }
        self.pending.clear();
        let dangling = self.decoder.finish().is_some();
        if !self.buffer.is_empty() || dangling {
            tracing::debug!(
                discarded = self.buffer.len(),
                "Discarding incomplete frame at end of stream"
            );
        }
        self.buffer.clear();

        tracing::debug!(
            outcome = ?outcome,
            chunks = self.stats.chunks,
            bytes = self.stats.bytes,
            frames = self.stats.frames,
            dropped = self.stats.dropped_frames,
            deltas = self.stats.deltas,
            "Stream finished"
        );

        if let Some(callback) = self.on_complete.take() {
            callback(outcome, &self.stats);
        }
    }
}

impl<S: ByteSource> Drop for StreamConsumer<S> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.finish(StreamOutcome::Cancelled);
        }
    }
}

async fn read_chunk<S: ByteSource>(
    source: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, StreamError> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, source.next_chunk()).await {
            Ok(chunk) => chunk,
            Err(_) => Err(StreamError::IdleTimeout(limit)),
        },
        None => source.next_chunk().await,
    }
}
