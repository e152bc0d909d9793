//! One send/receive interaction
//!
//! A [`Session`] opens a reply stream from a [`ResponderSource`], feeds its
//! chunks through a [`StreamConsumer`] and hands out the resulting updates
//! one at a time. Every suspension point races three things: the next
//! chunk, the overall deadline and the cancellation token. The first to
//! resolve wins.

use crate::consumer::StreamConsumer;
use banksie_core::{
    ByteStream, ResponderSource, SessionId, SessionState, StreamError, StreamUpdate,
};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock budget for the whole session, opening the stream included
    pub timeout: Duration,

    /// Maximum number of chunk reads before the stream is treated as ended
    pub max_iterations: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_iterations: 1000,
        }
    }
}

/// An update tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub session: SessionId,
    pub update: StreamUpdate,
}

enum Read {
    Chunk(Option<banksie_core::Result<bytes::Bytes>>),
    Deadline,
}

pub struct Session {
    id: SessionId,
    source: Arc<dyn ResponderSource>,
    message: String,
    config: SessionConfig,
    cancel: CancellationToken,
    deadline: Instant,
    state: SessionState,
    consumer: StreamConsumer,
    /// Open response body; dropped as soon as the session reaches a terminal state
    body: Option<ByteStream>,
    pending: VecDeque<StreamUpdate>,
    iterations: usize,
}

impl Session {
    /// Create a session for `message`. The deadline starts now; the stream is
    /// opened lazily on the first call to [`Session::next_update`].
    pub fn start(
        id: SessionId,
        source: Arc<dyn ResponderSource>,
        message: impl Into<String>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let deadline = Instant::now() + config.timeout;
        Self {
            id,
            source,
            message: message.into(),
            config,
            cancel,
            deadline,
            state: SessionState::Pending,
            consumer: StreamConsumer::new(),
            body: None,
            pending: VecDeque::new(),
            iterations: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token that cancels this session when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next display update, or `None` once the session is over.
    ///
    /// Yields zero or more `Partial` updates and then exactly one terminal
    /// update, unless the session is cancelled, in which case it stops
    /// without a terminal update and discards anything not yet handed out.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        loop {
            if self.cancel.is_cancelled() {
                self.supersede();
                return None;
            }
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            if self.state.is_terminal() {
                return None;
            }

            match self.state {
                SessionState::Pending => self.open().await,
                _ => self.read_next().await,
            }
        }
    }

    /// Consume the session as a lazy stream of updates
    pub fn into_stream(self) -> impl Stream<Item = StreamUpdate> + Send {
        futures::stream::unfold(self, |mut session| async move {
            let update = session.next_update().await?;
            Some((update, session))
        })
    }

    /// Like [`Session::into_stream`], tagging every update with the session id
    pub fn into_tagged_stream(self) -> impl Stream<Item = SessionUpdate> + Send {
        let id = self.id;
        self.into_stream()
            .map(move |update| SessionUpdate { session: id, update })
    }

    async fn open(&mut self) {
        info!(session = %self.id, "Starting streaming request");

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = self.source.open(&self.message) => result,
            _ = tokio::time::sleep_until(self.deadline) => Err(self.timeout_error()),
        };

        match opened {
            Ok(body) => {
                debug!(session = %self.id, "Response received, reading stream");
                self.body = Some(body);
                self.state = SessionState::Streaming;
            }
            Err(e) => {
                let update = self.consumer.fail(e);
                self.terminate(update);
            }
        }
    }

    async fn read_next(&mut self) {
        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            warn!(
                session = %self.id,
                "Stream processing exceeded maximum iterations ({})", self.config.max_iterations
            );
            let update = self.consumer.finish();
            self.terminate(update);
            return;
        }

        let Some(body) = self.body.as_mut() else {
            let update = self.consumer.finish();
            self.terminate(update);
            return;
        };

        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            chunk = body.next() => Read::Chunk(chunk),
            _ = tokio::time::sleep_until(self.deadline) => Read::Deadline,
        };

        match read {
            Read::Chunk(Some(Ok(chunk))) => {
                for update in self.consumer.feed(&chunk) {
                    if update.is_terminal() {
                        self.terminate(Some(update));
                    } else {
                        self.pending.push_back(update);
                    }
                }
            }
            Read::Chunk(Some(Err(e))) => {
                let update = self.consumer.fail(e);
                self.terminate(update);
            }
            Read::Chunk(None) => {
                debug!(session = %self.id, "Stream completed");
                let update = self.consumer.finish();
                self.terminate(update);
            }
            Read::Deadline => {
                warn!(session = %self.id, "Request timeout - stopping stream");
                let error = self.timeout_error();
                let update = self.consumer.fail(error);
                self.terminate(update);
            }
        }
    }

    fn timeout_error(&self) -> StreamError {
        StreamError::Timeout {
            after_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// First and only transition into a terminal state. Releases the body.
    fn terminate(&mut self, update: Option<StreamUpdate>) {
        self.body = None;
        if self.state.is_terminal() {
            return;
        }

        self.state = match &update {
            Some(StreamUpdate::Failed(StreamError::Timeout { .. })) => SessionState::TimedOut,
            Some(StreamUpdate::Failed(e)) => {
                error!(session = %self.id, "Session failed: {}", e);
                SessionState::Errored
            }
            _ => SessionState::Completed,
        };
        info!(session = %self.id, state = ?self.state, "Session finished");

        if let Some(update) = update {
            self.pending.push_back(update);
        }
    }

    fn supersede(&mut self) {
        self.body = None;
        if !self.state.is_terminal() || !self.pending.is_empty() {
            debug!(
                session = %self.id,
                "Session cancelled, discarding {} undelivered updates",
                self.pending.len()
            );
            self.state = SessionState::Cancelled;
        }
        self.pending.clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("iterations", &self.iterations)
            .field("pending", &self.pending.len())
            .finish()
    }
}
