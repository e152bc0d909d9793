//! Stream consumer state machine
//!
//! Owns the line buffer and the accumulated response for one session.
//! Feeding it raw chunks produces display updates; it never performs I/O,
//! so the session layer decides when chunks arrive and when the stream ends.

use banksie_core::{
    parse_line, strip_braced_spans, FinalMessage, LineBuffer, Record, StreamError, StreamUpdate,
};
use tracing::{debug, warn};

/// Final text used when a completed stream carried no text at all
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received";

#[derive(Debug, Default)]
pub struct StreamConsumer {
    framer: LineBuffer,
    accumulated: String,
    finished: bool,
    records: usize,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal update has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Concatenation of all chunk texts seen so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Number of records dispatched so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Consume one raw chunk.
    ///
    /// Returns one `Partial` per chunk record, in order. If a terminal record
    /// is reached, its update is the last element and everything after it,
    /// including the rest of this chunk, is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        if self.finished {
            return Vec::new();
        }

        let mut updates = Vec::new();
        for line in self.framer.push(chunk) {
            let record = match parse_line(&line) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping malformed event line: {} (line: {:?})", e, line);
                    continue;
                }
            };

            self.records += 1;
            debug!("Received record: {:?}", record);

            let update = self.dispatch(record);
            let terminal = update.is_terminal();
            updates.push(update);
            if terminal {
                break;
            }
        }

        updates
    }

    fn dispatch(&mut self, record: Record) -> StreamUpdate {
        match record {
            Record::Chunk { text } => {
                self.accumulated.push_str(&text);
                StreamUpdate::Partial(strip_braced_spans(&self.accumulated))
            }
            Record::Done {
                final_text,
                message_id,
                created_at,
            } => {
                let text = final_text
                    .or_else(|| Some(std::mem::take(&mut self.accumulated)))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string());
                debug!("Stream finished with {} chars", text.len());
                self.complete(FinalMessage {
                    text: strip_braced_spans(&text),
                    message_id,
                    created_at,
                })
            }
            Record::Error { message } => {
                self.terminate(StreamUpdate::Failed(StreamError::Upstream { message }))
            }
        }
    }

    /// The transport signalled end-of-stream without a completion record.
    ///
    /// A non-empty accumulated response completes the session as-is, without
    /// the brace filter. Returns `None` if already finished.
    pub fn finish(&mut self) -> Option<StreamUpdate> {
        if self.finished {
            return None;
        }
        if !self.framer.pending().is_empty() {
            debug!(
                "Discarding unterminated trailing line ({} chars)",
                self.framer.pending().len()
            );
        }

        if self.accumulated.is_empty() {
            return Some(self.terminate(StreamUpdate::Failed(StreamError::EmptyStream)));
        }

        debug!("Stream ended without done signal, using accumulated response");
        let text = std::mem::take(&mut self.accumulated);
        Some(self.complete(FinalMessage::new(text)))
    }

    /// End the session with an external failure (transport, timeout).
    /// Returns `None` if already finished.
    pub fn fail(&mut self, error: StreamError) -> Option<StreamUpdate> {
        if self.finished {
            return None;
        }
        Some(self.terminate(StreamUpdate::Failed(error)))
    }

    /// Discard all state so the consumer can serve a new session
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn complete(&mut self, message: FinalMessage) -> StreamUpdate {
        self.terminate(StreamUpdate::Completed(message))
    }

    fn terminate(&mut self, update: StreamUpdate) -> StreamUpdate {
        self.finished = true;
        self.accumulated.clear();
        self.framer.clear();
        update
    }
}
