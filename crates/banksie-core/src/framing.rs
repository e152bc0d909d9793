//! Newline framing of the raw byte stream

use crate::decode::Utf8Decoder;

/// Accumulates decoded text and hands out complete lines.
///
/// Invariant: `buffer` never contains `\n`. Everything before the last
/// newline seen has already been returned by [`LineBuffer::push`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    decoder: Utf8Decoder,
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        if !text.contains('\n') {
            self.buffer.push_str(&text);
            return Vec::new();
        }

        self.buffer.push_str(&text);
        let mut lines: Vec<String> = self.buffer.split('\n').map(str::to_string).collect();
        // split always yields at least one segment; the last is the new partial line
        self.buffer = lines.pop().unwrap_or_default();
        lines
    }

    /// The partial (newline-less) trailing segment
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop any buffered partial line and decoder state
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.decoder = Utf8Decoder::new();
    }
}
