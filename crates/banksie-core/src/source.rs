//! Responder source trait definitions

use crate::Result;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Raw chunks of a response body as delivered by the transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can start a streamed reply to a user message.
///
/// The HTTP connector implements this against the chat backend; tests
/// implement it over in-memory chunks.
#[async_trait::async_trait]
pub trait ResponderSource: Send + Sync {
    /// Send `message` and return the response body as a chunk stream.
    ///
    /// Failures before the body starts (connection refused, non-success
    /// status) are reported here; failures mid-body are items of the stream.
    async fn open(&self, message: &str) -> Result<ByteStream>;
}
