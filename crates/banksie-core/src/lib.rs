//! Banksie Core Types
//!
//! This crate provides the building blocks of the chat stream consumer:
//! - Stateful UTF-8 decoding and newline framing of raw chunks
//! - Event record parsing
//! - The brace filter applied to displayed text
//! - Message, update and error types shared by the other crates
//! - The `ResponderSource` seam between the consumer and the transport

pub mod decode;
pub mod error;
pub mod filter;
pub mod framing;
pub mod record;
pub mod source;
pub mod types;

pub use error::{
    FailureKind, RecordError, Result, StreamError, GENERIC_FAILURE_MESSAGE, TIMEOUT_MESSAGE,
    UNREACHABLE_MESSAGE,
};
pub use filter::strip_braced_spans;
pub use framing::LineBuffer;
pub use record::{parse_line, Record, EVENT_PREFIX};
pub use source::{ByteStream, ResponderSource};
pub use types::{ChatMessage, FinalMessage, Sender, SessionId, SessionState, StreamUpdate};
