//! Banksie Session Management
//!
//! This crate turns a raw chunk stream into display updates:
//! - `StreamConsumer`: the I/O-free framing and dispatch state machine
//! - `Session`: one send/receive interaction with timeout, cancellation and
//!   an iteration cap, exposed as a lazy stream of updates
//! - `Conversation`: the chat transcript, discarding updates from
//!   superseded sessions

pub mod consumer;
pub mod conversation;
pub mod session;

pub use consumer::{StreamConsumer, NO_RESPONSE_PLACEHOLDER};
pub use conversation::Conversation;
pub use session::{Session, SessionConfig, SessionUpdate};
