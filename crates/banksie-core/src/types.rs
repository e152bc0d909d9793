//! Messages, updates and session identifiers

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one send/receive interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Streaming,
    Completed,
    TimedOut,
    Errored,
    /// Superseded by a newer session; nothing more is emitted
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Pending | SessionState::Streaming)
    }
}

/// The finalized assistant message of a successful session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalMessage {
    pub text: String,
    /// Identifier assigned by the backend when it persisted the exchange
    pub message_id: Option<String>,
    pub created_at: Option<String>,
}

impl FinalMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message_id: None,
            created_at: None,
        }
    }
}

/// One value produced by the stream consumer.
///
/// A session emits zero or more `Partial` snapshots followed by exactly one
/// terminal `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Filtered snapshot of the accumulated response so far
    Partial(String),
    Completed(FinalMessage),
    Failed(StreamError),
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamUpdate::Partial(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(rename = "ai")]
    Assistant,
}

/// An entry of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender: Sender::User,
            timestamp: now(),
            is_error: false,
        }
    }

    /// Assistant message for a completed session, keeping the backend's id and
    /// timestamp when it sent them
    pub fn from_final(message: FinalMessage) -> Self {
        Self {
            id: message
                .message_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: message.text,
            sender: Sender::Assistant,
            timestamp: message.created_at.unwrap_or_else(now),
            is_error: false,
        }
    }

    /// Placeholder assistant message standing in for a failed session
    pub fn from_error(error: &StreamError) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: error.user_message().to_string(),
            sender: Sender::Assistant,
            timestamp: now(),
            is_error: true,
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
