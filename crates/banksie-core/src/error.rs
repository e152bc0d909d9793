//! Error types for the Banksie stream consumer

use thiserror::Error;

/// Placeholder shown when the session timed out
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please check your connection and try again.";

/// Placeholder shown when the backend could not be reached at all
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to connect to the server. Please check if the backend is running.";

/// Placeholder shown for every other terminal failure
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I encountered an error processing your message. Please try again.";

/// Terminal failure of a streaming session.
///
/// Every variant ends the session. Malformed individual lines are not
/// represented here; see [`RecordError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Upstream error during streaming{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Upstream { message: Option<String> },

    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    #[error("HTTP error {status_code}: {message}")]
    HttpStatus { status_code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("No response data received from server")]
    EmptyStream,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Coarse category of a [`StreamError`], for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Upstream,
    ServerUnreachable,
    Http,
    Transport,
    Timeout,
    EmptyStream,
}

impl StreamError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StreamError::Upstream { .. } => FailureKind::Upstream,
            StreamError::ServerUnreachable(_) => FailureKind::ServerUnreachable,
            StreamError::HttpStatus { .. } => FailureKind::Http,
            StreamError::Transport(_) | StreamError::InvalidResponse(_) => FailureKind::Transport,
            StreamError::Timeout { .. } => FailureKind::Timeout,
            StreamError::EmptyStream => FailureKind::EmptyStream,
        }
    }

    /// The single user-facing text appended to the conversation for this failure
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            FailureKind::Timeout => TIMEOUT_MESSAGE,
            FailureKind::ServerUnreachable => UNREACHABLE_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// A single event line that could not be decoded. Never fatal.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
