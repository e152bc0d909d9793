//! Banksie Egress Connector
//!
//! This crate provides the HTTP connector to the chat backend:
//! - Login and chat history retrieval
//! - Opening the streamed chat response

pub mod chat;
pub mod client;

use banksie_core::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend error ({status_code}): {message}")]
    BackendError { status_code: u16, message: String },

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Not authenticated: no bearer token configured")]
    MissingToken,
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for StreamError {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::HttpError(e) if e.is_connect() => {
                StreamError::ServerUnreachable(e.to_string())
            }
            EgressError::HttpError(e) => StreamError::Transport(e.to_string()),
            EgressError::BackendError {
                status_code,
                message,
            } => StreamError::HttpStatus {
                status_code,
                message,
            },
            EgressError::Timeout(secs) => StreamError::Timeout {
                after_ms: secs.saturating_mul(1000),
            },
            EgressError::ParseError(msg) => StreamError::InvalidResponse(msg),
            e @ (EgressError::ConfigError(_) | EgressError::MissingToken) => {
                StreamError::Transport(e.to_string())
            }
        }
    }
}
