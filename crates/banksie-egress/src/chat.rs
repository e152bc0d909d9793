//! Chat backend connector

use crate::{
    client::{classify_request_error, create_client, with_retry, HttpClientConfig},
    EgressError, Result,
};
use async_trait::async_trait;
use banksie_core::{ByteStream, ChatMessage, ResponderSource, Sender, StreamError};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Chat connector configuration
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL of the backend (default: http://localhost:8000)
    pub base_url: String,

    /// Bearer credential attached to authenticated calls
    pub token: Option<String>,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl ChatClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// One persisted exchange as returned by the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub message: String,
    pub response: String,
    pub created_at: String,
}

impl HistoryEntry {
    /// Expand the exchange into the user message and the assistant reply
    pub fn into_messages(self) -> [ChatMessage; 2] {
        [
            ChatMessage {
                id: format!("{}-user", self.id),
                text: self.message,
                sender: Sender::User,
                timestamp: self.created_at.clone(),
                is_error: false,
            },
            ChatMessage {
                id: format!("{}-ai", self.id),
                text: self.response,
                sender: Sender::Assistant,
                timestamp: self.created_at,
                is_error: false,
            },
        ]
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    message: &'a str,
}

/// Chat connector
pub struct ChatClient {
    config: ChatClientConfig,
    client: Client,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> Result<&str> {
        self.config.token.as_deref().ok_or(EgressError::MissingToken)
    }

    fn timeout_secs(&self) -> u64 {
        self.config.client_config.request_timeout_secs
    }

    /// Exchange credentials for a bearer token
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        debug!("Logging in to {}", self.config.base_url);

        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| classify_request_error(e, self.timeout_secs()))?;

        let login: LoginResponse = parse_json(ensure_success(response).await?).await?;
        info!("Logged in as {}", login.user.username);
        Ok(login)
    }

    /// Fetch the persisted chat history, oldest first
    #[instrument(skip(self))]
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let token = self.bearer()?;
        let max_retries = self.config.client_config.max_retries;

        let entries: Vec<HistoryEntry> = with_retry(max_retries, || async move {
            let response = self
                .client
                .get(self.url("/api/chat/history"))
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| classify_request_error(e, self.timeout_secs()))?;

            parse_json(ensure_success(response).await?).await
        })
        .await?;

        debug!("Fetched {} history entries", entries.len());
        Ok(entries)
    }

    /// Send a message and return the streamed reply body.
    ///
    /// The returned stream yields raw chunks; framing and event parsing are
    /// left to the consumer.
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn open_stream(&self, message: &str) -> Result<ByteStream> {
        let token = self.bearer()?;
        let timeout_secs = self.timeout_secs();

        debug!("Starting streaming request");
        let response = self
            .client
            .post(self.url("/api/chat/stream"))
            .bearer_auth(token)
            .header("Accept", "text/event-stream")
            .json(&StreamRequest { message })
            .send()
            .await
            .map_err(|e| classify_request_error(e, timeout_secs))?;

        debug!("Response status: {}", response.status());
        let response = ensure_success(response).await?;

        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| StreamError::from(classify_request_error(e, timeout_secs)))
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ResponderSource for ChatClient {
    async fn open(&self, message: &str) -> banksie_core::Result<ByteStream> {
        self.open_stream(message).await.map_err(StreamError::from)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(EgressError::BackendError {
        status_code: status.as_u16(),
        message,
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| EgressError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_entry_into_messages() {
        let entry = HistoryEntry {
            id: 3,
            user_id: Some(1),
            message: "What sold best?".to_string(),
            response: "Widgets.".to_string(),
            created_at: "2025-01-01 10:00:00".to_string(),
        };

        let [user, ai] = entry.into_messages();
        assert_eq!(user.id, "3-user");
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.text, "What sold best?");
        assert_eq!(ai.id, "3-ai");
        assert_eq!(ai.sender, Sender::Assistant);
        assert_eq!(ai.text, "Widgets.");
        assert_eq!(ai.timestamp, "2025-01-01 10:00:00");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ChatClient::new(ChatClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(
            client.url("/api/chat/stream"),
            "http://localhost:8000/api/chat/stream"
        );
    }

    #[tokio::test]
    async fn test_open_stream_requires_token() {
        let client = ChatClient::new(ChatClientConfig::default()).unwrap();
        let result = client.open_stream("hi").await;
        assert!(matches!(result, Err(EgressError::MissingToken)));
    }

    #[test]
    fn test_config_builders() {
        let config = ChatClientConfig::new("http://example.test").with_token("abc");
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.token.as_deref(), Some("abc"));
    }
}
