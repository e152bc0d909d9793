use anyhow::Context;
use banksie_egress::{chat::ChatClientConfig, client::HttpClientConfig};
use banksie_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token; takes precedence over `token_file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_token_file")]
    pub token_file: String,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            token_file: default_token_file(),
            session: SessionSettings::default(),
            http: HttpSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CliConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("BANKSIE_API_URL") {
            self.api_url = val;
        }

        if let Ok(val) = std::env::var("BANKSIE_TOKEN") {
            self.token = Some(val);
        }

        if let Ok(val) = std::env::var("BANKSIE_TOKEN_FILE") {
            self.token_file = val;
        }

        if let Ok(val) = std::env::var("BANKSIE_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.session.timeout_secs = secs,
                Err(_) => eprintln!("Warning: Invalid BANKSIE_TIMEOUT_SECS '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("BANKSIE_MAX_ITERATIONS") {
            match val.parse::<usize>() {
                Ok(max) => self.session.max_iterations = max,
                Err(_) => eprintln!("Warning: Invalid BANKSIE_MAX_ITERATIONS '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("BANKSIE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_secs(self.session.timeout_secs),
            max_iterations: self.session.max_iterations,
        }
    }

    /// Connector configuration, without a token
    pub fn client_config(&self) -> ChatClientConfig {
        ChatClientConfig::new(&self.api_url).with_client_config(HttpClientConfig {
            request_timeout_secs: self.http.request_timeout_secs,
            connect_timeout_secs: self.http.connect_timeout_secs,
            ..Default::default()
        })
    }

    pub fn token_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.token_file).to_string())
    }

    /// Explicit token, falling back to the token file if it exists
    pub fn resolve_token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }

        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }

        let token = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    pub fn save_token(&self, token: &str) -> anyhow::Result<PathBuf> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, token)
            .with_context(|| format!("Failed to write token file {}", path.display()))?;
        Ok(path)
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_token_file() -> String {
    "~/.banksie/token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_iterations() -> usize {
    1000
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
