//! Tunnel Configuration
//!
//! Loadable from TOML or JSON:
//!
//! ```toml
//! base_url = "https://tr3bg.wetg65.org"
//! user_agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"
//! request_timeout_secs = 10
//! ```

use crate::transport::HttpTransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Pre-shared secret known to the tunnel server
pub const DEFAULT_SHARED_SECRET: &str = "sdgyuwgrikabdg@2@";

/// Production tunnel endpoint
pub const DEFAULT_BASE_URL: &str = "https://tr3bg.wetg65.org";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_secret() -> String {
    DEFAULT_SHARED_SECRET.to_string()
}

fn default_user_agent() -> String {
    format!("olink/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_body_size() -> usize {
    4 * 1024 * 1024
}

/// Secure tunnel settings
#[derive(Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Scheme and host the obfuscated path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Shared secret for path and key derivation
    #[serde(default = "default_secret")]
    pub secret: String,
    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whole-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum response body size (bytes)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl TunnelConfig {
    /// Load from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Load from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Transport settings derived from this config
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_body_size: self.max_body_size,
            tls: None,
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            secret: default_secret(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl std::fmt::Debug for TunnelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelConfig")
            .field("base_url", &self.base_url)
            .field("secret", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Shared secret must not be empty")]
    EmptySecret,

    #[error("Timeouts must be at least one second")]
    InvalidTimeout,
}
