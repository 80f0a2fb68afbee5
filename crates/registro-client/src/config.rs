//! Client configuration.

use std::path::Path;
use std::time::Duration;

use registro_auth::LifecycleConfig;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Read(String),

    /// The configuration file is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Root client configuration.
///
/// # Example (TOML)
///
/// ```toml
/// base_url = "https://registro.example.org"
/// api_prefix = "/api/v1"
/// request_timeout = "30s"
///
/// [auth]
/// refresh_interval = "4m"
/// refresh_timeout = "15s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL (scheme, host and optional path).
    pub base_url: String,

    /// Prefix of the registry API, relative to `base_url`.
    pub api_prefix: String,

    /// Timeout applied to every HTTP request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Token lifecycle settings.
    pub auth: LifecycleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout: Duration::from_secs(30),
            auth: LifecycleConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `base_url` is not an absolute http(s) URL
    /// - `api_prefix` does not start with `/`
    /// - `request_timeout` is zero
    /// - the `auth` section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidValue(format!("base_url '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(
                "base_url must use http or https".to_string(),
            ));
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "api_prefix must start with '/'".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }
        self.auth.validate().map_err(ConfigError::InvalidValue)
    }

    /// Builds the HTTP client used for every request.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("registro/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("HTTP client: {e}")))
    }

    /// Base URL of the registry API.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/')
        )
    }
}
