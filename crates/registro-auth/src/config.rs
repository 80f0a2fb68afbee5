//! Token lifecycle configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the token lifecycle manager.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// refresh_interval = "4m"
/// refresh_timeout = "15s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Path of the login endpoint, relative to the backend base URL.
    pub login_path: String,

    /// Path of the refresh endpoint, relative to the backend base URL.
    pub refresh_path: String,

    /// Path of the password reset endpoint.
    pub forgot_password_path: String,

    /// Period of the proactive refresh timer.
    /// Must be shorter than the access token validity window.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Upper bound for a refresh call, and for callers waiting on one.
    #[serde(with = "humantime_serde")]
    pub refresh_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            forgot_password_path: "/auth/forgot-password".to_string(),
            refresh_interval: Duration::from_secs(240), // 4 minutes
            refresh_timeout: Duration::from_secs(15),
        }
    }
}

impl LifecycleConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the proactive refresh period.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the refresh timeout.
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message if a path does not start with `/` or a
    /// duration is zero.
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [
            ("login_path", &self.login_path),
            ("refresh_path", &self.refresh_path),
            ("forgot_password_path", &self.forgot_password_path),
        ] {
            if !path.starts_with('/') {
                return Err(format!("auth.{name} must start with '/'"));
            }
        }
        if self.refresh_interval.is_zero() {
            return Err("auth.refresh_interval must be > 0".into());
        }
        if self.refresh_timeout.is_zero() {
            return Err("auth.refresh_timeout must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.login_path, "/auth/login");
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.refresh_interval, Duration::from_secs(240));
        assert_eq!(config.refresh_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_humantime() {
        let config: LifecycleConfig = toml::from_str(
            r#"
            refresh_interval = "90s"
            refresh_timeout = "2s"
            "#,
        )
        .unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(90));
        assert_eq!(config.refresh_timeout, Duration::from_secs(2));
        assert_eq!(config.login_path, "/auth/login");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LifecycleConfig::new().with_refresh_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = LifecycleConfig {
            refresh_path: "auth/refresh".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
