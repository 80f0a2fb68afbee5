//! Authentication error types.
//!
//! This module defines the errors raised while logging in, refreshing tokens
//! and persisting credentials, together with the [`ErrorCategory`] taxonomy
//! shared by every layer of the client.

use std::fmt;

/// Errors that can occur during authentication and token lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Required input was missing before any request was made.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the missing or malformed input.
        message: String,
    },

    /// The backend rejected the supplied email/password pair.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The session can no longer be renewed and the user must log in again.
    #[error("Session expired: {message}")]
    SessionExpired {
        /// Why the session could not be renewed.
        message: String,
    },

    /// A token refresh did not complete within the configured timeout.
    #[error("Token refresh timed out after {seconds}s")]
    RefreshTimeout {
        /// The timeout that elapsed, in whole seconds.
        seconds: u64,
    },

    /// The authenticated user lacks permission for the operation.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description returned by the backend.
        message: String,
    },

    /// The backend could not be reached.
    #[error("Network error: {message}")]
    Network {
        /// Transport-level description.
        message: String,
    },

    /// The backend answered with an unexpected HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The backend answered with a payload that could not be understood.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the parse failure.
        message: String,
    },

    /// Reading or writing the credential store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The lifecycle configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `SessionExpired` error.
    #[must_use]
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::SessionExpired {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Maps a non-success response from an auth endpoint.
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 => Self::session_expired(if message.is_empty() {
                "unauthorized".to_string()
            } else {
                message
            }),
            403 => Self::forbidden(message),
            _ => Self::Http { status, message },
        }
    }

    /// Returns `true` if this error means the user is (or must be) logged out.
    #[must_use]
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::SessionExpired { .. } | Self::RefreshTimeout { .. }
        )
    }

    /// Returns the error category for display and logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::InvalidCredentials => ErrorCategory::Auth,
            Self::SessionExpired { .. } => ErrorCategory::Auth,
            Self::RefreshTimeout { .. } => ErrorCategory::Auth,
            Self::Forbidden { .. } => ErrorCategory::Permission,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Http { status: 404, .. } => ErrorCategory::NotFound,
            Self::Http { .. } => ErrorCategory::Server,
            Self::InvalidResponse { .. } => ErrorCategory::Server,
            Self::Storage { .. } => ErrorCategory::Server,
            Self::Configuration { .. } => ErrorCategory::Validation,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::invalid_response(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error taxonomy surfaced to the user-facing layer.
///
/// Transport and HTTP failures are always mapped onto one of these categories
/// at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 401 or an expired session.
    Auth,
    /// 403.
    Permission,
    /// 404.
    NotFound,
    /// No connection or timed out.
    Network,
    /// 5xx or a payload the client cannot interpret.
    Server,
    /// Required input missing before a call is made.
    Validation,
}

impl ErrorCategory {
    /// Short user-facing explanation for the category.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Auth => "Your session has expired. Please log in again.",
            Self::Permission => "You do not have permission to perform this action.",
            Self::NotFound => "The requested record was not found.",
            Self::Network => "The server could not be reached. Check your connection.",
            Self::Server => "The server could not process the request. Try again later.",
            Self::Validation => "Some required information is missing.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "AUTH_ERROR"),
            Self::Permission => write!(f, "PERMISSION_ERROR"),
            Self::NotFound => write!(f, "NOT_FOUND_ERROR"),
            Self::Network => write!(f, "NETWORK_ERROR"),
            Self::Server => write!(f, "SERVER_ERROR"),
            Self::Validation => write!(f, "VALIDATION_ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_input("email is required");
        assert_eq!(err.to_string(), "Invalid input: email is required");

        let err = AuthError::RefreshTimeout { seconds: 15 };
        assert_eq!(err.to_string(), "Token refresh timed out after 15s");

        let err = AuthError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            AuthError::from_status(401, ""),
            AuthError::SessionExpired { .. }
        ));
        assert!(matches!(
            AuthError::from_status(403, "nope"),
            AuthError::Forbidden { .. }
        ));
        assert_eq!(
            AuthError::from_status(404, "").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AuthError::from_status(500, "").category(),
            ErrorCategory::Server
        );
    }

    #[test]
    fn test_session_errors() {
        assert!(AuthError::InvalidCredentials.is_session_error());
        assert!(AuthError::session_expired("x").is_session_error());
        assert!(AuthError::RefreshTimeout { seconds: 1 }.is_session_error());
        assert!(!AuthError::network("down").is_session_error());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH_ERROR");
        assert_eq!(ErrorCategory::Validation.to_string(), "VALIDATION_ERROR");
        assert_eq!(
            AuthError::network("x").category().user_message(),
            "The server could not be reached. Check your connection."
        );
    }
}
