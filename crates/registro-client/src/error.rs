//! Service-boundary error types.
//!
//! Every failure that leaves [`RegistryClient`](crate::RegistryClient) is a
//! [`ClientError`]. Raw transport and HTTP failures are mapped here onto the
//! [`ErrorCategory`] taxonomy and never reach callers unwrapped.

use registro_auth::{AuthError, ErrorCategory};
use serde_json::Value;

use crate::config::ConfigError;

/// Errors returned by the registry client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Login, refresh or credential storage failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Required input was missing; no request was made.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the missing input.
        message: String,
    },

    /// A save was attempted without a classification for the current
    /// patient identifier.
    #[error("The patient must be validated before saving")]
    NotValidated,

    /// The backend still answered 401 after session recovery.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description returned by the backend.
        message: String,
    },

    /// 403.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description returned by the backend.
        message: String,
    },

    /// 404.
    #[error("Not found: {message}")]
    NotFound {
        /// Description returned by the backend.
        message: String,
    },

    /// Any other non-success status.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        /// Response status code.
        status: u16,
        /// Description returned by the backend.
        message: String,
    },

    /// The backend could not be reached.
    #[error("Network error: {message}")]
    Network {
        /// Transport-level description.
        message: String,
    },

    /// The backend answered with a payload the client cannot interpret.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the problem.
        message: String,
    },

    /// Moving a patient into the target layer was not reflected by the
    /// follow-up validation.
    #[error("Moving the patient to layer {layer} was not confirmed by the server")]
    MoveNotConfirmed {
        /// The target research layer.
        layer: String,
    },

    /// The client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Maps a non-success HTTP response.
    ///
    /// JSON bodies of the form `{"message": "..."}` (or `{"error": "..."}`)
    /// contribute their message; other bodies are used verbatim.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            _ => Self::Server { status, message },
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(err) => err.category(),
            Self::Validation { .. } | Self::NotValidated | Self::Config(_) => {
                ErrorCategory::Validation
            }
            Self::Unauthorized { .. } => ErrorCategory::Auth,
            Self::Forbidden { .. } => ErrorCategory::Permission,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Server { .. } | Self::InvalidResponse { .. } | Self::MoveNotConfirmed { .. } => {
                ErrorCategory::Server
            }
        }
    }

    /// Message suitable for showing to the person entering data.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::NotValidated | Self::MoveNotConfirmed { .. } => self.to_string(),
            other => other.category().user_message().to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::invalid_response(err.to_string())
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

fn extract_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body)
        && let Some(message) = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
    {
        return message.to_string();
    }
    body.trim().to_string()
}
