//! # registro-auth
//!
//! Authentication for the Registro Poblacional de Epilepsia client.
//!
//! This crate provides:
//! - [`credential`] - the access/refresh token pair and the JWT claims read from it
//! - [`storage`] - durable credential stores (file and in-memory)
//! - [`lifecycle`] - the [`TokenManager`]: bearer token attachment, 401
//!   recovery with a single coalesced refresh, and proactive timer refresh
//! - [`error`] - [`AuthError`] and the [`ErrorCategory`] taxonomy shared with
//!   the service layer

pub mod config;
pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod storage;

pub use config::LifecycleConfig;
pub use credential::{Credential, StoredTokens, TokenResponse, is_usable_token};
pub use error::{AuthError, ErrorCategory};
pub use lifecycle::{ProactiveRefresh, TokenManager};
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
