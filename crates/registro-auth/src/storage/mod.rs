//! Credential persistence.
//!
//! The token lifecycle manager never touches persistence directly; it goes
//! through a [`CredentialStore`]. Two implementations are provided:
//!
//! - [`FileCredentialStore`] - JSON file per profile under `~/.registro/`
//! - [`MemoryCredentialStore`] - process-local, for tests and embedding
//!
//! Implementations must make [`CredentialStore::clear`] remove both tokens
//! at once; a half-cleared store would let a stale refresh token outlive a
//! logout.

mod file;
mod memory;

use async_trait::async_trait;

use crate::AuthResult;
use crate::credential::StoredTokens;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// Durable key-value storage for the access/refresh token pair.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the persisted tokens, if any.
    async fn load(&self) -> AuthResult<Option<StoredTokens>>;

    /// Replaces the persisted tokens.
    async fn save(&self, tokens: &StoredTokens) -> AuthResult<()>;

    /// Removes both tokens. Returns `true` if anything was stored.
    async fn clear(&self) -> AuthResult<bool>;
}
