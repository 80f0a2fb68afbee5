use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CredentialStore;
use crate::AuthResult;
use crate::credential::StoredTokens;

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<Option<StoredTokens>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a token pair.
    #[must_use]
    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> AuthResult<Option<StoredTokens>> {
        Ok(self.tokens.read().await.clone())
    }

    async fn save(&self, tokens: &StoredTokens) -> AuthResult<()> {
        *self.tokens.write().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> AuthResult<bool> {
        Ok(self.tokens.write().await.take().is_some())
    }
}
