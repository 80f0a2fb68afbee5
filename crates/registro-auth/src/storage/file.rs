use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::CredentialStore;
use crate::credential::StoredTokens;
use crate::{AuthError, AuthResult};

/// Stores the token pair as a JSON file.
///
/// The default location is `~/.registro/credentials.<profile>.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store backed by an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the store for a named profile in the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the home directory cannot be determined.
    pub fn for_profile(profile: &str) -> AuthResult<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| AuthError::storage("Cannot determine home directory"))?
            .join(".registro");
        Ok(Self::new(dir.join(format!("credentials.{profile}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> AuthResult<Option<StoredTokens>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::storage(e.to_string())),
        };
        match serde_json::from_str(&content) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable credentials file");
                Ok(None)
            }
        }
    }

    async fn save(&self, tokens: &StoredTokens) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(tokens).map_err(|e| AuthError::storage(e.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn clear(&self) -> AuthResult<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::storage(e.to_string())),
        }
    }
}
