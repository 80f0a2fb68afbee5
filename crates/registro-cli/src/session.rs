use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use registro_auth::{FileCredentialStore, ProactiveRefresh};
use registro_client::RegistryClient;

use crate::config;

/// A registry client bound to a profile's stored credentials.
pub struct Session {
    pub client: RegistryClient,
    _refresh: ProactiveRefresh,
}

/// Builds a client for `server` without requiring a stored session.
pub async fn connect(server: &str, profile: &str, config_file: Option<&Path>) -> Result<RegistryClient> {
    let profile_cfg = config::load_profile(profile)?;
    let client_cfg = config::client_config(server, config_file, &profile_cfg)?;
    let store = FileCredentialStore::for_profile(profile)?;
    tracing::debug!(profile, path = %store.path().display(), "Using credential store");
    let client = RegistryClient::from_config(&client_cfg, Arc::new(store))?;
    client
        .auth()
        .restore()
        .await
        .context("Failed to read stored credentials")?;
    Ok(client)
}

/// Builds a client for `server` and requires a logged-in session. The token
/// is renewed in the background while the command runs.
pub async fn open(server: &str, profile: &str, config_file: Option<&Path>) -> Result<Session> {
    let client = connect(server, profile, config_file).await?;
    if !client.auth().is_logged_in() {
        anyhow::bail!("Not logged in (profile: \"{profile}\"). Run: registro login");
    }
    let refresh = client.auth().spawn_proactive_refresh();
    Ok(Session {
        client,
        _refresh: refresh,
    })
}
