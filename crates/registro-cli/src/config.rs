use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use registro_client::ClientConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    pub server: Option<String>,
    pub api_prefix: Option<String>,
    pub format: Option<String>,
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".registro");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn load_all_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)?;
    let cfg: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(cfg)
}

fn save_profile_to(path: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all_from(path)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    let mut all = load_all_from(&config_path()?)?;
    Ok(all.remove(profile).unwrap_or_default())
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_profile_to(&config_path()?, profile, config)
}

/// Records the server a login succeeded against, so later commands find it.
pub fn remember_server(profile: &str, server: &str) -> Result<()> {
    let mut cfg = load_profile(profile)?;
    if cfg.server.as_deref() != Some(server) {
        cfg.server = Some(server.to_string());
        save_profile(profile, &cfg)?;
    }
    Ok(())
}

pub fn resolve_server(cli_server: &Option<String>, profile: &str) -> Result<String> {
    // 1. --server flag / REGISTRO_URL env
    if let Some(s) = cli_server {
        return Ok(s.clone());
    }
    // 2. config.toml profile
    let cfg = load_profile(profile)?;
    if let Some(s) = cfg.server {
        return Ok(s);
    }
    anyhow::bail!(
        "No server URL configured. Use --server, set REGISTRO_URL env var, or run: registro login --server <url>"
    )
}

/// Builds the client configuration for `server`, starting from `--config`
/// when given and applying the profile's overrides.
pub fn client_config(server: &str, file: Option<&Path>, profile: &ProfileConfig) -> Result<ClientConfig> {
    let mut config = match file {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    config.base_url = server.to_string();
    if let Some(prefix) = &profile.api_prefix {
        config.api_prefix = prefix.clone();
    }
    config.validate()?;
    Ok(config)
}
