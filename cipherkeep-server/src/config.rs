//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub storage_path: PathBuf,
    /// Expose `POST /register`. When false the route is not mounted.
    pub registration_enabled: bool,
    pub challenge_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Upper bound on the `limit` a client may request from `POST /sync`.
    pub max_sync_limit: u32,
    pub token_ttl_secs: u64,
    /// HMAC key for bearer tokens. A random key is generated when unset,
    /// which invalidates every token on restart.
    pub token_secret: Option<String>,
    pub max_payload_size: usize,
    /// Return the login challenge in the `/login/challenge` response body.
    pub echo_challenge: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            storage_path: PathBuf::from("cipherkeep.db"),
            registration_enabled: true,
            challenge_ttl_secs: 300,
            sweep_interval_secs: 60,
            max_sync_limit: 1000,
            token_ttl_secs: 24 * 60 * 60,
            token_secret: None,
            max_payload_size: 1024 * 1024,
            echo_challenge: true,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_sync_limit >= 1, "max_sync_limit must be at least 1");
        anyhow::ensure!(self.challenge_ttl_secs >= 1, "challenge_ttl_secs must be at least 1");
        anyhow::ensure!(self.sweep_interval_secs >= 1, "sweep_interval_secs must be at least 1");
        anyhow::ensure!(self.token_ttl_secs >= 1, "token_ttl_secs must be at least 1");
        if let Some(secret) = &self.token_secret {
            anyhow::ensure!(secret.len() >= 16, "token_secret must be at least 16 bytes");
        }
        Ok(())
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}
