//! Client configuration.

use crate::crypto::KdfParams;
use crate::{platform, KeeperError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up under the platform config directory.
pub const CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the CipherKeep server
    pub server_url: String,
    /// Directory holding per-account mirrors and token files
    pub data_dir: PathBuf,
    /// Per-request network timeout
    pub timeout_secs: u64,
    /// Records requested per sync page
    pub page_size: u32,
    pub kdf: KdfParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            data_dir: platform::get_data_dir(),
            timeout_secs: 30,
            page_size: 100,
            kdf: KdfParams::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| KeeperError::InvalidInput(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `client.toml` from the config directory, or defaults when absent.
    pub fn load_or_default() -> Result<Self> {
        let path = platform::get_config_dir().join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(KeeperError::InvalidInput(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(KeeperError::InvalidInput(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        self.kdf.validate()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
