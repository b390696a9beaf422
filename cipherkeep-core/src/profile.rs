//! Per-account local layout.
//!
//! Inside the data directory each account owns `<account>_vault.db` (the
//! mirror) and `<account>_token` (the bearer token sealed under the master
//! key). A `current` file names the account commands operate on.

use crate::crypto::{open, seal, MasterKey};
use crate::mirror::LocalMirror;
use crate::{platform, KeeperError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

const CURRENT_FILE: &str = "current";

/// Handle on the client data directory.
#[derive(Debug, Clone)]
pub struct Profile {
    dir: PathBuf,
}

impl Profile {
    /// Use `dir` as the data directory, creating it with owner-only access.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        platform::ensure_private_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mirror_path(&self, account: &str) -> Result<PathBuf> {
        validate_account(account)?;
        Ok(self.dir.join(format!("{}_vault.db", account)))
    }

    pub fn token_path(&self, account: &str) -> Result<PathBuf> {
        validate_account(account)?;
        Ok(self.dir.join(format!("{}_token", account)))
    }

    /// Whether a mirror already exists locally for `account`.
    pub fn has_mirror(&self, account: &str) -> Result<bool> {
        Ok(self.mirror_path(account)?.exists())
    }

    pub fn open_mirror(&self, account: &str) -> Result<LocalMirror> {
        LocalMirror::open(self.mirror_path(account)?)
    }

    /// Seal the bearer token under the master key and write it with mode 0600.
    pub fn save_token(&self, account: &str, key: &MasterKey, token: &str) -> Result<()> {
        let path = self.token_path(account)?;
        let blob = seal(key, token.as_bytes())?;
        std::fs::write(&path, blob)?;
        platform::restrict_file(&path)?;
        debug!("Stored encrypted token for {}", account);
        Ok(())
    }

    /// Read and open the stored token.
    ///
    /// A missing file is `NotInitialized`; a blob that does not open under
    /// `key` surfaces as `Crypto(AuthenticationFailed)`.
    pub fn load_token(&self, account: &str, key: &MasterKey) -> Result<String> {
        let path = self.token_path(account)?;
        let blob = match std::fs::read(&path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeeperError::NotInitialized)
            }
            Err(e) => return Err(e.into()),
        };
        let plaintext = open(key, &blob)?;
        String::from_utf8(plaintext)
            .map_err(|_| KeeperError::InvalidInput("stored token is not UTF-8".to_string()))
    }

    pub fn set_current(&self, account: &str) -> Result<()> {
        validate_account(account)?;
        let path = self.dir.join(CURRENT_FILE);
        std::fs::write(&path, account)?;
        platform::restrict_file(&path)?;
        Ok(())
    }

    /// The account named in the `current` file.
    pub fn current(&self) -> Result<String> {
        let path = self.dir.join(CURRENT_FILE);
        let account = match std::fs::read_to_string(&path) {
            Ok(content) => content.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeeperError::NotInitialized)
            }
            Err(e) => return Err(e.into()),
        };
        if account.is_empty() {
            return Err(KeeperError::NotInitialized);
        }
        validate_account(&account)?;
        Ok(account)
    }
}

/// Reject identifiers that would escape the data directory or carry
/// surrounding whitespace the server would trim away.
pub fn validate_account(account: &str) -> Result<()> {
    if account.is_empty()
        || account == "."
        || account == ".."
        || account.contains(['/', '\\', '\0'])
        || account.trim() != account
    {
        return Err(KeeperError::InvalidInput(format!(
            "invalid account identifier: {:?}",
            account
        )));
    }
    Ok(())
}
