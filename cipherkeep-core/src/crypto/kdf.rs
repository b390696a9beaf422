//! Argon2id key derivation for the master password.
//!
//! The salt is application-wide rather than per-user: the derived key must be
//! reproducible on any device from the master password alone. Cost parameters
//! live in [`KdfParams`] so tests can run with cheap settings.

use crate::crypto::{CryptoError, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Fixed application salt used when no override is configured.
pub const APPLICATION_SALT: &[u8] = b"cipherkeep-master-key-salt-v1";

/// Length of the derived symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// Parameters for Argon2id key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Application-wide salt (at least 8 bytes)
    pub salt: Vec<u8>,

    /// Memory cost in KiB
    pub mem_cost: u32,

    /// Time cost (number of iterations)
    pub time_cost: u32,

    /// Parallelism (number of lanes)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: APPLICATION_SALT.to_vec(),
            mem_cost: 65_536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Low-cost parameters for tests. Never use these for a real vault.
    pub fn interactive_test() -> Self {
        Self {
            salt: APPLICATION_SALT.to_vec(),
            mem_cost: 64,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Verify that parameters are within the ranges Argon2 accepts
    pub fn validate(&self) -> Result<()> {
        if self.salt.len() < 8 {
            return Err(CryptoError::KdfFailed(
                "Salt too short (minimum: 8 bytes)".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(CryptoError::KdfFailed(
                "Time cost too low (minimum: 1)".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "Parallelism too low (minimum: 1)".to_string(),
            ));
        }
        if self.mem_cost < 8 * self.parallelism {
            return Err(CryptoError::KdfFailed(format!(
                "Memory cost too low (minimum: {} KiB)",
                8 * self.parallelism
            )));
        }
        Ok(())
    }
}

/// A symmetric key derived from the master password.
///
/// Lives for a single command invocation and is zeroized on drop.
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl MasterKey {
    /// Wrap raw key bytes (use with caution)
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Derive the master key from a password using Argon2id
///
/// # Arguments
/// * `password` - The master password as bytes
/// * `params` - KDF parameters (salt, memory, time, parallelism)
///
/// # Errors
/// `CryptoError::KdfFailed` when the parameters are rejected or Argon2 cannot
/// allocate its memory blocks.
pub fn derive_key(password: &[u8], params: &KdfParams) -> Result<MasterKey> {
    params.validate()?;

    let argon_params = Params::new(
        params.mem_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::KdfFailed(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, &params.salt, &mut key)
        .map_err(|e| CryptoError::KdfFailed(format!("Hashing failed: {}", e)))?;

    Ok(MasterKey { key })
}
