//! AES-256-GCM envelope encryption for secret payloads.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key derived from the master password
//! - 96-bit (12 byte) random nonce, fresh for every call
//! - 128-bit authentication tag appended to the ciphertext
//!
//! Wherever a blob is persisted or transmitted it is `nonce || ciphertext`.

use crate::crypto::{CryptoError, MasterKey, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

/// Nonce length required by AES-256-GCM.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended by AES-256-GCM.
pub const TAG_LEN: usize = 16;

/// Encrypt a payload under the master key.
///
/// Returns the authenticated ciphertext (tag included) and the nonce it was
/// sealed with. The nonce comes from the OS RNG on every call, never a counter.
pub fn encrypt(key: &MasterKey, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate a payload.
///
/// Every failure (wrong key, bad tag, malformed nonce) is reported as
/// `CryptoError::AuthenticationFailed`. Callers treat it as access denied.
pub fn decrypt(key: &MasterKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Encrypt into the storage format `nonce || ciphertext`.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (ciphertext, nonce) = encrypt(key, plaintext)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a `nonce || ciphertext` blob.
pub fn open(key: &MasterKey, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    decrypt(key, ciphertext, nonce)
}
