//! Cryptographic primitives for the client.
//!
//! This module provides:
//! - Argon2id master-key derivation from the master password
//! - AES-256-GCM envelope encryption with per-call random nonces
//! - The KeyCheck canary used to verify a master password

pub mod cipher;
pub mod kdf;
pub mod keycheck;

pub use cipher::{decrypt, encrypt, open, seal, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_key, KdfParams, MasterKey};
pub use keycheck::{
    create_canary, verify_key, verify_password, KeyCheckError, CANARY_MARKER, CANARY_METADATA,
};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key, corrupted data and tampering all collapse into this variant.
    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
