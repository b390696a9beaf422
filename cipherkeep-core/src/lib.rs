//! CipherKeep Core Library
//!
//! Client side of a zero-knowledge secret store: key derivation and envelope
//! encryption, the local encrypted mirror, the pull-sync engine and the
//! [`Keeper`] facade the CLI drives. The wire models in [`sync::models`] are
//! shared with the server.

pub mod config;
pub mod crypto;
pub mod keeper;
pub mod mirror;
pub mod platform;
pub mod profile;
pub mod sync;

pub use config::ClientConfig;
pub use crypto::{
    create_canary, derive_key, open, seal, verify_key, verify_password, CryptoError, KdfParams,
    KeyCheckError, MasterKey,
};
pub use keeper::{InitOutcome, Keeper, SecretEntry, Session};
pub use mirror::{LocalMirror, SecretRecord};
pub use platform::{ensure_data_dir, get_config_dir, get_data_dir};
pub use profile::Profile;
pub use sync::{Cancellation, KeeperClient, SyncEngine, SyncReport};

use thiserror::Error;

/// Result type for CipherKeep client operations
pub type Result<T> = std::result::Result<T, KeeperError>;

/// Errors raised by the local SQLite layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Other(String),
}

/// General error type for CipherKeep client operations
#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Wrong master password")]
    WrongPassword,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No account initialized; run `cipherkeep init` first")]
    NotInitialized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeyCheckError> for KeeperError {
    fn from(err: KeyCheckError) -> Self {
        match err {
            KeyCheckError::WrongPassword => KeeperError::WrongPassword,
            KeyCheckError::Kdf(e) => KeeperError::Crypto(e),
        }
    }
}

impl From<rusqlite::Error> for KeeperError {
    fn from(err: rusqlite::Error) -> Self {
        KeeperError::Database(DatabaseError::Sqlite(err))
    }
}
