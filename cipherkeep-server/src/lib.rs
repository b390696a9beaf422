//! CipherKeep server
//!
//! Stores ciphertext-only records per account, appends every change to a
//! history ledger, and serves incremental deltas keyed by ledger position.
//! It never holds keys or plaintext.

pub mod auth;
pub mod challenge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod storage;

pub use config::ServerConfig;
pub use error::RelayError;
pub use server::build_router;
pub use state::AppState;
pub use storage::SecretStore;
