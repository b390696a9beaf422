//! Local encrypted mirror of the account's records.
//!
//! The mirror is a per-account SQLite file holding exactly what the server
//! returned: ciphertext, cleartext metadata, activity flag and the ledger
//! position that last touched each record. The sync cursor is derived from it.

pub mod models;
pub mod store;

pub use models::SecretRecord;
pub use store::LocalMirror;
