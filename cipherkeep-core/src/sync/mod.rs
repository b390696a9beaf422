//! Pull synchronization with the CipherKeep server
//!
//! - `models`: JSON wire format shared with the server
//! - `client`: reqwest-based HTTP client and the `RemoteLedger` seam
//! - `engine`: cursor-driven pull loop into the local mirror
//! - `cancel`: cancellation handle for network calls

pub mod cancel;
pub mod client;
pub mod engine;
pub mod models;

pub use cancel::Cancellation;
pub use client::{KeeperClient, RemoteLedger};
pub use engine::{BatchOutcome, SyncEngine, SyncReport};
pub use models::{MutationKind, SyncRecord, SyncRequest, SyncResponse, UpdateRequest};
