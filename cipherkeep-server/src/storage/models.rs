//! Storage model types.

use cipherkeep_core::sync::models::{MutationKind, SyncRecord};

/// A change requested by an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add {
        data: Vec<u8>,
        metadata: String,
    },
    Update {
        id: i64,
        data: Vec<u8>,
        /// `None` keeps the stored annotation.
        metadata: Option<String>,
    },
    Delete {
        id: i64,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Add { .. } => MutationKind::Add,
            Self::Update { .. } => MutationKind::Update,
            Self::Delete { .. } => MutationKind::Delete,
        }
    }
}

/// Identifiers produced by a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    pub secret_record_id: i64,
    pub history_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub account_id: i64,
    pub data: Vec<u8>,
    pub metadata: String,
    pub history_id: i64,
    pub is_active: bool,
}

impl From<StoredRecord> for SyncRecord {
    fn from(r: StoredRecord) -> Self {
        Self {
            id: r.id,
            data: r.data,
            metadata: r.metadata,
            is_active: r.is_active,
            history_id: r.history_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub account_id: i64,
    pub secret_record_id: i64,
    pub method: String,
    pub created_at: i64,
}

/// One page of `select_delta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPage {
    pub records: Vec<StoredRecord>,
    pub fully_synced: bool,
}
