//! Transactional mutations and the per-account history ledger.

use crate::error::RelayError;
use crate::storage::{DeltaPage, HistoryEntry, Mutation, MutationOutcome, SecretStore, StoredRecord};
use chrono::Utc;
use rusqlite::params;

impl SecretStore {
    /// Apply a mutation and append its history entry in one transaction.
    ///
    /// UPDATE and DELETE only match active records owned by `account_id`; a
    /// foreign, missing or deleted id is `NotFound` either way. Any error
    /// drops the transaction, which rolls both writes back.
    pub fn apply(&self, account_id: i64, mutation: Mutation) -> Result<MutationOutcome, RelayError> {
        let method = mutation.kind().as_str();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let secret_record_id = match mutation {
            Mutation::Add { data, metadata } => {
                tx.execute(
                    "INSERT INTO secret_records (account_id, data, metadata, history_id, is_active)
                     VALUES (?1, ?2, ?3, -1, 1)",
                    params![account_id, data, metadata],
                )?;
                tx.last_insert_rowid()
            }
            Mutation::Update { id, data, metadata } => {
                let changed = tx.execute(
                    "UPDATE secret_records
                     SET data = ?1, metadata = COALESCE(?2, metadata)
                     WHERE id = ?3 AND account_id = ?4 AND is_active = 1",
                    params![data, metadata, id, account_id],
                )?;
                if changed == 0 {
                    return Err(RelayError::NotFound("Secret not found".to_string()));
                }
                id
            }
            Mutation::Delete { id } => {
                let changed = tx.execute(
                    "UPDATE secret_records SET is_active = 0
                     WHERE id = ?1 AND account_id = ?2 AND is_active = 1",
                    params![id, account_id],
                )?;
                if changed == 0 {
                    return Err(RelayError::NotFound("Secret not found".to_string()));
                }
                id
            }
        };

        tx.execute(
            "INSERT INTO history (account_id, secret_record_id, method, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_id, secret_record_id, method, Utc::now().timestamp()],
        )?;
        let history_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE secret_records SET history_id = ?1 WHERE id = ?2",
            params![history_id, secret_record_id],
        )?;

        tx.commit()?;
        tracing::debug!(
            "{} record {} at history {} for account {}",
            method,
            secret_record_id,
            history_id,
            account_id
        );

        Ok(MutationOutcome {
            secret_record_id,
            history_id,
        })
    }

    /// Records touched after `last_history_id`, oldest change first.
    ///
    /// Ordered by `history_id`, not `id`: the client cursor is the largest
    /// `history_id` it holds, so an `id` order could skip an older record
    /// updated after a newer one.
    pub fn select_delta(
        &self,
        account_id: i64,
        last_history_id: i64,
        limit: u32,
    ) -> Result<DeltaPage, RelayError> {
        if limit == 0 {
            return Err(RelayError::BadRequest("limit must be at least 1".to_string()));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, data, metadata, history_id, is_active
             FROM secret_records
             WHERE account_id = ?1 AND history_id > ?2
             ORDER BY history_id ASC
             LIMIT ?3",
        )?;

        let records = stmt
            .query_map(params![account_id, last_history_id, limit], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    data: row.get(2)?,
                    metadata: row.get(3)?,
                    history_id: row.get(4)?,
                    is_active: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let fully_synced = records.len() < limit as usize;
        Ok(DeltaPage {
            records,
            fully_synced,
        })
    }

    /// The account's ledger in append order.
    pub fn history(&self, account_id: i64) -> Result<Vec<HistoryEntry>, RelayError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, secret_record_id, method, created_at
             FROM history WHERE account_id = ?1 ORDER BY id ASC",
        )?;

        let entries = stmt
            .query_map([account_id], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    secret_record_id: row.get(2)?,
                    method: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
