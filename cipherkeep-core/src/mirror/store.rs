//! SQLite connection and queries for the local mirror.

use crate::mirror::SecretRecord;
use crate::{DatabaseError, KeeperError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS secret_records (
        id INTEGER PRIMARY KEY,
        data BLOB NOT NULL,
        metadata TEXT NOT NULL DEFAULT '',
        history_id INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );
    CREATE INDEX IF NOT EXISTS idx_secret_records_history
        ON secret_records(history_id);
";

const UPSERT: &str = "
    INSERT INTO secret_records (id, data, metadata, history_id, is_active)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id) DO UPDATE SET
        data = excluded.data,
        metadata = excluded.metadata,
        history_id = excluded.history_id,
        is_active = excluded.is_active
    WHERE excluded.history_id >= secret_records.history_id
";

const COLUMNS: &str = "id, data, metadata, history_id, is_active";

/// Durable per-account store of encrypted records and the sync cursor.
pub struct LocalMirror {
    conn: Connection,
}

impl LocalMirror {
    /// Open (or create) a mirror at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(DatabaseError::Sqlite)?;
        let mirror = Self { conn };
        mirror.initialize_schema()?;
        debug!("Opened local mirror at {}", path.as_ref().display());
        Ok(mirror)
    }

    /// Create a new in-memory mirror for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Sqlite)?;
        let mirror = Self { conn };
        mirror.initialize_schema()?;
        Ok(mirror)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    /// Insert or replace a record by id.
    ///
    /// A row already carrying a newer `history_id` is left untouched, so
    /// replaying an old batch never regresses the mirror.
    pub fn upsert(&mut self, record: &SecretRecord) -> Result<()> {
        upsert_on(&self.conn, record)
    }

    /// Upsert a whole sync batch atomically. Returns the number of records seen.
    pub fn apply_batch(&mut self, records: &[SecretRecord]) -> Result<usize> {
        let tx = self.conn.transaction().map_err(DatabaseError::Sqlite)?;
        for record in records {
            upsert_on(&tx, record)?;
        }
        tx.commit().map_err(DatabaseError::Sqlite)?;
        Ok(records.len())
    }

    /// Soft-delete a record locally after the server confirmed the DELETE.
    pub fn mark_inactive(&mut self, id: i64, history_id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE secret_records
                 SET is_active = 0, history_id = MAX(history_id, ?2)
                 WHERE id = ?1",
                params![id, history_id],
            )
            .map_err(DatabaseError::Sqlite)?;

        if changed == 0 {
            return Err(KeeperError::NotFound(format!("secret {}", id)));
        }
        Ok(())
    }

    /// Point lookup, active or not.
    pub fn get(&self, id: i64) -> Result<Option<SecretRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM secret_records WHERE id = ?1", COLUMNS),
                params![id],
                SecretRecord::from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?;
        Ok(record)
    }

    /// Ciphertext of an active, non-canary record.
    pub fn read_ciphertext(&self, id: i64) -> Result<Vec<u8>> {
        let canary_id = self.canary()?.map(|c| c.id);
        match self.get(id)? {
            Some(record) if record.is_active && Some(record.id) != canary_id => Ok(record.data),
            _ => Err(KeeperError::NotFound(format!("secret {}", id))),
        }
    }

    /// Active records excluding the canary, ordered by id.
    pub fn list_active(&self) -> Result<Vec<SecretRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM secret_records
                 WHERE is_active = 1
                   AND id != (SELECT MIN(id) FROM secret_records)
                 ORDER BY id ASC",
                COLUMNS
            ))
            .map_err(DatabaseError::Sqlite)?;

        let records = stmt
            .query_map([], SecretRecord::from_row)
            .map_err(DatabaseError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DatabaseError::Sqlite)?;
        Ok(records)
    }

    /// The KeyCheck canary: the record with the smallest id.
    pub fn canary(&self) -> Result<Option<SecretRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM secret_records ORDER BY id ASC LIMIT 1",
                    COLUMNS
                ),
                [],
                SecretRecord::from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?;
        Ok(record)
    }

    /// Highest ledger position applied locally, 0 for an empty mirror.
    pub fn current_cursor(&self) -> Result<i64> {
        let cursor = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(history_id), 0) FROM secret_records",
                [],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(cursor)
    }

    /// Every record including the canary and inactive rows, ordered by id.
    pub fn all_records(&self) -> Result<Vec<SecretRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM secret_records ORDER BY id ASC",
                COLUMNS
            ))
            .map_err(DatabaseError::Sqlite)?;

        let records = stmt
            .query_map([], SecretRecord::from_row)
            .map_err(DatabaseError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DatabaseError::Sqlite)?;
        Ok(records)
    }
}

fn upsert_on(conn: &Connection, record: &SecretRecord) -> Result<()> {
    conn.execute(
        UPSERT,
        params![
            record.id,
            record.data,
            record.metadata,
            record.history_id,
            record.is_active as i64
        ],
    )
    .map_err(DatabaseError::Sqlite)?;
    Ok(())
}
