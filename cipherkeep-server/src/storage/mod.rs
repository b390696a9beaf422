//! SQLite storage backend for the server.
//!
//! Records and the history ledger live in one database. The schema itself
//! refuses edits to history, removal of records and reactivation of deleted
//! records; [`SecretStore::apply`] is the only write path for records.

pub mod ledger;
pub mod models;

use crate::error::RelayError;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use models::{DeltaPage, HistoryEntry, Mutation, MutationOutcome, StoredRecord};

/// Thread-safe server storage.
#[derive(Clone)]
pub struct SecretStore {
    conn: Arc<Mutex<Connection>>,
}

impl SecretStore {
    pub fn open(path: &Path) -> Result<Self, anyhow::Error> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, anyhow::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), anyhow::Error> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS secret_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                data BLOB NOT NULL,
                metadata TEXT NOT NULL DEFAULT '',
                history_id INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                secret_record_id INTEGER NOT NULL,
                method TEXT NOT NULL CHECK (method IN ('ADD', 'UPDATE', 'DELETE')),
                created_at INTEGER NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id),
                FOREIGN KEY (secret_record_id) REFERENCES secret_records(id)
            );

            CREATE INDEX IF NOT EXISTS idx_secret_records_account_history
                ON secret_records(account_id, history_id);
            CREATE INDEX IF NOT EXISTS idx_history_account
                ON history(account_id, id);

            CREATE TRIGGER IF NOT EXISTS history_no_update
                BEFORE UPDATE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS history_no_delete
                BEFORE DELETE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS secret_records_no_delete
                BEFORE DELETE ON secret_records
            BEGIN
                SELECT RAISE(ABORT, 'secret records are never removed');
            END;

            CREATE TRIGGER IF NOT EXISTS secret_records_no_reactivate
                BEFORE UPDATE OF is_active ON secret_records
                WHEN OLD.is_active = 0 AND NEW.is_active != 0
            BEGIN
                SELECT RAISE(ABORT, 'deleted records cannot be reactivated');
            END;",
        )?;
        Ok(())
    }

    pub fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RelayError> {
        self.conn
            .lock()
            .map_err(|e| RelayError::Internal(format!("Lock error: {}", e)))
    }

    /// Create an account. `Conflict` when the identifier is taken.
    pub fn create_account(&self, username: &str) -> Result<i64, RelayError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO accounts (username, created_at) VALUES (?1, ?2)",
            rusqlite::params![username, Utc::now().timestamp()],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RelayError::Conflict("Account already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn account_id(&self, username: &str) -> Result<Option<i64>, RelayError> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM accounts WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}
