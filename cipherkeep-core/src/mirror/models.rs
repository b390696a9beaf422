//! Record model stored in the local mirror.

/// An encrypted record as mirrored from the server.
///
/// `data` is the opaque `nonce || ciphertext` blob; `metadata` is the cleartext
/// annotation the client attached when the record was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: i64,
    pub data: Vec<u8>,
    pub metadata: String,
    pub history_id: i64,
    pub is_active: bool,
}

impl SecretRecord {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            data: row.get(1)?,
            metadata: row.get(2)?,
            history_id: row.get(3)?,
            is_active: row.get::<_, i64>(4)? != 0,
        })
    }
}
