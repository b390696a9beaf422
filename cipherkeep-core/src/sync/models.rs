//! Wire format shared by the client and the server.
//!
//! JSON bodies keep the field names existing clients send (`ID`,
//! `lastHistoryID`, `secureData`, ...). Ciphertext travels as standard base64.

use crate::mirror::SecretRecord;
use serde::{Deserialize, Serialize};

/// Kind of mutation carried by `POST /update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Body of `POST /register` and `POST /login/challenge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    pub mail: String,
}

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

/// Generic `{message}` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `POST /update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// Target record for UPDATE and DELETE.
    #[serde(
        rename = "ID",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    /// `nonce || ciphertext`, required for ADD and UPDATE.
    #[serde(
        default,
        with = "base64_opt_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl UpdateRequest {
    pub fn add(data: Vec<u8>, metadata: String) -> Self {
        Self {
            kind: MutationKind::Add,
            id: None,
            data: Some(data),
            metadata: Some(metadata),
        }
    }

    pub fn update(id: i64, data: Vec<u8>, metadata: String) -> Self {
        Self {
            kind: MutationKind::Update,
            id: Some(id),
            data: Some(data),
            metadata: Some(metadata),
        }
    }

    pub fn delete(id: i64) -> Self {
        Self {
            kind: MutationKind::Delete,
            id: Some(id),
            data: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(
        rename = "secureDataID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secure_data_id: Option<i64>,
    #[serde(rename = "historyID")]
    pub history_id: i64,
    pub message: String,
}

/// Body of `POST /sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(rename = "lastHistoryID")]
    pub last_history_id: i64,
    pub limit: u32,
}

/// A record as delivered by `POST /sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub metadata: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "historyID")]
    pub history_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(rename = "secureData", default)]
    pub secure_data: Vec<SyncRecord>,
    #[serde(rename = "fullySynced")]
    pub fully_synced: bool,
}

impl From<SyncRecord> for SecretRecord {
    fn from(r: SyncRecord) -> Self {
        Self {
            id: r.id,
            data: r.data,
            metadata: r.metadata,
            history_id: r.history_id,
            is_active: r.is_active,
        }
    }
}

/// Custom base64 serialization for `Vec<u8>`.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Same as `base64_bytes` for optional fields.
mod base64_opt_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => STANDARD
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_request_wire_names() {
        let req = UpdateRequest::update(7, vec![1, 2, 3], "note".to_string());
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"type": "UPDATE", "ID": 7, "data": "AQID", "metadata": "note"})
        );

        let delete = serde_json::to_value(UpdateRequest::delete(3)).unwrap();
        assert_eq!(delete, json!({"type": "DELETE", "ID": 3}));
    }

    #[test]
    fn update_request_accepts_lowercase_id() {
        let req: UpdateRequest =
            serde_json::from_value(json!({"type": "DELETE", "id": 12})).unwrap();
        assert_eq!(req.kind, MutationKind::Delete);
        assert_eq!(req.id, Some(12));
        assert!(req.data.is_none());
    }

    #[test]
    fn update_request_rejects_bad_base64() {
        let result: Result<UpdateRequest, _> =
            serde_json::from_value(json!({"type": "ADD", "data": "not base64!!"}));
        assert!(result.is_err());

        let result: Result<UpdateRequest, _> =
            serde_json::from_value(json!({"type": "RENAME", "ID": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn sync_response_wire_names() {
        let body = json!({
            "secureData": [
                {"id": 1, "data": "AAEC", "metadata": "{}", "isActive": true, "historyID": 4}
            ],
            "fullySynced": true
        });
        let resp: SyncResponse = serde_json::from_value(body).unwrap();
        assert!(resp.fully_synced);

        let record: SecretRecord = resp.secure_data[0].clone().into();
        assert_eq!(record.id, 1);
        assert_eq!(record.data, vec![0, 1, 2]);
        assert_eq!(record.history_id, 4);
        assert!(record.is_active);
    }

    #[test]
    fn sync_request_wire_names() {
        let value = serde_json::to_value(SyncRequest {
            last_history_id: 42,
            limit: 100,
        })
        .unwrap();
        assert_eq!(value, json!({"lastHistoryID": 42, "limit": 100}));
    }
}
