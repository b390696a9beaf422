//! Incremental sync handler.

use crate::error::RelayError;
use crate::handlers::current_account;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::Extensions;
use axum::Json;
use cipherkeep_core::sync::models::{SyncRecord, SyncRequest, SyncResponse};

pub async fn sync(
    State(state): State<AppState>,
    extensions: Extensions,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, RelayError> {
    let account = current_account(&extensions)?;
    let Json(req) = payload?;

    let max = state.config.max_sync_limit;
    if req.limit == 0 || req.limit > max {
        return Err(RelayError::BadRequest(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    if req.last_history_id < 0 {
        return Err(RelayError::BadRequest(
            "lastHistoryID must not be negative".to_string(),
        ));
    }

    let page = state
        .store
        .select_delta(account.id, req.last_history_id, req.limit)?;

    tracing::debug!(
        "Sync for {} after {}: {} records",
        account.username,
        req.last_history_id,
        page.records.len()
    );

    Ok(Json(SyncResponse {
        secure_data: page.records.into_iter().map(SyncRecord::from).collect(),
        fully_synced: page.fully_synced,
    }))
}
