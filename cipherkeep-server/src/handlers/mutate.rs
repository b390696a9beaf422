//! Record mutation handler.

use crate::error::RelayError;
use crate::handlers::current_account;
use crate::state::AppState;
use crate::storage::Mutation;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::Extensions;
use axum::Json;
use cipherkeep_core::sync::models::{MutationKind, UpdateRequest, UpdateResponse};

/// Validate the request shape for its mutation kind.
fn to_mutation(req: UpdateRequest) -> Result<Mutation, RelayError> {
    let kind = req.kind;
    let missing =
        |field: &str| RelayError::BadRequest(format!("{} requires {}", kind.as_str(), field));

    match kind {
        MutationKind::Add => Ok(Mutation::Add {
            data: req.data.ok_or_else(|| missing("data"))?,
            metadata: req.metadata.unwrap_or_default(),
        }),
        MutationKind::Update => Ok(Mutation::Update {
            id: req.id.ok_or_else(|| missing("ID"))?,
            data: req.data.ok_or_else(|| missing("data"))?,
            metadata: req.metadata,
        }),
        MutationKind::Delete => Ok(Mutation::Delete {
            id: req.id.ok_or_else(|| missing("ID"))?,
        }),
    }
}

pub async fn update(
    State(state): State<AppState>,
    extensions: Extensions,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, RelayError> {
    let account = current_account(&extensions)?;
    let Json(req) = payload?;
    let kind = req.kind;
    let mutation = to_mutation(req)?;

    let outcome = state.store.apply(account.id, mutation)?;

    Ok(Json(UpdateResponse {
        secure_data_id: Some(outcome.secret_record_id),
        history_id: outcome.history_id,
        message: format!("{} applied", kind.as_str()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_rejected() {
        let add = UpdateRequest {
            kind: MutationKind::Add,
            id: None,
            data: None,
            metadata: None,
        };
        assert!(matches!(to_mutation(add), Err(RelayError::BadRequest(_))));

        let update = UpdateRequest {
            kind: MutationKind::Update,
            id: None,
            data: Some(vec![1]),
            metadata: None,
        };
        assert!(matches!(to_mutation(update), Err(RelayError::BadRequest(_))));

        assert!(matches!(
            to_mutation(UpdateRequest::delete(4)),
            Ok(Mutation::Delete { id: 4 })
        ));
    }

    #[test]
    fn add_defaults_metadata() {
        let req = UpdateRequest {
            kind: MutationKind::Add,
            id: None,
            data: Some(vec![9]),
            metadata: None,
        };
        assert_eq!(
            to_mutation(req).unwrap(),
            Mutation::Add {
                data: vec![9],
                metadata: String::new()
            }
        );
    }
}
