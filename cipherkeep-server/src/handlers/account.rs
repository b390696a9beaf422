//! Registration and challenge login handlers.

use crate::auth::AUTH_COOKIE;
use crate::error::RelayError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use cipherkeep_core::sync::models::{AccountRequest, LoginRequest, LoginResponse, MessageResponse};

fn normalize_account(mail: &str) -> Result<String, RelayError> {
    let mail = mail.trim();
    if mail.is_empty() {
        return Err(RelayError::BadRequest("mail is required".to_string()));
    }
    if mail.len() > 254 {
        return Err(RelayError::BadRequest("mail is too long".to_string()));
    }
    Ok(mail.to_string())
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<AccountRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RelayError> {
    let Json(req) = payload?;
    let mail = normalize_account(&req.mail)?;

    state.store.create_account(&mail)?;
    tracing::info!("Registered account {}", mail);

    Ok(Json(MessageResponse {
        message: "Account created".to_string(),
    }))
}

pub async fn request_challenge(
    State(state): State<AppState>,
    payload: Result<Json<AccountRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RelayError> {
    let Json(req) = payload?;
    let mail = normalize_account(&req.mail)?;

    if state.store.account_id(&mail)?.is_none() {
        return Err(RelayError::NotFound("Account not found".to_string()));
    }

    let challenge = state.challenges.issue(&mail);
    state.notifier.deliver(&mail, &challenge);

    let message = if state.config.echo_challenge {
        challenge
    } else {
        "Challenge sent".to_string()
    };
    Ok(Json(MessageResponse { message }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let Json(req) = payload?;
    let mail = normalize_account(&req.login)?;

    if !state.challenges.redeem(&mail, req.password.trim()) {
        tracing::warn!("Failed challenge redemption for {}", mail);
        return Err(RelayError::Auth("Invalid or expired challenge".to_string()));
    }

    let token = state.tokens.issue(&mail)?;
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        AUTH_COOKIE,
        token,
        state.tokens.ttl().as_secs()
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Logged in".to_string(),
            token,
        }),
    ))
}
