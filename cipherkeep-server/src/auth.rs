//! Bearer-token issuance and the auth middleware.
//!
//! Tokens are `base64url(claims).base64url(HMAC-SHA256(claims))` with claims
//! `{sub, iat, exp}`. They are stateless: the server only needs its key.

use crate::error::RelayError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie (and header) carrying the token.
pub const AUTH_COOKIE: &str = "Authorization";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Account resolved by the middleware, available to handlers via extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub id: i64,
    pub username: String,
}

pub struct TokenIssuer {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
        }
    }

    /// Issuer with a fresh random key; tokens do not survive a restart.
    pub fn ephemeral(ttl: Duration) -> Self {
        let key: [u8; 32] = rand::random();
        Self::new(key.to_vec(), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<String, RelayError> {
        let now = Utc::now().timestamp();
        self.issue_at(subject, now)
    }

    fn issue_at(&self, subject: &str, now: i64) -> Result<String, RelayError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| RelayError::Internal(format!("Claims encoding failed: {}", e)))?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let tag = URL_SAFE_NO_PAD.encode(self.sign(encoded.as_bytes())?);
        Ok(format!("{}.{}", encoded, tag))
    }

    /// Check signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, RelayError> {
        let invalid = || RelayError::Auth("Invalid token".to_string());

        let (encoded, tag) = token.split_once('.').ok_or_else(invalid)?;
        let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| invalid())?;
        let expected = self.sign(encoded.as_bytes())?;
        if !bool::from(expected.as_slice().ct_eq(tag.as_slice())) {
            return Err(invalid());
        }

        let payload = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(RelayError::Auth("Token expired".to_string()));
        }
        Ok(claims)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, RelayError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| RelayError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Pull the token from `Authorization: Bearer <t>` or the `Authorization` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.trim_start_matches("Bearer ").trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Auth middleware: validates the bearer token and attaches the account.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, RelayError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| RelayError::Auth("Missing Authorization token".to_string()))?;
    let claims = state.tokens.verify(&token)?;

    let id = state
        .store
        .account_id(&claims.sub)?
        .ok_or_else(|| RelayError::Auth("Unknown account".to_string()))?;

    request.extensions_mut().insert(AuthenticatedAccount {
        id,
        username: claims.sub,
    });

    Ok(next.run(request).await)
}
