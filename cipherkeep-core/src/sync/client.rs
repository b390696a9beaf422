//! HTTP client for the CipherKeep server.

use crate::sync::models::{
    AccountRequest, ErrorResponse, LoginRequest, LoginResponse, MessageResponse, SyncRequest,
    SyncResponse, UpdateRequest, UpdateResponse,
};
use crate::{KeeperError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Source of ledger pages for the sync engine.
#[allow(async_fn_in_trait)]
pub trait RemoteLedger {
    /// Fetch up to `limit` records whose `history_id` exceeds `last_history_id`.
    async fn pull(&self, last_history_id: i64, limit: u32) -> Result<SyncResponse>;
}

/// HTTP client for the CipherKeep server.
pub struct KeeperClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KeeperClient {
    /// Create a new client with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeeperError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create the account. `Conflict` means it already exists.
    pub async fn register(&self, mail: &str) -> Result<()> {
        let _: MessageResponse = self
            .post("/register", &AccountRequest { mail: mail.to_string() }, false)
            .await?;
        Ok(())
    }

    /// Ask the server to issue a login challenge for `mail`.
    pub async fn request_challenge(&self, mail: &str) -> Result<String> {
        let resp: MessageResponse = self
            .post(
                "/login/challenge",
                &AccountRequest { mail: mail.to_string() },
                false,
            )
            .await?;
        Ok(resp.message)
    }

    /// Exchange the challenge for a bearer token and keep it on the client.
    pub async fn redeem_challenge(&mut self, mail: &str, challenge: &str) -> Result<String> {
        let resp: LoginResponse = self
            .post(
                "/login",
                &LoginRequest {
                    login: mail.to_string(),
                    password: challenge.to_string(),
                },
                false,
            )
            .await?;
        self.token = Some(resp.token.clone());
        Ok(resp.token)
    }

    /// Submit an ADD, UPDATE or DELETE.
    pub async fn mutate(&self, request: &UpdateRequest) -> Result<UpdateResponse> {
        debug!("Submitting {} mutation", request.kind.as_str());
        self.post("/update", request, true).await
    }

    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| KeeperError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }

    // --- Internal helpers ---

    async fn post<B, R>(&self, path: &str, body: &B, authenticated: bool) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);

        if authenticated {
            let token = self
                .token
                .as_deref()
                .ok_or_else(|| KeeperError::Unauthorized("no session token".to_string()))?;
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| KeeperError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        resp.json::<R>()
            .await
            .map_err(|e| KeeperError::Network(format!("Invalid response from {}: {}", path, e)))
    }
}

impl RemoteLedger for KeeperClient {
    async fn pull(&self, last_history_id: i64, limit: u32) -> Result<SyncResponse> {
        self.post(
            "/sync",
            &SyncRequest {
                last_history_id,
                limit,
            },
            true,
        )
        .await
    }
}

async fn error_from_response(resp: reqwest::Response) -> KeeperError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED => KeeperError::Unauthorized(message),
        StatusCode::NOT_FOUND => KeeperError::NotFound(message),
        StatusCode::CONFLICT => KeeperError::Conflict(message),
        StatusCode::BAD_REQUEST => KeeperError::InvalidInput(message),
        other => KeeperError::Server {
            status: other.as_u16(),
            message,
        },
    }
}
