//! Common test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cipherkeep_server::{build_router, AppState, SecretStore, ServerConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server backed by a temporary database.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(mut config: ServerConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        config.storage_path = temp_dir.path().join("server.db");

        let store = SecretStore::open(&config.storage_path).expect("Failed to open store");
        let state = AppState::new(store, config);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Register `mail`, run the challenge login and return the bearer token.
    pub async fn login(&self, mail: &str) -> String {
        let (status, _) = json_request(
            &self.router,
            "POST",
            "/register",
            Some(json!({ "mail": mail })),
            None,
        )
        .await;
        assert!(
            status == StatusCode::OK || status == StatusCode::CONFLICT,
            "register failed: {}",
            status
        );

        let (status, body) = json_request(
            &self.router,
            "POST",
            "/login/challenge",
            Some(json!({ "mail": mail })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let challenge = body["message"].as_str().unwrap().to_string();

        let (status, body) = json_request(
            &self.router,
            "POST",
            "/login",
            Some(json!({ "login": mail, "password": challenge })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

#[allow(dead_code)]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        token_secret: Some("integration-test-secret-0123456789".to_string()),
        ..ServerConfig::default()
    }
}

/// Helper to make JSON requests.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}
