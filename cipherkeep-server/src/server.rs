//! Axum router setup.

use crate::auth::auth_middleware;
use crate::handlers::{account, mutate, sync};
use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route("/update", post(mutate::update))
        .route("/sync", post(sync::sync))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes
    let mut public = Router::new()
        .route("/login/challenge", post(account::request_challenge))
        .route("/login", post(account::login))
        .route("/health", get(health));

    if state.config.registration_enabled {
        public = public.route("/register", post(account::register));
    }

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(state.config.max_payload_size))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
