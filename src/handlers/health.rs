//! Health and diagnostics endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router, debug_handler};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tokens", get(token_count))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct TokenCountResponse {
    count: usize,
}

/// Count of live (unexpired) tokens, for eyeballing store growth.
#[debug_handler]
async fn token_count(State(state): State<AppState>) -> Json<TokenCountResponse> {
    Json(TokenCountResponse {
        count: state.stores.tokens.live_count(),
    })
}
