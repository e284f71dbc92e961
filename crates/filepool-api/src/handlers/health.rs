//! Health check handler.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::state::AppState;

/// Liveness probe. Reports how many accounts are configured without touching
/// any backend.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "accountsConfigured": state.uploader.pool().len(),
        })),
    )
}
