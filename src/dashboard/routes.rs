//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<RunStatus>`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::{RunStatus, StatusSnapshot};

pub type AppState = Arc<RunStatus>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    pub uptime_secs: i64,
    pub healthy: bool,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.snapshot().await;
    let uptime_secs = (chrono::Utc::now() - snapshot.started_at).num_seconds();
    // Healthy until a failure is the most recent outcome.
    let healthy = snapshot.last_error.is_none();
    Json(StatusResponse {
        snapshot,
        uptime_secs,
        healthy,
    })
}

/// GET /api/fixture
pub async fn get_fixture(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    state.last_fixture().await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
