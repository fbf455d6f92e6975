//! Health check endpoint handler

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::api::{response, routes::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Models with a registered adapter.
    pub models: usize,
}

/// Handler for GET /health
pub async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    response::ok(HealthResponse {
        status: "ok".to_string(),
        version: crate::version().to_string(),
        models: state.orchestrator.adapters().len(),
    })
}
