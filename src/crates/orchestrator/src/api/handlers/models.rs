//! Model catalog endpoint handler

use axum::extract::{Query, State};
use llm::ModelCapability;
use serde::{Deserialize, Serialize};

use crate::api::{response, routes::AppState};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelQuery {
    /// Only list models of this provider.
    pub provider: Option<String>,
    /// Only list models with a registered adapter.
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    #[serde(flatten)]
    pub capability: ModelCapability,
    /// Whether a request naming this model can be dispatched.
    pub available: bool,
}

/// Handler for GET /api/v1/models
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> impl axum::response::IntoResponse {
    let orchestrator = &state.orchestrator;
    let entries: Vec<ModelEntry> = orchestrator
        .capabilities()
        .all()
        .iter()
        .filter(|c| {
            query
                .provider
                .as_deref()
                .map_or(true, |p| c.provider.eq_ignore_ascii_case(p))
        })
        .map(|c| ModelEntry {
            capability: *c,
            available: orchestrator.adapters().contains(c.model),
        })
        .filter(|e| !query.available || e.available)
        .collect();

    response::ok(entries)
}
