//! Generation endpoint handlers
//!
//! `POST /api/v1/generate` answers with the full report and, when the
//! policy gate allows delivery, the base64 archive. The streaming variant
//! sends one server-sent event per progress frame, named after its stage.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::info;

use crate::api::{error::ApiResult, response, routes::AppState};
use crate::packaging;
use crate::pipeline::GenerationReport;
use crate::request::GenerationRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub report: GenerationReport,
    pub deliverable: bool,
    /// Base64 `.tar.gz`; absent when the app was blocked.
    pub archive: Option<String>,
}

/// Handler for POST /api/v1/generate
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let Json(request) = payload?;
    info!(
        models = request.models.len(),
        tier = request.tier,
        "Generation requested"
    );

    let report = state.orchestrator.generate(&request).await?;
    let deliverable = report.is_deliverable();
    let archive = if deliverable {
        Some(BASE64.encode(packaging::package(&report.app)?))
    } else {
        None
    };

    Ok(response::ok(GenerateResponse {
        report,
        deliverable,
        archive,
    }))
}

/// Handler for POST /api/v1/generate/stream
pub async fn generate_stream(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let Json(request) = payload?;
    info!(
        models = request.models.len(),
        tier = request.tier,
        "Streaming generation requested"
    );

    let frames = state.orchestrator.generate_stream(request);
    let events = frames.map(|frame| Event::default().event(frame.stage.as_str()).json_data(&frame));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
