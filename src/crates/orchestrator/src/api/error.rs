//! HTTP mapping of pipeline failures.
//!
//! Caller mistakes become 4xx, an all-providers failure becomes 502 and
//! everything else 500. Bodies are `{ "error", "message", "code" }`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::OrchestratorError;

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Failure class, e.g. `invalid_request`
    pub error: String,
    pub message: String,
    /// Stable machine-readable code
    pub code: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body could not be decoded
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Request decoded but violated its contract
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    /// No provider returned a usable response
    #[error("{0}")]
    NoValidOutput(String),

    #[error("Generation failed: {0}")]
    Pipeline(String),
}

impl ApiError {
    /// Status, code and failure class in one table.
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ApiError::MalformedBody(_) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_BODY", "bad_request")
            }
            ApiError::InvalidRequest(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "invalid_request",
            ),
            ApiError::NoValidOutput(_) => {
                (StatusCode::BAD_GATEWAY, "NO_VALID_OUTPUT", "upstream")
            }
            ApiError::Pipeline(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    pub fn code(&self) -> &'static str {
        self.parts().1
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, class) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, %status, "Request failed: {}", message);
        } else {
            tracing::debug!(code, %status, "Request rejected: {}", message);
        }

        let body = ApiErrorResponse {
            error: class.to_string(),
            message,
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            e if e.is_input_error() => ApiError::InvalidRequest(e.to_string()),
            e @ OrchestratorError::NoValidOutput { .. } => ApiError::NoValidOutput(e.to_string()),
            other => ApiError::Pipeline(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::MalformedBody(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}
