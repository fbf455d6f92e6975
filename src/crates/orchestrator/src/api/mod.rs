//! HTTP API for the pipeline
//!
//! Provides endpoints for:
//! - Health checks
//! - Listing the model catalog
//! - Batch generation (JSON report plus base64 archive)
//! - Streaming generation over server-sent events

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use response::SuccessResponse;
pub use routes::{create_router, AppState};
