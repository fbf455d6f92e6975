//! Error types for provider adapters.

use thiserror::Error;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur while talking to a generation provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Model not found or unavailable.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid response from provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider did not finish within its bound.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect(),
            LlmError::Timeout(_) | LlmError::RateLimitExceeded(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Whether this error should be reported as a `timeout` status rather than `error`.
    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::HttpError(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status to the matching error variant.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::AuthenticationError(body),
            404 => LlmError::ModelNotFound(body),
            408 | 504 => LlmError::Timeout(format!("{} returned {}", provider, status)),
            429 => LlmError::RateLimitExceeded(body),
            _ => LlmError::ProviderError(format!("{} API error {}: {}", provider, status, body)),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}
