//! Multi-provider orchestration and consensus pipeline for polyforge
//!
//! A build request is fanned out to several generation providers, each
//! response is scored, the scored set is reconciled into one consensus
//! answer, code blocks are extracted into a file set, a tiered content
//! policy is applied and the result is packaged as an archive.
//!
//! The entry point is [`pipeline::Orchestrator`].

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod consensus;
pub mod dispatch;
pub mod extraction;
pub mod packaging;
pub mod pipeline;
pub mod policy;
pub mod request;
pub mod scoring;

use llm::RawResult;
use thiserror::Error;

pub use app::{AppMetadata, ArtifactFile, GeneratedApp};
pub use cache::{CacheKey, InMemoryResultCache, ResultCache};
pub use config::PipelineConfig;
pub use consensus::{ConsensusEngine, ConsensusResult, ConsensusStrategy};
pub use dispatch::{DispatchConfig, DispatchEngine};
pub use packaging::{ProgressFrame, ProgressStage};
pub use pipeline::{GenerationReport, Orchestrator};
pub use policy::{EnforcementResult, PolicyGate, PolicyMode, PolicyProfile};
pub use request::{GenerationRequest, TaskType};
pub use scoring::{ScoredResult, ScoringEngine};

/// Errors that can occur during orchestration
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Required input was empty (prompt, result set)
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Request violated its contract
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every provider failed; the best raw result is attached for diagnostics
    #[error(
        "No valid output from any provider (best candidate {}/{}: {})",
        .result.provider,
        .result.model,
        .result.error.as_deref().unwrap_or("empty payload")
    )]
    NoValidOutput { result: Box<RawResult> },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Archive could not be built or read
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// Provider layer setup failed
    #[error("Provider error: {0}")]
    Llm(#[from] llm::LlmError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Whether the error stems from caller input rather than runtime failure.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::EmptyInput(_) | OrchestratorError::InvalidRequest(_)
        )
    }
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
