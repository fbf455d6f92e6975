//! Generation requests as submitted by callers.

use crate::consensus::ConsensusStrategy;
use crate::policy::ProfileOverride;
use crate::{OrchestratorError, Result};
use llm::{AdapterRequest, ImageInput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on models per request.
pub const MAX_MODELS: usize = 10;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default output token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Which scoring heuristics apply to the responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Code,
    Text,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Code => write!(f, "code"),
            TaskType::Text => write!(f, "text"),
        }
    }
}

impl FromStr for TaskType {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "code" => Ok(TaskType::Code),
            "text" => Ok(TaskType::Text),
            other => Err(OrchestratorError::InvalidRequest(format!(
                "unknown task type '{}'",
                other
            ))),
        }
    }
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_tier() -> u8 {
    1
}

/// A natural-language build request fanned out to several models.
///
/// Treated as immutable once handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageInput>,
    pub models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Caps concurrent calls per batch; falls back to the dispatch config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ConsensusStrategy>,
    /// Subscription tier (1-5) selecting the policy profile.
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_override: Option<ProfileOverride>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            images: Vec::new(),
            models: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_parallel: None,
            task_type: TaskType::default(),
            strategy: None,
            tier: default_tier(),
            policy_override: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models.push(model.into());
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.extend(models.into_iter().map(Into::into));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_strategy(mut self, strategy: ConsensusStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_policy_override(mut self, policy_override: ProfileOverride) -> Self {
        self.policy_override = Some(policy_override);
        self
    }

    /// Check the input contract. This is the only place request-shape
    /// problems surface as errors.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(OrchestratorError::EmptyInput("prompt is empty".to_string()));
        }
        if self.models.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "at least one model is required".to_string(),
            ));
        }
        if self.models.len() > MAX_MODELS {
            return Err(OrchestratorError::InvalidRequest(format!(
                "{} models requested, at most {} allowed",
                self.models.len(),
                MAX_MODELS
            )));
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Err(OrchestratorError::InvalidRequest(
                "model identifiers must be non-empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(OrchestratorError::InvalidRequest(
                "max_tokens must be positive".to_string(),
            ));
        }
        if self.max_parallel == Some(0) {
            return Err(OrchestratorError::InvalidRequest(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        if !(1..=5).contains(&self.tier) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "tier {} outside 1-5",
                self.tier
            )));
        }
        Ok(())
    }

    /// The per-call payload handed to every adapter.
    pub fn to_adapter_request(&self) -> AdapterRequest {
        AdapterRequest {
            prompt: self.prompt.clone(),
            system: self.system.clone(),
            images: self.images.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
