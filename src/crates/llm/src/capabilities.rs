//! Static catalog of model capabilities.
//!
//! Maps a provider and model identifier (or one of its aliases) to the
//! metadata the dispatcher and pipeline need: cost, speed, supported
//! inputs, output kind, and whether the provider runs synchronously or
//! through a polled job. Pure lookup, no state; safe for unlimited
//! concurrent reads.

use crate::types::OutputKind;
use serde::Serialize;
use std::time::Duration;

/// Relative latency class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

/// How a provider delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One request, one response.
    Sync,
    /// Submit a job, then poll until it settles.
    Polling,
}

/// Capability metadata for one model.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelCapability {
    pub provider: &'static str,
    pub model: &'static str,
    pub display_name: &'static str,
    /// Blended USD cost per thousand tokens (per call for media models).
    pub cost_per_1k_tokens: f64,
    pub speed: Speed,
    pub supports_json: bool,
    pub supports_code: bool,
    pub supports_vision: bool,
    pub output_kind: OutputKind,
    pub execution: ExecutionMode,
    pub local_only: bool,
    pub aliases: &'static [&'static str],
    /// Env var holding the provider credential, if one is needed.
    pub api_key_env: Option<&'static str>,
}

const SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const POLLING_TIMEOUT: Duration = Duration::from_secs(90);
const VIDEO_TIMEOUT: Duration = Duration::from_secs(300);

impl ModelCapability {
    /// Dispatch timeout appropriate for this model.
    pub fn default_timeout(&self) -> Duration {
        match (self.execution, self.output_kind) {
            (_, OutputKind::Video) => VIDEO_TIMEOUT,
            (ExecutionMode::Polling, _) => POLLING_TIMEOUT,
            (ExecutionMode::Sync, _) => SYNC_TIMEOUT,
        }
    }

    /// Whether `id` names this model directly or through an alias.
    pub fn matches(&self, id: &str) -> bool {
        self.model.eq_ignore_ascii_case(id)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(id))
    }
}

const fn text_model(
    provider: &'static str,
    model: &'static str,
    display_name: &'static str,
    cost_per_1k_tokens: f64,
    speed: Speed,
    supports_vision: bool,
    aliases: &'static [&'static str],
    api_key_env: Option<&'static str>,
) -> ModelCapability {
    ModelCapability {
        provider,
        model,
        display_name,
        cost_per_1k_tokens,
        speed,
        supports_json: true,
        supports_code: true,
        supports_vision,
        output_kind: OutputKind::Text,
        execution: ExecutionMode::Sync,
        local_only: false,
        aliases,
        api_key_env,
    }
}

const OPENAI_KEY: Option<&str> = Some("OPENAI_API_KEY");
const ANTHROPIC_KEY: Option<&str> = Some("ANTHROPIC_API_KEY");
const GOOGLE_KEY: Option<&str> = Some("GOOGLE_API_KEY");
const OPENROUTER_KEY: Option<&str> = Some("OPENROUTER_API_KEY");
const REPLICATE_KEY: Option<&str> = Some("REPLICATE_API_TOKEN");

/// Built-in catalog.
pub const BUILTIN_CAPABILITIES: &[ModelCapability] = &[
    text_model(
        "openai",
        "gpt-4o",
        "GPT-4o",
        0.0075,
        Speed::Medium,
        true,
        &["gpt4o", "openai"],
        OPENAI_KEY,
    ),
    text_model(
        "openai",
        "gpt-4o-mini",
        "GPT-4o mini",
        0.0004,
        Speed::Fast,
        true,
        &["gpt-mini"],
        OPENAI_KEY,
    ),
    text_model(
        "anthropic",
        "claude-3-5-sonnet-latest",
        "Claude 3.5 Sonnet",
        0.009,
        Speed::Medium,
        true,
        &["claude", "claude-sonnet", "sonnet"],
        ANTHROPIC_KEY,
    ),
    text_model(
        "anthropic",
        "claude-3-5-haiku-latest",
        "Claude 3.5 Haiku",
        0.0024,
        Speed::Fast,
        false,
        &["claude-haiku", "haiku"],
        ANTHROPIC_KEY,
    ),
    text_model(
        "google",
        "gemini-1.5-pro",
        "Gemini 1.5 Pro",
        0.003,
        Speed::Medium,
        true,
        &["gemini", "gemini-pro"],
        GOOGLE_KEY,
    ),
    text_model(
        "google",
        "gemini-1.5-flash",
        "Gemini 1.5 Flash",
        0.0002,
        Speed::Fast,
        true,
        &["gemini-flash"],
        GOOGLE_KEY,
    ),
    text_model(
        "openrouter",
        "deepseek/deepseek-chat",
        "DeepSeek V3 (OpenRouter)",
        0.0006,
        Speed::Medium,
        false,
        &["deepseek"],
        OPENROUTER_KEY,
    ),
    text_model(
        "openrouter",
        "meta-llama/llama-3.1-70b-instruct",
        "Llama 3.1 70B (OpenRouter)",
        0.0004,
        Speed::Medium,
        false,
        &["llama-70b"],
        OPENROUTER_KEY,
    ),
    ModelCapability {
        provider: "ollama",
        model: "llama3.1",
        display_name: "Llama 3.1 (local)",
        cost_per_1k_tokens: 0.0,
        speed: Speed::Slow,
        supports_json: true,
        supports_code: true,
        supports_vision: false,
        output_kind: OutputKind::Text,
        execution: ExecutionMode::Sync,
        local_only: true,
        aliases: &["llama3", "local"],
        api_key_env: None,
    },
    ModelCapability {
        provider: "ollama",
        model: "qwen2.5-coder",
        display_name: "Qwen 2.5 Coder (local)",
        cost_per_1k_tokens: 0.0,
        speed: Speed::Slow,
        supports_json: true,
        supports_code: true,
        supports_vision: false,
        output_kind: OutputKind::Text,
        execution: ExecutionMode::Sync,
        local_only: true,
        aliases: &["qwen-coder"],
        api_key_env: None,
    },
    ModelCapability {
        provider: "replicate",
        model: "black-forest-labs/flux-schnell",
        display_name: "FLUX schnell",
        cost_per_1k_tokens: 0.003,
        speed: Speed::Medium,
        supports_json: false,
        supports_code: false,
        supports_vision: false,
        output_kind: OutputKind::Image,
        execution: ExecutionMode::Polling,
        local_only: false,
        aliases: &["flux"],
        api_key_env: REPLICATE_KEY,
    },
    ModelCapability {
        provider: "replicate",
        model: "minimax/video-01",
        display_name: "MiniMax Video-01",
        cost_per_1k_tokens: 0.5,
        speed: Speed::Slow,
        supports_json: false,
        supports_code: false,
        supports_vision: true,
        output_kind: OutputKind::Video,
        execution: ExecutionMode::Polling,
        local_only: false,
        aliases: &["video-01"],
        api_key_env: REPLICATE_KEY,
    },
];

/// Read-only capability lookup.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: Vec<ModelCapability>,
}

impl CapabilityRegistry {
    /// Registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_CAPABILITIES.to_vec(),
        }
    }

    /// Empty registry.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add or replace an entry keyed by model id.
    pub fn with_entry(mut self, capability: ModelCapability) -> Self {
        self.entries.retain(|c| c.model != capability.model);
        self.entries.push(capability);
        self
    }

    /// Look up a model by id or alias.
    pub fn get(&self, id: &str) -> Option<&ModelCapability> {
        self.entries
            .iter()
            .find(|c| c.model.eq_ignore_ascii_case(id))
            .or_else(|| self.entries.iter().find(|c| c.matches(id)))
    }

    /// Canonical model id for an id or alias.
    pub fn resolve_alias<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|c| c.model).unwrap_or(id)
    }

    /// All entries for one provider.
    pub fn by_provider<'a>(
        &'a self,
        provider: &'a str,
    ) -> impl Iterator<Item = &'a ModelCapability> + 'a {
        self.entries.iter().filter(move |c| c.provider == provider)
    }

    /// All entries.
    pub fn all(&self) -> &[ModelCapability] {
        &self.entries
    }

    /// Dispatch timeout for a model, if it is catalogued.
    pub fn timeout_for(&self, id: &str) -> Option<Duration> {
        self.get(id).map(ModelCapability::default_timeout)
    }

    /// Estimated USD cost of a call that consumed `tokens`.
    pub fn estimate_cost(&self, id: &str, tokens: u32) -> f64 {
        match self.get(id) {
            Some(c) if c.output_kind == OutputKind::Text => {
                c.cost_per_1k_tokens * tokens as f64 / 1000.0
            }
            Some(c) => c.cost_per_1k_tokens,
            None => 0.0,
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
