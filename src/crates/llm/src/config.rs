//! Connection settings shared by the provider adapters.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for local providers (Ollama and compatible servers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    /// Base URL for the local server, e.g. "http://localhost:11434".
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LocalLlmConfig {
    /// Create a new local configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for hosted providers (OpenAI, Anthropic, Gemini, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    ///
    /// Examples:
    /// - OpenAI: "https://api.openai.com/v1"
    /// - Anthropic: "https://api.anthropic.com"
    /// - Gemini: "https://generativelanguage.googleapis.com/v1beta"
    /// - OpenRouter: "https://openrouter.ai/api/v1"
    /// - Replicate: "https://api.replicate.com/v1"
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl RemoteLlmConfig {
    /// Create a new remote configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: trim_base(base_url.into()),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Create configuration reading the API key from an environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        if api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound(format!(
                "Environment variable {} is empty",
                env_var
            )));
        }

        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return a copy of this configuration targeting a different model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

/// Bounds for adapters that submit a job and poll it to completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Status checks before giving up with a timeout.
    pub max_attempts: u32,
}

impl PollConfig {
    /// Ceiling for short image jobs: 90 checks one second apart.
    pub fn short_job() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 90,
        }
    }

    /// Ceiling for long-running video jobs: five minutes.
    pub fn long_job() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 150,
        }
    }

    /// Wall-clock ceiling implied by these bounds.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::short_job()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config_builder() {
        let config = LocalLlmConfig::new("http://localhost:11434/", "llama3")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o")
            .with_timeout(Duration::from_secs(120));

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout, Duration::from_secs(120));

        let other = config.for_model("gpt-4o-mini");
        assert_eq!(other.model, "gpt-4o-mini");
        assert_eq!(other.api_key, "test-key");
    }

    #[test]
    fn test_poll_ceilings() {
        assert_eq!(PollConfig::short_job().ceiling(), Duration::from_secs(90));
        assert_eq!(PollConfig::long_job().ceiling(), Duration::from_secs(300));
    }

    #[test]
    fn test_from_env_missing() {
        let result = RemoteLlmConfig::from_env(
            "POLYFORGE_TEST_KEY_THAT_IS_NEVER_SET",
            "https://example.com",
            "m",
        );
        assert!(matches!(result, Err(LlmError::ApiKeyNotFound(_))));
    }
}
