//! Adapter registry: model identifiers to adapter instances.

use crate::adapter::ProviderAdapter;
use crate::capabilities::{CapabilityRegistry, ModelCapability};
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "local")]
use crate::config::LocalLlmConfig;
#[cfg(feature = "local")]
use crate::local::OllamaClient;
#[cfg(feature = "remote")]
use crate::remote::{ClaudeClient, GeminiClient, OpenAiClient, OpenRouterClient, ReplicateClient};
#[cfg(feature = "remote")]
use crate::types::OutputKind;

/// Lookup table from model id (or alias) to a shared adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    aliases: HashMap<String, String>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("models", &self.models())
            .finish()
    }
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own model id.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let model = adapter.model().to_lowercase();
        debug!(provider = adapter.provider(), model = %model, "Registered adapter");
        self.adapters.insert(model, adapter);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Route `alias` to the adapter registered for `model`.
    pub fn register_alias(&mut self, alias: impl Into<String>, model: impl Into<String>) {
        self.aliases
            .insert(alias.into().to_lowercase(), model.into().to_lowercase());
    }

    /// Resolve an id or alias to its adapter.
    pub fn get(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        let key = id.to_lowercase();
        self.adapters
            .get(&key)
            .or_else(|| self.aliases.get(&key).and_then(|m| self.adapters.get(m)))
            .cloned()
    }

    /// Whether an adapter is available for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Registered model ids, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.adapters.keys().cloned().collect();
        models.sort();
        models
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Build adapters for every catalogued model whose credentials are present.
    ///
    /// Hosted providers are enabled by their API key variable; Ollama is
    /// enabled when `OLLAMA_HOST` is set.
    pub fn from_env(capabilities: &CapabilityRegistry) -> Result<Self> {
        let mut registry = Self::new();

        for capability in capabilities.all() {
            let adapter = match build_adapter(capability)? {
                Some(adapter) => adapter,
                None => continue,
            };
            registry.register(adapter);
            for alias in capability.aliases {
                registry.register_alias(*alias, capability.model);
            }
        }

        info!(adapters = registry.len(), "Adapter registry initialised from environment");
        Ok(registry)
    }
}

fn base_url_for(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "anthropic" => Some("https://api.anthropic.com"),
        "google" => Some("https://generativelanguage.googleapis.com/v1beta"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "replicate" => Some("https://api.replicate.com/v1"),
        _ => None,
    }
}

fn build_adapter(capability: &ModelCapability) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    if capability.local_only {
        return build_local(capability);
    }

    let (Some(env_var), Some(base_url)) =
        (capability.api_key_env, base_url_for(capability.provider))
    else {
        return Ok(None);
    };

    let config = match RemoteLlmConfig::from_env(env_var, base_url, capability.model) {
        Ok(config) => config.with_timeout(capability.default_timeout()),
        Err(LlmError::ApiKeyNotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    build_remote(capability, config)
}

#[cfg(feature = "remote")]
fn build_remote(
    capability: &ModelCapability,
    config: RemoteLlmConfig,
) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    let adapter: Arc<dyn ProviderAdapter> = match capability.provider {
        "openai" => Arc::new(OpenAiClient::new(config)?),
        "anthropic" => Arc::new(ClaudeClient::new(config)?),
        "google" => Arc::new(GeminiClient::new(config)?),
        "openrouter" => Arc::new(OpenRouterClient::new(config)?.with_app_name("polyforge")),
        "replicate" if capability.output_kind == OutputKind::Video => {
            Arc::new(ReplicateClient::video(config)?)
        }
        "replicate" => {
            Arc::new(ReplicateClient::new(config)?.with_output_kind(capability.output_kind))
        }
        other => {
            return Err(LlmError::ConfigError(format!("no adapter for provider '{}'", other)));
        }
    };
    Ok(Some(adapter))
}

#[cfg(not(feature = "remote"))]
fn build_remote(
    _capability: &ModelCapability,
    _config: RemoteLlmConfig,
) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    Ok(None)
}

#[cfg(feature = "local")]
fn build_local(capability: &ModelCapability) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    let Ok(host) = std::env::var("OLLAMA_HOST") else {
        return Ok(None);
    };
    let config =
        LocalLlmConfig::new(host, capability.model).with_timeout(capability.default_timeout());
    Ok(Some(Arc::new(OllamaClient::new(config)?)))
}

#[cfg(not(feature = "local"))]
fn build_local(_capability: &ModelCapability) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdapterRequest, ProviderOutput};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl ProviderAdapter for Named {
        fn provider(&self) -> &str {
            "test"
        }

        fn model(&self) -> &str {
            self.0
        }

        async fn generate(&self, _request: &AdapterRequest) -> Result<ProviderOutput> {
            Ok(ProviderOutput::text(self.0, 1))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = AdapterRegistry::new().with_adapter(Arc::new(Named("Alpha-1")));
        registry.register_alias("alpha", "alpha-1");

        assert!(registry.contains("alpha-1"));
        assert!(registry.contains("ALPHA"));
        assert_eq!(registry.get("alpha").unwrap().model(), "Alpha-1");
        assert!(registry.get("beta").is_none());
        assert_eq!(registry.models(), vec!["alpha-1".to_string()]);
    }

    #[test]
    fn test_base_urls() {
        assert!(base_url_for("openai").is_some());
        assert!(base_url_for("ollama").is_none());
    }
}
