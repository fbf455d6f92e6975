//! OpenRouter adapter.
//!
//! OpenRouter routes one OpenAI-compatible API to many upstream vendors,
//! so this adapter reuses the OpenAI wire types and adds the attribution
//! headers OpenRouter uses for app ranking.

use crate::adapter::ProviderAdapter;
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::remote::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::types::{AdapterRequest, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;

/// OpenRouter API adapter.
#[derive(Clone)]
pub struct OpenRouterClient {
    config: RemoteLlmConfig,
    client: Client,
    app_name: Option<String>,
}

impl OpenRouterClient {
    /// Create a new OpenRouter adapter with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            app_name: None,
        })
    }

    /// Set the application name reported to OpenRouter.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterClient {
    fn provider(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatCompletionRequest::from_adapter_request(&self.config.model, request);

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);

        if let Some(app_name) = &self.app_name {
            req = req.header("HTTP-Referer", app_name).header("X-Title", app_name);
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("OpenRouter", status, error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion.into_output()
    }
}
