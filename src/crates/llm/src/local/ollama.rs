//! Ollama adapter for locally served models.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::local::OllamaClient;
//! use llm::config::LocalLlmConfig;
//!
//! let config = LocalLlmConfig::new("http://localhost:11434", "llama3.1");
//! let client = OllamaClient::new(config)?;
//! ```

use crate::adapter::ProviderAdapter;
use crate::config::LocalLlmConfig;
use crate::error::{LlmError, Result};
use crate::types::{AdapterRequest, ImageInput, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ollama adapter for local inference.
#[derive(Clone)]
pub struct OllamaClient {
    config: LocalLlmConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama adapter with the given configuration.
    pub fn new(config: LocalLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Check if the Ollama server is running.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_request(&self, request: &AdapterRequest) -> OllamaRequest {
        // Ollama only accepts raw base64 images
        let images: Vec<String> = request
            .images
            .iter()
            .filter_map(|img| match img {
                ImageInput::Base64 { data, .. } => Some(data.clone()),
                ImageInput::Url { url } => {
                    warn!(model = %self.config.model, url = %url, "Ollama ignores URL images");
                    None
                }
            })
            .collect();

        OllamaRequest {
            model: self.config.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            images,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = self.build_request(request);

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Ollama", status, error_text));
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tokens =
            ollama_resp.prompt_eval_count.unwrap_or(0) + ollama_resp.eval_count.unwrap_or(0);
        Ok(ProviderOutput::text(ollama_resp.response, tokens))
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let config = LocalLlmConfig::new("http://localhost:11434", "llama3.1");
        let client = OllamaClient::new(config).unwrap();

        let request = AdapterRequest::new("Hello")
            .with_system("Be brief")
            .with_max_tokens(256)
            .with_image(ImageInput::base64("image/png", "AAAA"))
            .with_image(ImageInput::url("https://example.com/skip.png"));

        let json = serde_json::to_value(client.build_request(&request)).unwrap();
        assert_eq!(json["model"], "llama3.1");
        assert_eq!(json["system"], "Be brief");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
        assert_eq!(json["images"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_images_omitted_when_empty() {
        let config = LocalLlmConfig::new("http://localhost:11434", "llama3.1");
        let client = OllamaClient::new(config).unwrap();
        let json = serde_json::to_value(client.build_request(&AdapterRequest::new("hi"))).unwrap();
        assert!(json.get("images").is_none());
        assert!(json.get("system").is_none());
    }
}
