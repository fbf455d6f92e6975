//! OpenAI chat completions adapter.
//!
//! Also provides the OpenAI-compatible wire types reused by the
//! OpenRouter adapter.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::config::RemoteLlmConfig;
//! use llm::{call, AdapterRequest};
//!
//! let config =
//!     RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o")?;
//! let client = OpenAiClient::new(config)?;
//!
//! let result = call(&client, &AdapterRequest::new("Build a todo app")).await;
//! ```

use crate::adapter::ProviderAdapter;
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::types::{AdapterRequest, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI API adapter.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI adapter with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatCompletionRequest::from_adapter_request(&self.config.model, request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("OpenAI", status, error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion.into_output()
    }
}

// OpenAI-compatible wire types
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl ChatCompletionRequest {
    pub(crate) fn from_adapter_request(model: &str, request: &AdapterRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(system.clone()),
            });
        }

        let content = if request.images.is_empty() {
            ChatContent::Text(request.prompt.clone())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: request.prompt.clone(),
            }];
            parts.extend(request.images.iter().map(|img| ContentPart::ImageUrl {
                image_url: ImageUrl { url: img.as_url() },
            }));
            ChatContent::Parts(parts)
        };
        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

impl ChatCompletionResponse {
    pub(crate) fn into_output(self) -> Result<ProviderOutput> {
        let tokens = self.usage.map(|u| u.total_tokens).unwrap_or(0);
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        Ok(ProviderOutput::text(text, tokens))
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageInput;

    #[test]
    fn test_client_creation() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o");
        let client = OpenAiClient::new(config).unwrap();
        assert_eq!(client.provider(), "openai");
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_request_with_system_and_images() {
        let request = AdapterRequest::new("Describe this UI")
            .with_system("You are a designer")
            .with_image(ImageInput::url("https://example.com/mock.png"));

        let body = ChatCompletionRequest::from_adapter_request("gpt-4o", &request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["url"],
            "https://example.com/mock.png"
        );
    }

    #[test]
    fn test_plain_prompt_serializes_as_string() {
        let request = AdapterRequest::new("hi");
        let body = ChatCompletionRequest::from_adapter_request("gpt-4o", &request);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_without_choices_is_invalid() {
        let resp: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [], "usage": {"total_tokens": 5}}"#).unwrap();
        assert!(matches!(resp.into_output(), Err(LlmError::InvalidResponse(_))));
    }
}
