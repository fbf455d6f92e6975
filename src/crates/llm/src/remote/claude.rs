//! Anthropic Claude messages adapter.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::ClaudeClient;
//! use llm::config::RemoteLlmConfig;
//!
//! let config = RemoteLlmConfig::from_env(
//!     "ANTHROPIC_API_KEY",
//!     "https://api.anthropic.com",
//!     "claude-3-5-sonnet-latest"
//! )?;
//! let client = ClaudeClient::new(config)?;
//! ```

use crate::adapter::ProviderAdapter;
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::types::{AdapterRequest, ImageInput, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude API adapter.
#[derive(Clone)]
pub struct ClaudeClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl ClaudeClient {
    /// Create a new Claude adapter with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Build the messages body. Claude takes the system prompt as a top-level field.
    fn build_request(&self, request: &AdapterRequest) -> ClaudeRequest {
        let mut content: Vec<ClaudeContentBlock> = request
            .images
            .iter()
            .map(|img| ClaudeContentBlock::Image {
                source: match img {
                    ImageInput::Url { url } => ImageSource::Url { url: url.clone() },
                    ImageInput::Base64 { media_type, data } => ImageSource::Base64 {
                        media_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect();
        content.push(ClaudeContentBlock::Text {
            text: request.prompt.clone(),
        });

        ClaudeRequest {
            model: self.config.model.clone(),
            system: request.system.clone(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Claude", status, error_text));
        }

        let claude_resp: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = claude_resp
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(ProviderOutput::text(
            text,
            claude_resp.usage.input_tokens + claude_resp.usage.output_tokens,
        ))
    }
}

// Claude API types
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClaudeClient {
        let config = RemoteLlmConfig::new(
            "test-key",
            "https://api.anthropic.com",
            "claude-3-5-sonnet-latest",
        );
        ClaudeClient::new(config).unwrap()
    }

    #[test]
    fn test_system_is_top_level() {
        let request = AdapterRequest::new("Hello").with_system("You are helpful");
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(json["system"], "You are helpful");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_images_precede_prompt() {
        let request = AdapterRequest::new("What is this?")
            .with_image(ImageInput::base64("image/png", "AAAA"));
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["type"], "text");
        assert!(json.get("system").is_none());
    }
}
