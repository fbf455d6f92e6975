//! Google Gemini `generateContent` adapter.

use crate::adapter::ProviderAdapter;
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::types::{AdapterRequest, ImageInput, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Google Gemini API adapter.
#[derive(Clone)]
pub struct GeminiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini adapter with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn build_request(&self, request: &AdapterRequest) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: request.prompt.clone(),
        }];
        for image in &request.images {
            parts.push(match image {
                ImageInput::Base64 { media_type, data } => GeminiPart::InlineData {
                    inline_data: GeminiBlob {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
                ImageInput::Url { url } => GeminiPart::FileData {
                    file_data: GeminiFile {
                        mime_type: guess_image_mime(url).to_string(),
                        file_uri: url.clone(),
                    },
                },
            });
        }

        GeminiRequest {
            contents: vec![GeminiMessage {
                role: "user".to_string(),
                parts,
            }],
            system_instruction: request.system.as_ref().map(|s| GeminiSystem {
                parts: vec![GeminiPart::Text { text: s.clone() }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

fn guess_image_mime(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

#[async_trait]
impl ProviderAdapter for GeminiClient {
    fn provider(&self) -> &str {
        "google"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = self.build_request(request);

        // Gemini takes the API key as a query parameter
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.config.api_key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Gemini", status, error_text));
        }

        let gemini_resp: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let candidate = gemini_resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| {
                LlmError::InvalidResponse("response contained no candidates".to_string())
            })?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        let tokens = gemini_resp
            .usage_metadata
            .map(|u| u.total_token_count)
            .unwrap_or(0);

        Ok(ProviderOutput::text(text, tokens))
    }
}

// Gemini API types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystem>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiMessage {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystem {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: GeminiBlob,
    },
    #[serde(rename_all = "camelCase")]
    FileData {
        file_data: GeminiFile,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        let config = RemoteLlmConfig::new(
            "test-key",
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-1.5-pro",
        );
        GeminiClient::new(config).unwrap()
    }

    #[test]
    fn test_system_instruction_is_separate() {
        let request = AdapterRequest::new("Hello").with_system("You are helpful");
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are helpful");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn test_image_parts() {
        let request = AdapterRequest::new("Describe")
            .with_image(ImageInput::base64("image/png", "AAAA"))
            .with_image(ImageInput::url("https://example.com/shot.webp"));
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[2]["fileData"]["mimeType"], "image/webp");
        assert_eq!(parts[2]["fileData"]["fileUri"], "https://example.com/shot.webp");
    }
}
