//! Replicate predictions adapter.
//!
//! Replicate runs media models as asynchronous jobs: a prediction is
//! created, then polled until it reaches `succeeded`, `failed` or
//! `canceled`. Polling is bounded by [`PollConfig`]; running out of
//! attempts reports a timeout.

use crate::adapter::ProviderAdapter;
use crate::config::{PollConfig, RemoteLlmConfig};
use crate::error::{LlmError, Result};
use crate::types::{AdapterRequest, OutputKind, ProviderOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Replicate API adapter for image and video models.
#[derive(Clone)]
pub struct ReplicateClient {
    config: RemoteLlmConfig,
    client: Client,
    poll: PollConfig,
    kind: OutputKind,
}

impl ReplicateClient {
    /// Create an adapter for an image model with short-job polling bounds.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            poll: PollConfig::short_job(),
            kind: OutputKind::Image,
        })
    }

    /// Create an adapter for a video model with long-job polling bounds.
    pub fn video(config: RemoteLlmConfig) -> Result<Self> {
        Ok(Self::new(config)?
            .with_poll_config(PollConfig::long_job())
            .with_output_kind(OutputKind::Video))
    }

    /// Override the polling bounds.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Override the reported output kind.
    pub fn with_output_kind(mut self, kind: OutputKind) -> Self {
        self.kind = kind;
        self
    }

    async fn create_prediction(&self, request: &AdapterRequest) -> Result<Prediction> {
        let url = format!("{}/models/{}/predictions", self.config.base_url, self.config.model);
        let body = PredictionRequest {
            input: PredictionInput {
                prompt: request.prompt.clone(),
                image: request.images.first().map(|img| img.as_url()),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        self.parse_prediction(response).await
    }

    async fn fetch_prediction(&self, id: &str) -> Result<Prediction> {
        let url = format!("{}/predictions/{}", self.config.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        self.parse_prediction(response).await
    }

    async fn parse_prediction(&self, response: reqwest::Response) -> Result<Prediction> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Replicate", status, error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateClient {
    fn provider(&self) -> &str {
        "replicate"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn output_kind(&self) -> OutputKind {
        self.kind
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput> {
        let mut prediction = self.create_prediction(request).await?;

        for attempt in 0..=self.poll.max_attempts {
            match prediction.status.as_str() {
                "succeeded" => {
                    return prediction
                        .output_url()
                        .map(ProviderOutput::url)
                        .ok_or_else(|| {
                            LlmError::InvalidResponse(format!(
                                "prediction {} succeeded without output",
                                prediction.id
                            ))
                        });
                }
                "failed" | "canceled" => {
                    return Err(LlmError::ProviderError(format!(
                        "prediction {} {}: {}",
                        prediction.id,
                        prediction.status,
                        prediction.error.as_deref().unwrap_or("no error detail")
                    )));
                }
                _ if attempt == self.poll.max_attempts => break,
                _ => {}
            }

            debug!(
                model = %self.config.model,
                prediction = %prediction.id,
                status = %prediction.status,
                attempt,
                "Prediction pending"
            );
            tokio::time::sleep(self.poll.interval).await;
            prediction = self.fetch_prediction(&prediction.id).await?;
        }

        Err(LlmError::Timeout(format!(
            "prediction {} still {} after {} polls",
            prediction.id, prediction.status, self.poll.max_attempts
        )))
    }
}

// Replicate API types
#[derive(Debug, Serialize)]
struct PredictionRequest {
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Prediction {
    /// First URL in the output, which may be a string or a list of strings.
    fn output_url(&self) -> Option<String> {
        match self.output.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                items.iter().find_map(|v| v.as_str().map(String::from))
            }
            _ => None,
        }
    }
}
