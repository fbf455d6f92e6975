//! Request and result records exchanged with provider adapters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference image attached to a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageInput {
    /// Publicly reachable image URL.
    Url { url: String },
    /// Inline image bytes, base64 encoded.
    Base64 { media_type: String, data: String },
}

impl ImageInput {
    /// Create a URL reference.
    pub fn url(url: impl Into<String>) -> Self {
        ImageInput::Url { url: url.into() }
    }

    /// Create an inline base64 image.
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ImageInput::Base64 {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Render as a URL, using a data URI for inline images.
    pub fn as_url(&self) -> String {
        match self {
            ImageInput::Url { url } => url.clone(),
            ImageInput::Base64 { media_type, data } => {
                format!("data:{};base64,{}", media_type, data)
            }
        }
    }
}

/// One call's worth of input for a single adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Optional reference images.
    #[serde(default)]
    pub images: Vec<ImageInput>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: u32,
}

impl AdapterRequest {
    /// Create a request with default sampling settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            images: Vec::new(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach a reference image.
    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the output token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Kind of artifact a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputKind::Text => "text",
            OutputKind::Image => "image",
            OutputKind::Video => "video",
            OutputKind::Audio => "audio",
        };
        f.write_str(s)
    }
}

/// Outcome tag of a single adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Error,
    Timeout,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultStatus::Ok => "ok",
            ResultStatus::Error => "error",
            ResultStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Successful payload returned by an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Generated text, for text models.
    pub text: Option<String>,
    /// Location of a generated asset, for media models.
    pub url: Option<String>,
    /// Tokens consumed by the call.
    pub tokens_used: u32,
}

impl ProviderOutput {
    /// Text output.
    pub fn text(text: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            text: Some(text.into()),
            url: None,
            tokens_used,
        }
    }

    /// Media output located at a URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            text: None,
            url: Some(url.into()),
            tokens_used: 0,
        }
    }
}

/// Normalized record of one adapter call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    pub provider: String,
    pub model: String,
    pub kind: OutputKind,
    pub status: ResultStatus,
    /// Canonical id of the model that served the call, when `model` holds
    /// an alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_model: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub response_time_ms: u64,
    pub tokens_used: u32,
    /// Position of the model in the originating request.
    #[serde(default)]
    pub dispatch_index: usize,
}

impl RawResult {
    /// Successful result.
    pub fn ok(
        provider: impl Into<String>,
        model: impl Into<String>,
        kind: OutputKind,
        output: ProviderOutput,
        response_time_ms: u64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            kind,
            status: ResultStatus::Ok,
            resolved_model: None,
            text: output.text,
            url: output.url,
            error: None,
            response_time_ms,
            tokens_used: output.tokens_used,
            dispatch_index: 0,
        }
    }

    /// Failed result carrying the triggering message.
    pub fn error(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            kind: OutputKind::Text,
            status: ResultStatus::Error,
            resolved_model: None,
            text: None,
            url: None,
            error: Some(message.into()),
            response_time_ms,
            tokens_used: 0,
            dispatch_index: 0,
        }
    }

    /// Result for a call that exceeded its time bound.
    pub fn timeout(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            status: ResultStatus::Timeout,
            ..Self::error(provider, model, message, response_time_ms)
        }
    }

    /// Tag this result with its dispatch position.
    pub fn with_dispatch_index(mut self, index: usize) -> Self {
        self.dispatch_index = index;
        self
    }

    /// Report this result under the id the caller asked for.
    ///
    /// The adapter's own id moves to `resolved_model` when the two differ.
    pub fn with_requested_model(mut self, requested: &str) -> Self {
        if !self.model.eq_ignore_ascii_case(requested) {
            let served = std::mem::replace(&mut self.model, requested.to_string());
            self.resolved_model = Some(served);
        }
        self
    }

    /// Canonical model id: `resolved_model` when set, else `model`.
    pub fn served_model(&self) -> &str {
        self.resolved_model.as_deref().unwrap_or(&self.model)
    }

    /// Set the output kind.
    pub fn with_kind(mut self, kind: OutputKind) -> Self {
        self.kind = kind;
        self
    }

    /// Text payload, falling back to the asset URL.
    pub fn payload(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.url.as_deref())
            .filter(|p| !p.trim().is_empty())
    }

    /// An `ok` result with a non-empty payload.
    pub fn is_usable(&self) -> bool {
        self.status == ResultStatus::Ok && self.payload().is_some()
    }
}
