//! Hosted provider adapters.
//!
//! - **OpenAI** - chat completions, image URLs as content parts
//! - **Claude** - Anthropic messages API
//! - **Gemini** - Google `generateContent`
//! - **OpenRouter** - OpenAI-compatible router over many vendors
//! - **Replicate** - polled prediction jobs for image and video models

pub mod claude;
pub mod gemini;
pub mod openai;
pub mod openrouter;
pub mod replicate;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use openrouter::OpenRouterClient;
pub use replicate::ReplicateClient;
