//! Provider adapters for polyforge.
//!
//! Every generation provider is reached through one [`ProviderAdapter`]:
//! a small unit that performs exactly one external call and reports a
//! normalized [`RawResult`] via [`call`]. The orchestrator never depends on
//! an adapter's internals, only on this contract, the static
//! [`CapabilityRegistry`] and the [`AdapterRegistry`] that maps model ids to
//! adapter instances.
//!
//! # Remote Providers
//!
//! - **OpenAI**, **Claude**, **Gemini**, **OpenRouter** - synchronous chat APIs
//! - **Replicate** - polled prediction jobs for image and video models
//!
//! # Local Providers
//!
//! - **Ollama** - models served on localhost
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{call, AdapterRegistry, AdapterRequest, CapabilityRegistry};
//!
//! let capabilities = CapabilityRegistry::builtin();
//! let adapters = AdapterRegistry::from_env(&capabilities)?;
//!
//! if let Some(adapter) = adapters.get("gpt-4o") {
//!     let result = call(adapter.as_ref(), &AdapterRequest::new("Build a todo app")).await;
//!     println!("{} -> {:?}", result.model, result.status);
//! }
//! ```

pub mod adapter;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

pub use adapter::{call, ProviderAdapter};
pub use capabilities::{CapabilityRegistry, ExecutionMode, ModelCapability, Speed};
pub use config::{LocalLlmConfig, PollConfig, RemoteLlmConfig};
pub use error::{LlmError, Result};
pub use registry::AdapterRegistry;
pub use types::{AdapterRequest, ImageInput, OutputKind, ProviderOutput, RawResult, ResultStatus};
