//! The uniform contract every provider adapter implements.
//!
//! An adapter wraps exactly one external call. The orchestrator depends on
//! adapters only through [`ProviderAdapter`] and the [`call`] helper, which
//! turns any outcome into a [`RawResult`] record.

use crate::error::Result;
use crate::types::{AdapterRequest, OutputKind, ProviderOutput, RawResult};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

/// One external generation endpoint bound to one model.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier, e.g. "openai".
    fn provider(&self) -> &str;

    /// Model identifier this adapter targets.
    fn model(&self) -> &str;

    /// Kind of artifact the model produces.
    fn output_kind(&self) -> OutputKind {
        OutputKind::Text
    }

    /// Perform the call. Must return within the adapter's own bound.
    async fn generate(&self, request: &AdapterRequest) -> Result<ProviderOutput>;
}

/// Invoke an adapter and normalize the outcome.
///
/// Never returns an error: failures become `error` records and timeouts
/// become `timeout` records carrying the triggering message.
pub async fn call(adapter: &dyn ProviderAdapter, request: &AdapterRequest) -> RawResult {
    let started = Instant::now();
    let outcome = adapter.generate(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            debug!(
                provider = adapter.provider(),
                model = adapter.model(),
                elapsed_ms,
                tokens = output.tokens_used,
                "Adapter call succeeded"
            );
            RawResult::ok(
                adapter.provider(),
                adapter.model(),
                adapter.output_kind(),
                output,
                elapsed_ms,
            )
        }
        Err(e) if e.is_timeout() => {
            debug!(
                provider = adapter.provider(),
                model = adapter.model(),
                error = %e,
                "Adapter call timed out"
            );
            RawResult::timeout(adapter.provider(), adapter.model(), e.to_string(), elapsed_ms)
                .with_kind(adapter.output_kind())
        }
        Err(e) => {
            debug!(
                provider = adapter.provider(),
                model = adapter.model(),
                error = %e,
                "Adapter call failed"
            );
            RawResult::error(adapter.provider(), adapter.model(), e.to_string(), elapsed_ms)
                .with_kind(adapter.output_kind())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::types::ResultStatus;

    struct Fixed(std::result::Result<&'static str, &'static str>, bool);

    #[async_trait]
    impl ProviderAdapter for Fixed {
        fn provider(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        async fn generate(&self, _request: &AdapterRequest) -> Result<ProviderOutput> {
            match self.0 {
                Ok(text) => Ok(ProviderOutput::text(text, 42)),
                Err(msg) if self.1 => Err(LlmError::Timeout(msg.to_string())),
                Err(msg) => Err(LlmError::ProviderError(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_call_success() {
        let result = call(&Fixed(Ok("hello"), false), &AdapterRequest::new("hi")).await;
        assert_eq!(result.status, ResultStatus::Ok);
        assert_eq!(result.text.as_deref(), Some("hello"));
        assert_eq!(result.tokens_used, 42);
        assert_eq!(result.provider, "fixed");
    }

    #[tokio::test]
    async fn test_call_error_and_timeout() {
        let result = call(&Fixed(Err("boom"), false), &AdapterRequest::new("hi")).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.unwrap().contains("boom"));

        let result = call(&Fixed(Err("slow"), true), &AdapterRequest::new("hi")).await;
        assert_eq!(result.status, ResultStatus::Timeout);
    }
}
