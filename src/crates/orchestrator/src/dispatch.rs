//! Concurrent fan-out of one request to many models.
//!
//! Models are split into batches of `max_parallel`. Every call in a batch
//! runs on its own task under its own timeout, and batch N+1 starts only
//! once batch N has fully resolved. No failure escapes a batch: errors,
//! timeouts, panics and unknown model ids all become [`RawResult`] records.

use crate::request::GenerationRequest;
use futures::future::join_all;
use llm::{AdapterRegistry, CapabilityRegistry, ProviderAdapter, RawResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default per-call timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default batch size.
pub const DEFAULT_MAX_PARALLEL: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Calls issued concurrently per batch.
    pub max_parallel: usize,
    /// Fallback timeout for models absent from the capability catalog.
    pub default_timeout_ms: u64,
    /// Per-model timeouts in milliseconds, keyed by model id or alias.
    pub timeout_overrides_ms: HashMap<String, u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_overrides_ms: HashMap::new(),
        }
    }
}

impl DispatchConfig {
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_timeout_override(mut self, model: impl Into<String>, timeout: Duration) -> Self {
        self.timeout_overrides_ms
            .insert(model.into().to_lowercase(), duration_ms(timeout));
        self
    }
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Issues adapter calls in bounded, failure-isolated batches.
#[derive(Debug, Clone)]
pub struct DispatchEngine {
    adapters: Arc<AdapterRegistry>,
    capabilities: Arc<CapabilityRegistry>,
    config: DispatchConfig,
}

struct InFlight {
    index: usize,
    provider: String,
    model: String,
    handle: tokio::task::JoinHandle<RawResult>,
}

impl DispatchEngine {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        capabilities: Arc<CapabilityRegistry>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            adapters,
            capabilities,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Timeout for `model`: explicit override, then the catalogued default,
    /// then the configured fallback.
    pub fn timeout_for(&self, model: &str) -> Duration {
        let overrides = &self.config.timeout_overrides_ms;
        let canonical = self.capabilities.resolve_alias(model);

        let exact = overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(model));
        let via_alias = || {
            overrides.iter().find(|(key, _)| {
                self.capabilities
                    .resolve_alias(key)
                    .eq_ignore_ascii_case(canonical)
            })
        };

        if let Some((_, ms)) = exact.or_else(via_alias) {
            return Duration::from_millis(*ms);
        }

        self.capabilities
            .timeout_for(model)
            .unwrap_or(Duration::from_millis(self.config.default_timeout_ms))
    }

    /// Call every requested model and collect exactly one result per model.
    ///
    /// Each result carries the model id exactly as requested (the adapter's
    /// canonical id goes to `resolved_model` for aliases) and its
    /// `dispatch_index`; results are sorted by that index.
    pub async fn dispatch(&self, request: &GenerationRequest) -> Vec<RawResult> {
        let adapter_request = Arc::new(request.to_adapter_request());
        let batch_size = request
            .max_parallel
            .unwrap_or(self.config.max_parallel)
            .max(1);

        let mut results = Vec::with_capacity(request.models.len());

        for (batch_no, batch) in request.models.chunks(batch_size).enumerate() {
            let offset = batch_no * batch_size;
            let batch_started = Instant::now();
            let mut in_flight = Vec::with_capacity(batch.len());

            for (i, model) in batch.iter().enumerate() {
                let index = offset + i;
                let Some(adapter) = self.adapters.get(model) else {
                    warn!(model = %model, batch = batch_no, "No adapter registered for model");
                    let provider = self
                        .capabilities
                        .get(model)
                        .map(|c| c.provider)
                        .unwrap_or("unknown");
                    results.push(
                        RawResult::error(
                            provider,
                            model.as_str(),
                            format!("no adapter registered for model '{}'", model),
                            0,
                        )
                        .with_dispatch_index(index),
                    );
                    continue;
                };

                let timeout = self.timeout_for(model);
                in_flight.push(InFlight {
                    index,
                    provider: adapter.provider().to_string(),
                    model: adapter.model().to_string(),
                    handle: tokio::spawn(call_with_timeout(
                        adapter,
                        Arc::clone(&adapter_request),
                        timeout,
                    )),
                });
            }

            debug!(batch = batch_no, calls = in_flight.len(), "Batch dispatched");

            let (meta, handles): (Vec<_>, Vec<_>) = in_flight
                .into_iter()
                .map(|f| ((f.index, f.provider, f.model), f.handle))
                .unzip();

            let joined_all = join_all(handles).await;
            for ((index, provider, model), joined) in meta.into_iter().zip(joined_all) {
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(
                            provider = %provider,
                            model = %model,
                            error = %e,
                            "Adapter task aborted"
                        );
                        RawResult::error(provider, model, format!("adapter task failed: {}", e), 0)
                    }
                };
                results.push(
                    result
                        .with_requested_model(&request.models[index])
                        .with_dispatch_index(index),
                );
            }

            info!(
                batch = batch_no,
                elapsed_ms = batch_started.elapsed().as_millis() as u64,
                "Batch resolved"
            );
        }

        results.sort_by_key(|r| r.dispatch_index);
        results
    }
}

async fn call_with_timeout(
    adapter: Arc<dyn ProviderAdapter>,
    request: Arc<llm::AdapterRequest>,
    timeout: Duration,
) -> RawResult {
    let started = Instant::now();
    match tokio::time::timeout(timeout, llm::call(adapter.as_ref(), &request)).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!(
                provider = adapter.provider(),
                model = adapter.model(),
                elapsed_ms,
                "Adapter call exceeded dispatch timeout"
            );
            RawResult::timeout(
                adapter.provider(),
                adapter.model(),
                format!("timed out after {}s", timeout.as_secs_f64()),
                elapsed_ms,
            )
            .with_kind(adapter.output_kind())
        }
    }
}
