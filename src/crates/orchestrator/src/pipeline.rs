//! Orchestration entry point.
//!
//! [`Orchestrator::generate`] runs the full batch flow and returns a
//! [`GenerationReport`]; [`Orchestrator::generate_stream`] runs the same
//! flow while emitting [`ProgressFrame`]s and ends with the packaged archive.

use crate::app::{app_description, app_name, AppMetadata, ArtifactFile, GeneratedApp};
use crate::cache::{CacheKey, InMemoryResultCache, ResultCache};
use crate::config::PipelineConfig;
use crate::consensus::{ConsensusEngine, ConsensusResult};
use crate::dispatch::DispatchEngine;
use crate::extraction::{
    extract_code_blocks, extract_dependencies, extract_env_vars, extract_setup_instructions,
    normalize_blocks, validate_generated_code,
};
use crate::packaging::stream::DEFAULT_BUFFER;
use crate::packaging::{
    self, complete_payload, ProgressEmitter, ProgressFrame, ProgressStage, StreamClosed,
};
use crate::policy::{ContentScanner, EnforcementResult, PolicyGate};
use crate::request::{GenerationRequest, TaskType};
use crate::scoring::ScoringEngine;
use crate::{OrchestratorError, Result};
use llm::{AdapterRegistry, CapabilityRegistry, RawResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// File holding the whole answer of a text task that produced no code blocks.
const TEXT_RESPONSE_PATH: &str = "response.md";

/// Everything one batch generation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub app: GeneratedApp,
    pub consensus: ConsensusResult,
    pub enforcement: EnforcementResult,
    /// Advisory validation findings.
    pub warnings: Vec<String>,
}

impl GenerationReport {
    /// Whether the policy gate let the app through.
    pub fn is_deliverable(&self) -> bool {
        self.enforcement.allowed
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    adapters: Arc<AdapterRegistry>,
    capabilities: Arc<CapabilityRegistry>,
    config: PipelineConfig,
    cache: Option<Option<Arc<dyn ResultCache>>>,
    scanner: Option<Arc<dyn ContentScanner>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<CapabilityRegistry>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Use `cache` instead of the one described by the config.
    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(Some(cache));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = Some(None);
        self
    }

    /// Replace the built-in marker scanner.
    pub fn scanner(mut self, scanner: Arc<dyn ContentScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;

        let cache = match self.cache {
            Some(explicit) => explicit,
            None if self.config.cache.enabled => {
                let cache = InMemoryResultCache::from_config(&self.config.cache);
                Some(Arc::new(cache) as Arc<dyn ResultCache>)
            }
            None => None,
        };

        let policy = match self.scanner {
            Some(scanner) => PolicyGate::new(self.config.policy.clone(), scanner),
            None => PolicyGate::from_config(self.config.policy.clone()),
        };

        Ok(Orchestrator {
            dispatch: DispatchEngine::new(
                self.adapters,
                self.capabilities.clone(),
                self.config.dispatch.clone(),
            ),
            scoring: ScoringEngine::new(self.config.scoring.clone()),
            consensus: ConsensusEngine::new(self.config.consensus.clone()),
            policy,
            cache,
            capabilities: self.capabilities,
        })
    }
}

/// Runs requests through dispatch, scoring, consensus, extraction and policy.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct Orchestrator {
    dispatch: DispatchEngine,
    scoring: ScoringEngine,
    consensus: ConsensusEngine,
    policy: PolicyGate,
    cache: Option<Arc<dyn ResultCache>>,
    capabilities: Arc<CapabilityRegistry>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("models", &self.dispatch.adapters().models())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl Orchestrator {
    pub fn builder(adapters: Arc<AdapterRegistry>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            adapters,
            capabilities: Arc::new(CapabilityRegistry::builtin()),
            config: PipelineConfig::default(),
            cache: None,
            scanner: None,
        }
    }

    /// Orchestrator with the built-in catalog and default configuration.
    pub fn new(adapters: Arc<AdapterRegistry>) -> Result<Self> {
        Self::builder(adapters).build()
    }

    pub fn from_config(
        adapters: Arc<AdapterRegistry>,
        capabilities: Arc<CapabilityRegistry>,
        config: PipelineConfig,
    ) -> Result<Self> {
        Self::builder(adapters)
            .capabilities(capabilities)
            .config(config)
            .build()
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn policy(&self) -> &PolicyGate {
        &self.policy
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        self.dispatch.adapters()
    }

    /// Run the batch flow.
    ///
    /// Fails on invalid input, or with [`OrchestratorError::NoValidOutput`]
    /// when no provider produced a usable answer. A policy block is not an
    /// error; it shows up in [`GenerationReport::enforcement`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReport> {
        let started = Instant::now();
        let (consensus, raw) = self.reach_consensus(request).await?;
        let report = self.assemble(request, consensus, &raw)?;

        info!(
            app = %report.app.name,
            files = report.app.files.len(),
            allowed = report.enforcement.allowed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(report)
    }

    /// Run the flow while reporting progress, ending in a `complete` frame
    /// that carries the archive or an `error` frame.
    pub fn generate_stream(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> ReceiverStream<ProgressFrame> {
        let (emitter, stream) = ProgressEmitter::channel(DEFAULT_BUFFER);
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(StreamClosed) = orchestrator.emit_generation(&emitter, &request).await {
                debug!("Generation stream receiver dropped");
            }
        });

        stream
    }

    async fn emit_generation(
        &self,
        emitter: &ProgressEmitter,
        request: &GenerationRequest,
    ) -> std::result::Result<(), StreamClosed> {
        emitter
            .stage(ProgressStage::Initializing, 0, "Validating request")
            .await?;
        if let Err(e) = request.validate() {
            return emitter.fail(e.to_string()).await;
        }

        emitter
            .stage(
                ProgressStage::Generating,
                10,
                format!("Dispatching to {} models", request.models.len()),
            )
            .await?;
        let (consensus, raw) = match self.reach_consensus(request).await {
            Ok(outcome) => outcome,
            Err(e) => return emitter.fail(e.to_string()).await,
        };
        emitter
            .stage(
                ProgressStage::Generating,
                60,
                format!(
                    "Consensus via {} from {} ({:.0}% agreement)",
                    consensus.strategy,
                    consensus.winner.provider(),
                    consensus.agreement * 100.0
                ),
            )
            .await?;

        let report = match self.assemble(request, consensus, &raw) {
            Ok(report) => report,
            Err(e) => return emitter.fail(e.to_string()).await,
        };
        emitter
            .stage(
                ProgressStage::Validating,
                70,
                format!(
                    "{} files, {} warnings",
                    report.app.files.len(),
                    report.warnings.len()
                ),
            )
            .await?;

        if !report.is_deliverable() {
            return emitter
                .fail(format!("Blocked by content policy: {}", report.enforcement.message))
                .await;
        }

        emitter
            .stage(ProgressStage::Packaging, 85, "Writing archive")
            .await?;
        match packaging::package(&report.app) {
            Ok(archive) => {
                let mut data = complete_payload(&report.app, &archive);
                data["warnings"] = json!(report.warnings);
                data["creditsAwarded"] = json!(report.enforcement.credits_awarded);
                emitter
                    .complete(format!("Generated {}", report.app.name), data)
                    .await
            }
            Err(e) => emitter.fail(e.to_string()).await,
        }
    }

    /// Validate, dispatch (or hit the cache), score and reconcile.
    ///
    /// Returns the consensus and the raw results it was built from.
    async fn reach_consensus(
        &self,
        request: &GenerationRequest,
    ) -> Result<(ConsensusResult, Vec<RawResult>)> {
        request.validate()?;

        let key = CacheKey::from_request(request);
        let cached = self.cache.as_ref().and_then(|cache| cache.get(&key));

        let raw = match cached {
            Some(results) => {
                info!(key = %key, results = results.len(), "Serving dispatch results from cache");
                results
            }
            None => {
                let results = self.dispatch.dispatch(request).await;
                if let Some(cache) = &self.cache {
                    if results.iter().any(RawResult::is_usable) {
                        cache.put(key, results.clone());
                    }
                }
                results
            }
        };

        let scored = self.scoring.score_all(raw.clone(), request.task_type);
        let strategy = request.strategy.unwrap_or(self.consensus.config().strategy);
        let consensus = self.consensus.reach(scored, strategy)?;

        if !consensus.winner.is_usable() {
            warn!(
                models = request.models.len(),
                provider = %consensus.winner.provider(),
                "No provider produced a usable response"
            );
            return Err(OrchestratorError::NoValidOutput {
                result: Box::new(consensus.winner.result.clone()),
            });
        }

        Ok((consensus, raw))
    }

    /// Extract files, apply the policy gate and build the app.
    fn assemble(
        &self,
        request: &GenerationRequest,
        consensus: ConsensusResult,
        raw: &[RawResult],
    ) -> Result<GenerationReport> {
        let text = consensus.text.as_str();

        let mut files = normalize_blocks(&extract_code_blocks(text));
        if files.is_empty() && request.task_type == TaskType::Text {
            files.push(ArtifactFile::new(TEXT_RESPONSE_PATH, text, "markdown"));
        }

        let dependencies = extract_dependencies(text);
        let env_vars = extract_env_vars(text);
        let setup_instructions = extract_setup_instructions(text, &dependencies, &env_vars);

        let warnings: Vec<String> = validate_generated_code(&files)
            .into_iter()
            .map(|w| w.to_string())
            .collect();
        for warning in &warnings {
            warn!(warning = %warning, "Generated code validation");
        }

        let app = GeneratedApp {
            name: app_name(&files, &request.prompt),
            description: app_description(&request.prompt),
            files,
            dependencies,
            env_vars,
            setup_instructions,
            metadata: self.metadata(raw),
        };

        let scanned = if app.files.is_empty() {
            consensus.text.clone()
        } else {
            app.combined_source()
        };
        let enforcement = self
            .policy
            .enforce(&scanned, request.tier, request.policy_override.as_ref())?;

        Ok(GenerationReport {
            app,
            consensus,
            enforcement,
            warnings,
        })
    }

    fn metadata(&self, raw: &[RawResult]) -> AppMetadata {
        let mut models_used: Vec<String> = Vec::new();
        for result in raw.iter().filter(|r| r.is_usable()) {
            if !models_used.contains(&result.model) {
                models_used.push(result.model.clone());
            }
        }

        let total_tokens = raw.iter().map(|r| u64::from(r.tokens_used)).sum();
        let total_cost = raw
            .iter()
            .map(|r| self.capabilities.estimate_cost(r.served_model(), r.tokens_used))
            .sum();

        AppMetadata::new(models_used, total_tokens, total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyMode, ProfileOverride};
    use async_trait::async_trait;
    use llm::{AdapterRequest, OutputKind, ProviderAdapter, ProviderOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    struct Canned {
        model: String,
        text: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderAdapter for Canned {
        fn provider(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            &self.model
        }

        fn output_kind(&self) -> OutputKind {
            OutputKind::Text
        }

        async fn generate(&self, _request: &AdapterRequest) -> llm::Result<ProviderOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderOutput::text(self.text.clone(), 500))
        }
    }

    const ANSWER: &str = r#"Here you go.

```ts src/index.ts
export async function main() {
  // entry
  console.log(process.env.API_URL);
}
```
"#;

    fn orchestrator(text: &str, calls: Arc<AtomicUsize>) -> Arc<Orchestrator> {
        let adapters = AdapterRegistry::new().with_adapter(Arc::new(Canned {
            model: "mock-1".into(),
            text: text.into(),
            calls,
        }));
        Arc::new(Orchestrator::new(Arc::new(adapters)).unwrap())
    }

    #[tokio::test]
    async fn test_generate_builds_app() {
        let orch = orchestrator(ANSWER, Arc::new(AtomicUsize::new(0)));
        let report = orch
            .generate(&GenerationRequest::new("Build a tiny service").with_model("mock-1"))
            .await
            .unwrap();

        assert!(report.is_deliverable());
        assert_eq!(report.app.name, "build-a-tiny-service");
        assert_eq!(report.app.files[0].path, "src/index.ts");
        assert_eq!(report.app.env_vars, vec!["API_URL".to_string()]);
        assert_eq!(report.app.metadata.models_used, vec!["mock-1".to_string()]);
        assert_eq!(report.app.metadata.total_tokens, 500);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(ANSWER, calls.clone());
        let request = GenerationRequest::new("Build it").with_model("mock-1");

        orch.generate(&request).await.unwrap();
        orch.generate(&request).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_task_without_blocks() {
        let orch = orchestrator("Plain prose answer.", Arc::new(AtomicUsize::new(0)));
        let request = GenerationRequest::new("Explain")
            .with_model("mock-1")
            .with_task_type(TaskType::Text);
        let report = orch.generate(&request).await.unwrap();
        assert_eq!(report.app.files[0].path, TEXT_RESPONSE_PATH);
    }

    #[tokio::test]
    async fn test_invalid_request_is_error() {
        let orch = orchestrator(ANSWER, Arc::new(AtomicUsize::new(0)));
        let err = orch.generate(&GenerationRequest::new("  ")).await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_stream_blocked_by_policy() {
        let risky = "```js\n// TODO: call the real API\nconst users = []; // mock data\n```\n";
        let orch = orchestrator(risky, Arc::new(AtomicUsize::new(0)));
        let request = GenerationRequest::new("Run things")
            .with_model("mock-1")
            .with_tier(3);

        let frames: Vec<_> = orch.generate_stream(request).collect().await;
        let last = frames.last().unwrap();
        assert_eq!(last.stage, ProgressStage::Error);
        assert!(last.message.contains("content policy"));
        assert!(frames.windows(2).all(|w| w[0].progress <= w[1].progress));
    }

    #[tokio::test]
    async fn test_tier_override_downgrades_to_warn() {
        let risky = "```js\nthrow new Error('not implemented');\n```\n";
        let orch = orchestrator(risky, Arc::new(AtomicUsize::new(0)));
        let request = GenerationRequest::new("Run")
            .with_model("mock-1")
            .with_tier(3)
            .with_policy_override(ProfileOverride::default().with_mode(PolicyMode::Warn));

        let report = orch.generate(&request).await.unwrap();
        assert!(report.is_deliverable());
        assert!(report.enforcement.credits_awarded > 0.0);
    }
}
