mod common;

use common::{registry, Journal, MockAdapter};
use llm::{AdapterRegistry, CapabilityRegistry, ResultStatus};
use orchestrator::dispatch::{DispatchConfig, DispatchEngine};
use orchestrator::GenerationRequest;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn engine(adapters: Vec<MockAdapter>, config: DispatchConfig) -> DispatchEngine {
    DispatchEngine::new(registry(adapters), Arc::new(CapabilityRegistry::empty()), config)
}

#[tokio::test(start_paused = true)]
async fn test_one_result_per_model_despite_failures() {
    let engine = engine(
        vec![
            MockAdapter::reply("alpha", "mock-a", "fine"),
            MockAdapter::failing("beta", "mock-b", "upstream 500"),
            MockAdapter::reply("gamma", "mock-c", "late").with_delay(Duration::from_secs(120)),
            MockAdapter::panicking("delta", "mock-d"),
        ],
        DispatchConfig::default().with_max_parallel(4),
    );
    let request =
        GenerationRequest::new("build").with_models(["mock-a", "mock-b", "mock-c", "mock-d"]);

    let results = engine.dispatch(&request).await;

    assert_eq!(results.len(), 4);
    let models: Vec<_> = results.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["mock-a", "mock-b", "mock-c", "mock-d"]);

    assert_eq!(results[0].status, ResultStatus::Ok);
    assert_eq!(results[1].status, ResultStatus::Error);
    assert!(results[1].error.as_deref().unwrap().contains("upstream 500"));
    assert_eq!(results[2].status, ResultStatus::Timeout);
    assert_eq!(results[3].status, ResultStatus::Error);
    assert_eq!(results[3].provider, "delta");
}

#[tokio::test(start_paused = true)]
async fn test_batches_run_sequentially() {
    let journal: Journal = Default::default();
    let adapters = ["mock-a", "mock-b", "mock-c", "mock-d", "mock-e"]
        .iter()
        .enumerate()
        .map(|(i, model)| {
            MockAdapter::reply("p", model, "ok")
                .with_delay(Duration::from_millis(100 * (5 - i as u64)))
                .with_journal(journal.clone())
        })
        .collect();
    let engine = engine(adapters, DispatchConfig::default().with_max_parallel(2));
    let models = ["mock-a", "mock-b", "mock-c", "mock-d", "mock-e"];
    let request = GenerationRequest::new("build").with_models(models);

    let results = engine.dispatch(&request).await;
    assert_eq!(results.len(), 5);

    let log = journal.lock().clone();
    let position = |entry: &str| log.iter().position(|e| e == entry).unwrap();

    // every call of batch N ends before any call of batch N+1 starts
    let ordering = [
        ("mock-a", "mock-c"),
        ("mock-b", "mock-c"),
        ("mock-c", "mock-e"),
        ("mock-d", "mock-e"),
    ];
    for (done, next) in ordering {
        assert!(position(&format!("end:{}", done)) < position(&format!("start:{}", next)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_parallelism_overrides_config() {
    let journal: Journal = Default::default();
    let adapters = ["mock-a", "mock-b", "mock-c"]
        .iter()
        .map(|model| {
            MockAdapter::reply("p", model, "ok")
                .with_delay(Duration::from_millis(10))
                .with_journal(journal.clone())
        })
        .collect();
    let engine = engine(adapters, DispatchConfig::default().with_max_parallel(3));
    let request = GenerationRequest::new("build")
        .with_models(["mock-a", "mock-b", "mock-c"])
        .with_max_parallel(1);

    engine.dispatch(&request).await;

    let log = journal.lock().clone();
    assert_eq!(
        log,
        vec![
            "start:mock-a",
            "end:mock-a",
            "start:mock-b",
            "end:mock-b",
            "start:mock-c",
            "end:mock-c"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_override_applies_per_model() {
    let engine = engine(
        vec![
            MockAdapter::reply("p", "mock-slow", "eventually").with_delay(Duration::from_secs(80)),
            MockAdapter::reply("p", "mock-fast", "quick").with_delay(Duration::from_secs(80)),
        ],
        DispatchConfig::default().with_timeout_override("mock-slow", Duration::from_secs(90)),
    );
    let request = GenerationRequest::new("build").with_models(["mock-slow", "mock-fast"]);

    let results = engine.dispatch(&request).await;
    assert_eq!(results[0].status, ResultStatus::Ok);
    assert_eq!(results[1].status, ResultStatus::Timeout);
}

#[tokio::test]
async fn test_unknown_model_makes_no_call() {
    let known = MockAdapter::reply("p", "mock-a", "ok");
    let calls = known.calls();
    let engine = engine(vec![known], DispatchConfig::default());
    let request = GenerationRequest::new("build").with_models(["missing-model", "mock-a"]);

    let results = engine.dispatch(&request).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].model, "missing-model");
    assert_eq!(results[0].status, ResultStatus::Error);
    assert_eq!(results[0].dispatch_index, 0);
    assert_eq!(results[1].dispatch_index, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_aliases_keep_requested_ids() {
    let canonical = MockAdapter::reply("anthropic", "claude-3-5-sonnet-latest", "ok");
    let calls = canonical.calls();
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(canonical));
    adapters.register_alias("sonnet", "claude-3-5-sonnet-latest");
    adapters.register_alias("claude", "claude-3-5-sonnet-latest");
    let engine = DispatchEngine::new(
        Arc::new(adapters),
        Arc::new(CapabilityRegistry::empty()),
        DispatchConfig::default(),
    );
    let request = GenerationRequest::new("build").with_models(["sonnet", "claude"]);

    let results = engine.dispatch(&request).await;

    let models: Vec<_> = results.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["sonnet", "claude"]);
    assert!(results
        .iter()
        .all(|r| r.status == ResultStatus::Ok && r.served_model() == "claude-3-5-sonnet-latest"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
