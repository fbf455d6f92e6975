mod common;

use llm::{OutputKind, ProviderOutput, RawResult};
use orchestrator::consensus::{
    cluster_results, jaccard_similarity, ConsensusEngine, ConsensusStrategy,
};
use orchestrator::{ScoredResult, ScoringEngine, TaskType};

fn ok(provider: &str, text: &str, tokens: u32, index: usize) -> RawResult {
    RawResult::ok(
        provider,
        format!("{}-model", provider),
        OutputKind::Text,
        ProviderOutput::text(text, tokens),
        1_200,
    )
    .with_dispatch_index(index)
}

fn score(results: Vec<RawResult>, task: TaskType) -> Vec<ScoredResult> {
    ScoringEngine::default().score_all(results, task)
}

const PYTHON: &str = r#"```python
# compute the fibonacci sequence iteratively
def fib(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a
```"#;

const RUST: &str = r#"```rust
// parse command line arguments into a config struct
struct Config { verbose: bool }
fn parse(args: &[String]) -> Config {
    Config { verbose: args.iter().any(|arg| arg == "-v") }
}
```"#;

const SQL: &str = r#"```sql
-- list active customers ordered by signup date
SELECT id, email FROM customers WHERE active = true ORDER BY created_at DESC;
```"#;

#[test]
fn test_two_similar_summaries_and_an_error() {
    let first = common::summary("for busy people");
    let second = common::summary("with keyboard shortcuts");
    assert!(jaccard_similarity(&first, &second) >= 0.3);

    let scored = score(
        vec![
            ok("openai", &first, 600, 0),
            RawResult::error("gemini", "gemini-model", "quota exhausted", 30)
                .with_dispatch_index(1),
            ok("claude", &second, 800, 2),
        ],
        TaskType::Text,
    );

    let result = ConsensusEngine::default()
        .reach(scored, ConsensusStrategy::ClusterMajority)
        .unwrap();

    assert_eq!(result.agreement, 1.0);
    assert!((result.confidence - 0.7).abs() < 1e-9);
    assert_ne!(result.winner.provider(), "gemini");
    assert!(result.winner_position().is_some());
    assert!(result.reasoning.contains("2 members"));
    assert!(result.reasoning.contains("openai"));
    assert!(result.reasoning.contains("claude"));
}

#[test]
fn test_three_dissimilar_code_outputs() {
    for (a, b) in [(PYTHON, RUST), (PYTHON, SQL), (RUST, SQL)] {
        assert!(jaccard_similarity(a, b) < 0.3);
    }
    assert_eq!(cluster_results(&[PYTHON, RUST, SQL], 0.3).len(), 3);

    let scored = score(
        vec![ok("openai", PYTHON, 900, 0), ok("claude", RUST, 900, 1), ok("gemini", SQL, 900, 2)],
        TaskType::Code,
    );

    let clustered = ConsensusEngine::default()
        .reach(scored.clone(), ConsensusStrategy::ClusterMajority)
        .unwrap();
    assert!((clustered.agreement - 1.0 / 3.0).abs() < 1e-9);

    let weighted = ConsensusEngine::default()
        .reach(scored.clone(), ConsensusStrategy::WeightedBest)
        .unwrap();
    assert!((weighted.agreement - 2.0 / 3.0).abs() < 1e-9);
    let best = scored
        .iter()
        .map(|s| s.score)
        .fold(f64::MIN, f64::max);
    assert_eq!(weighted.winner.score, best);

    // no cluster covers half the answers, so hybrid falls back to weighted-best
    let hybrid = ConsensusEngine::default()
        .reach(scored, ConsensusStrategy::Hybrid)
        .unwrap();
    assert_eq!(hybrid.strategy, ConsensusStrategy::WeightedBest);
    assert_eq!(hybrid.winner, weighted.winner);
}

#[test]
fn test_all_failed_keeps_first_as_winner() {
    let scored = score(
        vec![
            RawResult::error("openai", "gpt-4o", "401", 5),
            RawResult::timeout("claude", "claude-sonnet", "deadline", 60_000)
                .with_dispatch_index(1),
        ],
        TaskType::Code,
    );

    for strategy in [
        ConsensusStrategy::ClusterMajority,
        ConsensusStrategy::WeightedBest,
        ConsensusStrategy::Hybrid,
    ] {
        let result = ConsensusEngine::default().reach(scored.clone(), strategy).unwrap();
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.agreement, 0.0);
        assert_eq!(result.winner, scored[0]);
    }
}

#[test]
fn test_empty_input_is_rejected() {
    let err = ConsensusEngine::default()
        .reach(Vec::new(), ConsensusStrategy::Hybrid)
        .unwrap_err();
    assert!(err.is_input_error());
}
