//! Reconciling scored results into one consensus answer.
//!
//! Three strategies are available:
//!
//! - **cluster-majority** groups responses whose word sets overlap (Jaccard
//!   similarity at or above a threshold) and picks the best member of the
//!   largest group.
//! - **weighted-best** takes the highest-scoring response.
//! - **hybrid** uses cluster-majority when at least three responses are valid
//!   and the largest cluster reaches the majority cutoff, otherwise
//!   weighted-best.
//!
//! Ties are broken by score (descending) and then by dispatch index, so the
//! outcome does not depend on completion order.

use crate::scoring::ScoredResult;
use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsensusStrategy {
    ClusterMajority,
    WeightedBest,
    #[default]
    Hybrid,
}

impl fmt::Display for ConsensusStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusStrategy::ClusterMajority => write!(f, "cluster-majority"),
            ConsensusStrategy::WeightedBest => write!(f, "weighted-best"),
            ConsensusStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for ConsensusStrategy {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "cluster-majority" | "cluster" | "majority" => Ok(ConsensusStrategy::ClusterMajority),
            "weighted-best" | "weighted" | "best" => Ok(ConsensusStrategy::WeightedBest),
            "hybrid" => Ok(ConsensusStrategy::Hybrid),
            other => Err(OrchestratorError::InvalidRequest(format!(
                "unknown consensus strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Strategy used when the request does not name one.
    pub strategy: ConsensusStrategy,
    /// Minimum Jaccard similarity for two responses to share a cluster.
    pub similarity_threshold: f64,
    /// Fraction of valid responses the largest cluster must cover for
    /// hybrid to accept the cluster answer.
    pub majority_cutoff: f64,
    /// Valid responses needed before hybrid considers clustering.
    pub hybrid_min_results: usize,
    /// Confidence assumed for members whose confidence is not a number.
    pub default_member_confidence: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            strategy: ConsensusStrategy::default(),
            similarity_threshold: 0.3,
            majority_cutoff: 0.5,
            hybrid_min_results: 3,
            default_member_confidence: 0.5,
        }
    }
}

impl ConsensusConfig {
    pub fn with_strategy(mut self, strategy: ConsensusStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_majority_cutoff(mut self, cutoff: f64) -> Self {
        self.majority_cutoff = cutoff;
        self
    }
}

/// The reconciled answer of one orchestration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub text: String,
    pub confidence: f64,
    /// Fraction of valid responses supporting the answer.
    pub agreement: f64,
    /// Every scored result considered, in input order.
    pub results: Vec<ScoredResult>,
    /// Always one of `results`.
    pub winner: ScoredResult,
    pub reasoning: String,
    /// The strategy that produced the answer (hybrid resolves to one of the others).
    pub strategy: ConsensusStrategy,
}

impl ConsensusResult {
    /// Position of the winner within `results`.
    pub fn winner_position(&self) -> Option<usize> {
        self.results.iter().position(|r| r == &self.winner)
    }
}

/// Lowercase whitespace-separated word set.
fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of the lowercase word sets of two texts.
///
/// Two texts without any words have similarity 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

/// Greedy single-link clustering.
///
/// Texts are visited in order; each joins the first existing cluster that
/// holds a member at or above `threshold`, or starts a new one. Clusters
/// come back as index lists, largest first, equal sizes kept in creation order.
pub fn cluster_results(texts: &[&str], threshold: f64) -> Vec<Vec<usize>> {
    let sets: Vec<HashSet<String>> = texts.iter().map(|t| word_set(t)).collect();
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for (i, set) in sets.iter().enumerate() {
        let home = clusters
            .iter_mut()
            .find(|cluster| cluster.iter().any(|&j| jaccard(set, &sets[j]) >= threshold));
        match home {
            Some(cluster) => cluster.push(i),
            None => clusters.push(vec![i]),
        }
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters
}

/// Score descending, then dispatch index ascending.
fn rank(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.dispatch_index().cmp(&b.dispatch_index()))
}

#[derive(Debug, Clone, Default)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Reach consensus using the configured default strategy.
    pub fn reach_default(&self, results: Vec<ScoredResult>) -> Result<ConsensusResult> {
        self.reach(results, self.config.strategy)
    }

    /// Reduce `results` to one winner.
    ///
    /// Fails only when `results` is empty.
    pub fn reach(
        &self,
        results: Vec<ScoredResult>,
        strategy: ConsensusStrategy,
    ) -> Result<ConsensusResult> {
        if results.is_empty() {
            return Err(OrchestratorError::EmptyInput(
                "consensus requires at least one result".to_string(),
            ));
        }

        let mut valid: Vec<usize> = (0..results.len())
            .filter(|&i| results[i].is_usable())
            .collect();
        valid.sort_by_key(|&i| results[i].dispatch_index());

        let outcome = if valid.is_empty() {
            self.no_valid_results(&results)
        } else {
            match strategy {
                ConsensusStrategy::ClusterMajority => self.cluster_majority(&results, &valid).0,
                ConsensusStrategy::WeightedBest => self.weighted_best(&results, &valid),
                ConsensusStrategy::Hybrid => self.hybrid(&results, &valid),
            }
        };

        info!(
            strategy = %outcome.strategy,
            requested = %strategy,
            results = results.len(),
            valid = valid.len(),
            agreement = outcome.agreement,
            confidence = outcome.confidence,
            winner = %results[outcome.winner].result.model,
            "Consensus reached"
        );

        let winner = results[outcome.winner].clone();
        Ok(ConsensusResult {
            text: winner.result.payload().unwrap_or_default().to_string(),
            confidence: outcome.confidence,
            agreement: outcome.agreement.clamp(0.0, 1.0),
            winner,
            reasoning: outcome.reasoning,
            strategy: outcome.strategy,
            results,
        })
    }

    fn no_valid_results(&self, results: &[ScoredResult]) -> Outcome {
        Outcome {
            winner: 0,
            confidence: 0.0,
            agreement: 0.0,
            reasoning: format!("No valid responses among {} results", results.len()),
            strategy: ConsensusStrategy::WeightedBest,
        }
    }

    /// Returns the outcome and the coverage of the largest cluster.
    fn cluster_majority(&self, results: &[ScoredResult], valid: &[usize]) -> (Outcome, f64) {
        let texts: Vec<&str> = valid
            .iter()
            .map(|&i| results[i].result.payload().unwrap_or_default())
            .collect();
        let clusters = cluster_results(&texts, self.config.similarity_threshold);
        debug!(
            clusters = clusters.len(),
            sizes = ?clusters.iter().map(Vec::len).collect::<Vec<_>>(),
            "Clustered responses"
        );

        // valid is non-empty, so there is at least one cluster
        let largest: Vec<usize> = clusters
            .first()
            .map(|c| c.iter().map(|&k| valid[k]).collect())
            .unwrap_or_default();

        let winner = largest
            .iter()
            .copied()
            .min_by(|&a, &b| rank(&results[a], &results[b]))
            .unwrap_or(valid[0]);

        let members = largest.len().max(1) as f64;
        let coverage = largest.len() as f64 / valid.len() as f64;
        let confidence = largest
            .iter()
            .map(|&i| {
                let c = results[i].confidence;
                if c.is_finite() {
                    c
                } else {
                    self.config.default_member_confidence
                }
            })
            .sum::<f64>()
            / members;
        let average_score = largest.iter().map(|&i| results[i].score).sum::<f64>() / members;

        let providers: BTreeSet<&str> = largest.iter().map(|&i| results[i].provider()).collect();
        let reasoning = format!(
            "Cluster of {} members, average score {:.2}, {:.0}% agreement, providers: {}",
            largest.len(),
            average_score,
            coverage * 100.0,
            providers.into_iter().collect::<Vec<_>>().join(", ")
        );

        (
            Outcome {
                winner,
                confidence: confidence.clamp(0.0, 1.0),
                agreement: coverage,
                reasoning,
                strategy: ConsensusStrategy::ClusterMajority,
            },
            coverage,
        )
    }

    fn weighted_best(&self, results: &[ScoredResult], valid: &[usize]) -> Outcome {
        let mut ranked = valid.to_vec();
        ranked.sort_by(|&a, &b| rank(&results[a], &results[b]));

        let winner = ranked[0];
        let top_half = ranked.len().div_ceil(2);
        let agreement = top_half as f64 / ranked.len() as f64;
        let best = &results[winner];

        let reasoning = format!(
            "Best of {} members by score: {} ({}) scored {:.2} in {}ms, {:.0}% agreement",
            ranked.len(),
            best.provider(),
            best.result.model,
            best.score,
            best.result.response_time_ms,
            agreement * 100.0
        );

        Outcome {
            winner,
            confidence: best.confidence,
            agreement,
            reasoning,
            strategy: ConsensusStrategy::WeightedBest,
        }
    }

    fn hybrid(&self, results: &[ScoredResult], valid: &[usize]) -> Outcome {
        if valid.len() < self.config.hybrid_min_results {
            return self.weighted_best(results, valid);
        }

        let (clustered, coverage) = self.cluster_majority(results, valid);
        if coverage >= self.config.majority_cutoff {
            clustered
        } else {
            debug!(
                coverage,
                cutoff = self.config.majority_cutoff,
                "No majority cluster, falling back to weighted-best"
            );
            self.weighted_best(results, valid)
        }
    }
}

struct Outcome {
    winner: usize,
    confidence: f64,
    agreement: f64,
    reasoning: String,
    strategy: ConsensusStrategy,
}
