//! Configuration module for the pipeline
//!
//! Every stage reads its tunables from one [`PipelineConfig`]:
//! - Dispatch batch size and timeouts
//! - Scoring constants
//! - Consensus strategy and thresholds
//! - Result cache TTL
//! - Per-tier policy overrides
//!
//! Files are loaded by [`loader`] from YAML, JSON or TOML.

pub mod loader;

pub use loader::{load_config, load_from_env, load_pipeline_config, ConfigFormat, CONFIG_ENV};

use crate::cache::CacheConfig;
use crate::consensus::ConsensusConfig;
use crate::dispatch::DispatchConfig;
use crate::policy::PolicyConfig;
use crate::scoring::ScoringConfig;
use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dispatch: DispatchConfig,
    pub scoring: ScoringConfig,
    pub consensus: ConsensusConfig,
    pub cache: CacheConfig,
    pub policy: PolicyConfig,
}

impl PipelineConfig {
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusConfig) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_parallel == 0 {
            return Err(OrchestratorError::Config(
                "dispatch.max_parallel must be at least 1".to_string(),
            ));
        }
        if self.dispatch.default_timeout_ms == 0 {
            return Err(OrchestratorError::Config(
                "dispatch.default_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some((model, _)) = self
            .dispatch
            .timeout_overrides_ms
            .iter()
            .find(|(_, ms)| **ms == 0)
        {
            return Err(OrchestratorError::Config(format!(
                "dispatch.timeout_overrides_ms.{} must be positive",
                model
            )));
        }
        check_fraction("consensus.similarity_threshold", self.consensus.similarity_threshold)?;
        check_fraction("consensus.majority_cutoff", self.consensus.majority_cutoff)?;

        for (tier, patch) in &self.policy.tiers {
            if !(1..=5).contains(tier) {
                return Err(OrchestratorError::Config(format!(
                    "policy.tiers: unknown tier {}",
                    tier
                )));
            }
            if let Some(min) = patch.min_confidence {
                check_fraction(&format!("policy.tiers.{}.min_confidence", tier), min)?;
            }
        }
        if let Some(confidence) = self.policy.scanner_confidence {
            check_fraction("policy.scanner_confidence", confidence)?;
        }

        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OrchestratorError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
