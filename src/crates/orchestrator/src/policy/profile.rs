//! Tier profiles and their deployment-level overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Disabled,
    Warn,
    Block,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Disabled => write!(f, "disabled"),
            PolicyMode::Warn => write!(f, "warn"),
            PolicyMode::Block => write!(f, "block"),
        }
    }
}

/// Content policy settings for one subscription tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyProfile {
    pub tier: u8,
    pub enabled: bool,
    pub mode: PolicyMode,
    pub credit_per_line: f64,
    pub manual_flag_multiplier: f64,
    /// Scans below this confidence are treated as noise.
    pub min_confidence: f64,
    /// Scales automatic credits; absent means 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_multiplier: Option<f64>,
}

impl PolicyProfile {
    /// Built-in profile for `tier`, if the tier exists.
    pub fn builtin(tier: u8) -> Option<Self> {
        let (enabled, mode, credit_per_line, manual_flag_multiplier, min_confidence) = match tier {
            1 => (false, PolicyMode::Disabled, 0.0, 1.0, 1.0),
            2 => (true, PolicyMode::Warn, 5.0, 2.0, 0.7),
            3 => (true, PolicyMode::Block, 10.0, 2.0, 0.6),
            4 => (true, PolicyMode::Block, 15.0, 2.5, 0.5),
            5 => (true, PolicyMode::Block, 25.0, 3.0, 0.5),
            _ => return None,
        };
        Some(Self {
            tier,
            enabled,
            mode,
            credit_per_line,
            manual_flag_multiplier,
            min_confidence,
            credit_multiplier: None,
        })
    }

    /// Whether enforcement can have any effect.
    pub fn is_active(&self) -> bool {
        self.enabled && self.mode != PolicyMode::Disabled
    }

    /// Copy of this profile with every set override field applied.
    pub fn apply(&self, patch: &ProfileOverride) -> Self {
        Self {
            tier: self.tier,
            enabled: patch.enabled.unwrap_or(self.enabled),
            mode: patch.mode.unwrap_or(self.mode),
            credit_per_line: patch.credit_per_line.unwrap_or(self.credit_per_line),
            manual_flag_multiplier: patch
                .manual_flag_multiplier
                .unwrap_or(self.manual_flag_multiplier),
            min_confidence: patch.min_confidence.unwrap_or(self.min_confidence),
            credit_multiplier: patch.credit_multiplier.or(self.credit_multiplier),
        }
    }
}

/// Partial profile; set fields replace the profile's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PolicyMode>,
    #[serde(alias = "credit_per_line", skip_serializing_if = "Option::is_none")]
    pub credit_per_line: Option<f64>,
    #[serde(alias = "manual_flag_multiplier", skip_serializing_if = "Option::is_none")]
    pub manual_flag_multiplier: Option<f64>,
    #[serde(alias = "min_confidence", skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(alias = "credit_multiplier", skip_serializing_if = "Option::is_none")]
    pub credit_multiplier: Option<f64>,
}

impl ProfileOverride {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_mode(mut self, mode: PolicyMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_credit_multiplier(mut self, multiplier: f64) -> Self {
        self.credit_multiplier = Some(multiplier);
        self
    }
}

/// Deployment-level policy settings layered over the built-in tier table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Per-tier overrides, keyed by tier number.
    pub tiers: BTreeMap<u8, ProfileOverride>,
    /// Extra markers for the built-in scanner.
    pub extra_markers: Vec<String>,
    /// Also flag risky constructs such as `eval(`.
    pub security_markers: bool,
    /// Confidence reported by the built-in scanner.
    pub scanner_confidence: Option<f64>,
}

impl PolicyConfig {
    pub fn with_tier_override(mut self, tier: u8, patch: ProfileOverride) -> Self {
        self.tiers.insert(tier, patch);
        self
    }

    /// Effective profile for `tier`: built-in values plus configured overrides.
    pub fn profile_for(&self, tier: u8) -> Option<PolicyProfile> {
        let base = PolicyProfile::builtin(tier)?;
        Some(match self.tiers.get(&tier) {
            Some(patch) => base.apply(patch),
            None => base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tiers() {
        assert!(!PolicyProfile::builtin(1).unwrap().is_active());
        let tier3 = PolicyProfile::builtin(3).unwrap();
        assert_eq!(tier3.mode, PolicyMode::Block);
        assert_eq!(tier3.credit_per_line, 10.0);
        assert_eq!(tier3.min_confidence, 0.6);
        assert!(PolicyProfile::builtin(0).is_none());
        assert!(PolicyProfile::builtin(6).is_none());
    }

    #[test]
    fn test_apply_override() {
        let patched = PolicyProfile::builtin(3)
            .unwrap()
            .apply(
                &ProfileOverride::default()
                    .with_mode(PolicyMode::Warn)
                    .with_credit_multiplier(2.0),
            );
        assert_eq!(patched.mode, PolicyMode::Warn);
        assert_eq!(patched.credit_multiplier, Some(2.0));
        assert_eq!(patched.credit_per_line, 10.0);
    }

    #[test]
    fn test_config_layers_overrides() {
        let config = PolicyConfig::default()
            .with_tier_override(2, ProfileOverride::default().with_enabled(false));
        assert!(!config.profile_for(2).unwrap().enabled);
        assert!(config.profile_for(3).unwrap().enabled);
        assert!(config.profile_for(9).is_none());
    }

    #[test]
    fn test_mode_serde() {
        let patch: ProfileOverride =
            serde_json::from_str(r#"{"mode": "block", "minConfidence": 0.9}"#).unwrap();
        assert_eq!(patch.mode, Some(PolicyMode::Block));
        assert_eq!(patch.min_confidence, Some(0.9));
    }
}
