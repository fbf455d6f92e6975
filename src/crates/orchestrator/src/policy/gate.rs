//! Turns a scan into an allow, warn or block decision.

use super::profile::{PolicyConfig, PolicyMode, PolicyProfile, ProfileOverride};
use super::scanner::{ContentScanner, MarkerScanner, ScanResult};
use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementResult {
    pub allowed: bool,
    pub scan: ScanResult,
    pub credits_awarded: f64,
    pub message: String,
    pub requires_regeneration: bool,
}

impl EnforcementResult {
    fn allow(scan: ScanResult, message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            scan,
            credits_awarded: 0.0,
            message: message.into(),
            requires_regeneration: false,
        }
    }
}

/// Applies tier profiles to generated code.
#[derive(Clone)]
pub struct PolicyGate {
    config: PolicyConfig,
    scanner: Arc<dyn ContentScanner>,
}

impl fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyGate").field("config", &self.config).finish()
    }
}

impl Default for PolicyGate {
    fn default() -> Self {
        Self::from_config(PolicyConfig::default())
    }
}

impl PolicyGate {
    pub fn new(config: PolicyConfig, scanner: Arc<dyn ContentScanner>) -> Self {
        Self { config, scanner }
    }

    /// Gate using the built-in [`MarkerScanner`] tuned by `config`.
    pub fn from_config(config: PolicyConfig) -> Self {
        let mut scanner =
            MarkerScanner::default().with_markers(config.extra_markers.iter().cloned());
        if config.security_markers {
            scanner = scanner.with_security_markers();
        }
        if let Some(confidence) = config.scanner_confidence {
            scanner = scanner.with_confidence(confidence);
        }
        Self::new(config, Arc::new(scanner))
    }

    pub fn profile(&self, tier: u8, patch: Option<&ProfileOverride>) -> Result<PolicyProfile> {
        let profile = self
            .config
            .profile_for(tier)
            .ok_or_else(|| {
                OrchestratorError::InvalidRequest(format!("unknown policy tier {}", tier))
            })?;
        Ok(match patch {
            Some(patch) => profile.apply(patch),
            None => profile,
        })
    }

    /// Automatic enforcement.
    ///
    /// A disabled profile always allows with zero credits, whatever the code.
    pub fn enforce(
        &self,
        code: &str,
        tier: u8,
        patch: Option<&ProfileOverride>,
    ) -> Result<EnforcementResult> {
        let profile = self.profile(tier, patch)?;

        if !profile.is_active() {
            return Ok(EnforcementResult::allow(
                ScanResult::skipped(code),
                format!("Content policy disabled for tier {}", tier),
            ));
        }

        let scan = self.scanner.scan(code);

        let decision = if scan.offending_lines == 0 {
            EnforcementResult::allow(scan, "No policy violations found")
        } else if scan.confidence < profile.min_confidence {
            let message = format!(
                "Scan confidence {:.2} below threshold {:.2}, ignoring {} flagged lines",
                scan.confidence, profile.min_confidence, scan.offending_lines
            );
            EnforcementResult::allow(scan, message)
        } else {
            let credits = scan.offending_lines as f64
                * profile.credit_per_line
                * profile.credit_multiplier.unwrap_or(1.0);
            let blocking = profile.mode == PolicyMode::Block;
            let message = if blocking {
                format!(
                    "{} offending lines, regeneration required ({} credits awarded)",
                    scan.offending_lines, credits
                )
            } else {
                format!(
                    "{} offending lines flagged ({} credits awarded)",
                    scan.offending_lines, credits
                )
            };
            EnforcementResult {
                allowed: !blocking,
                scan,
                credits_awarded: credits,
                message,
                requires_regeneration: blocking,
            }
        };

        info!(
            tier,
            mode = %profile.mode,
            offending = decision.scan.offending_lines,
            confidence = decision.scan.confidence,
            credits = decision.credits_awarded,
            allowed = decision.allowed,
            "Policy decision"
        );
        Ok(decision)
    }

    /// Manual flag raised by a reviewer.
    ///
    /// Blocks and requires regeneration whatever the mode, crediting the
    /// offending lines (at least one) at the manual-flag multiplier. A
    /// disabled profile still allows with zero credits.
    pub fn flag_manual(
        &self,
        code: &str,
        tier: u8,
        patch: Option<&ProfileOverride>,
    ) -> Result<EnforcementResult> {
        let profile = self.profile(tier, patch)?;

        if !profile.enabled {
            return Ok(EnforcementResult::allow(
                ScanResult::skipped(code),
                format!("Content policy disabled for tier {}, manual flag ignored", tier),
            ));
        }

        let scan = self.scanner.scan(code);
        let lines = scan.offending_lines.max(1) as f64;
        let credits = lines * profile.credit_per_line * profile.manual_flag_multiplier;

        info!(tier, offending = scan.offending_lines, credits, "Manual flag applied");
        Ok(EnforcementResult {
            allowed: false,
            message: format!(
                "Manually flagged, regeneration required ({} credits awarded)",
                credits
            ),
            scan,
            credits_awarded: credits,
            requires_regeneration: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        offending: usize,
        confidence: f64,
    }

    impl ContentScanner for Fixed {
        fn scan(&self, code: &str) -> ScanResult {
            ScanResult {
                total_lines: code.lines().count(),
                offending_lines: self.offending,
                findings: Vec::new(),
                confidence: self.confidence,
            }
        }
    }

    fn gate(offending: usize, confidence: f64) -> PolicyGate {
        PolicyGate::new(PolicyConfig::default(), Arc::new(Fixed { offending, confidence }))
    }

    #[test]
    fn test_disabled_tier_always_allows() {
        let result = gate(100, 1.0).enforce("eval(x)", 1, None).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 0.0);
        assert!(!result.requires_regeneration);
    }

    #[test]
    fn test_block_mode_awards_and_blocks() {
        let result = gate(5, 0.8).enforce("code", 3, None).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.credits_awarded, 50.0);
        assert!(result.requires_regeneration);
    }

    #[test]
    fn test_warn_mode_allows_with_credits() {
        let result = gate(4, 0.9).enforce("code", 2, None).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 20.0);
        assert!(!result.requires_regeneration);
    }

    #[test]
    fn test_low_confidence_is_noise() {
        let result = gate(5, 0.3).enforce("code", 3, None).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 0.0);
    }

    #[test]
    fn test_clean_code_allows() {
        let result = gate(0, 1.0).enforce("code", 5, None).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 0.0);
    }

    #[test]
    fn test_override_multiplier_and_disable() {
        let doubled = ProfileOverride::default().with_credit_multiplier(2.0);
        let result = gate(5, 0.8).enforce("code", 3, Some(&doubled)).unwrap();
        assert_eq!(result.credits_awarded, 100.0);

        let off = ProfileOverride::default().with_enabled(false);
        let result = gate(5, 0.8).enforce("code", 3, Some(&off)).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 0.0);
    }

    #[test]
    fn test_manual_flag_ignores_mode() {
        let result = gate(3, 0.1).flag_manual("code", 2, None).unwrap();
        assert!(!result.allowed);
        assert!(result.requires_regeneration);
        assert_eq!(result.credits_awarded, 3.0 * 5.0 * 2.0);

        let none_found = gate(0, 0.1).flag_manual("code", 3, None).unwrap();
        assert_eq!(none_found.credits_awarded, 20.0);
    }

    #[test]
    fn test_unknown_tier() {
        assert!(gate(0, 1.0).enforce("code", 7, None).is_err());
    }
}
