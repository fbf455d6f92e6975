use orchestrator::policy::{
    ContentScanner, PolicyConfig, PolicyGate, PolicyMode, ProfileOverride, ScanFinding, ScanResult,
};
use std::sync::Arc;

/// Reports a fixed number of offending lines at a fixed confidence.
struct FixedScanner {
    offending: usize,
    confidence: f64,
}

impl ContentScanner for FixedScanner {
    fn scan(&self, code: &str) -> ScanResult {
        ScanResult {
            total_lines: code.lines().count(),
            offending_lines: self.offending,
            findings: (1..=self.offending)
                .map(|line| ScanFinding {
                    line,
                    marker: "fixed".to_string(),
                    excerpt: String::new(),
                })
                .collect(),
            confidence: self.confidence,
        }
    }
}

fn gate(offending: usize, confidence: f64) -> PolicyGate {
    PolicyGate::new(
        PolicyConfig::default(),
        Arc::new(FixedScanner {
            offending,
            confidence,
        }),
    )
}

#[test]
fn test_tier_three_blocks_five_lines() {
    let result = gate(5, 0.8).enforce("whatever", 3, None).unwrap();
    assert!(!result.allowed);
    assert_eq!(result.credits_awarded, 50.0);
    assert!(result.requires_regeneration);
    assert_eq!(result.scan.offending_lines, 5);
}

#[test]
fn test_tier_one_always_allows() {
    for offending in [0, 1, 50] {
        let result = gate(offending, 1.0).enforce("rm -rf /", 1, None).unwrap();
        assert!(result.allowed);
        assert_eq!(result.credits_awarded, 0.0);
        assert!(!result.requires_regeneration);
    }
}

#[test]
fn test_override_can_disable_a_paid_tier() {
    let patch = ProfileOverride::default().with_enabled(false);
    let result = gate(5, 0.9).enforce("x", 4, Some(&patch)).unwrap();
    assert!(result.allowed);
    assert_eq!(result.credits_awarded, 0.0);
}

#[test]
fn test_below_min_confidence_is_noise() {
    // tier 3 acts at 0.6 and above
    let result = gate(5, 0.59).enforce("x", 3, None).unwrap();
    assert!(result.allowed);
    assert_eq!(result.credits_awarded, 0.0);
}

#[test]
fn test_warn_tier_awards_but_allows() {
    let result = gate(2, 0.9).enforce("x", 2, None).unwrap();
    assert!(result.allowed);
    assert!(!result.requires_regeneration);
    assert_eq!(result.credits_awarded, 10.0);
}

#[test]
fn test_manual_flag_applies_multiplier_in_warn_mode() {
    let result = gate(3, 0.9).flag_manual("x", 2, None).unwrap();
    assert!(!result.allowed);
    assert!(result.requires_regeneration);
    assert_eq!(result.credits_awarded, 3.0 * 5.0 * 2.0);
}

#[test]
fn test_configured_tier_override() {
    let config = PolicyConfig::default().with_tier_override(
        5,
        ProfileOverride::default()
            .with_mode(PolicyMode::Warn)
            .with_credit_multiplier(2.0),
    );
    let gate = PolicyGate::new(
        config,
        Arc::new(FixedScanner {
            offending: 1,
            confidence: 0.9,
        }),
    );

    let result = gate.enforce("x", 5, None).unwrap();
    assert!(result.allowed);
    assert_eq!(result.credits_awarded, 50.0);
}

#[test]
fn test_builtin_scanner_finds_markers() {
    let code = "const ok = 1;\n// TODO: wire up billing\nconst rows = fetchRows(); // mock data\n";
    let result = PolicyGate::default().enforce(code, 3, None).unwrap();
    assert_eq!(result.scan.offending_lines, 2);
    assert_eq!(result.scan.findings[0].line, 2);
    assert!(!result.allowed);
    assert_eq!(result.credits_awarded, 20.0);
}

#[test]
fn test_placeholder_code_is_blocked_at_top_tier() {
    let code = "export async function charge(card) {\n\
                // TODO: integrate the payment provider\n\
                throw new Error('Not implemented');\n\
                }\n\
                const customers = [{ name: 'Jane' }]; // Mock data\n\
                const about = 'Lorem ipsum dolor sit amet';\n\
                const client = new Stripe('YOUR_API_KEY');\n";
    let result = PolicyGate::default().enforce(code, 5, None).unwrap();

    assert_eq!(result.scan.offending_lines, 5);
    assert!(!result.allowed);
    assert!(result.requires_regeneration);
    assert_eq!(result.credits_awarded, 125.0);
}

#[test]
fn test_security_markers_are_opt_in() {
    let code = "const out = eval(input);\n";
    assert_eq!(PolicyGate::default().enforce(code, 3, None).unwrap().scan.offending_lines, 0);

    let config = PolicyConfig {
        security_markers: true,
        ..PolicyConfig::default()
    };
    let result = PolicyGate::from_config(config).enforce(code, 3, None).unwrap();
    assert_eq!(result.scan.offending_lines, 1);
    assert_eq!(result.scan.findings[0].marker, "eval(");
}
