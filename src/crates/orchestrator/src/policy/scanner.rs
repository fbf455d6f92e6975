//! Line-oriented detection of unfinished generated code.
//!
//! The built-in [`MarkerScanner`] flags placeholder and mock content such as
//! `TODO:` stubs or `YOUR_API_KEY` tokens. Security markers are an opt-in
//! extra list.

use serde::{Deserialize, Serialize};

/// One offending line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// 1-based line number.
    pub line: usize,
    pub marker: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub total_lines: usize,
    pub offending_lines: usize,
    pub findings: Vec<ScanFinding>,
    pub confidence: f64,
}

impl ScanResult {
    /// Result for code that was not scanned.
    pub fn skipped(code: &str) -> Self {
        Self {
            total_lines: code.lines().count(),
            offending_lines: 0,
            findings: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Decides which lines of generated code are offending.
pub trait ContentScanner: Send + Sync {
    fn scan(&self, code: &str) -> ScanResult;
}

/// Placeholder and mock content left behind by a model that did not finish
/// the job.
pub const DEFAULT_MARKERS: &[&str] = &[
    "TODO:",
    "FIXME",
    "not implemented",
    "unimplemented!",
    "mock data",
    "mock response",
    "lorem ipsum",
    "YOUR_API_KEY",
    "placeholder implementation",
    "replace with real",
];

/// Risky constructs, opt-in through [`MarkerScanner::with_security_markers`].
pub const SECURITY_MARKERS: &[&str] = &[
    "eval(",
    "new Function(",
    "child_process",
    "rm -rf /",
    "dangerouslySetInnerHTML",
    "document.write(",
    "curl | sh",
    "curl | bash",
    "os.system(",
    "subprocess.call(",
];

const EXCERPT_CHARS: usize = 80;

/// Case-insensitive substring scanner over a marker list.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    markers: Vec<String>,
    confidence: f64,
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()), 0.8)
    }
}

impl MarkerScanner {
    pub fn new<I, S>(markers: I, confidence: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(|m| m.into().to_lowercase()).collect(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers
            .extend(markers.into_iter().map(|m| m.into().to_lowercase()));
        self
    }

    pub fn with_security_markers(self) -> Self {
        self.with_markers(SECURITY_MARKERS.iter().copied())
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

impl ContentScanner for MarkerScanner {
    fn scan(&self, code: &str) -> ScanResult {
        let mut total_lines = 0;
        let mut findings = Vec::new();

        for (i, line) in code.lines().enumerate() {
            total_lines += 1;
            let lower = line.to_lowercase();
            if let Some(marker) = self.markers.iter().find(|m| lower.contains(m.as_str())) {
                findings.push(ScanFinding {
                    line: i + 1,
                    marker: marker.clone(),
                    excerpt: line.trim().chars().take(EXCERPT_CHARS).collect(),
                });
            }
        }

        ScanResult {
            total_lines,
            offending_lines: findings.len(),
            findings,
            confidence: self.confidence,
        }
    }
}
