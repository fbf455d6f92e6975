//! Heuristic quality scoring of raw provider results.

use crate::request::TaskType;
use llm::{OutputKind, RawResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```").expect("fence pattern"));

static FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)\b(function\s+\w+|fn\s+\w+|def\s+\w+|func\s+\w+",
        r"|\w+\s*=\s*(async\s*)?\([^)]*\)\s*=>)",
    ))
    .expect("function pattern")
});

static CLASS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\b(class|struct|trait|impl)\s+\w+").expect("class pattern"));

static IMPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^\s*(import\s|from\s+\S+\s+import\s|use\s+\w",
        r"|const\s+\w+\s*=\s*require\(|#include\s)",
    ))
    .expect("import pattern")
});

static EXPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(export\s|pub\s|module\.exports)").expect("export pattern")
});

static TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\b(interface|type|enum)\s+\w+").expect("type pattern"));

static ASYNC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(async|await)\b").expect("async pattern"));

static TRY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btry\s*[{:]|\bcatch\s*[({]|\bexcept\b").expect("try pattern"));

static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\s)(//|#\s|/\*)").expect("comment pattern"));

static SENTENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(\s|$)").expect("sentence pattern"));

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+\S").expect("heading pattern"));

static JSON_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json[^\n]*\n(.*?)```").expect("json fence pattern"));

/// Tunable scoring constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub code_base: f64,
    pub code_block_bonus: f64,
    pub complexity_weight: f64,
    pub quality_weight: f64,
    pub code_json_bonus: f64,
    pub length_weight: f64,
    pub length_denominator: f64,
    pub long_line_limit: usize,
    pub long_line_penalty: f64,
    pub fast_response_ms: u64,
    pub fast_confidence_cap: f64,
    pub slow_confidence_cap: f64,
    pub text_base: f64,
    pub word_weight: f64,
    pub word_denominator: f64,
    pub sentence_weight: f64,
    pub sentence_denominator: f64,
    pub text_json_bonus: f64,
    pub heading_bonus: f64,
    pub token_denominator: f64,
    /// Flat score for usable image/video/audio results.
    pub media_score: f64,
    pub media_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            code_base: 0.3,
            code_block_bonus: 0.2,
            complexity_weight: 0.2,
            quality_weight: 0.2,
            code_json_bonus: 0.1,
            length_weight: 0.2,
            length_denominator: 2000.0,
            long_line_limit: 120,
            long_line_penalty: 0.1,
            fast_response_ms: 10_000,
            fast_confidence_cap: 0.9,
            slow_confidence_cap: 0.5,
            text_base: 0.5,
            word_weight: 0.3,
            word_denominator: 500.0,
            sentence_weight: 0.2,
            sentence_denominator: 20.0,
            text_json_bonus: 0.15,
            heading_bonus: 0.05,
            token_denominator: 1000.0,
            media_score: 0.5,
            media_confidence: 0.5,
        }
    }
}

/// A raw result with its quality assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: RawResult,
    /// Quality in [0, 1].
    pub score: f64,
    /// Trust in [0, 1], independent of quality.
    pub confidence: f64,
    pub reasoning: String,
}

impl ScoredResult {
    pub fn is_usable(&self) -> bool {
        self.result.is_usable()
    }

    pub fn provider(&self) -> &str {
        &self.result.provider
    }

    pub fn dispatch_index(&self) -> usize {
        self.result.dispatch_index
    }
}

/// Converts raw results into scored results.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score_all(&self, results: Vec<RawResult>, task: TaskType) -> Vec<ScoredResult> {
        results.into_iter().map(|r| self.score(r, task)).collect()
    }

    pub fn score(&self, result: RawResult, task: TaskType) -> ScoredResult {
        if !result.is_usable() {
            let reasoning = format!(
                "{} result from {} has no usable payload",
                result.status, result.provider
            );
            return ScoredResult {
                result,
                score: 0.0,
                confidence: 0.0,
                reasoning,
            };
        }

        let (score, confidence, reasoning) = match (result.kind, task) {
            (OutputKind::Text, TaskType::Code) => self.score_code(&result),
            (OutputKind::Text, TaskType::Text) => self.score_text(&result),
            (kind, _) => (
                self.config.media_score,
                self.config.media_confidence,
                format!("{} asset delivered", kind),
            ),
        };

        ScoredResult {
            result,
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
        }
    }

    fn score_code(&self, result: &RawResult) -> (f64, f64, String) {
        let c = &self.config;
        let text = result.payload().unwrap_or_default();

        let fenced = if FENCE_REGEX.is_match(text) { c.code_block_bonus } else { 0.0 };
        let complexity = complexity(text) * c.complexity_weight;
        let quality = self.quality(text) * c.quality_weight;
        let json = if contains_valid_json(text) { c.code_json_bonus } else { 0.0 };
        let length = ratio(text.chars().count() as f64, c.length_denominator) * c.length_weight;

        let score = c.code_base + fenced + complexity + quality + json + length;

        let tokens = ratio(result.tokens_used as f64, c.token_denominator);
        let cap = if result.response_time_ms < c.fast_response_ms {
            c.fast_confidence_cap
        } else {
            c.slow_confidence_cap
        };

        let reasoning = format!(
            "code: base {:.2}, fenced +{:.2}, complexity +{:.2}, quality +{:.2}, \
             json +{:.2}, length +{:.2}",
            c.code_base, fenced, complexity, quality, json, length
        );
        (score, tokens.min(cap), reasoning)
    }

    fn score_text(&self, result: &RawResult) -> (f64, f64, String) {
        let c = &self.config;
        let text = result.payload().unwrap_or_default();

        let words = text.split_whitespace().count() as f64;
        let sentences = SENTENCE_REGEX.find_iter(text).count() as f64;

        let word_part = ratio(words, c.word_denominator) * c.word_weight;
        let sentence_part = ratio(sentences, c.sentence_denominator) * c.sentence_weight;
        let json = if contains_valid_json(text) { c.text_json_bonus } else { 0.0 };
        let heading = if HEADING_REGEX.is_match(text) { c.heading_bonus } else { 0.0 };

        let score = c.text_base + word_part + sentence_part + json + heading;
        let confidence = ratio(result.tokens_used as f64, c.token_denominator);

        let reasoning = format!(
            "text: {} words, {} sentences, json +{:.2}, headings +{:.2}",
            words, sentences, json, heading
        );
        (score, confidence, reasoning)
    }

    /// Additive style credit in [0, 1].
    fn quality(&self, text: &str) -> f64 {
        let signals = [
            EXPORT_REGEX.is_match(text),
            TYPE_REGEX.is_match(text),
            ASYNC_REGEX.is_match(text),
            TRY_REGEX.is_match(text),
            COMMENT_REGEX.is_match(text),
        ];
        let mut quality = signals.iter().filter(|s| **s).count() as f64 * 0.2;
        if text.lines().any(|l| l.chars().count() > self.config.long_line_limit) {
            quality -= self.config.long_line_penalty;
        }
        quality.clamp(0.0, 1.0)
    }
}

fn ratio(value: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    (value / denominator).min(1.0)
}

/// Averaged structural size measure in [0, 1].
fn complexity(text: &str) -> f64 {
    let lines = text.lines().filter(|l| !l.trim().is_empty()).count() as f64;
    let functions = FUNCTION_REGEX.find_iter(text).count() as f64;
    let classes = CLASS_REGEX.find_iter(text).count() as f64;
    let imports = IMPORT_REGEX.find_iter(text).count() as f64;

    let blend = (ratio(lines, 200.0)
        + ratio(functions, 10.0)
        + ratio(classes, 5.0)
        + ratio(imports, 10.0))
        / 4.0;
    blend.min(1.0)
}

/// Whether the text embeds a JSON object or array that parses.
///
/// Fenced `json` blocks are tried first, then the outermost brace span.
pub fn contains_valid_json(text: &str) -> bool {
    let fenced = JSON_FENCE_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .any(|m| serde_json::from_str::<serde_json::Value>(m.as_str().trim()).is_ok());
    if fenced {
        return true;
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<serde_json::Value>(&text[start..=end]).is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::ProviderOutput;

    fn ok(text: &str, tokens: u32, ms: u64) -> RawResult {
        RawResult::ok("mock", "m", OutputKind::Text, ProviderOutput::text(text, tokens), ms)
    }

    #[test]
    fn test_unusable_scores_zero() {
        let engine = ScoringEngine::default();
        let scored = engine.score(RawResult::error("mock", "m", "boom", 1), TaskType::Code);
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.confidence, 0.0);

        let blank = engine.score(ok("   ", 100, 1), TaskType::Text);
        assert_eq!(blank.score, 0.0);
        assert_eq!(blank.confidence, 0.0);
    }

    #[test]
    fn test_code_rewards_fences_and_structure() {
        let engine = ScoringEngine::default();
        let plain = engine.score(ok("just some words", 500, 100), TaskType::Code);
        let source = "```ts\n// entry\nimport x from 'y';\nexport async function main() {\n\
                      \x20 try { await x(); } catch (e) {}\n}\n```";
        let code = engine.score(ok(source, 500, 100), TaskType::Code);
        assert!(code.score > plain.score);
        assert!(code.score >= 0.5);
        assert!(code.reasoning.starts_with("code:"));
    }

    #[test]
    fn test_code_confidence_caps() {
        let engine = ScoringEngine::default();
        let fast = engine.score(ok("x", 5000, 500), TaskType::Code);
        assert_eq!(fast.confidence, 0.9);

        let slow = engine.score(ok("x", 5000, 20_000), TaskType::Code);
        assert_eq!(slow.confidence, 0.5);

        let few_tokens = engine.score(ok("x", 200, 500), TaskType::Code);
        assert!((few_tokens.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_long_lines_penalize_quality() {
        let engine = ScoringEngine::default();
        let short = "export const a = 1; // ok";
        let long = format!("export const a = 1; // {}", "x".repeat(130));
        assert!(engine.quality(short) > engine.quality(&long));
    }

    #[test]
    fn test_text_scoring() {
        let engine = ScoringEngine::default();
        let text = ok("# Title\n\nOne sentence. Two sentences!", 2000, 10);
        let scored = engine.score(text, TaskType::Text);
        assert!(scored.score > 0.55);
        assert_eq!(scored.confidence, 1.0);
    }

    #[test]
    fn test_media_flat_score() {
        let engine = ScoringEngine::default();
        let output = ProviderOutput::url("https://x/a.png");
        let image = RawResult::ok("replicate", "flux", OutputKind::Image, output, 10);
        let scored = engine.score(image, TaskType::Code);
        assert_eq!(scored.score, 0.5);
    }

    #[test]
    fn test_contains_valid_json() {
        assert!(contains_valid_json("```json\n{\"a\": 1}\n```"));
        assert!(contains_valid_json("result: {\"ok\": true} done"));
        assert!(!contains_valid_json("fn main() { let x = 1; }"));
        assert!(!contains_valid_json("no braces"));
    }
}
