use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[ \t]*([^\n]*)\n(.*?)```").expect("fence pattern")
});

/// A fenced code segment as found in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Lowercased language tag, possibly empty.
    pub language: String,
    /// Filename given on the fence line, if any.
    pub filename: Option<String>,
    pub content: String,
}

impl CodeBlock {
    pub fn new(
        language: impl Into<String>,
        filename: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into().to_lowercase(),
            filename,
            content: content.into(),
        }
    }
}

/// Scan `text` for fenced code blocks.
///
/// Accepts the language tag followed by an optional filename in any of the
/// usual spellings (`ts src/app.ts`, `ts:src/app.ts`, `ts // src/app.ts`,
/// `ts title="src/app.ts"`). Blocks with an empty body are discarded.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();

    for caps in FENCE_REGEX.captures_iter(text) {
        let language = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let info = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let body = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

        if body.trim().is_empty() {
            debug!(language, "Discarding empty code block");
            continue;
        }

        let content = body.strip_suffix('\n').unwrap_or(body);
        blocks.push(CodeBlock::new(language, parse_fence_filename(info), content));
    }

    blocks
}

fn parse_fence_filename(info: &str) -> Option<String> {
    let mut candidate = info.trim();
    for prefix in [":", "//", "#", "--", "<!--"] {
        candidate = candidate.strip_prefix(prefix).unwrap_or(candidate).trim();
    }
    for prefix in ["title=", "file=", "filename=", "file:", "filename:"] {
        if let Some(rest) = candidate.strip_prefix(prefix) {
            candidate = rest.trim();
        }
    }
    let candidate = candidate
        .trim_end_matches("-->")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`');

    let looks_like_path = !candidate.is_empty()
        && !candidate.contains(char::is_whitespace)
        && (candidate.contains('.') || candidate.contains('/'));

    looks_like_path.then(|| candidate.to_string())
}
