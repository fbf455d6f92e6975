//! Dependency and environment variable mining.

use super::blocks::extract_code_blocks;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::warn;

static DEPENDENCIES_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""dependencies"\s*:\s*(\{[^{}]*\})"#).expect("dependencies pattern")
});

static ENV_REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?:process\.env\.|import\.meta\.env\.)([A-Z_][A-Z0-9_]*)"#,
        r#"|(?:process\.env|os\.environ)\[\s*['"]([A-Z_][A-Z0-9_]*)['"]\s*\]"#,
        r#"|(?:os\.getenv|os\.environ\.get|env::var|Deno\.env\.get|System\.getenv)"#,
        r#"\(\s*['"]([A-Z_][A-Z0-9_]*)['"]"#,
    ))
    .expect("env reference pattern")
});

static ENV_ASSIGNMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)=").expect("env assignment pattern")
});

const ENV_LANGUAGES: &[&str] = &["env", "dotenv", "bash", "sh", "shell", "zsh"];

/// Dependency map (name to version) from fenced JSON blocks.
///
/// Each `json` block is parsed and its `dependencies` object merged in.
/// When a block does not parse as a whole, the `"dependencies": {...}` span
/// alone is tried. Anything unparseable is skipped.
pub fn extract_dependencies(text: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();

    for block in extract_code_blocks(text).iter().filter(|b| b.language == "json") {
        let object = match serde_json::from_str::<Value>(&block.content) {
            Ok(value) => value.get("dependencies").cloned(),
            Err(_) => DEPENDENCIES_SPAN_REGEX
                .captures(&block.content)
                .and_then(|caps| caps.get(1))
                .and_then(|span| serde_json::from_str::<Value>(span.as_str()).ok()),
        };

        match object {
            Some(Value::Object(map)) => {
                for (name, version) in map {
                    let version = match version {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    deps.insert(name, version);
                }
            }
            Some(_) => warn!("Ignoring non-object dependencies entry"),
            None if block.content.contains("\"dependencies\"") => {
                warn!("Could not parse dependencies block, skipping");
            }
            None => {}
        }
    }

    deps
}

/// Sorted, de-duplicated environment variable names.
///
/// Unions variables referenced from code (`process.env.X`, `os.getenv("X")`,
/// ...) with `KEY=` lines of env or shell blocks.
pub fn extract_env_vars(text: &str) -> Vec<String> {
    let mut names: BTreeSet<String> = ENV_REFERENCE_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
        .collect();

    for block in extract_code_blocks(text)
        .iter()
        .filter(|b| ENV_LANGUAGES.contains(&b.language.as_str()))
    {
        for line in block.content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = ENV_ASSIGNMENT_REGEX.captures(line).and_then(|c| c.get(1)) {
                names.insert(name.as_str().to_string());
            }
        }
    }

    names.into_iter().collect()
}
