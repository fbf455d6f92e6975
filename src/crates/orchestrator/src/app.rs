//! The generated deliverable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

const DESCRIPTION_CHARS: usize = 200;
const NAME_WORDS: usize = 5;
const DEFAULT_NAME: &str = "generated-app";

/// One file of the generated app. Paths are unique within an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub content: String,
    /// Source language tag taken from the code fence.
    pub language: String,
}

impl ArtifactFile {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Models that produced a usable response.
    pub models_used: Vec<String>,
    pub total_tokens: u64,
    /// Estimated USD cost across all calls.
    pub total_cost: f64,
}

impl AppMetadata {
    pub fn new(models_used: Vec<String>, total_tokens: u64, total_cost: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            models_used,
            total_tokens,
            total_cost,
        }
    }
}

/// Aggregate root for one generation, owned by the call that built it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedApp {
    pub name: String,
    pub description: String,
    pub files: Vec<ArtifactFile>,
    pub dependencies: BTreeMap<String, String>,
    pub env_vars: Vec<String>,
    pub setup_instructions: String,
    pub metadata: AppMetadata,
}

impl GeneratedApp {
    pub fn file(&self, path: &str) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Concatenated file contents, as handed to the content scanner.
    pub fn combined_source(&self) -> String {
        self.files
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// App name: the `name` of a generated `package.json`, else a slug of the
/// first prompt words.
pub fn app_name(files: &[ArtifactFile], prompt: &str) -> String {
    let from_manifest = files
        .iter()
        .filter(|f| f.path.rsplit('/').next() == Some("package.json"))
        .find_map(|f| {
            let value: serde_json::Value = serde_json::from_str(&f.content).ok()?;
            value.get("name")?.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
        });

    from_manifest.unwrap_or_else(|| slugify(prompt))
}

fn slugify(prompt: &str) -> String {
    let slug = prompt
        .split_whitespace()
        .take(NAME_WORDS)
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        slug
    }
}

/// First 200 characters of the prompt.
pub fn app_description(prompt: &str) -> String {
    prompt.trim().chars().take(DESCRIPTION_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_package_json() {
        let files = [ArtifactFile::new("package.json", r#"{"name": "todo-pro"}"#, "json")];
        assert_eq!(app_name(&files, "whatever"), "todo-pro");
    }

    #[test]
    fn test_name_from_prompt() {
        assert_eq!(app_name(&[], "Build me a Todo app, with auth!"), "build-me-a-todo-app");
        assert_eq!(app_name(&[], "!!! ???"), DEFAULT_NAME);
    }

    #[test]
    fn test_description_truncates() {
        let prompt = "x".repeat(300);
        assert_eq!(app_description(&prompt).len(), 200);
        assert_eq!(app_description("  short  "), "short");
    }

    #[test]
    fn test_combined_source() {
        let app = GeneratedApp {
            name: "a".into(),
            description: String::new(),
            files: vec![
                ArtifactFile::new("a.ts", "one", "ts"),
                ArtifactFile::new("b.ts", "two", "ts"),
            ],
            dependencies: BTreeMap::new(),
            env_vars: Vec::new(),
            setup_instructions: String::new(),
            metadata: AppMetadata::new(Vec::new(), 0, 0.0),
        };
        assert_eq!(app.combined_source(), "one\ntwo");
        assert!(app.file("b.ts").is_some());
    }
}
