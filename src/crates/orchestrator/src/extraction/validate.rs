//! Advisory checks on a generated file set. Nothing here blocks delivery.

use crate::app::ArtifactFile;
use serde::{Deserialize, Serialize};
use std::fmt;

const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "kt", "swift", "rb", "php",
    "c", "h", "cpp", "hpp", "cs", "html", "css", "scss", "vue", "svelte", "sql", "sh", "dart",
    "scala", "ex", "exs",
];

const MIN_FILE_CHARS: usize = 10;

const PLACEHOLDER_MARKERS: &[&str] =
    &["TODO:", "YOUR_API_KEY", "your-api-key-here", "<YOUR_API_KEY>"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    NoFiles,
    NoSourceFiles,
    ShortFile { path: String },
    Placeholder { path: String, marker: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::NoFiles => write!(f, "no files were generated"),
            ValidationWarning::NoSourceFiles => {
                write!(f, "no recognizable source files were generated")
            }
            ValidationWarning::ShortFile { path } => write!(f, "{} is suspiciously short", path),
            ValidationWarning::Placeholder { path, marker } => {
                write!(f, "{} contains placeholder marker '{}'", path, marker)
            }
        }
    }
}

pub fn validate_generated_code(files: &[ArtifactFile]) -> Vec<ValidationWarning> {
    if files.is_empty() {
        return vec![ValidationWarning::NoFiles];
    }

    let mut warnings = Vec::new();

    let has_source = files.iter().any(|f| {
        f.path
            .rsplit_once('.')
            .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    });
    if !has_source {
        warnings.push(ValidationWarning::NoSourceFiles);
    }

    for file in files {
        if file.content.trim().chars().count() < MIN_FILE_CHARS {
            warnings.push(ValidationWarning::ShortFile {
                path: file.path.clone(),
            });
        }
        if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| file.content.contains(**m)) {
            warnings.push(ValidationWarning::Placeholder {
                path: file.path.clone(),
                marker: marker.to_string(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> ArtifactFile {
        ArtifactFile::new(path, content, "ts")
    }

    #[test]
    fn test_no_files() {
        assert_eq!(validate_generated_code(&[]), vec![ValidationWarning::NoFiles]);
    }

    #[test]
    fn test_clean_set_has_no_warnings() {
        let files = [file("src/index.ts", "export const answer = 42;")];
        assert!(validate_generated_code(&files).is_empty());
    }

    #[test]
    fn test_flags_without_blocking() {
        let files = [
            file("README.md", "# A readme that is long enough"),
            file("config.json", "{}"),
            file("notes.md", "TODO: wire YOUR_API_KEY here"),
        ];
        let warnings = validate_generated_code(&files);
        assert!(warnings.contains(&ValidationWarning::NoSourceFiles));
        assert!(warnings.contains(&ValidationWarning::ShortFile {
            path: "config.json".to_string()
        }));
        assert!(warnings.contains(&ValidationWarning::Placeholder {
            path: "notes.md".to_string(),
            marker: "TODO:".to_string()
        }));
        assert_eq!(warnings[0].to_string(), "no recognizable source files were generated");
    }
}
