//! Filename inference and collision handling for extracted blocks.

use super::blocks::CodeBlock;
use crate::app::ArtifactFile;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static FIRST_LINE_FILENAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?://|#|/\*|<!--|--|;)\s*(?:(?i:file(?:name)?|path)\s*:\s*)?",
        r"([\w@./-]*[\w-]\.[A-Za-z0-9]+)(?:\s|$|\*/|-->)",
    ))
    .expect("first line filename pattern")
});

static EXPORT_SYMBOL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^\s*export\s+(?:default\s+)?(?:async\s+)?",
        r"(?:function\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    ))
    .expect("export symbol pattern")
});

const FALLBACK_STEM: &str = "generated";

/// File extension (with the dot) for a fence language tag.
pub fn extension_for(language: &str) -> Option<&'static str> {
    let ext = match language.to_ascii_lowercase().as_str() {
        "typescript" | "ts" => ".ts",
        "tsx" => ".tsx",
        "javascript" | "js" | "node" => ".js",
        "jsx" => ".jsx",
        "mjs" => ".mjs",
        "python" | "py" => ".py",
        "rust" | "rs" => ".rs",
        "go" | "golang" => ".go",
        "java" => ".java",
        "kotlin" | "kt" => ".kt",
        "swift" => ".swift",
        "ruby" | "rb" => ".rb",
        "php" => ".php",
        "c" => ".c",
        "cpp" | "c++" | "cc" => ".cpp",
        "csharp" | "cs" | "c#" => ".cs",
        "html" => ".html",
        "css" => ".css",
        "scss" => ".scss",
        "vue" => ".vue",
        "svelte" => ".svelte",
        "json" => ".json",
        "yaml" | "yml" => ".yml",
        "toml" => ".toml",
        "xml" => ".xml",
        "markdown" | "md" => ".md",
        "sql" => ".sql",
        "graphql" | "gql" => ".graphql",
        "bash" | "sh" | "shell" | "zsh" => ".sh",
        "env" | "dotenv" => ".env",
        "prisma" => ".prisma",
        _ => return None,
    };
    Some(ext)
}

/// Turn extracted blocks into files with unique paths.
///
/// Blocks without a usable filename get one inferred from, in order: a
/// filename comment on the first line, manifest-like JSON content, an
/// exported symbol name, or `generated<ext>`. Colliding paths get `-1`,
/// `-2`, ... inserted before the extension.
pub fn normalize_blocks(blocks: &[CodeBlock]) -> Vec<ArtifactFile> {
    let mut used: HashSet<String> = HashSet::new();
    let mut files = Vec::with_capacity(blocks.len());

    for block in blocks {
        let wanted = block
            .filename
            .as_deref()
            .filter(|name| !is_placeholder(name, &block.language))
            .and_then(sanitize_path)
            .unwrap_or_else(|| infer_filename(block));

        let path = unique_path(&wanted, &used);
        if path != wanted {
            debug!(wanted = %wanted, path = %path, "Renamed colliding file");
        }
        used.insert(path.clone());

        files.push(ArtifactFile::new(path, block.content.clone(), language_tag(block)));
    }

    files
}

fn language_tag(block: &CodeBlock) -> String {
    if block.language.is_empty() {
        "text".to_string()
    } else {
        block.language.clone()
    }
}

/// `file.<language>` is what some models emit when they have no name.
fn is_placeholder(name: &str, language: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name == format!("file.{}", language) {
        return true;
    }
    extension_for(language).is_some_and(|ext| name == format!("file{}", ext))
}

fn infer_filename(block: &CodeBlock) -> String {
    if let Some(name) = first_line_filename(&block.content) {
        return name;
    }

    let ext = extension_for(&block.language).unwrap_or(".txt");

    if let Some(manifest) = manifest_name(block, ext) {
        return manifest.to_string();
    }

    if let Some(caps) = EXPORT_SYMBOL_REGEX.captures(&block.content) {
        if let Some(symbol) = caps.get(1) {
            return format!("{}{}", symbol.as_str(), ext);
        }
    }

    format!("{}{}", FALLBACK_STEM, ext)
}

fn first_line_filename(content: &str) -> Option<String> {
    let first = content.lines().next()?;
    let caps = FIRST_LINE_FILENAME_REGEX.captures(first)?;
    sanitize_path(caps.get(1)?.as_str())
}

fn manifest_name(block: &CodeBlock, ext: &str) -> Option<&'static str> {
    if ext != ".json" {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&block.content).ok()?;
    let object = value.as_object()?;
    if object.contains_key("compilerOptions") {
        Some("tsconfig.json")
    } else if object.contains_key("dependencies")
        || object.contains_key("devDependencies")
        || object.contains_key("scripts")
    {
        Some("package.json")
    } else {
        None
    }
}

/// Relative, forward-slash path with no parent or empty segments.
fn sanitize_path(raw: &str) -> Option<String> {
    let cleaned = raw.trim().replace('\\', "/");
    let segments: Vec<&str> = cleaned
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Split `dir/name.ext` into (`dir/name`, `.ext`); dotfiles keep no extension.
fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(name_start + dot),
        _ => (path, ""),
    }
}

fn unique_path(wanted: &str, used: &HashSet<String>) -> String {
    if !used.contains(wanted) {
        return wanted.to_string();
    }
    let (stem, ext) = split_extension(wanted);
    (1..)
        .map(|n| format!("{}-{}{}", stem, n, ext))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| wanted.to_string())
}
