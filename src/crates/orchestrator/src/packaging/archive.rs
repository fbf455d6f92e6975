//! Gzip-compressed tar archives of a generated app.

use crate::app::GeneratedApp;
use crate::{OrchestratorError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::collections::HashSet;
use std::io::Read;
use tracing::debug;

pub const README_PATH: &str = "README.md";
pub const MANIFEST_PATH: &str = "package.json";
pub const ENV_EXAMPLE_PATH: &str = ".env.example";
pub const METADATA_PATH: &str = "polyforge.meta.json";

/// One file as it will appear in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Every entry of the archive, generated files first.
///
/// Derived entries (README, manifest, `.env.example`, metadata) are added
/// only when the app has no file at the same path; the manifest only when
/// there are dependencies and `.env.example` only when there are variables.
pub fn archive_entries(app: &GeneratedApp) -> Result<Vec<ArchiveEntry>> {
    let mut entries: Vec<ArchiveEntry> = app
        .files
        .iter()
        .map(|f| ArchiveEntry::new(f.path.clone(), f.content.as_bytes()))
        .collect();
    let taken: HashSet<&str> = app.files.iter().map(|f| f.path.as_str()).collect();

    let mut derived = vec![ArchiveEntry::new(README_PATH, readme(app))];

    if !app.dependencies.is_empty() {
        let manifest = json!({
            "name": app.name,
            "version": "0.1.0",
            "private": true,
            "description": app.description,
            "dependencies": app.dependencies,
        });
        derived.push(ArchiveEntry::new(MANIFEST_PATH, serde_json::to_vec_pretty(&manifest)?));
    }

    if !app.env_vars.is_empty() {
        let body: String = app.env_vars.iter().map(|v| format!("{}=\n", v)).collect();
        derived.push(ArchiveEntry::new(ENV_EXAMPLE_PATH, body));
    }

    derived.push(ArchiveEntry::new(METADATA_PATH, serde_json::to_vec_pretty(&app.metadata)?));

    for entry in derived {
        if taken.contains(entry.path.as_str()) {
            debug!(path = %entry.path, "Generated file shadows derived entry");
            continue;
        }
        entries.push(entry);
    }

    Ok(entries)
}

fn readme(app: &GeneratedApp) -> String {
    let mut out = format!(
        "# {}\n\n{}\n\n{}",
        app.name,
        app.description,
        app.setup_instructions.trim_end()
    );
    if !app.env_vars.is_empty() {
        out.push_str("\n\n## Environment\n\n");
        for var in &app.env_vars {
            out.push_str(&format!("- `{}`\n", var));
        }
    } else {
        out.push('\n');
    }
    out
}

/// Build a `.tar.gz` from entries.
pub fn write_archive(entries: &[ArchiveEntry], mtime: u64) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder
            .append_data(&mut header, &entry.path, entry.data.as_slice())
            .map_err(|e| {
                OrchestratorError::Packaging(format!("failed to add {}: {}", entry.path, e))
            })?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Package an app as a `.tar.gz` byte buffer.
pub fn package(app: &GeneratedApp) -> Result<Vec<u8>> {
    let entries = archive_entries(app)?;
    let mtime = app.metadata.generated_at.timestamp().max(0) as u64;
    let bytes = write_archive(&entries, mtime)?;
    debug!(entries = entries.len(), bytes = bytes.len(), "Archive written");
    Ok(bytes)
}

/// Read every regular file of a `.tar.gz` buffer as `(path, bytes)`.
pub fn unpack(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        files.push((path, data));
    }

    Ok(files)
}
