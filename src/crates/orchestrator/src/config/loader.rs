//! Configuration loader with environment variable support
//!
//! Loads YAML, JSON or TOML files, chosen by extension, with:
//! - `${ENV:default}` expansion applied to the raw text before parsing
//! - Numeric YAML mapping keys accepted (e.g. `policy.tiers.3`)
//! - Validation of the resulting [`PipelineConfig`]

use super::PipelineConfig;
use crate::{OrchestratorError, Result};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "POLYFORGE_CONFIG";

static ENV_REF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").expect("env reference pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(OrchestratorError::Config(format!(
                "Unsupported configuration format for {:?} (expected .yaml, .yml, .json or .toml)",
                path
            ))),
        }
    }
}

/// Load and deserialize a configuration file into any type.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|e| {
        OrchestratorError::Config(format!("Failed to read configuration file {:?}: {}", path, e))
    })?;

    let expanded = expand_env_in_string(&content);
    let value = parse_str(&expanded, format)
        .map_err(|e| OrchestratorError::Config(format!("Failed to parse {:?}: {}", path, e)))?;

    debug!(path = ?path, format = ?format, "Configuration parsed");

    serde_json::from_value(value).map_err(|e| {
        OrchestratorError::Config(format!("Failed to deserialize configuration {:?}: {}", path, e))
    })
}

/// Load a [`PipelineConfig`] and validate it.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let config: PipelineConfig = load_config(path.as_ref())?;
    config.validate()?;
    info!(path = ?path.as_ref(), "Loaded pipeline configuration");
    Ok(config)
}

/// Load the file named by `POLYFORGE_CONFIG`, if set.
pub fn load_from_env() -> Result<Option<PipelineConfig>> {
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => load_pipeline_config(path.trim()).map(Some),
        _ => Ok(None),
    }
}

fn parse_str(content: &str, format: ConfigFormat) -> std::result::Result<JsonValue, String> {
    match format {
        ConfigFormat::Yaml => {
            let yaml: YamlValue = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
            yaml_to_json(&yaml)
        }
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => {
            let value: toml::Value = toml::from_str(content).map_err(|e| e.to_string())?;
            serde_json::to_value(value).map_err(|e| e.to_string())
        }
    }
}

/// Expand environment variables in a string
///
/// Supports syntax: ${ENV_VAR:default_value}. A missing variable without a
/// default expands to the empty string.
fn expand_env_in_string(s: &str) -> String {
    if !s.contains("${") {
        return s.to_string();
    }

    ENV_REF_REGEX
        .replace_all(s, |cap: &Captures| {
            let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
            env::var(&cap[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

/// Convert a YAML value to JSON, stringifying scalar mapping keys.
fn yaml_to_json(yaml: &YamlValue) -> std::result::Result<JsonValue, String> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| format!("Invalid number: {}", f))
            } else {
                Err("Invalid number".to_string())
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        YamlValue::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s.clone(),
                    YamlValue::Number(n) => n.to_string(),
                    YamlValue::Bool(b) => b.to_string(),
                    _ => return Err("Map keys must be scalars".to_string()),
                };
                json_map.insert(key, yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(json_map))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
