//! Configuration resolution for lmkernel.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`$XDG_CONFIG_HOME/lmkernel/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)
//!
//! Files may be partial; each layer is deep-merged over the previous one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete lmkernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub kernel: KernelConfig,
    pub model: ModelConfig,
    pub log: LogConfig,
}

/// Metadata the kernel registers with the notebook host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KernelConfig {
    pub name: String,
    pub display_name: String,
    pub language: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "lmkernel".to_string(),
            display_name: "On-device Language Model".to_string(),
            language: "text".to_string(),
        }
    }
}

/// On-device model backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the local model server.
    pub base_url: String,
    /// Model to prompt.
    pub model: String,
    /// Download the model on first use when it is not installed.
    pub pull_if_missing: bool,
    /// How streamed increments should be interpreted.
    pub convention: StreamConvention,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
            pull_if_missing: true,
            convention: StreamConvention::Auto,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// How a streaming prompt reports its text.
///
/// Backends disagree: some yield the full reply so far on every increment,
/// others yield only the newly produced text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamConvention {
    /// Detect per stream from the shape of the increments.
    #[default]
    Auto,
    /// Every increment is the full reply so far.
    Cumulative,
    /// Every increment is only the new text.
    Incremental,
}

impl std::str::FromStr for StreamConvention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cumulative" => Ok(Self::Cumulative),
            "incremental" | "delta" => Ok(Self::Incremental),
            other => Err(Error::Config(format!("Unknown stream convention: {other}"))),
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        merge_values(&mut merged, load_config_value(&global_path)?);
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        merge_values(&mut merged, load_config_value(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("lmkernel").join("settings.json"))
}

fn load_config_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// replaces the base value.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply `LMKERNEL_*` overrides using the given variable lookup.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("LMKERNEL_BASE_URL") {
        config.model.base_url = val;
    }
    if let Some(val) = lookup("LMKERNEL_MODEL") {
        config.model.model = val;
    }
    if let Some(val) = lookup("LMKERNEL_PULL") {
        match val.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => config.model.pull_if_missing = true,
            "0" | "false" | "no" => config.model.pull_if_missing = false,
            _ => tracing::warn!(value = %val, "Ignoring invalid LMKERNEL_PULL"),
        }
    }
    if let Some(val) = lookup("LMKERNEL_CONVENTION") {
        match val.parse() {
            Ok(convention) => config.model.convention = convention,
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid LMKERNEL_CONVENTION"),
        }
    }
    if let Some(val) = lookup("LMKERNEL_LOG_LEVEL") {
        config.log.level = val;
    }
}
