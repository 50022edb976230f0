//! JSON configuration for the CLI and embedding applications.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persistent application settings. Everything is optional; missing fields
/// fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine to use when the caller names none.
    pub default_engine: Option<String>,
    /// Compute device override ("cuda", "coreml", "cpu").
    pub device: Option<String>,
    /// Per-engine constructor options, keyed by engine name.
    pub engines: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("voxclone").join("config.json"))
    }

    /// Load from the platform config directory, falling back to defaults.
    pub fn load_default() -> Self {
        match Self::config_path() {
            Some(path) => load_json_config(&path),
            None => Self::default(),
        }
    }

    /// Constructor options configured for `engine`, empty if none.
    pub fn engine_options(&self, engine: &str) -> HashMap<String, serde_json::Value> {
        self.engines.get(engine).cloned().unwrap_or_default()
    }
}

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparsable config, using defaults");
                T::default()
            }
        },
        Err(_) => {
            debug!(path = %path.display(), "no config file, using defaults");
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}
