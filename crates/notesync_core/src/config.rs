//! Engine timing and capacity settings.
//!
//! Every knob has a default matching the behaviour users are used to, so an
//! empty TOML file (or none at all) yields a working engine:
//!
//! ```toml
//! fetch_debounce_ms = 50
//! save_debounce_ms = 1200
//! guard_window_ms = 2000
//! remote_settle_ms = 50
//! cache_capacity = 20
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delay between a selection and its fetch.
pub const DEFAULT_FETCH_DEBOUNCE_MS: u64 = 50;
/// Quiet period after the last keystroke before buffered edits are saved.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1200;
/// How long after a keystroke external updates may not replace content.
pub const DEFAULT_GUARD_WINDOW_MS: u64 = 2000;
/// How long an applied remote update suppresses local change callbacks.
pub const DEFAULT_REMOTE_SETTLE_MS: u64 = 50;
/// Number of document snapshots kept for instant display.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fetch debounce in milliseconds.
    pub fetch_debounce_ms: u64,
    /// Save debounce in milliseconds.
    pub save_debounce_ms: u64,
    /// Guard window in milliseconds.
    pub guard_window_ms: u64,
    /// Remote settle delay in milliseconds.
    pub remote_settle_ms: u64,
    /// Maximum number of cached document snapshots.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_debounce_ms: DEFAULT_FETCH_DEBOUNCE_MS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            guard_window_ms: DEFAULT_GUARD_WINDOW_MS,
            remote_settle_ms: DEFAULT_REMOTE_SETTLE_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.save_debounce_ms > self.guard_window_ms {
            // A save that lands after the guard expired lets a stale echo
            // erase text that was never persisted.
            return Err(ConfigError::Invalid(format!(
                "save_debounce_ms ({}) must not exceed guard_window_ms ({})",
                self.save_debounce_ms, self.guard_window_ms
            )));
        }
        Ok(())
    }

    /// See [`EngineConfig::fetch_debounce_ms`].
    pub fn fetch_debounce(&self) -> Duration {
        Duration::from_millis(self.fetch_debounce_ms)
    }

    /// See [`EngineConfig::save_debounce_ms`].
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// See [`EngineConfig::guard_window_ms`].
    pub fn guard_window(&self) -> Duration {
        Duration::from_millis(self.guard_window_ms)
    }

    /// See [`EngineConfig::remote_settle_ms`].
    pub fn remote_settle(&self) -> Duration {
        Duration::from_millis(self.remote_settle_ms)
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`EngineConfig`].
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Rendering the config failed.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Values are out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
