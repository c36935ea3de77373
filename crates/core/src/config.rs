//! UI configuration
//!
//! One [`UiConfig`] is constructed at startup by the application shell and
//! passed down to whatever needs it. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Fallback refresh delay when nothing else is configured (ms)
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Largest accepted refresh delay (ms)
pub const MAX_DELAY_MS: u64 = 10_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level UI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// UI thread settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// OS thread name of the UI thread (default: "ui")
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

/// Refresh scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Quiet window before a coalesced refresh runs (default: 100ms)
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Per-scheduler overrides, keyed by scheduler name
    #[serde(default)]
    pub overrides: BTreeMap<String, u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SchedulerConfig {
    /// Delay used when a scheduler has no override
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    /// Delay for the scheduler registered under `name`
    pub fn delay_for(&self, name: &str) -> Duration {
        self.overrides
            .get(name)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or_else(|| self.default_delay())
    }
}

fn default_thread_name() -> String {
    "ui".to_string()
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

impl UiConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate and write configuration, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(io_err)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.thread_name must not be empty".to_string(),
            ));
        }

        if self.scheduler.default_delay_ms > MAX_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "scheduler.default_delay_ms must be 0-{} (got {})",
                MAX_DELAY_MS, self.scheduler.default_delay_ms
            )));
        }

        for (name, ms) in &self.scheduler.overrides {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "scheduler.overrides keys must not be empty".to_string(),
                ));
            }
            if *ms > MAX_DELAY_MS {
                return Err(ConfigError::Invalid(format!(
                    "scheduler.overrides.{} must be 0-{} (got {})",
                    name, MAX_DELAY_MS, ms
                )));
            }
        }

        Ok(())
    }

    /// Commented example configuration
    pub fn example() -> &'static str {
        r#"# Campaign UI configuration

[dispatch]
# Name of the UI thread
thread_name = "ui"

[scheduler]
# Quiet window (ms) before a coalesced panel refresh runs (0-10000)
default_delay_ms = 100

# Per-panel overrides (ms)
[scheduler.overrides]
finances = 250
daily_report = 50
"#
    }
}
