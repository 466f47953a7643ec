//! Configuration loading and typed config structures for Plume.
//!
//! The configuration lives in `plume-config.yaml`. Every field has a default,
//! so an empty document (or no file at all) yields a working setup.

use std::path::Path;

use serde::Deserialize;

use crate::propagation::ContaminationPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value: {reason}")]
    Invalid {
        /// Which value is wrong and why.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `plume-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlumeConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation store limits and deposit policy.
    #[serde(default)]
    pub store: StoreConfig,

    /// Fallbacks for values a scenario may omit.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl PlumeConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_frames_per_request == 0 {
            return Err(ConfigError::Invalid {
                reason: "store.max_frames_per_request must be at least 1".to_owned(),
            });
        }
        let edge = self.defaults.cell_edge_m;
        if !edge.is_finite() || edge <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("defaults.cell_edge_m must be positive, got {edge}"),
            });
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format of log lines.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Simulation store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Largest frame count a single advance request may ask for.
    #[serde(default = "default_max_frames_per_request")]
    pub max_frames_per_request: usize,

    /// How deposits land in cells across ticks.
    #[serde(default)]
    pub contamination_policy: ContaminationPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_frames_per_request: default_max_frames_per_request(),
            contamination_policy: ContaminationPolicy::default(),
        }
    }
}

/// Fallback values for scenario fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DefaultsConfig {
    /// Cell edge length in meters.
    #[serde(default = "default_cell_edge_m")]
    pub cell_edge_m: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cell_edge_m: default_cell_edge_m(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_max_frames_per_request() -> usize {
    1000
}

const fn default_cell_edge_m() -> f64 {
    100.0
}
