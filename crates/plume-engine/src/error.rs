//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of a run so `main` can propagate
//! with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: plume_core::ConfigError,
    },

    /// Reading the scenario or writing the export failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that could not be read or written.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The scenario file is not valid YAML for a scenario.
    #[error("failed to parse scenario: {source}")]
    Scenario {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// The scenario parsed but cannot be run.
    #[error("invalid scenario: {reason}")]
    InvalidScenario {
        /// What is wrong with the scenario.
        reason: String,
    },

    /// The simulation store rejected an operation.
    #[error("simulation error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: plume_core::StoreError,
    },

    /// Serializing the export failed.
    #[error("failed to serialize export: {source}")]
    Export {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The command line was malformed.
    #[error("usage: plume-engine <scenario.yaml> [output.json] ({message})")]
    Usage {
        /// What was wrong with the arguments.
        message: String,
    },
}
