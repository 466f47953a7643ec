//! Headless engine binary for the Plume simulator.
//!
//! Runs one scenario file end to end and writes the requested sparse frame
//! exports as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `plume-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Parse the command line: `plume-engine <scenario.yaml> [output.json]`
//! 4. Load the scenario
//! 5. Run it through a fresh simulation store
//! 6. Write the export to the output file, or stdout

mod error;
mod runner;
mod scenario;

use std::io::Write;
use std::path::{Path, PathBuf};

use plume_core::config::LoggingConfig;
use plume_core::{LogFormat, PlumeConfig, SimulationStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::scenario::Scenario;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "plume-config.yaml";

/// Paths taken from the command line.
struct Args {
    /// Scenario to run.
    scenario: PathBuf,
    /// Export destination; stdout when absent.
    output: Option<PathBuf>,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the scenario, the run, or writing the
/// export fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration before logging so its level applies.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("plume-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        level = config.logging.level,
        max_frames_per_request = config.store.max_frames_per_request,
        contamination_policy = ?config.store.contamination_policy,
        default_cell_edge_m = config.defaults.cell_edge_m,
        "Configuration loaded"
    );

    // 3. Parse arguments.
    let args = parse_args(std::env::args().skip(1))?;

    // 4. Load the scenario.
    let scenario = Scenario::from_file(&args.scenario)?;
    info!(
        scenario = %args.scenario.display(),
        sources = scenario.sources.len(),
        winds = scenario.winds.len(),
        injections = scenario.injections.len(),
        frames = scenario.frames,
        "Scenario loaded"
    );

    // 5. Run.
    let store = SimulationStore::from_config(&config.store);
    let outcome = runner::run(
        &store,
        &scenario,
        config.defaults.cell_edge_m,
        config.store.max_frames_per_request,
    )?;

    // 6. Write the export.
    let json = serde_json::to_string_pretty(&outcome).map_err(EngineError::from)?;
    write_output(args.output.as_deref(), &json)?;

    info!("plume-engine finished");
    Ok(())
}

/// Initialize the global subscriber. `RUST_LOG` overrides the config level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load configuration from `plume-config.yaml`, returning whether the file
/// existed.
fn load_config() -> Result<(PlumeConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        let config = PlumeConfig::from_file(config_path)?;
        Ok((config, true))
    } else {
        Ok((PlumeConfig::default(), false))
    }
}

/// Split the command line into scenario and optional output paths.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, EngineError> {
    let scenario = args.next().map(PathBuf::from).ok_or_else(|| EngineError::Usage {
        message: "missing scenario path".to_owned(),
    })?;
    let output = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        return Err(EngineError::Usage {
            message: format!("unexpected argument `{extra}`"),
        });
    }
    Ok(Args { scenario, output })
}

/// Write `json` to `path`, or to stdout when no path is given.
fn write_output(path: Option<&Path>, json: &str) -> Result<(), EngineError> {
    match path {
        Some(path) => {
            std::fs::write(path, json).map_err(|source| EngineError::Io {
                path: path.display().to_string(),
                source,
            })?;
            info!(output = %path.display(), bytes = json.len(), "Export written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").map_err(|source| EngineError::Io {
                path: "<stdout>".to_owned(),
                source,
            })?;
        }
    }
    Ok(())
}
