//! Simulation core for the Plume contaminant dispersion simulator.
//!
//! A simulation advances a geodesic grid through discrete one-minute ticks.
//! Each tick deep-copies the previous frame's grid, resolves the wind in
//! effect, and evaluates a Gaussian plume per source over the cells downwind
//! of it.
//!
//! # Modules
//!
//! - [`wind`] -- Tick-indexed wind schedule with floor lookup
//! - [`source`] -- Validated registry of contamination emitters
//! - [`propagation`] -- Octant pruning, the plume equation, and frame advance
//! - [`timeline`] -- Frames and the append-only frame timeline
//! - [`simulation`] -- One simulation and the operations callers drive it with
//! - [`store`] -- Thread-safe registry of simulations keyed by id
//! - [`config`] -- YAML configuration loading

pub mod config;
pub mod propagation;
pub mod simulation;
pub mod source;
pub mod store;
pub mod timeline;
pub mod wind;

pub use config::{ConfigError, LogFormat, PlumeConfig};
pub use propagation::{ContaminationPolicy, Octant, PropagationError};
pub use simulation::{Simulation, SimulationError};
pub use source::{SourceError, SourceRegistry};
pub use store::{SimulationStore, StoreError};
pub use timeline::{Frame, FrameTimeline, TimelineError};
pub use wind::{WindError, WindSchedule};
