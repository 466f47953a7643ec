//! Shared type definitions for the Plume contaminant dispersion simulator.
//!
//! This crate is the single source of truth for the values that cross the
//! boundary between the simulation core and whatever serves it. Types defined
//! here flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for simulations and frames
//! - [`structs`] -- Coordinates, wind, contamination entries, sources, and
//!   the info/sparse-export projections

pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{FrameId, SimulationId};
pub use structs::{
    ContaminationEntry, Coordinate, MaterialId, SimulationInfo, Source, SparseCell, SparseFrame,
    WindVector,
};
