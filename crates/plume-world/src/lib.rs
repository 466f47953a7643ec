//! Geodesy and the geodesic cell grid for the Plume simulator.
//!
//! This crate models the physical space a simulation runs over: a
//! rectangular latitude/longitude extent cut into square cells of a fixed
//! edge length, each holding the contamination recorded in it.
//!
//! # Modules
//!
//! - [`geodesy`] -- Haversine distance and small-offset coordinate stepping.
//! - [`grid`] -- [`Grid`] construction from two corners, cell storage, and
//!   the row/column band lookups used to place sources and injections.
//! - [`error`] -- Error types for grid construction and lookup.

pub mod error;
pub mod geodesy;
pub mod grid;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use grid::{Cell, Grid};
