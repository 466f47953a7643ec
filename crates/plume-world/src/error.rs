//! Error types for the `plume-world` crate.
//!
//! All fallible grid operations return [`WorldError`].

/// Errors that can occur while building or querying a grid.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The corners or cell edge length do not describe a usable grid.
    #[error("invalid grid extent: {reason}")]
    InvalidExtent {
        /// Explanation of what is wrong with the geometry.
        reason: String,
    },

    /// No cell of the grid contains the coordinate.
    #[error("coordinate ({lat}, {lng}) lies outside the grid")]
    OutOfBounds {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lng: f64,
    },
}
