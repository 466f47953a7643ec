//! Value structs shared between the simulation core and its callers.
//!
//! Everything here is plain data: coordinates, wind vectors, contamination
//! entries, source parameters, and the read-side projections (simulation
//! info and sparse frame export) handed to the request layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{FrameId, SimulationId};

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A point on the Earth's surface in decimal degrees.
///
/// No wraparound handling is done for the antimeridian or the poles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate from a latitude/longitude pair.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite numbers.
    pub const fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Wind
// ---------------------------------------------------------------------------

/// Wind heading and strength.
///
/// `direction` is measured in degrees clockwise from north and names the
/// heading the wind carries contamination toward: 90 moves it east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WindVector {
    /// Degrees clockwise from north.
    pub direction: f64,
    /// Meters per second.
    pub speed: f64,
}

impl WindVector {
    /// Still air from due north; the vector every schedule starts with.
    pub const CALM: Self = Self {
        direction: 0.0,
        speed: 0.0,
    };

    /// Create a wind vector.
    pub const fn new(direction: f64, speed: f64) -> Self {
        Self { direction, speed }
    }
}

// ---------------------------------------------------------------------------
// Contamination
// ---------------------------------------------------------------------------

/// Opaque identifier for a contaminant material (e.g. `"chlorine"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MaterialId(pub String);

impl MaterialId {
    /// Borrow the material name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MaterialId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// One recorded deposit of a material in a cell.
///
/// `level` is never negative. Entries are appended, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ContaminationEntry {
    /// The deposited material.
    pub material: MaterialId,
    /// Concentration of the deposit.
    pub level: f64,
}

impl ContaminationEntry {
    /// Create an entry for `material` at `level`.
    pub fn new(material: impl Into<MaterialId>, level: f64) -> Self {
        Self {
            material: material.into(),
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A point emitter of contamination.
///
/// Sources are immutable once registered with a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Source {
    /// Position of the emitter.
    pub location: Coordinate,
    /// Release height above ground in meters.
    pub height: f64,
    /// Material released by the emitter.
    pub material: MaterialId,
    /// Emission strength.
    pub power: f64,
    /// Horizontal dispersion coefficient (sigma, meters).
    pub dispersion_horizontal: f64,
    /// Vertical dispersion coefficient (sigma, meters).
    pub dispersion_vertical: f64,
}

// ---------------------------------------------------------------------------
// Read-side projections
// ---------------------------------------------------------------------------

/// Static description of a simulation: its extent and grid shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationInfo {
    /// The simulation's identifier.
    pub id: SimulationId,
    /// First corner the grid is anchored at.
    pub start: Coordinate,
    /// Opposite corner of the requested extent.
    pub end: Coordinate,
    /// Cell edge length in meters.
    pub cell_edge_m: f64,
    /// Number of rows (latitude steps).
    pub grid_length: usize,
    /// Number of columns (longitude steps).
    pub grid_width: usize,
    /// Number of frames in the timeline.
    pub frame_count: usize,
    /// When the simulation was created.
    pub created_at: DateTime<Utc>,
}

/// A non-empty cell in a sparse frame export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SparseCell {
    /// The cell's reference corner.
    pub corner: Coordinate,
    /// The diagonally opposite corner.
    pub opposite_corner: Coordinate,
    /// Every entry recorded in the cell, in deposit order.
    pub contaminations: Vec<ContaminationEntry>,
}

/// A frame reduced to its header and contaminated cells only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SparseFrame {
    /// The exported frame's identifier.
    pub frame_id: FrameId,
    /// Tick number of the frame.
    pub tick: u64,
    /// Minutes since midnight, in `0..1440`.
    pub time_of_day: u32,
    /// Wind in effect for the frame.
    pub wind: WindVector,
    /// Cells holding at least one entry, row-major.
    pub cells: Vec<SparseCell>,
}
