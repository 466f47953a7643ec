//! The geodesic cell grid.
//!
//! A [`Grid`] covers the rectangle between two corner coordinates with square
//! cells of a fixed edge length. The axis convention is fixed crate-wide:
//!
//! - **rows** (`grid_length`) step along latitude, starting at the start
//!   corner and moving toward increasing latitude;
//! - **columns** (`grid_width`) step along longitude, starting at the start
//!   corner's longitude and moving east.
//!
//! Cell `(i, j)` is row `i`, column `j`. Both dimensions are the ceiling of
//! the haversine extent divided by the edge length, so the lattice always
//! reaches the far corner.
//!
//! Two band lookups place coordinates on the grid:
//!
//! - [`Grid::home_cell`] scans row anchors then column anchors and clamps to
//!   the last row/column when nothing matches. Sources use it, so a source on
//!   or past the boundary still emits.
//! - [`Grid::containing_cell`] tests each cell's own footprint and fails with
//!   [`WorldError::OutOfBounds`] when no cell contains the point.

use plume_types::{ContaminationEntry, Coordinate};
use serde::Serialize;
use tracing::debug;

use crate::error::WorldError;
use crate::geodesy;

/// Upper bound on cells along either axis.
pub const MAX_CELLS_PER_AXIS: u32 = 4096;

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One square unit of the grid and the contamination recorded in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Reference (south-west) corner of the cell.
    corner: Coordinate,
    /// Edge length in meters, shared by every cell of the grid.
    edge_m: f64,
    /// Entries in deposit order.
    contaminations: Vec<ContaminationEntry>,
}

impl Cell {
    /// Create an empty cell anchored at `corner`.
    pub const fn new(corner: Coordinate, edge_m: f64) -> Self {
        Self {
            corner,
            edge_m,
            contaminations: Vec::new(),
        }
    }

    /// The cell's reference corner.
    pub const fn corner(&self) -> Coordinate {
        self.corner
    }

    /// The corner diagonally opposite the reference corner.
    pub fn opposite_corner(&self) -> Coordinate {
        geodesy::offset(self.corner, self.edge_m, self.edge_m)
    }

    /// Entries recorded in the cell, oldest first.
    pub fn contaminations(&self) -> &[ContaminationEntry] {
        &self.contaminations
    }

    /// Whether the cell holds no entries.
    pub const fn is_clean(&self) -> bool {
        self.contaminations.is_empty()
    }

    /// Append an entry.
    pub fn push_contamination(&mut self, entry: ContaminationEntry) {
        self.contaminations.push(entry);
    }

    /// Drop every entry.
    pub fn clear_contaminations(&mut self) {
        self.contaminations.clear();
    }

    /// Whether the latitude falls within this cell's row band.
    fn lat_band_contains(&self, lat: f64) -> bool {
        self.corner.lat <= lat && lat < self.opposite_corner().lat
    }

    /// Whether the longitude falls within this cell's column band.
    fn lng_band_contains(&self, lng: f64) -> bool {
        self.corner.lng <= lng && lng < self.opposite_corner().lng
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A rectangular lattice of [`Cell`]s covering a geographic extent.
///
/// The layout never changes after construction; only cell contents do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    /// Coordinate the lattice was generated from (corner of cell `(0, 0)`).
    anchor: Coordinate,
    /// Cell edge length in meters.
    edge_m: f64,
    /// Number of rows.
    grid_length: usize,
    /// Number of columns.
    grid_width: usize,
    /// Cells, row-major. Every row holds `grid_width` cells.
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Build the grid spanning `start` to `end` with cells of `edge_m` meters.
    ///
    /// `end` must lie strictly north and east of `start`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidExtent`] if a coordinate or the edge
    /// length is not finite, the edge length is not positive, the corners are
    /// degenerate or crossed, or either dimension would be zero or exceed
    /// [`MAX_CELLS_PER_AXIS`].
    pub fn build(start: Coordinate, end: Coordinate, edge_m: f64) -> Result<Self, WorldError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(invalid_extent("corner coordinates must be finite"));
        }
        if !edge_m.is_finite() || edge_m <= 0.0 {
            return Err(invalid_extent(format!(
                "cell edge length must be a positive number of meters, got {edge_m}"
            )));
        }
        if end.lat <= start.lat || end.lng <= start.lng {
            return Err(invalid_extent(format!(
                "end corner ({}, {}) must lie north-east of start corner ({}, {})",
                end.lat, end.lng, start.lat, start.lng
            )));
        }

        let grid_length = cells_along(
            geodesy::distance(start, Coordinate::new(end.lat, start.lng)),
            edge_m,
        )?;
        let grid_width = cells_along(
            geodesy::distance(start, Coordinate::new(start.lat, end.lng)),
            edge_m,
        )?;

        let mut rows = Vec::with_capacity(grid_length);
        let mut row_start = start;
        for _ in 0..grid_length {
            let mut row = Vec::with_capacity(grid_width);
            let mut current = row_start;
            for _ in 0..grid_width {
                row.push(Cell::new(current, edge_m));
                current = geodesy::offset(current, edge_m, 0.0);
            }
            rows.push(row);
            row_start = Coordinate::new(geodesy::offset(row_start, 0.0, edge_m).lat, start.lng);
        }

        debug!(grid_length, grid_width, edge_m, "Grid built");

        Ok(Self {
            anchor: start,
            edge_m,
            grid_length,
            grid_width,
            rows,
        })
    }

    /// Number of rows (latitude steps).
    pub const fn grid_length(&self) -> usize {
        self.grid_length
    }

    /// Number of columns (longitude steps).
    pub const fn grid_width(&self) -> usize {
        self.grid_width
    }

    /// `(grid_length, grid_width)`.
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.grid_length, self.grid_width)
    }

    /// Borrow cell `(i, j)`.
    pub fn cell(&self, i: usize, j: usize) -> Option<&Cell> {
        self.rows.get(i).and_then(|row| row.get(j))
    }

    /// Mutably borrow cell `(i, j)`.
    pub fn cell_mut(&mut self, i: usize, j: usize) -> Option<&mut Cell> {
        self.rows.get_mut(i).and_then(|row| row.get_mut(j))
    }

    /// Iterate rows in order of increasing latitude.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Iterate every cell mutably, row-major.
    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.rows.iter_mut().flatten()
    }

    /// Iterate `((i, j), cell)` for cells holding at least one entry.
    pub fn contaminated_cells(&self) -> impl Iterator<Item = ((usize, usize), &Cell)> {
        self.rows.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_clean())
                .map(move |(j, cell)| ((i, j), cell))
        })
    }

    /// Locate the cell a point emitter belongs to.
    ///
    /// Picks the first row whose latitude band `[row i, row i+1)` contains the
    /// point, then the first column in that row whose longitude band
    /// `[col j, col j+1)` contains it. Falls back to the last row or column
    /// when no band matches, so the result is always a valid index.
    pub fn home_cell(&self, point: Coordinate) -> (usize, usize) {
        let last_row = self.grid_length.saturating_sub(1);
        let last_col = self.grid_width.saturating_sub(1);

        let i = self
            .rows
            .windows(2)
            .position(|pair| match pair {
                [lower, upper] => row_lat(lower) <= point.lat && point.lat < row_lat(upper),
                _ => false,
            })
            .unwrap_or(last_row);

        let j = self
            .rows
            .get(i)
            .and_then(|row| {
                row.windows(2).position(|pair| match pair {
                    [west, east] => west.corner.lng <= point.lng && point.lng < east.corner.lng,
                    _ => false,
                })
            })
            .unwrap_or(last_col);

        (i, j)
    }

    /// Locate the cell whose footprint contains `point`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if no cell contains the point.
    pub fn containing_cell(&self, point: Coordinate) -> Result<(usize, usize), WorldError> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.first().is_some_and(|cell| cell.lat_band_contains(point.lat)))
            .find_map(|(i, row)| {
                row.iter()
                    .position(|cell| cell.lng_band_contains(point.lng))
                    .map(|j| (i, j))
            })
            .ok_or(WorldError::OutOfBounds {
                lat: point.lat,
                lng: point.lng,
            })
    }
}

/// Latitude of a row's anchor cell. NaN for an empty row so no band matches.
fn row_lat(row: &[Cell]) -> f64 {
    row.first().map_or(f64::NAN, |cell| cell.corner.lat)
}

/// Number of cells needed to cover `extent_m` with cells of `edge_m`.
fn cells_along(extent_m: f64, edge_m: f64) -> Result<usize, WorldError> {
    let count = (extent_m / edge_m).ceil();
    if !count.is_finite() || count <= 0.0 {
        return Err(invalid_extent(format!(
            "extent of {extent_m} m yields no cells of {edge_m} m"
        )));
    }
    if count > f64::from(MAX_CELLS_PER_AXIS) {
        return Err(invalid_extent(format!(
            "extent of {extent_m} m needs {count} cells of {edge_m} m, limit is {MAX_CELLS_PER_AXIS}"
        )));
    }
    // In range 1..=MAX_CELLS_PER_AXIS, checked above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cells = count as u32;
    usize::try_from(cells).map_err(|_err| invalid_extent("cell count exceeds usize range"))
}

fn invalid_extent(reason: impl Into<String>) -> WorldError {
    WorldError::InvalidExtent {
        reason: reason.into(),
    }
}
