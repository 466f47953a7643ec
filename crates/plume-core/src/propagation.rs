//! Per-tick contamination propagation.
//!
//! One call to [`advance`] turns frame *k* into frame *k+1*:
//!
//! 1. Deep-copy the previous grid and step the tick and the clock.
//! 2. Resolve the wind in effect and the tick it was scheduled at.
//! 3. Classify the heading into an [`Octant`] and fold it into a bearing
//!    within `[0, 90]` used to split the wind into its two axis components.
//! 4. For every source, evaluate the Gaussian plume equation over the
//!    [`DownwindRegion`] of its home cell and deposit every strictly positive
//!    level through the [`ContaminationPolicy`].
//!
//! Distances in the plume equation are unsigned haversine lengths measured
//! along each axis, and both velocity components are magnitudes along the
//! corresponding axis.

use core::ops::Range;
use std::f64::consts::PI;

use plume_types::{ContaminationEntry, Coordinate, FrameId, Source, WindVector};
use plume_world::{Cell, Grid, geodesy};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::source::SourceRegistry;
use crate::timeline::Frame;
use crate::wind::{WindError, WindSchedule};

/// Simulated seconds covered by one tick.
pub const SECONDS_PER_TICK: f64 = 60.0;

/// Length of the time-of-day cycle, in ticks (one tick per minute).
pub const MINUTES_PER_DAY: u32 = 1440;

/// Height of the receptor the plume is evaluated at (ground level).
const RECEPTOR_HEIGHT_M: f64 = 0.0;

/// Degrees in a full turn.
const FULL_TURN_DEG: f64 = 360.0;

/// Errors that can occur while advancing a frame.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    /// The wind schedule has no entry for the new tick.
    #[error(transparent)]
    Wind(#[from] WindError),

    /// The tick counter cannot be incremented further.
    #[error("tick counter overflowed after tick {tick}")]
    TickOverflow {
        /// The last tick that was reached.
        tick: u64,
    },
}

// ---------------------------------------------------------------------------
// Octants
// ---------------------------------------------------------------------------

/// Map a heading into `[0, 360)`.
///
/// `rem_euclid` rounds tiny negative headings up to exactly 360, which is
/// folded back to north here.
pub fn normalize_direction(direction: f64) -> f64 {
    let d = direction.rem_euclid(FULL_TURN_DEG);
    if d >= FULL_TURN_DEG { 0.0 } else { d }
}

/// The eight compass sectors a wind heading falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Octant {
    /// Exactly 0 degrees.
    North,
    /// Strictly between 0 and 90 degrees.
    NorthEast,
    /// Exactly 90 degrees.
    East,
    /// Strictly between 90 and 180 degrees.
    SouthEast,
    /// Exactly 180 degrees.
    South,
    /// Strictly between 180 and 270 degrees.
    SouthWest,
    /// Exactly 270 degrees.
    West,
    /// Strictly between 270 and 360 degrees.
    NorthWest,
}

impl Octant {
    /// Classify a heading in degrees clockwise from north.
    ///
    /// The heading is normalized into `[0, 360)` first.
    #[allow(clippy::float_cmp)] // cardinal headings are exact by construction
    pub fn from_direction(direction: f64) -> Self {
        let d = normalize_direction(direction);
        if d == 0.0 {
            Self::North
        } else if d == 90.0 {
            Self::East
        } else if d == 180.0 {
            Self::South
        } else if d == 270.0 {
            Self::West
        } else if d < 90.0 {
            Self::NorthEast
        } else if d < 180.0 {
            Self::SouthEast
        } else if d < 270.0 {
            Self::SouthWest
        } else {
            Self::NorthWest
        }
    }

    /// Fold a heading into its angle from the nearest north/south axis.
    ///
    /// The result lies in `[0, 90]`. Cardinal headings fold through the
    /// sector that starts at them: east and west give 90, north and south
    /// give 0.
    pub fn folded_bearing(self, direction: f64) -> f64 {
        let d = normalize_direction(direction);
        match self {
            Self::North | Self::NorthEast => d,
            Self::East | Self::SouthEast => 180.0 - d,
            Self::South | Self::SouthWest => d - 180.0,
            Self::West | Self::NorthWest => FULL_TURN_DEG - d,
        }
    }
}

impl core::fmt::Display for Octant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::North => "N",
            Self::NorthEast => "NE",
            Self::East => "E",
            Self::SouthEast => "SE",
            Self::South => "S",
            Self::SouthWest => "SW",
            Self::West => "W",
            Self::NorthWest => "NW",
        };
        f.write_str(name)
    }
}

/// The sub-rectangle of cells a source is evaluated over.
///
/// Both ranges are half-open and always include the source's own row and
/// column. North means increasing row index, east increasing column index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownwindRegion {
    /// Row indices to evaluate.
    pub rows: Range<usize>,
    /// Column indices to evaluate.
    pub cols: Range<usize>,
}

impl DownwindRegion {
    /// Region downwind of `home` for a wind in `octant` on a grid of
    /// `(grid_length, grid_width)` cells.
    pub fn new(octant: Octant, home: (usize, usize), dimensions: (usize, usize)) -> Self {
        let (i, j) = home;
        let (grid_length, grid_width) = dimensions;

        let all_rows = 0..grid_length;
        let all_cols = 0..grid_width;
        let north = i.min(grid_length)..grid_length;
        let south = 0..i.saturating_add(1).min(grid_length);
        let east = j.min(grid_width)..grid_width;
        let west = 0..j.saturating_add(1).min(grid_width);

        let (rows, cols) = match octant {
            Octant::North => (north, all_cols),
            Octant::South => (south, all_cols),
            Octant::East => (all_rows, east),
            Octant::West => (all_rows, west),
            Octant::NorthEast => (north, east),
            Octant::SouthEast => (south, east),
            Octant::SouthWest => (south, west),
            Octant::NorthWest => (north, west),
        };
        Self { rows, cols }
    }

    /// Whether `(i, j)` lies inside the region.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.rows.contains(&i) && self.cols.contains(&j)
    }

    /// Number of cells in the region.
    pub fn cell_count(&self) -> usize {
        self.rows.len().saturating_mul(self.cols.len())
    }

    /// Iterate `(i, j)` row-major.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .clone()
            .flat_map(move |i| self.cols.clone().map(move |j| (i, j)))
    }
}

// ---------------------------------------------------------------------------
// Plume equation
// ---------------------------------------------------------------------------

/// Wind velocity split along the grid axes, in meters per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    /// Component along the latitude (row) axis.
    pub along_lat: f64,
    /// Component along the longitude (column) axis.
    pub along_lng: f64,
}

impl Drift {
    /// Split `speed` using a bearing already folded into `[0, 90]`.
    pub fn from_folded(speed: f64, bearing_deg: f64) -> Self {
        let bearing = bearing_deg.to_radians();
        Self {
            along_lat: speed * bearing.cos(),
            along_lng: speed * bearing.sin(),
        }
    }
}

/// Ticks spent under the current wind, counting the first tick as 1.
///
/// `scheduled` is the tick the active wind entry was stored at. An entry at
/// tick 0 is treated as starting at tick 1, the first advanced frame.
pub const fn wind_tick(tick: u64, scheduled: u64) -> u64 {
    let start = if scheduled == 0 { 1 } else { scheduled };
    tick.saturating_sub(start).saturating_add(1)
}

/// Gaussian plume concentration from `source` at a cell anchored at
/// `cell_corner`, `wind_tick` ticks after the current wind started.
///
/// The downwind displacement `drift · wind_tick · 60 s` is subtracted from
/// the unsigned axis distances, and a ground-reflection term accounts for
/// the source height.
pub fn plume_level(source: &Source, cell_corner: Coordinate, drift: Drift, wind_tick: u64) -> f64 {
    let origin = source.location;
    let dx = geodesy::distance(Coordinate::new(cell_corner.lat, origin.lng), origin);
    let dy = geodesy::distance(Coordinate::new(origin.lat, cell_corner.lng), origin);

    // Exact for any realistic tick count.
    #[allow(clippy::cast_precision_loss)]
    let elapsed_s = wind_tick as f64 * SECONDS_PER_TICK;

    let sigma_h = source.dispersion_horizontal;
    let sigma_v = source.dispersion_vertical;
    let two_sigma_h_sq = 2.0 * sigma_h * sigma_h;
    let two_sigma_v_sq = 2.0 * sigma_v * sigma_v;

    let scale = source.power / ((2.0 * PI).powf(1.5) * sigma_v * sigma_h * sigma_h);
    let along_lat = (-drift.along_lat.mul_add(-elapsed_s, dx).powi(2) / two_sigma_h_sq).exp();
    let along_lng = (-drift.along_lng.mul_add(-elapsed_s, dy).powi(2) / two_sigma_h_sq).exp();
    let reflection = (-(RECEPTOR_HEIGHT_M - source.height).powi(2) / two_sigma_v_sq).exp()
        + (-(RECEPTOR_HEIGHT_M + source.height).powi(2) / two_sigma_v_sq).exp();

    scale * along_lat * along_lng * reflection
}

// ---------------------------------------------------------------------------
// Accumulation policy
// ---------------------------------------------------------------------------

/// How newly computed levels land in a cell across ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContaminationPolicy {
    /// Entries persist forever; every tick appends on top of the last.
    #[default]
    Accumulate,
    /// Every cell is cleared at the start of a tick before new deposits.
    ResetEachTick,
}

impl ContaminationPolicy {
    /// Prepare a freshly copied grid for the tick's deposits.
    pub fn begin_tick(self, grid: &mut Grid) {
        match self {
            Self::Accumulate => {}
            Self::ResetEachTick => grid.cells_mut().for_each(Cell::clear_contaminations),
        }
    }

    /// Record one deposit in `cell`.
    pub fn deposit(self, cell: &mut Cell, entry: ContaminationEntry) {
        match self {
            Self::Accumulate | Self::ResetEachTick => cell.push_contamination(entry),
        }
    }
}

// ---------------------------------------------------------------------------
// Advancing
// ---------------------------------------------------------------------------

/// Counters reported by one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Cells the plume equation was evaluated for.
    pub cells_evaluated: usize,
    /// Entries deposited.
    pub entries_added: usize,
}

/// Evaluate every source against `grid` under `wind` and deposit the results.
pub fn propagate(
    grid: &mut Grid,
    sources: &SourceRegistry,
    wind: WindVector,
    wind_tick: u64,
    policy: ContaminationPolicy,
) -> PropagationStats {
    let octant = Octant::from_direction(wind.direction);
    let drift = Drift::from_folded(wind.speed, octant.folded_bearing(wind.direction));
    let dimensions = grid.dimensions();
    let mut stats = PropagationStats::default();

    for source in sources.iter() {
        let home = grid.home_cell(source.location);
        let region = DownwindRegion::new(octant, home, dimensions);
        trace!(
            material = %source.material,
            row = home.0,
            col = home.1,
            region_cells = region.cell_count(),
            "Source home cell"
        );

        for (i, j) in region.cells() {
            let Some(cell) = grid.cell_mut(i, j) else {
                continue;
            };
            stats.cells_evaluated = stats.cells_evaluated.saturating_add(1);

            let level = plume_level(source, cell.corner(), drift, wind_tick);
            // NaN fails this comparison and is never deposited.
            if level > 0.0 {
                policy.deposit(cell, ContaminationEntry::new(source.material.clone(), level));
                stats.entries_added = stats.entries_added.saturating_add(1);
            }
        }
    }

    stats
}

/// Produce the frame following `previous`.
///
/// The previous frame is never modified.
///
/// # Errors
///
/// Returns [`PropagationError::Wind`] if no wind is scheduled for the new
/// tick, or [`PropagationError::TickOverflow`] if the tick cannot advance.
pub fn advance(
    previous: &Frame,
    sources: &SourceRegistry,
    winds: &WindSchedule,
    policy: ContaminationPolicy,
) -> Result<Frame, PropagationError> {
    let tick = previous
        .tick
        .checked_add(1)
        .ok_or(PropagationError::TickOverflow {
            tick: previous.tick,
        })?;
    let (scheduled, scheduled_wind) = winds.active_entry(tick)?;
    let wind = WindVector::new(
        normalize_direction(scheduled_wind.direction),
        scheduled_wind.speed,
    );
    let elapsed = wind_tick(tick, scheduled);

    let mut grid = previous.grid.clone();
    policy.begin_tick(&mut grid);
    let stats = propagate(&mut grid, sources, wind, elapsed, policy);

    debug!(
        tick,
        octant = %Octant::from_direction(wind.direction),
        wind_direction = wind.direction,
        wind_speed = wind.speed,
        wind_tick = elapsed,
        cells_evaluated = stats.cells_evaluated,
        entries_added = stats.entries_added,
        "Frame advanced"
    );

    Ok(Frame {
        id: FrameId::new(),
        tick,
        time_of_day: next_time_of_day(previous.time_of_day),
        wind_direction: wind.direction,
        wind_speed: wind.speed,
        grid,
    })
}

/// Step the clock by one minute, wrapping at midnight.
const fn next_time_of_day(minutes: u32) -> u32 {
    let next = minutes.saturating_add(1);
    if next >= MINUTES_PER_DAY { 0 } else { next }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use plume_types::MaterialId;

    use super::*;

    fn scenario_grid() -> Grid {
        Grid::build(Coordinate::new(0.0, 0.0), Coordinate::new(0.01, 0.01), 100.0).unwrap()
    }

    fn center_source() -> Source {
        Source {
            location: Coordinate::new(0.005, 0.005),
            height: 0.0,
            material: MaterialId::from("chlorine"),
            power: 1000.0,
            dispersion_horizontal: 50.0,
            dispersion_vertical: 50.0,
        }
    }

    fn registry_with(source: Source) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.add(source).unwrap();
        registry
    }

    #[test]
    fn octants_from_direction() {
        let cases = [
            (0.0, Octant::North),
            (45.0, Octant::NorthEast),
            (90.0, Octant::East),
            (135.0, Octant::SouthEast),
            (180.0, Octant::South),
            (225.0, Octant::SouthWest),
            (270.0, Octant::West),
            (315.0, Octant::NorthWest),
            (360.0, Octant::North),
            (450.0, Octant::East),
            (-90.0, Octant::West),
            (89.999, Octant::NorthEast),
        ];
        for (direction, expected) in cases {
            assert_eq!(Octant::from_direction(direction), expected, "direction {direction}");
        }
    }

    #[test]
    fn tiny_negative_heading_normalizes_to_north() {
        let heading: f64 = -1e-20;
        assert!(heading.rem_euclid(FULL_TURN_DEG) >= FULL_TURN_DEG);
        assert!(normalize_direction(heading).abs() < f64::EPSILON);
        assert_eq!(Octant::from_direction(heading), Octant::North);
        assert!((normalize_direction(-90.0) - 270.0).abs() < 1e-12);
        assert!((normalize_direction(725.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn bearings_fold_into_quarter_turn() {
        let cases = [
            (0.0, 0.0),
            (30.0, 30.0),
            (90.0, 90.0),
            (120.0, 60.0),
            (180.0, 0.0),
            (200.0, 20.0),
            (270.0, 90.0),
            (300.0, 60.0),
        ];
        for (direction, expected) in cases {
            let folded = Octant::from_direction(direction).folded_bearing(direction);
            assert!((folded - expected).abs() < 1e-9, "{direction} folded to {folded}");
        }
    }

    #[test]
    fn regions_follow_the_octant() {
        let home = (5, 5);
        let dims = (12, 12);
        let cases = [
            (Octant::North, 5..12, 0..12),
            (Octant::South, 0..6, 0..12),
            (Octant::East, 0..12, 5..12),
            (Octant::West, 0..12, 0..6),
            (Octant::NorthEast, 5..12, 5..12),
            (Octant::SouthEast, 0..6, 5..12),
            (Octant::SouthWest, 0..6, 0..6),
            (Octant::NorthWest, 5..12, 0..6),
        ];
        for (octant, rows, cols) in cases {
            assert_eq!(
                DownwindRegion::new(octant, home, dims),
                DownwindRegion { rows, cols },
                "octant {octant}"
            );
        }
    }

    #[test]
    fn regions_always_include_the_home_cell() {
        let dims = (12, 9);
        let octants = [
            Octant::North,
            Octant::NorthEast,
            Octant::East,
            Octant::SouthEast,
            Octant::South,
            Octant::SouthWest,
            Octant::West,
            Octant::NorthWest,
        ];
        for octant in octants {
            for home in [(0, 0), (11, 8), (0, 8), (11, 0), (6, 4)] {
                let region = DownwindRegion::new(octant, home, dims);
                assert!(region.contains(home.0, home.1), "{octant} at {home:?}");
                assert_eq!(region.cells().count(), region.cell_count());
            }
        }
    }

    #[test]
    fn wind_tick_restarts_when_wind_changes() {
        assert_eq!(wind_tick(1, 0), 1);
        assert_eq!(wind_tick(3, 0), 3);
        assert_eq!(wind_tick(5, 5), 1);
        assert_eq!(wind_tick(7, 5), 3);
    }

    #[test]
    fn drift_components_split_speed() {
        let north = Drift::from_folded(4.0, 0.0);
        assert!((north.along_lat - 4.0).abs() < 1e-12);
        assert!(north.along_lng.abs() < 1e-12);

        let east = Drift::from_folded(4.0, 90.0);
        assert!(east.along_lat.abs() < 1e-12);
        assert!((east.along_lng - 4.0).abs() < 1e-12);
    }

    #[test]
    fn calm_level_falls_off_with_distance() {
        let source = center_source();
        let calm = Drift::from_folded(0.0, 0.0);
        let near = plume_level(&source, Coordinate::new(0.0049, 0.0049), calm, 1);
        let far = plume_level(&source, Coordinate::new(0.0020, 0.0020), calm, 1);
        assert!(near > far);
        assert!(far >= 0.0);
    }

    #[test]
    fn elevated_source_deposits_less_at_ground() {
        let calm = Drift::from_folded(0.0, 0.0);
        let corner = Coordinate::new(0.0049, 0.0049);
        let ground = plume_level(&center_source(), corner, calm, 1);
        let stack = Source {
            height: 60.0,
            ..center_source()
        };
        assert!(plume_level(&stack, corner, calm, 1) < ground);
    }

    #[test]
    fn east_wind_contaminates_downwind_only() {
        let mut grid = scenario_grid();
        let sources = registry_with(center_source());
        let stats = propagate(
            &mut grid,
            &sources,
            WindVector::new(90.0, 2.0),
            1,
            ContaminationPolicy::Accumulate,
        );

        assert_eq!(grid.home_cell(Coordinate::new(0.005, 0.005)), (5, 5));
        let east = grid.cell(5, 6).unwrap();
        assert_eq!(east.contaminations().len(), 1);
        assert!(east.contaminations().first().unwrap().level > 0.0);
        assert!(grid.cell(5, 4).unwrap().is_clean());
        assert_eq!(stats.cells_evaluated, 12 * 7);
        assert!(stats.entries_added > 0);
    }

    #[test]
    fn clamped_source_still_deposits() {
        let mut grid = scenario_grid();
        let outside = Coordinate::new(0.02, 0.02);
        let sources = registry_with(Source {
            location: outside,
            ..center_source()
        });
        let stats = propagate(
            &mut grid,
            &sources,
            WindVector::new(225.0, 2.0),
            1,
            ContaminationPolicy::Accumulate,
        );

        assert_eq!(grid.home_cell(outside), (11, 11));
        assert!(stats.entries_added > 0);
        assert!(grid.contaminated_cells().count() > 0);
    }

    #[test]
    fn calm_air_deposits_around_the_source() {
        let mut grid = scenario_grid();
        let sources = registry_with(center_source());
        let stats = propagate(
            &mut grid,
            &sources,
            WindVector::CALM,
            1,
            ContaminationPolicy::Accumulate,
        );

        let home = grid.cell(5, 5).unwrap();
        assert_eq!(home.contaminations().len(), 1);
        assert!(home.contaminations().first().unwrap().level > 0.0);
        assert!(stats.entries_added > 0);
    }

    #[test]
    fn underflowing_levels_are_not_recorded() {
        let mut grid = scenario_grid();
        let sources = registry_with(Source {
            dispersion_horizontal: 0.001,
            dispersion_vertical: 0.001,
            ..center_source()
        });
        let stats = propagate(
            &mut grid,
            &sources,
            WindVector::new(45.0, 2.0),
            1,
            ContaminationPolicy::Accumulate,
        );
        assert_eq!(stats.entries_added, 0);
        assert_eq!(grid.contaminated_cells().count(), 0);
    }

    #[test]
    fn reset_policy_clears_previous_entries() {
        let mut grid = scenario_grid();
        grid.cell_mut(0, 0)
            .unwrap()
            .push_contamination(ContaminationEntry::new("smoke", 1.0));

        ContaminationPolicy::Accumulate.begin_tick(&mut grid);
        assert_eq!(grid.contaminated_cells().count(), 1);

        ContaminationPolicy::ResetEachTick.begin_tick(&mut grid);
        assert_eq!(grid.contaminated_cells().count(), 0);
    }

    #[test]
    fn advance_steps_tick_and_leaves_previous_untouched() {
        let previous = Frame::initial(scenario_grid());
        let sources = registry_with(center_source());
        let mut winds = WindSchedule::seeded();
        winds.set(0, WindVector::new(450.0, 1.0)).unwrap();

        let next = advance(&previous, &sources, &winds, ContaminationPolicy::Accumulate).unwrap();
        assert_eq!(next.tick, 1);
        assert_eq!(next.time_of_day, 1);
        assert!((next.wind_direction - 90.0).abs() < 1e-12);
        assert_ne!(next.id, previous.id);
        assert!(next.grid.contaminated_cells().count() > 0);
        assert_eq!(previous.grid.contaminated_cells().count(), 0);
    }

    #[test]
    fn advance_records_normalized_heading() {
        let previous = Frame::initial(scenario_grid());
        let sources = registry_with(center_source());
        let mut winds = WindSchedule::seeded();
        winds.set(0, WindVector::new(-1e-20, 2.0)).unwrap();

        let next = advance(&previous, &sources, &winds, ContaminationPolicy::Accumulate).unwrap();
        assert!((0.0..FULL_TURN_DEG).contains(&next.wind_direction));
        assert!(!next.grid.cell(6, 6).unwrap().is_clean());
    }

    #[test]
    fn advance_wraps_time_of_day() {
        let mut previous = Frame::initial(scenario_grid());
        previous.tick = 1439;
        previous.time_of_day = 1439;
        let next = advance(
            &previous,
            &SourceRegistry::new(),
            &WindSchedule::seeded(),
            ContaminationPolicy::Accumulate,
        )
        .unwrap();
        assert_eq!(next.tick, 1440);
        assert_eq!(next.time_of_day, 0);
    }

    #[test]
    fn advance_without_schedule_fails() {
        let previous = Frame::initial(scenario_grid());
        let result = advance(
            &previous,
            &SourceRegistry::new(),
            &WindSchedule::new(),
            ContaminationPolicy::Accumulate,
        );
        assert!(matches!(
            result,
            Err(PropagationError::Wind(WindError::NoSchedule { tick: 1 }))
        ));
    }
}
