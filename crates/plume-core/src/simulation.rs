//! A single simulation: grid timeline, sources, and wind schedule.
//!
//! [`Simulation`] owns everything one run needs and exposes the operations
//! callers drive it with. It is not internally synchronized; the
//! [`SimulationStore`](crate::store::SimulationStore) serializes access to
//! each instance.

use chrono::{DateTime, Utc};
use plume_types::{
    ContaminationEntry, Coordinate, SimulationId, SimulationInfo, Source, SparseFrame, WindVector,
};
use plume_world::{Grid, WorldError};
use tracing::{debug, info};

use crate::propagation::{self, ContaminationPolicy, PropagationError};
use crate::source::{SourceError, SourceRegistry};
use crate::timeline::{Frame, FrameTimeline, TimelineError};
use crate::wind::{WindError, WindSchedule};

/// Errors returned by simulation operations.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Explanation of which argument is wrong.
        reason: String,
    },

    /// Grid construction or lookup failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A source was rejected.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A wind lookup or update failed.
    #[error(transparent)]
    Wind(#[from] WindError),

    /// A frame lookup failed.
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    /// Advancing a frame failed.
    #[error(transparent)]
    Propagation(#[from] PropagationError),
}

/// One contamination run over a fixed grid.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Unique identifier.
    id: SimulationId,
    /// Start corner the grid was built from.
    start: Coordinate,
    /// End corner the grid was built toward.
    end: Coordinate,
    /// Cell edge length in meters.
    cell_edge_m: f64,
    /// `(grid_length, grid_width)`, fixed at creation.
    dimensions: (usize, usize),
    /// When the simulation was created.
    created_at: DateTime<Utc>,
    /// How deposits land in cells across ticks.
    policy: ContaminationPolicy,
    /// Frames produced so far; frame 0 is the clean initial grid.
    timeline: FrameTimeline,
    /// Registered emitters.
    sources: SourceRegistry,
    /// Wind changes keyed by tick.
    winds: WindSchedule,
}

impl Simulation {
    /// Create a simulation with the default accumulation policy.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if the corners and edge length do
    /// not describe a usable grid.
    pub fn new(start: Coordinate, end: Coordinate, cell_edge_m: f64) -> Result<Self, SimulationError> {
        Self::with_policy(start, end, cell_edge_m, ContaminationPolicy::default())
    }

    /// Create a simulation using `policy` for deposits.
    ///
    /// Builds the grid, seeds frame 0 (tick 0, midnight, calm) and schedules
    /// calm air from tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if the corners and edge length do
    /// not describe a usable grid.
    pub fn with_policy(
        start: Coordinate,
        end: Coordinate,
        cell_edge_m: f64,
        policy: ContaminationPolicy,
    ) -> Result<Self, SimulationError> {
        let grid = Grid::build(start, end, cell_edge_m)?;
        let dimensions = grid.dimensions();
        let id = SimulationId::new();

        info!(
            simulation_id = %id,
            grid_length = dimensions.0,
            grid_width = dimensions.1,
            cell_edge_m,
            ?policy,
            "Simulation created"
        );

        Ok(Self {
            id,
            start,
            end,
            cell_edge_m,
            dimensions,
            created_at: Utc::now(),
            policy,
            timeline: FrameTimeline::starting_with(Frame::initial(grid)),
            sources: SourceRegistry::new(),
            winds: WindSchedule::seeded(),
        })
    }

    /// The simulation's identifier.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// The deposit policy in use.
    pub const fn policy(&self) -> ContaminationPolicy {
        self.policy
    }

    /// Summary of the simulation's geometry and progress.
    pub const fn info(&self) -> SimulationInfo {
        SimulationInfo {
            id: self.id,
            start: self.start,
            end: self.end,
            cell_edge_m: self.cell_edge_m,
            grid_length: self.dimensions.0,
            grid_width: self.dimensions.1,
            frame_count: self.timeline.len(),
            created_at: self.created_at,
        }
    }

    /// Register an emitter. It takes effect from the next advanced frame.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Source`] if the source is invalid.
    pub fn add_source(&mut self, source: Source) -> Result<(), SimulationError> {
        debug!(
            simulation_id = %self.id,
            material = %source.material,
            lat = source.location.lat,
            lng = source.location.lng,
            "Registering source"
        );
        self.sources.add(source)?;
        Ok(())
    }

    /// Schedule `wind` to take effect at `tick`, replacing any entry there.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Wind`] if the vector is invalid.
    pub fn add_wind(&mut self, tick: u64, wind: WindVector) -> Result<(), SimulationError> {
        self.winds.set(tick, wind)?;
        debug!(
            simulation_id = %self.id,
            tick,
            direction = wind.direction,
            speed = wind.speed,
            "Wind scheduled"
        );
        Ok(())
    }

    /// Produce and append one frame.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Propagation`] if no wind is scheduled for
    /// the new tick or the tick counter overflows.
    pub fn advance(&mut self) -> Result<&Frame, SimulationError> {
        let next = propagation::advance(
            self.timeline.latest()?,
            &self.sources,
            &self.winds,
            self.policy,
        )?;
        self.timeline.push(next);
        Ok(self.timeline.latest()?)
    }

    /// Advance `count` frames and return the new frame count.
    ///
    /// Frames appended before a failing step are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidArgument`] if `count` is zero, or
    /// the first error from [`Simulation::advance`].
    pub fn advance_frames(&mut self, count: usize) -> Result<usize, SimulationError> {
        if count == 0 {
            return Err(SimulationError::InvalidArgument {
                reason: "frame count must be greater than zero".to_owned(),
            });
        }
        for _ in 0..count {
            self.advance()?;
        }
        info!(
            simulation_id = %self.id,
            advanced = count,
            frame_count = self.timeline.len(),
            "Frames advanced"
        );
        Ok(self.timeline.len())
    }

    /// Write `entry` into the latest frame's cell containing `point`.
    ///
    /// No new frame is produced. Returns the `(row, column)` written to.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidArgument`] for a negative or
    /// non-finite level, and [`SimulationError::World`] if no cell contains
    /// the point.
    pub fn inject_contamination(
        &mut self,
        point: Coordinate,
        entry: ContaminationEntry,
    ) -> Result<(usize, usize), SimulationError> {
        if !entry.level.is_finite() || entry.level < 0.0 {
            return Err(SimulationError::InvalidArgument {
                reason: format!("contamination level must be non-negative, got {}", entry.level),
            });
        }

        let frame = self.timeline.latest_mut()?;
        let (i, j) = frame.grid.containing_cell(point)?;
        let cell = frame
            .grid
            .cell_mut(i, j)
            .ok_or(WorldError::OutOfBounds {
                lat: point.lat,
                lng: point.lng,
            })?;

        debug!(
            simulation_id = %self.id,
            tick = frame.tick,
            row = i,
            col = j,
            material = %entry.material,
            level = entry.level,
            "Contamination injected"
        );
        cell.push_contamination(entry);
        Ok((i, j))
    }

    /// Frame at `index`; `-1` means the latest.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Timeline`] if the index does not exist.
    pub fn frame(&self, index: i64) -> Result<&Frame, SimulationError> {
        Ok(self.timeline.get(index)?)
    }

    /// The most recent frame.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Timeline`] if the timeline is empty.
    pub fn latest(&self) -> Result<&Frame, SimulationError> {
        Ok(self.timeline.latest()?)
    }

    /// Number of frames, including frame 0.
    pub const fn frame_count(&self) -> usize {
        self.timeline.len()
    }

    /// All frames in tick order.
    pub const fn timeline(&self) -> &FrameTimeline {
        &self.timeline
    }

    /// Registered sources in insertion order.
    pub const fn sources(&self) -> &[Source] {
        self.sources.as_slice()
    }

    /// Wind in effect at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Wind`] if nothing is scheduled at or
    /// before `tick`.
    pub fn wind_at(&self, tick: u64) -> Result<WindVector, SimulationError> {
        Ok(self.winds.active_wind(tick)?)
    }

    /// Sparse projection of the frame at `index` (`-1` for latest).
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Timeline`] if the index does not exist.
    pub fn sparse_export(&self, index: i64) -> Result<SparseFrame, SimulationError> {
        Ok(self.frame(index)?.sparse())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use plume_types::MaterialId;

    use super::*;

    fn make_simulation() -> Simulation {
        Simulation::new(Coordinate::new(0.0, 0.0), Coordinate::new(0.01, 0.01), 100.0).unwrap()
    }

    fn make_source() -> Source {
        Source {
            location: Coordinate::new(0.005, 0.005),
            height: 0.0,
            material: MaterialId::from("chlorine"),
            power: 1000.0,
            dispersion_horizontal: 50.0,
            dispersion_vertical: 50.0,
        }
    }

    #[test]
    fn new_simulation_seeds_frame_zero_and_calm_wind() {
        let sim = make_simulation();
        assert_eq!(sim.frame_count(), 1);
        let frame = sim.frame(0).unwrap();
        assert_eq!(frame.tick, 0);
        assert_eq!(frame.time_of_day, 0);
        assert_eq!(sim.wind_at(0).unwrap(), WindVector::CALM);
        assert_eq!(sim.policy(), ContaminationPolicy::Accumulate);
    }

    #[test]
    fn info_reports_geometry_and_progress() {
        let mut sim = make_simulation();
        sim.advance_frames(2).unwrap();
        let info = sim.info();
        assert_eq!(info.id, sim.id());
        assert_eq!((info.grid_length, info.grid_width), (12, 12));
        assert_eq!(info.frame_count, 3);
        assert!((info.cell_edge_m - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_extent_is_reported() {
        let result = Simulation::new(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0), 100.0);
        assert!(matches!(
            result,
            Err(SimulationError::World(WorldError::InvalidExtent { .. }))
        ));
    }

    #[test]
    fn zero_frame_advance_is_rejected() {
        let mut sim = make_simulation();
        assert!(matches!(
            sim.advance_frames(0),
            Err(SimulationError::InvalidArgument { .. })
        ));
        assert_eq!(sim.frame_count(), 1);
    }

    #[test]
    fn advance_frames_returns_new_count() {
        let mut sim = make_simulation();
        assert_eq!(sim.advance_frames(3).unwrap(), 4);
        assert_eq!(sim.latest().unwrap().tick, 3);
    }

    #[test]
    fn invalid_source_is_rejected() {
        let mut sim = make_simulation();
        let result = sim.add_source(Source {
            power: 0.0,
            ..make_source()
        });
        assert!(matches!(result, Err(SimulationError::Source(_))));
        assert!(sim.sources().is_empty());
    }

    #[test]
    fn injection_writes_latest_frame_without_new_frame() {
        let mut sim = make_simulation();
        sim.advance().unwrap();
        let cell = sim
            .inject_contamination(
                Coordinate::new(0.0031, 0.0077),
                ContaminationEntry::new("smoke", 4.0),
            )
            .unwrap();

        assert_eq!(sim.frame_count(), 2);
        let latest = sim.latest().unwrap();
        let (i, j) = cell;
        assert_eq!(latest.grid.cell(i, j).unwrap().contaminations().len(), 1);
        assert_eq!(sim.frame(0).unwrap().grid.contaminated_cells().count(), 0);
    }

    #[test]
    fn injection_rejects_negative_levels() {
        let mut sim = make_simulation();
        for level in [-1.0, f64::NAN, f64::INFINITY] {
            let result = sim.inject_contamination(
                Coordinate::new(0.005, 0.005),
                ContaminationEntry::new("smoke", level),
            );
            assert!(matches!(result, Err(SimulationError::InvalidArgument { .. })));
        }
    }

    #[test]
    fn sources_take_effect_on_next_frame() {
        let mut sim = make_simulation();
        sim.add_source(make_source()).unwrap();
        sim.add_wind(0, WindVector::new(90.0, 1.0)).unwrap();
        assert!(sim.sparse_export(-1).unwrap().cells.is_empty());

        sim.advance().unwrap();
        assert!(!sim.sparse_export(-1).unwrap().cells.is_empty());
        assert!(sim.sparse_export(0).unwrap().cells.is_empty());
    }

    #[test]
    fn reset_policy_drops_injected_entries_on_advance() {
        let mut sim = Simulation::with_policy(
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.01, 0.01),
            100.0,
            ContaminationPolicy::ResetEachTick,
        )
        .unwrap();
        sim.inject_contamination(Coordinate::new(0.001, 0.001), ContaminationEntry::new("smoke", 1.0))
            .unwrap();
        sim.advance().unwrap();
        assert!(sim.sparse_export(-1).unwrap().cells.is_empty());
        assert_eq!(sim.sparse_export(0).unwrap().cells.len(), 1);
    }
}
