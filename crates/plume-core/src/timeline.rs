//! Frames and the append-only frame timeline.
//!
//! A [`Frame`] is a full snapshot of the grid plus the wind and clock state
//! at one tick. Frame *k* is always produced by deep-copying frame *k-1*'s
//! grid and mutating the copy, so no two frames share cell storage. Once a
//! frame is appended to a [`FrameTimeline`] it is only handed out by shared
//! reference; the one exception is direct injection, which writes into the
//! latest frame through the crate-private [`FrameTimeline::latest_mut`].

use plume_types::{FrameId, SparseCell, SparseFrame, WindVector};
use plume_world::Grid;
use serde::Serialize;

/// Errors that can occur when reading the timeline.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The timeline holds no frames.
    #[error("timeline is empty")]
    Empty,

    /// The requested frame index does not exist.
    #[error("frame index {index} out of range (timeline holds {len} frames)")]
    IndexOutOfRange {
        /// The requested index (`-1` means latest).
        index: i64,
        /// Number of frames in the timeline.
        len: usize,
    },
}

/// One time-stepped snapshot of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Unique frame identifier.
    pub id: FrameId,
    /// Tick number; frame 0 is tick 0.
    pub tick: u64,
    /// Minutes since midnight, in `0..1440`.
    pub time_of_day: u32,
    /// Wind direction in effect, normalized to `[0, 360)`.
    pub wind_direction: f64,
    /// Wind speed in effect, meters per second.
    pub wind_speed: f64,
    /// Full grid state at this tick.
    pub grid: Grid,
}

impl Frame {
    /// The tick-0 frame: midnight, calm air, clean grid.
    pub fn initial(grid: Grid) -> Self {
        Self {
            id: FrameId::new(),
            tick: 0,
            time_of_day: 0,
            wind_direction: WindVector::CALM.direction,
            wind_speed: WindVector::CALM.speed,
            grid,
        }
    }

    /// The wind recorded on this frame.
    pub const fn wind(&self) -> WindVector {
        WindVector::new(self.wind_direction, self.wind_speed)
    }

    /// Project the frame onto its contaminated cells only.
    ///
    /// Each cell is reported by its reference corner and the diagonally
    /// opposite corner, in row-major order.
    pub fn sparse(&self) -> SparseFrame {
        let cells = self
            .grid
            .contaminated_cells()
            .map(|(_, cell)| SparseCell {
                corner: cell.corner(),
                opposite_corner: cell.opposite_corner(),
                contaminations: cell.contaminations().to_vec(),
            })
            .collect();

        SparseFrame {
            frame_id: self.id,
            tick: self.tick,
            time_of_day: self.time_of_day,
            wind: self.wind(),
            cells,
        }
    }
}

/// Ordered, append-only sequence of frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTimeline {
    /// Frames in tick order.
    frames: Vec<Frame>,
}

impl FrameTimeline {
    /// Create an empty timeline.
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Create a timeline whose first frame is `initial`.
    pub fn starting_with(initial: Frame) -> Self {
        Self {
            frames: vec![initial],
        }
    }

    /// Append a frame.
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// The most recently appended frame.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::Empty`] if no frame exists.
    pub fn latest(&self) -> Result<&Frame, TimelineError> {
        self.frames.last().ok_or(TimelineError::Empty)
    }

    /// Mutable access to the latest frame, for direct injection only.
    pub(crate) fn latest_mut(&mut self) -> Result<&mut Frame, TimelineError> {
        self.frames.last_mut().ok_or(TimelineError::Empty)
    }

    /// Look up a frame by index; `-1` means the latest frame.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::IndexOutOfRange`] if `index` is below `-1`
    /// or not less than the frame count, and [`TimelineError::Empty`] when
    /// `-1` is requested from an empty timeline.
    pub fn get(&self, index: i64) -> Result<&Frame, TimelineError> {
        if index == -1 {
            return self.latest();
        }
        let out_of_range = || TimelineError::IndexOutOfRange {
            index,
            len: self.frames.len(),
        };
        let position = usize::try_from(index).map_err(|_err| out_of_range())?;
        self.frames.get(position).ok_or_else(out_of_range)
    }

    /// Number of frames.
    pub const fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the timeline holds no frames.
    pub const fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate frames in tick order.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
