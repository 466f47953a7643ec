//! Registry of live simulations keyed by [`SimulationId`].
//!
//! The map itself sits behind an [`RwLock`] that is held only long enough to
//! insert, remove, or clone out a handle. Each simulation sits behind its own
//! [`Mutex`], so mutating calls on one id are serialized while other ids
//! proceed independently. Lock poisoning is reported as
//! [`StoreError::Poisoned`], never propagated as a panic.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use plume_types::{
    ContaminationEntry, Coordinate, SimulationId, SimulationInfo, Source, SparseFrame, WindVector,
};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::propagation::ContaminationPolicy;
use crate::simulation::{Simulation, SimulationError};
use crate::timeline::Frame;

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No simulation is registered under the id.
    #[error("simulation {id} not found")]
    NotFound {
        /// The id that was looked up.
        id: SimulationId,
    },

    /// A lock was poisoned by a panic in another thread.
    #[error("simulation store lock poisoned")]
    Poisoned,

    /// An advance request asked for more frames than allowed.
    #[error("requested {requested} frames, limit is {limit}")]
    LimitExceeded {
        /// Frames requested.
        requested: usize,
        /// Configured per-request maximum.
        limit: usize,
    },

    /// The simulation rejected the operation.
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Shared handle to one simulation.
type SimulationHandle = Arc<Mutex<Simulation>>;

/// Thread-safe collection of simulations.
#[derive(Debug)]
pub struct SimulationStore {
    /// Live simulations.
    simulations: RwLock<BTreeMap<SimulationId, SimulationHandle>>,
    /// Per-request cap on `advance_frames`.
    max_frames_per_request: usize,
    /// Policy given to newly created simulations.
    policy: ContaminationPolicy,
}

impl Default for SimulationStore {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl SimulationStore {
    /// Create an empty store.
    pub const fn new(max_frames_per_request: usize, policy: ContaminationPolicy) -> Self {
        Self {
            simulations: RwLock::new(BTreeMap::new()),
            max_frames_per_request,
            policy,
        }
    }

    /// Create an empty store from configuration.
    pub const fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.max_frames_per_request, config.contamination_policy)
    }

    /// Build a new simulation and register it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Simulation`] if the grid cannot be built, or
    /// [`StoreError::Poisoned`] if the map lock is poisoned.
    pub fn create(
        &self,
        start: Coordinate,
        end: Coordinate,
        cell_edge_m: f64,
    ) -> Result<SimulationId, StoreError> {
        let simulation = Simulation::with_policy(start, end, cell_edge_m, self.policy)?;
        let id = simulation.id();
        let mut map = self.simulations.write().map_err(|_err| StoreError::Poisoned)?;
        map.insert(id, Arc::new(Mutex::new(simulation)));
        info!(simulation_id = %id, live = map.len(), "Simulation registered");
        Ok(id)
    }

    /// Drop a simulation, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the map lock is poisoned.
    pub fn remove(&self, id: SimulationId) -> Result<bool, StoreError> {
        let mut map = self.simulations.write().map_err(|_err| StoreError::Poisoned)?;
        let removed = map.remove(&id).is_some();
        if removed {
            info!(simulation_id = %id, live = map.len(), "Simulation removed");
        }
        Ok(removed)
    }

    /// Ids of all live simulations, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the map lock is poisoned.
    pub fn list(&self) -> Result<Vec<SimulationId>, StoreError> {
        let map = self.simulations.read().map_err(|_err| StoreError::Poisoned)?;
        Ok(map.keys().copied().collect())
    }

    /// Number of live simulations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the map lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        let map = self.simulations.read().map_err(|_err| StoreError::Poisoned)?;
        Ok(map.len())
    }

    /// Register a source on simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if the source is invalid.
    pub fn add_source(&self, id: SimulationId, source: Source) -> Result<(), StoreError> {
        self.with_simulation(id, |sim| sim.add_source(source))
    }

    /// Schedule wind on simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if the wind is invalid.
    pub fn add_wind(&self, id: SimulationId, tick: u64, wind: WindVector) -> Result<(), StoreError> {
        self.with_simulation(id, |sim| sim.add_wind(tick, wind))
    }

    /// Advance simulation `id` by `count` frames and return its frame count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LimitExceeded`] if `count` is above the
    /// configured maximum, [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if advancing fails.
    pub fn advance_frames(&self, id: SimulationId, count: usize) -> Result<usize, StoreError> {
        if count > self.max_frames_per_request {
            warn!(
                simulation_id = %id,
                requested = count,
                limit = self.max_frames_per_request,
                "Advance request over limit"
            );
            return Err(StoreError::LimitExceeded {
                requested: count,
                limit: self.max_frames_per_request,
            });
        }
        self.with_simulation(id, |sim| sim.advance_frames(count))
    }

    /// Inject contamination into the latest frame of simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if the point is outside the grid or the
    /// level is invalid.
    pub fn inject_contamination(
        &self,
        id: SimulationId,
        point: Coordinate,
        entry: ContaminationEntry,
    ) -> Result<(usize, usize), StoreError> {
        self.with_simulation(id, |sim| sim.inject_contamination(point, entry))
    }

    /// Copy of frame `index` (`-1` for latest) of simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if the index does not exist.
    pub fn frame(&self, id: SimulationId, index: i64) -> Result<Frame, StoreError> {
        self.with_simulation(id, |sim| sim.frame(index).cloned())
    }

    /// Sources of simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub fn sources(&self, id: SimulationId) -> Result<Vec<Source>, StoreError> {
        self.with_simulation(id, |sim| Ok(sim.sources().to_vec()))
    }

    /// Wind in effect at `tick` on simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if nothing is scheduled at or before `tick`.
    pub fn wind(&self, id: SimulationId, tick: u64) -> Result<WindVector, StoreError> {
        self.with_simulation(id, |sim| sim.wind_at(tick))
    }

    /// Summary of simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub fn info(&self, id: SimulationId) -> Result<SimulationInfo, StoreError> {
        self.with_simulation(id, |sim| Ok(sim.info()))
    }

    /// Sparse projection of frame `index` of simulation `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or
    /// [`StoreError::Simulation`] if the index does not exist.
    pub fn sparse_export(&self, id: SimulationId, index: i64) -> Result<SparseFrame, StoreError> {
        self.with_simulation(id, |sim| sim.sparse_export(index))
    }

    /// Clone the handle for `id` out of the map.
    fn handle(&self, id: SimulationId) -> Result<SimulationHandle, StoreError> {
        let map = self.simulations.read().map_err(|_err| StoreError::Poisoned)?;
        map.get(&id).cloned().ok_or(StoreError::NotFound { id })
    }

    /// Run `op` with exclusive access to simulation `id`.
    fn with_simulation<T>(
        &self,
        id: SimulationId,
        op: impl FnOnce(&mut Simulation) -> Result<T, SimulationError>,
    ) -> Result<T, StoreError> {
        let handle = self.handle(id)?;
        let Ok(mut simulation) = handle.lock() else {
            warn!(simulation_id = %id, "Simulation lock poisoned");
            return Err(StoreError::Poisoned);
        };
        Ok(op(&mut simulation)?)
    }
}
