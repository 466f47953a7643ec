//! Drives one scenario through a [`SimulationStore`].
//!
//! Frames are advanced in requests no larger than the store's per-request
//! limit. Injections are applied once the timeline reaches their tick, so an
//! injection at tick `t` lands in frame `t` and propagates from `t + 1`.

use plume_core::SimulationStore;
use plume_types::{ContaminationEntry, SimulationId, SimulationInfo, SparseFrame};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::scenario::Scenario;

/// What a run produces: the final simulation summary and the exported frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Summary after the last frame.
    pub simulation: SimulationInfo,
    /// Sparse exports, in the order the scenario listed them.
    pub frames: Vec<SparseFrame>,
}

/// Run `scenario` to completion on `store`.
///
/// `default_edge_m` is used when the scenario omits a cell edge length and
/// `max_step` caps each advance request.
///
/// # Errors
///
/// Returns [`EngineError::Store`] if any simulation operation fails.
pub fn run(
    store: &SimulationStore,
    scenario: &Scenario,
    default_edge_m: f64,
    max_step: usize,
) -> Result<RunOutcome, EngineError> {
    let edge_m = scenario.cell_edge_m.unwrap_or(default_edge_m);
    let id = store.create(scenario.start, scenario.end, edge_m)?;

    for source in &scenario.sources {
        store.add_source(id, source.clone())?;
    }
    for wind in &scenario.winds {
        store.add_wind(id, wind.tick, wind.vector())?;
    }

    let mut injections: Vec<_> = scenario.injections.iter().collect();
    injections.sort_by_key(|injection| injection.tick);

    let mut tick = 0;
    for injection in injections {
        tick = advance_to(store, id, tick, injection.tick, max_step)?;
        let cell = store.inject_contamination(
            id,
            injection.location,
            ContaminationEntry::new(injection.material.clone(), injection.level),
        )?;
        debug!(tick, row = cell.0, col = cell.1, "Injection applied");
    }
    tick = advance_to(store, id, tick, scenario.frames, max_step)?;

    let frames = scenario
        .export
        .iter()
        .map(|&index| store.sparse_export(id, index))
        .collect::<Result<Vec<_>, _>>()?;
    let simulation = store.info(id)?;

    info!(
        simulation_id = %id,
        last_tick = tick,
        frame_count = simulation.frame_count,
        exported = frames.len(),
        "Scenario finished"
    );

    Ok(RunOutcome { simulation, frames })
}

/// Advance from `tick` to `target` in steps of at most `max_step` frames.
fn advance_to(
    store: &SimulationStore,
    id: SimulationId,
    tick: u64,
    target: u64,
    max_step: usize,
) -> Result<u64, EngineError> {
    let max_step = max_step.max(1);
    let mut current = tick;
    while current < target {
        let remaining = target.saturating_sub(current);
        let step = usize::try_from(remaining).map_or(max_step, |r| r.min(max_step));
        store.advance_frames(id, step)?;
        current = current.saturating_add(u64::try_from(step).unwrap_or(u64::MAX));
    }
    Ok(current)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use plume_core::ContaminationPolicy;

    use super::*;

    const SCENARIO: &str = r"
start: { lat: 0.0, lng: 0.0 }
end: { lat: 0.01, lng: 0.01 }
sources:
  - location: { lat: 0.005, lng: 0.005 }
    height: 0.0
    material: chlorine
    power: 1000.0
    dispersion_horizontal: 50.0
    dispersion_vertical: 50.0
winds:
  - { tick: 0, direction: 90.0, speed: 1.0 }
injections:
  - tick: 2
    location: { lat: 0.001, lng: 0.001 }
    material: smoke
    level: 3.0
frames: 7
export: [0, 2, -1]
";

    #[test]
    fn run_advances_in_limited_steps_and_exports() {
        let store = SimulationStore::new(3, ContaminationPolicy::Accumulate);
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let outcome = run(&store, &scenario, 100.0, 3).unwrap();

        assert_eq!(outcome.simulation.frame_count, 8);
        assert_eq!(outcome.frames.len(), 3);

        let ticks: Vec<u64> = outcome.frames.iter().map(|frame| frame.tick).collect();
        assert_eq!(ticks, vec![0, 2, 7]);
        assert!(outcome.frames.first().unwrap().cells.is_empty());
    }

    #[test]
    fn injection_lands_in_its_frame() {
        let store = SimulationStore::default();
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let outcome = run(&store, &scenario, 100.0, 1000).unwrap();

        let frame_two = outcome.frames.get(1).unwrap();
        let smoke_cells = frame_two
            .cells
            .iter()
            .filter(|cell| {
                cell.contaminations
                    .iter()
                    .any(|entry| entry.material.as_str() == "smoke")
            })
            .count();
        assert_eq!(smoke_cells, 1);
    }

    #[test]
    fn scenario_edge_falls_back_to_default() {
        let store = SimulationStore::default();
        let scenario = Scenario::parse(
            "start: { lat: 0.0, lng: 0.0 }\nend: { lat: 0.01, lng: 0.01 }\nframes: 0\n",
        )
        .unwrap();
        let outcome = run(&store, &scenario, 200.0, 10).unwrap();
        assert!((outcome.simulation.cell_edge_m - 200.0).abs() < f64::EPSILON);
        assert_eq!(outcome.simulation.grid_length, 6);
        assert_eq!(outcome.simulation.frame_count, 1);
    }
}
