//! Scenario files describing one headless run.
//!
//! A scenario names the grid extent, the sources, the wind changes, any
//! direct injections, how many frames to advance, and which frames to
//! export. Everything but the corners has a default.

use std::path::Path;

use plume_types::{Coordinate, MaterialId, Source, WindVector};
use serde::Deserialize;

use crate::error::EngineError;

/// A complete run description, deserialized from YAML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// South-west corner of the grid.
    pub start: Coordinate,

    /// North-east corner of the grid.
    pub end: Coordinate,

    /// Cell edge length in meters; falls back to the configured default.
    #[serde(default)]
    pub cell_edge_m: Option<f64>,

    /// Emitters registered before the first advance.
    #[serde(default)]
    pub sources: Vec<Source>,

    /// Wind changes keyed by the tick they take effect.
    #[serde(default)]
    pub winds: Vec<ScheduledWind>,

    /// Contamination written directly into the grid at a given tick.
    #[serde(default)]
    pub injections: Vec<Injection>,

    /// Number of frames to advance past frame 0.
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// Frame indices to export; `-1` is the latest.
    #[serde(default = "default_export")]
    pub export: Vec<i64>,
}

/// One entry of the wind schedule.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScheduledWind {
    /// Tick the wind starts blowing at.
    pub tick: u64,
    /// Degrees clockwise from north, toward which the wind blows.
    pub direction: f64,
    /// Meters per second.
    pub speed: f64,
}

impl ScheduledWind {
    /// The wind as a vector.
    pub const fn vector(self) -> WindVector {
        WindVector::new(self.direction, self.speed)
    }
}

/// Contamination placed directly into a cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Injection {
    /// Frame the injection lands in; `0` is the initial grid.
    #[serde(default)]
    pub tick: u64,
    /// Point inside the target cell.
    pub location: Coordinate,
    /// Injected material.
    pub material: MaterialId,
    /// Injected level.
    pub level: f64,
}

impl Scenario {
    /// Load a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read, or
    /// [`EngineError::Scenario`] / [`EngineError::InvalidScenario`] if its
    /// content is not a valid scenario.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse a scenario from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scenario`] if the YAML does not describe a
    /// scenario, or [`EngineError::InvalidScenario`] if an injection falls
    /// after the last advanced frame.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        let scenario: Self = serde_yml::from_str(yaml)?;
        if let Some(late) = scenario.injections.iter().find(|inj| inj.tick > scenario.frames) {
            return Err(EngineError::InvalidScenario {
                reason: format!(
                    "injection at tick {} is after the last frame (tick {})",
                    late.tick, scenario.frames
                ),
            });
        }
        Ok(scenario)
    }
}

const fn default_frames() -> u64 {
    1
}

fn default_export() -> Vec<i64> {
    vec![-1]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_scenario() {
        let yaml = r"
start: { lat: 0.0, lng: 0.0 }
end: { lat: 0.01, lng: 0.01 }
";
        let scenario = Scenario::parse(yaml).unwrap();
        assert_eq!(scenario.cell_edge_m, None);
        assert!(scenario.sources.is_empty());
        assert_eq!(scenario.frames, 1);
        assert_eq!(scenario.export, vec![-1]);
    }

    #[test]
    fn parse_full_scenario() {
        let yaml = r"
start: { lat: 0.0, lng: 0.0 }
end: { lat: 0.01, lng: 0.01 }
cell_edge_m: 100.0
sources:
  - location: { lat: 0.005, lng: 0.005 }
    height: 0.0
    material: chlorine
    power: 1000.0
    dispersion_horizontal: 50.0
    dispersion_vertical: 50.0
winds:
  - { tick: 0, direction: 90.0, speed: 1.0 }
  - { tick: 5, direction: 180.0, speed: 2.5 }
injections:
  - tick: 2
    location: { lat: 0.001, lng: 0.001 }
    material: smoke
    level: 3.0
frames: 10
export: [0, 5, -1]
";
        let scenario = Scenario::parse(yaml).unwrap();
        assert_eq!(scenario.cell_edge_m, Some(100.0));
        assert_eq!(scenario.sources.len(), 1);
        assert_eq!(scenario.sources.first().unwrap().material.as_str(), "chlorine");
        assert_eq!(scenario.winds.len(), 2);
        assert_eq!(
            scenario.winds.get(1).unwrap().vector(),
            WindVector::new(180.0, 2.5)
        );
        assert_eq!(scenario.injections.first().unwrap().tick, 2);
        assert_eq!(scenario.frames, 10);
        assert_eq!(scenario.export, vec![0, 5, -1]);
    }

    #[test]
    fn missing_corner_is_rejected() {
        let result = Scenario::parse("start: { lat: 0.0, lng: 0.0 }\n");
        assert!(matches!(result, Err(EngineError::Scenario { .. })));
    }

    #[test]
    fn late_injection_is_rejected() {
        let yaml = r"
start: { lat: 0.0, lng: 0.0 }
end: { lat: 0.01, lng: 0.01 }
frames: 2
injections:
  - tick: 3
    location: { lat: 0.001, lng: 0.001 }
    material: smoke
    level: 1.0
";
        assert!(matches!(
            Scenario::parse(yaml),
            Err(EngineError::InvalidScenario { .. })
        ));
    }
}
