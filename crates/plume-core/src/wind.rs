//! Tick-indexed wind schedule with floor lookup.
//!
//! The schedule is sparse: it stores a [`WindVector`] only at the ticks where
//! the wind changes. The wind in effect at tick `t` is the vector stored at
//! the greatest scheduled tick `<= t`. A simulation always seeds tick 0 with
//! [`WindVector::CALM`], so lookups never miss in normal use.

use std::collections::BTreeMap;

use plume_types::WindVector;

/// Errors that can occur during wind schedule operations.
#[derive(Debug, thiserror::Error)]
pub enum WindError {
    /// No wind is scheduled at or before the requested tick.
    #[error("no wind scheduled at or before tick {tick}")]
    NoSchedule {
        /// The tick that was looked up.
        tick: u64,
    },

    /// The wind vector is not physically meaningful.
    #[error("invalid wind: {reason}")]
    InvalidWind {
        /// Explanation of what is wrong with the vector.
        reason: String,
    },
}

/// Sparse mapping from tick to the wind that starts blowing at that tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindSchedule {
    /// Scheduled vectors keyed by the tick they take effect.
    entries: BTreeMap<u64, WindVector>,
}

impl WindSchedule {
    /// Create an empty schedule.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a schedule holding calm air from tick 0.
    pub fn seeded() -> Self {
        let mut schedule = Self::new();
        schedule.entries.insert(0, WindVector::CALM);
        schedule
    }

    /// Insert or overwrite the wind taking effect at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`WindError::InvalidWind`] if the direction or speed is not
    /// finite, or the speed is negative.
    pub fn set(&mut self, tick: u64, wind: WindVector) -> Result<(), WindError> {
        if !wind.direction.is_finite() {
            return Err(WindError::InvalidWind {
                reason: format!("direction must be finite, got {}", wind.direction),
            });
        }
        if !wind.speed.is_finite() || wind.speed < 0.0 {
            return Err(WindError::InvalidWind {
                reason: format!("speed must be a non-negative number, got {}", wind.speed),
            });
        }
        self.entries.insert(tick, wind);
        Ok(())
    }

    /// Return `(scheduled_tick, wind)` for the entry in effect at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`WindError::NoSchedule`] if nothing is scheduled at or
    /// before `tick`.
    pub fn active_entry(&self, tick: u64) -> Result<(u64, WindVector), WindError> {
        self.entries
            .range(..=tick)
            .next_back()
            .map(|(&scheduled, &wind)| (scheduled, wind))
            .ok_or(WindError::NoSchedule { tick })
    }

    /// Return the wind in effect at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`WindError::NoSchedule`] if nothing is scheduled at or
    /// before `tick`.
    pub fn active_wind(&self, tick: u64) -> Result<WindVector, WindError> {
        self.active_entry(tick).map(|(_, wind)| wind)
    }

    /// Iterate `(tick, wind)` pairs in tick order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, WindVector)> + '_ {
        self.entries.iter().map(|(&tick, &wind)| (tick, wind))
    }

    /// Number of scheduled changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_schedule_has_no_wind() {
        let schedule = WindSchedule::new();
        assert!(matches!(
            schedule.active_wind(0),
            Err(WindError::NoSchedule { tick: 0 })
        ));
    }

    #[test]
    fn seeded_schedule_is_calm_everywhere() {
        let schedule = WindSchedule::seeded();
        assert_eq!(schedule.active_wind(0).unwrap(), WindVector::CALM);
        assert_eq!(schedule.active_wind(1_000_000).unwrap(), WindVector::CALM);
    }

    #[test]
    fn floor_lookup_picks_latest_change() {
        let mut schedule = WindSchedule::seeded();
        let first = WindVector::new(45.0, 3.0);
        let second = WindVector::new(200.0, 7.5);
        schedule.set(0, first).unwrap();
        schedule.set(5, second).unwrap();

        assert_eq!(schedule.active_wind(3).unwrap(), first);
        assert_eq!(schedule.active_wind(4).unwrap(), first);
        assert_eq!(schedule.active_wind(5).unwrap(), second);
        assert_eq!(schedule.active_wind(7).unwrap(), second);
    }

    #[test]
    fn set_overwrites_existing_tick() {
        let mut schedule = WindSchedule::seeded();
        schedule.set(0, WindVector::new(90.0, 2.0)).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.active_wind(0).unwrap(), WindVector::new(90.0, 2.0));
    }

    #[test]
    fn resolved_key_never_decreases() {
        let mut schedule = WindSchedule::seeded();
        for tick in [3, 10, 11, 40] {
            schedule.set(tick, WindVector::new(10.0, 1.0)).unwrap();
        }
        let mut previous_key = 0;
        for tick in 0..60 {
            let (key, _) = schedule.active_entry(tick).unwrap();
            assert!(key >= previous_key, "key went back at tick {tick}");
            assert!(key <= tick);
            previous_key = key;
        }
    }

    #[test]
    fn lookup_before_first_entry_fails() {
        let mut schedule = WindSchedule::new();
        schedule.set(10, WindVector::new(0.0, 1.0)).unwrap();
        assert!(schedule.active_wind(9).is_err());
        assert!(schedule.active_wind(10).is_ok());
    }

    #[test]
    fn invalid_vectors_are_rejected() {
        let mut schedule = WindSchedule::seeded();
        assert!(schedule.set(1, WindVector::new(f64::NAN, 1.0)).is_err());
        assert!(schedule.set(1, WindVector::new(0.0, -1.0)).is_err());
        assert!(schedule.set(1, WindVector::new(0.0, f64::INFINITY)).is_err());
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn entries_iterate_in_tick_order() {
        let mut schedule = WindSchedule::seeded();
        schedule.set(9, WindVector::new(1.0, 1.0)).unwrap();
        schedule.set(4, WindVector::new(2.0, 2.0)).unwrap();
        let ticks: Vec<u64> = schedule.entries().map(|(tick, _)| tick).collect();
        assert_eq!(ticks, vec![0, 4, 9]);
    }
}
