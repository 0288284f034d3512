//! Discrete optimization horizon shared by all components of a model.

use crate::error::{ComponentError, ComponentResult};
use chrono::{NaiveDateTime, TimeDelta};
use dh_core::numeric::{Tolerances, nearly_equal};
use dh_core::units::Time;
use serde::{Deserialize, Serialize};
use uom::si::time::second;

/// Horizon duration split into `n_steps` equal steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizon {
    duration_s: f64,
    step_s: f64,
    n_steps: usize,
}

impl Horizon {
    pub fn new(duration: Time, step: Time) -> ComponentResult<Self> {
        Self::from_seconds(duration.get::<second>(), step.get::<second>())
    }

    /// Build a horizon from plain seconds.
    ///
    /// Both values must be positive and finite, and the duration must hold a
    /// whole number of steps.
    pub fn from_seconds(duration_s: f64, step_s: f64) -> ComponentResult<Self> {
        let bad = |what: String| ComponentError::config("horizon", what);
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(bad(format!("duration must be positive, got {duration_s} s")));
        }
        if !(step_s.is_finite() && step_s > 0.0) {
            return Err(bad(format!("time step must be positive, got {step_s} s")));
        }
        let steps = duration_s / step_s;
        let rounded = steps.round();
        if rounded < 1.0 || !nearly_equal(steps, rounded, Tolerances::default()) {
            return Err(bad(format!(
                "duration {duration_s} s is not a multiple of the time step {step_s} s"
            )));
        }
        Ok(Self {
            duration_s,
            step_s,
            n_steps: rounded as usize,
        })
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn step_s(&self) -> f64 {
        self.step_s
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Seconds from the start of the horizon to step `k`.
    pub fn offset_s(&self, k: usize) -> f64 {
        k as f64 * self.step_s
    }

    /// Wall-clock time of step `k`.
    pub fn time_of(&self, start: NaiveDateTime, k: usize) -> NaiveDateTime {
        let millis = (self.offset_s(k) * 1000.0).round() as i64;
        start + TimeDelta::milliseconds(millis)
    }

    /// Wall-clock times of every step.
    pub fn times(&self, start: NaiveDateTime) -> Vec<NaiveDateTime> {
        (0..self.n_steps).map(|k| self.time_of(start, k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dh_core::units::{hours, s};

    #[test]
    fn one_day_hourly() {
        let h = Horizon::new(hours(24.0), hours(1.0)).unwrap();
        assert_eq!(h.n_steps(), 24);
        assert_eq!(h.step_s(), 3600.0);
        assert_eq!(h.offset_s(3), 10_800.0);
    }

    #[test]
    fn rejects_partial_steps() {
        assert!(Horizon::new(s(100.0), s(30.0)).is_err());
        assert!(Horizon::from_seconds(0.0, 10.0).is_err());
        assert!(Horizon::from_seconds(100.0, -1.0).is_err());
        assert!(Horizon::from_seconds(f64::NAN, 1.0).is_err());
        assert!(Horizon::from_seconds(5.0, 10.0).is_err());
    }

    #[test]
    fn step_times() {
        let start = NaiveDate::from_ymd_opt(2014, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let h = Horizon::from_seconds(60.0, 20.0).unwrap();
        let times = h.times(start);
        assert_eq!(times.len(), 3);
        assert_eq!(times[2], start + TimeDelta::seconds(40));
    }
}
