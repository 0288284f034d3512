//! Scalar and sampled parameters with linear interpolation.
//!
//! A [`TimeSeriesParameter`] is either a single value or an ordered set of
//! `(index, value)` samples. Queries are total: inside the sampled range the
//! two bracketing samples are interpolated linearly, outside it the first or
//! last segment is extended, and a query exactly on a sample index returns the
//! stored value untouched.

use crate::error::{ComponentError, ComponentResult};
use chrono::NaiveDateTime;
use dh_core::numeric::strictly_increasing;

/// What the sample index of a series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// A plain number: volume, distance along a pipe, or seconds from the
    /// start of the horizon.
    Numeric,
    /// Seconds since the Unix epoch, built from timestamps.
    Epoch,
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    Scalar(f64),
    Series { index: Vec<f64>, values: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesParameter {
    name: String,
    description: String,
    unit_source: String,
    unit_target: String,
    /// Multiplier from the source unit to the target unit.
    factor: f64,
    index_kind: IndexKind,
    samples: Samples,
}

fn invalid(name: &str, what: impl Into<String>) -> ComponentError {
    ComponentError::Configuration {
        component: format!("parameter {name}"),
        what: what.into(),
    }
}

impl TimeSeriesParameter {
    pub fn scalar(name: impl Into<String>, value: f64) -> ComponentResult<Self> {
        let name = name.into();
        if !value.is_finite() {
            return Err(invalid(&name, format!("non-finite value {value}")));
        }
        Ok(Self {
            name,
            description: String::new(),
            unit_source: String::new(),
            unit_target: String::new(),
            factor: 1.0,
            index_kind: IndexKind::Numeric,
            samples: Samples::Scalar(value),
        })
    }

    /// Series from `(index, value)` pairs with strictly increasing indices.
    pub fn series(name: impl Into<String>, samples: Vec<(f64, f64)>) -> ComponentResult<Self> {
        Self::build(name.into(), samples, IndexKind::Numeric)
    }

    /// Series indexed by wall-clock time.
    pub fn from_timestamps(
        name: impl Into<String>,
        samples: Vec<(NaiveDateTime, f64)>,
    ) -> ComponentResult<Self> {
        let samples = samples
            .into_iter()
            .map(|(t, v)| (epoch_seconds(t), v))
            .collect();
        Self::build(name.into(), samples, IndexKind::Epoch)
    }

    fn build(name: String, samples: Vec<(f64, f64)>, index_kind: IndexKind) -> ComponentResult<Self> {
        if samples.is_empty() {
            return Err(invalid(&name, "series needs at least one sample"));
        }
        let (index, values): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
        if index.iter().chain(&values).any(|v| !v.is_finite()) {
            return Err(invalid(&name, "series contains non-finite samples"));
        }
        if !strictly_increasing(&index) {
            return Err(invalid(
                &name,
                "series indices must be unique and strictly increasing",
            ));
        }
        let samples = if values.len() == 1 {
            Samples::Scalar(values[0])
        } else {
            Samples::Series { index, values }
        };
        Ok(Self {
            name,
            description: String::new(),
            unit_source: String::new(),
            unit_target: String::new(),
            factor: 1.0,
            index_kind,
            samples,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach units and the factor converting source values to the target unit.
    pub fn with_units(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        factor: f64,
    ) -> Self {
        self.unit_source = source.into();
        self.unit_target = target.into();
        self.factor = factor;
        self
    }

    /// Fill in unit labels left empty, keeping the conversion factor.
    pub(crate) fn label_unit(mut self, unit: &str) -> Self {
        if self.unit_source.is_empty() {
            self.unit_source = unit.to_string();
        }
        if self.unit_target.is_empty() {
            self.unit_target = unit.to_string();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit_source(&self) -> &str {
        &self.unit_source
    }

    pub fn unit_target(&self) -> &str {
        &self.unit_target
    }

    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.samples, Samples::Scalar(_))
    }

    pub fn len(&self) -> usize {
        match &self.samples {
            Samples::Scalar(_) => 1,
            Samples::Series { index, .. } => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// First and last sample index, `None` for scalars.
    pub fn index_range(&self) -> Option<(f64, f64)> {
        match &self.samples {
            Samples::Scalar(_) => None,
            Samples::Series { index, .. } => Some((index[0], index[index.len() - 1])),
        }
    }

    /// Unit-converted value at `x`.
    pub fn value_at(&self, x: f64) -> f64 {
        self.raw_at(x) * self.factor
    }

    /// Value at a wall-clock time (for epoch-indexed series).
    pub fn value_at_time(&self, t: NaiveDateTime) -> f64 {
        self.value_at(epoch_seconds(t))
    }

    /// Values at `n` consecutive steps of `step_s` seconds from `start`.
    ///
    /// Numeric-indexed series are read as seconds relative to `start`.
    pub fn sample(&self, start: NaiveDateTime, step_s: f64, n: usize) -> Vec<f64> {
        let origin = match self.index_kind {
            IndexKind::Numeric => 0.0,
            IndexKind::Epoch => epoch_seconds(start),
        };
        (0..n)
            .map(|k| self.value_at(origin + k as f64 * step_s))
            .collect()
    }

    fn raw_at(&self, x: f64) -> f64 {
        let (index, values) = match &self.samples {
            Samples::Scalar(v) => return *v,
            Samples::Series { index, values } => (index, values),
        };
        let n = index.len();
        let pos = index.partition_point(|&i| i < x);
        if pos < n && index[pos] == x {
            return values[pos];
        }
        let (lo, hi) = if pos == 0 {
            (0, 1)
        } else if pos == n {
            (n - 2, n - 1)
        } else {
            (pos - 1, pos)
        };
        let (x0, x1) = (index[lo], index[hi]);
        let (v0, v1) = (values[lo], values[hi]);
        v0 + (v1 - v0) * (x - x0) / (x1 - x0)
    }
}

pub fn epoch_seconds(t: NaiveDateTime) -> f64 {
    t.and_utc().timestamp_millis() as f64 / 1000.0
}

/// Value handed to `change_param`: a plain number, samples, or a fully
/// described parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(f64),
    Samples(Vec<(f64, f64)>),
    Timed(Vec<(NaiveDateTime, f64)>),
    Parameter(TimeSeriesParameter),
}

impl ParamValue {
    /// Resolve into a parameter called `name`.
    pub fn into_parameter(self, name: &str) -> ComponentResult<TimeSeriesParameter> {
        match self {
            ParamValue::Scalar(v) => TimeSeriesParameter::scalar(name, v),
            ParamValue::Samples(s) => TimeSeriesParameter::series(name, s),
            ParamValue::Timed(s) => TimeSeriesParameter::from_timestamps(name, s),
            ParamValue::Parameter(p) => Ok(p),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Scalar(v)
    }
}

impl From<Vec<(f64, f64)>> for ParamValue {
    fn from(s: Vec<(f64, f64)>) -> Self {
        ParamValue::Samples(s)
    }
}

impl From<Vec<(NaiveDateTime, f64)>> for ParamValue {
    fn from(s: Vec<(NaiveDateTime, f64)>) -> Self {
        ParamValue::Timed(s)
    }
}

impl From<TimeSeriesParameter> for ParamValue {
    fn from(p: TimeSeriesParameter) -> Self {
        ParamValue::Parameter(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn unit_ramp() -> TimeSeriesParameter {
        TimeSeriesParameter::series("cost", vec![(0.0, 0.0), (1.0, 1.0)])
            .unwrap()
            .with_description("cost in function of volume")
            .with_units("EUR", "m3", 1.0)
    }

    #[test]
    fn interpolate() {
        assert_eq!(unit_ramp().value_at(0.5), 0.5);
    }

    #[test]
    fn extrapolate_up() {
        assert_eq!(unit_ramp().value_at(1.5), 1.5);
    }

    #[test]
    fn extrapolate_down() {
        assert_eq!(unit_ramp().value_at(-1.0), -1.0);
    }

    #[test]
    fn exact_index() {
        assert_eq!(unit_ramp().value_at(1.0), 1.0);
    }

    #[test]
    fn scalar_ignores_argument() {
        let p = TimeSeriesParameter::scalar("cost", 10.0).unwrap();
        assert_eq!(p.value_at(1000.0), 10.0);
        assert_eq!(p.value_at(-3.0), 10.0);
    }

    #[test]
    fn scalar_is_unit_converted() {
        let p = TimeSeriesParameter::scalar("fuel_cost", 0.034)
            .unwrap()
            .with_units("EUR/kWh", "EUR/J", 1.0 / 3.6e6);
        assert!((p.value_at(5.0) - 0.034 / 3.6e6).abs() < 1e-18);
    }

    #[test]
    fn single_sample_series_is_scalar() {
        let p = TimeSeriesParameter::series("x", vec![(4.0, 7.0)]).unwrap();
        assert!(p.is_scalar());
        assert_eq!(p.value_at(-100.0), 7.0);
    }

    #[test]
    fn cost_curve_lookup_is_exact() {
        // storage investment table: exact points must come back verbatim
        let p = TimeSeriesParameter::series(
            "cost",
            vec![
                (10_000.0, 577_500.0),
                (40_000.0, 1_885_000.0),
                (100_000.0, 3_300_000.0),
                (200_000.0, 5_400_000.0),
            ],
        )
        .unwrap();
        assert_eq!(p.value_at(40_000.0), 1_885_000.0);
        assert_eq!(p.value_at(25_000.0), 1_231_250.0);
        assert_eq!(p.value_at(220_000.0), 5_820_000.0);
    }

    #[test]
    fn rejects_bad_series() {
        assert!(TimeSeriesParameter::series("x", vec![]).is_err());
        assert!(TimeSeriesParameter::series("x", vec![(0.0, 1.0), (0.0, 2.0)]).is_err());
        assert!(TimeSeriesParameter::series("x", vec![(1.0, 1.0), (0.0, 2.0)]).is_err());
        assert!(TimeSeriesParameter::series("x", vec![(0.0, f64::NAN), (1.0, 2.0)]).is_err());
        assert!(TimeSeriesParameter::scalar("x", f64::INFINITY).is_err());
    }

    #[test]
    fn timestamps_sample_from_start() {
        let day = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
        let t0 = day.and_hms_opt(0, 0, 0).unwrap();
        let t1 = day.and_hms_opt(1, 0, 0).unwrap();
        let p = TimeSeriesParameter::from_timestamps("Te", vec![(t0, 270.0), (t1, 280.0)]).unwrap();
        assert_eq!(p.index_kind(), IndexKind::Epoch);
        assert_eq!(p.sample(t0, 1800.0, 3), vec![270.0, 275.0, 280.0]);
        let half = day.and_hms_opt(0, 30, 0).unwrap();
        assert_eq!(p.value_at_time(half), 275.0);
    }

    #[test]
    fn numeric_series_sample_relative_to_start() {
        let start = NaiveDate::from_ymd_opt(2014, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let p = TimeSeriesParameter::series("q", vec![(0.0, 1.0), (3600.0, 2.0)]).unwrap();
        assert_eq!(p.sample(start, 3600.0, 2), vec![1.0, 2.0]);
    }

    proptest! {
        #[test]
        fn exact_at_every_sample(values in proptest::collection::vec(-1e6f64..1e6, 2..20)) {
            let samples: Vec<(f64, f64)> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64 * 0.37, *v))
                .collect();
            let p = TimeSeriesParameter::series("p", samples.clone()).unwrap();
            for (x, v) in samples {
                prop_assert_eq!(p.value_at(x), v);
            }
        }

        #[test]
        fn interpolation_stays_in_bracket(
            v0 in -1e3f64..1e3,
            v1 in -1e3f64..1e3,
            frac in 0.0f64..1.0,
        ) {
            let p = TimeSeriesParameter::series("p", vec![(2.0, v0), (6.0, v1)]).unwrap();
            let v = p.value_at(2.0 + 4.0 * frac);
            prop_assert!(v >= v0.min(v1) - 1e-9 && v <= v0.max(v1) + 1e-9);
        }

        #[test]
        fn extrapolation_follows_boundary_slope(
            v0 in -1e3f64..1e3,
            v1 in -1e3f64..1e3,
            v2 in -1e3f64..1e3,
            beyond in 0.0f64..50.0,
        ) {
            let p = TimeSeriesParameter::series("p", vec![(0.0, v0), (1.0, v1), (2.0, v2)]).unwrap();
            let expected = v2 + (v2 - v1) * beyond;
            prop_assert!((p.value_at(2.0 + beyond) - expected).abs() < 1e-6);
            let expected_low = v0 - (v1 - v0) * beyond;
            prop_assert!((p.value_at(-beyond) - expected_low).abs() < 1e-6);
        }
    }
}
