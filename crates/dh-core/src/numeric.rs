use crate::DhError;

/// Floating point type used throughout the model
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-9,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, DhError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(DhError::NonFinite { what, value: v })
    }
}

/// Returns true when `values` is strictly increasing (and therefore unique).
pub fn strictly_increasing(values: &[Real]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
