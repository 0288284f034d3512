//! Closed real intervals for bound reasoning over expressions.

/// A closed interval `[lo, hi]`, possibly unbounded on either side.
///
/// An interval with `lo > hi` is empty: it is what a domain error (for example
/// the logarithm of a non-positive range) evaluates to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub const ENTIRE: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    pub const EMPTY: Interval = Interval {
        lo: f64::INFINITY,
        hi: f64::NEG_INFINITY,
    };

    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn point(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    pub fn is_empty(&self) -> bool {
        // NaN bounds count as empty as well
        !(self.lo <= self.hi)
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }

    pub fn add(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(self.lo + other.lo, self.hi + other.hi)
    }

    pub fn neg(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(-self.hi, -self.lo)
    }

    pub fn mul(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        let candidates = [
            mul_ext(self.lo, other.lo),
            mul_ext(self.lo, other.hi),
            mul_ext(self.hi, other.lo),
            mul_ext(self.hi, other.hi),
        ];
        hull(&candidates)
    }

    pub fn div(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        if other.lo == 0.0 && other.hi == 0.0 {
            return Interval::EMPTY;
        }
        if other.contains(0.0) {
            return Interval::ENTIRE;
        }
        self.mul(Interval::new(1.0 / other.hi, 1.0 / other.lo))
    }

    pub fn ln(self) -> Interval {
        if self.is_empty() || self.hi <= 0.0 {
            return Interval::EMPTY;
        }
        let lo = if self.lo <= 0.0 {
            f64::NEG_INFINITY
        } else {
            self.lo.ln()
        };
        Interval::new(lo, self.hi.ln())
    }

    pub fn powf(self, exponent: f64) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if exponent == 0.0 {
            return Interval::point(1.0);
        }
        let integral = exponent.fract() == 0.0;
        if !integral {
            // real powers are only defined on the non-negative half line
            if self.hi < 0.0 {
                return Interval::EMPTY;
            }
            let lo = self.lo.max(0.0);
            return monotone_pow(Interval::new(lo, self.hi), exponent);
        }
        if self.lo >= 0.0 {
            return monotone_pow(self, exponent);
        }
        if exponent < 0.0 {
            if self.hi >= 0.0 {
                return Interval::ENTIRE;
            }
            let candidates = [self.lo.powf(exponent), self.hi.powf(exponent)];
            return hull(&candidates);
        }
        let candidates = [self.lo.powf(exponent), self.hi.powf(exponent)];
        let mut out = hull(&candidates);
        let even = (exponent / 2.0).fract() == 0.0;
        if even && self.contains(0.0) {
            out.lo = 0.0;
        }
        out
    }
}

fn monotone_pow(x: Interval, exponent: f64) -> Interval {
    let a = x.lo.powf(exponent);
    let b = x.hi.powf(exponent);
    if exponent > 0.0 {
        Interval::new(a, b)
    } else {
        Interval::new(b, a)
    }
}

/// Product with the interval-arithmetic convention `0 * inf = 0`.
fn mul_ext(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 { 0.0 } else { a * b }
}

fn hull(values: &[f64]) -> Interval {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Interval::new(lo, hi)
}
