//! Algebraic constraints in `body (sense) 0` form.

use crate::expr::{Env, Expr};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    /// body == 0
    Eq,
    /// body <= 0
    Le,
    /// body >= 0
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub body: Expr,
    pub sense: Sense,
}

impl Constraint {
    /// `lhs == rhs`
    pub fn eq(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self {
            body: lhs.into() - rhs.into(),
            sense: Sense::Eq,
        }
    }

    /// `lhs <= rhs`
    pub fn le(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self {
            body: lhs.into() - rhs.into(),
            sense: Sense::Le,
        }
    }

    /// `lhs >= rhs`
    pub fn ge(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self {
            body: lhs.into() - rhs.into(),
            sense: Sense::Ge,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.body.is_linear()
    }

    /// Amount by which the constraint is violated (0 when satisfied).
    ///
    /// A body that evaluates to NaN (domain error) is reported as NaN rather
    /// than folded into a number, so callers can tell it apart.
    pub fn violation(&self, env: &dyn Env) -> f64 {
        let v = self.body.eval(env);
        if v.is_nan() {
            return f64::NAN;
        }
        match self.sense {
            Sense::Eq => v.abs(),
            Sense::Le => v.max(0.0),
            Sense::Ge => (-v).max(0.0),
        }
    }
}
