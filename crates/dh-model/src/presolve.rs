//! Interval-arithmetic feasibility screen.
//!
//! Evaluates every constraint body over the variable bounds and bound
//! parameter values. A row whose enclosure cannot meet its sense anywhere in
//! the box is proof of infeasibility, found before any numerical solve. The
//! screen is one-sided: passing it does not imply the model is feasible.

use crate::constraint::Sense;
use crate::context::ModelContext;
use crate::expr::{IntervalEnv, ParamRef, VarRef};
use crate::interval::Interval;
use crate::solution::{SolveOutcome, Solver};
use tracing::debug;

/// A proof that no point inside the variable bounds satisfies `row`.
#[derive(Debug, Clone, PartialEq)]
pub struct Infeasibility {
    pub row: String,
    pub range: Interval,
}

impl std::fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.range.is_empty() {
            write!(f, "{} cannot be evaluated inside the variable bounds", self.row)
        } else {
            write!(
                f,
                "{} ranges over [{}, {}] inside the variable bounds",
                self.row, self.range.lo, self.range.hi
            )
        }
    }
}

struct BoundsEnv<'a> {
    ctx: &'a ModelContext,
}

impl IntervalEnv for BoundsEnv<'_> {
    fn var(&self, r: VarRef) -> Interval {
        match self.ctx.var_block(r.var) {
            Ok(b) => Interval::new(b.lower[r.offset], b.upper[r.offset]),
            Err(_) => Interval::ENTIRE,
        }
    }

    fn param(&self, r: ParamRef) -> Interval {
        self.ctx
            .param_block(r.param)
            .ok()
            .and_then(|p| p.values.as_ref())
            .and_then(|v| v.get(r.offset))
            .map(|&v| Interval::point(v))
            .unwrap_or(Interval::ENTIRE)
    }
}

/// Return the first row proven infeasible over the bounds, if any.
pub fn screen(ctx: &ModelContext, tol: f64) -> Option<Infeasibility> {
    for block in ctx.var_blocks() {
        for (offset, (lo, hi)) in block.lower.iter().zip(&block.upper).enumerate() {
            if lo > hi {
                return Some(Infeasibility {
                    row: format!("bounds of {}[{}]", block.name, offset),
                    range: Interval::EMPTY,
                });
            }
        }
    }

    let env = BoundsEnv { ctx };
    for block in ctx.constraint_blocks() {
        for (row, c) in block.rows.iter().enumerate() {
            let range = c.body.interval(&env);
            let feasible = !range.is_empty()
                && match c.sense {
                    Sense::Eq => range.lo <= tol && range.hi >= -tol,
                    Sense::Le => range.lo <= tol,
                    Sense::Ge => range.hi >= -tol,
                };
            if !feasible {
                debug!(row = %block.name, index = row, "screen found infeasible row");
                return Some(Infeasibility {
                    row: format!("{}[{}]", block.name, row),
                    range,
                });
            }
        }
    }
    None
}

/// Wraps a solver and reports `Infeasible` up front when the screen finds a
/// contradiction, instead of letting the solver run into undefined values.
pub struct Screened<S> {
    pub inner: S,
    pub tol: f64,
}

impl<S: Solver> Screened<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, tol: 1e-9 }
    }
}

impl<S: Solver> Solver for Screened<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn solve(&mut self, ctx: &ModelContext) -> SolveOutcome {
        match screen(ctx, self.tol) {
            Some(proof) => SolveOutcome::Infeasible {
                reason: proof.to_string(),
            },
            None => self.inner.solve(ctx),
        }
    }
}
