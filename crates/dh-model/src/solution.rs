//! Solver seam: the outcome type an external solver reports back.

use crate::context::ModelContext;
use crate::error::{ModelError, ModelResult};
use crate::handle::VarHandle;

/// Values for every variable block of a context, indexed by variable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<Vec<f64>>,
}

impl Solution {
    /// Solution with every element at zero, sized for `ctx`.
    pub fn zeros(ctx: &ModelContext) -> Self {
        Self {
            values: ctx.var_blocks().map(|v| vec![0.0; v.shape.len()]).collect(),
        }
    }

    /// Solution seeded from the context's initial guesses (0 when absent).
    pub fn from_initial(ctx: &ModelContext) -> Self {
        Self {
            values: ctx
                .var_blocks()
                .map(|v| v.initial.iter().map(|x| x.unwrap_or(0.0)).collect())
                .collect(),
        }
    }

    pub fn set(&mut self, handle: &VarHandle, values: &[f64]) -> ModelResult<()> {
        let slot = self
            .values
            .get_mut(handle.id.slot())
            .ok_or_else(|| ModelError::UnknownName {
                name: format!("variable {}", handle.id),
            })?;
        if slot.len() != values.len() {
            return Err(ModelError::ShapeMismatch {
                name: format!("variable {}", handle.id),
                expected: slot.len(),
                actual: values.len(),
            });
        }
        slot.copy_from_slice(values);
        Ok(())
    }

    pub fn set_at(&mut self, handle: &VarHandle, offset: usize, value: f64) -> ModelResult<()> {
        let slot = self
            .values
            .get_mut(handle.id.slot())
            .and_then(|block| block.get_mut(offset))
            .ok_or(ModelError::UnknownName {
                name: format!("variable {}[{}]", handle.id, offset),
            })?;
        *slot = value;
        Ok(())
    }

    pub fn values(&self, handle: &VarHandle) -> ModelResult<&[f64]> {
        self.values
            .get(handle.id.slot())
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::UnknownName {
                name: format!("variable {}", handle.id),
            })
    }

    pub(crate) fn raw(&self, slot: usize, offset: usize) -> f64 {
        self.values
            .get(slot)
            .and_then(|b| b.get(offset))
            .copied()
            .unwrap_or(f64::NAN)
    }
}

/// What an external solver reports for one solve of a compiled model.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Solved(Solution),
    Infeasible { reason: String },
    NumericalFailure { reason: String },
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved(_))
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolveOutcome::Solved(sol) => Some(sol),
            _ => None,
        }
    }
}

/// An external numerical solver. Convergence strategy, initial guesses and
/// retries are entirely the implementor's concern.
pub trait Solver {
    fn name(&self) -> &str;

    fn solve(&mut self, ctx: &ModelContext) -> SolveOutcome;
}
