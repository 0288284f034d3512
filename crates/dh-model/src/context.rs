//! The shared modeling context components compile into.
//!
//! One `ModelContext` collects the variables, parameter symbols, constraints
//! and named expressions of every component in a network. Names are
//! namespaced by the registering component (`scope.name`) and must be unique.
//! Parameter symbols are declared while constraints are built and bound to
//! numbers afterwards, so a context can be rebound without recompiling.

use crate::constraint::Constraint;
use crate::error::{ModelError, ModelResult};
use crate::expr::{Env, Expr, ParamRef, VarRef};
use crate::handle::{Bounds, ParamHandle, Shape, VarHandle};
use crate::solution::{Solution, SolveOutcome, Solver};
use dh_core::{Id, ParamId, VarId};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct VarBlock {
    pub name: String,
    pub shape: Shape,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub initial: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub name: String,
    pub shape: Shape,
    pub values: Option<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct ConstraintBlock {
    pub name: String,
    pub rows: Vec<Constraint>,
}

#[derive(Debug, Clone)]
pub struct NamedExpression {
    pub name: String,
    /// Name without the component scope, used to aggregate across components.
    pub local: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub name: String,
    pub expr: Expr,
    pub sense: ObjectiveSense,
}

/// A constraint row or bound that a candidate solution does not satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub what: String,
    /// Violation amount; NaN when the row could not be evaluated.
    pub amount: f64,
}

/// Size and class summary of a compiled model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelStats {
    pub variable_blocks: usize,
    pub scalar_variables: usize,
    pub parameter_blocks: usize,
    pub scalar_parameters: usize,
    pub constraint_rows: usize,
    pub linear_rows: usize,
    pub nonlinear_rows: usize,
    pub expressions: usize,
}

impl ModelStats {
    pub fn is_linear(&self) -> bool {
        self.nonlinear_rows == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Symbol {
    Var,
    Param,
    Constraint,
    Expression,
}

#[derive(Debug, Default)]
pub struct ModelContext {
    vars: Vec<VarBlock>,
    params: Vec<ParamBlock>,
    constraints: Vec<ConstraintBlock>,
    expressions: Vec<NamedExpression>,
    names: HashMap<String, (Symbol, usize)>,
    objective: Option<Objective>,
    outcome: Option<SolveOutcome>,
}

/// Join a component scope and a local name.
pub fn scoped(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

impl ModelContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, full: &str, symbol: Symbol, slot: usize) -> ModelResult<()> {
        if self.names.contains_key(full) {
            return Err(ModelError::DuplicateName {
                name: full.to_string(),
            });
        }
        self.names.insert(full.to_string(), (symbol, slot));
        Ok(())
    }

    /// Declare a block of decision variables with uniform bounds.
    pub fn declare_var(
        &mut self,
        scope: &str,
        name: &str,
        shape: Shape,
        bounds: Bounds,
    ) -> ModelResult<VarHandle> {
        let full = scoped(scope, name);
        if bounds.lower.is_nan() || bounds.upper.is_nan() || bounds.lower > bounds.upper {
            return Err(ModelError::InvalidBounds {
                name: full,
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        let slot = self.vars.len();
        self.claim(&full, Symbol::Var, slot)?;
        debug!(var = %full, rows = shape.rows, cols = shape.cols, "declare variable");
        self.vars.push(VarBlock {
            name: full,
            shape,
            lower: vec![bounds.lower; shape.len()],
            upper: vec![bounds.upper; shape.len()],
            initial: vec![None; shape.len()],
        });
        Ok(VarHandle {
            id: Id::from_index(slot as u32),
            shape,
        })
    }

    /// Declare a block of parameter symbols; values are bound later.
    pub fn declare_param(&mut self, scope: &str, name: &str, shape: Shape) -> ModelResult<ParamHandle> {
        let full = scoped(scope, name);
        let slot = self.params.len();
        self.claim(&full, Symbol::Param, slot)?;
        debug!(param = %full, len = shape.len(), "declare parameter");
        self.params.push(ParamBlock {
            name: full,
            shape,
            values: None,
        });
        Ok(ParamHandle {
            id: Id::from_index(slot as u32),
            shape,
        })
    }

    /// Bind fixed numeric values to a declared parameter block.
    pub fn bind_param(&mut self, handle: &ParamHandle, values: &[f64]) -> ModelResult<()> {
        let block = self.param_block_mut(handle.id)?;
        if values.len() != block.shape.len() {
            return Err(ModelError::ShapeMismatch {
                name: block.name.clone(),
                expected: block.shape.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite {
                what: block.name.clone(),
            });
        }
        block.values = Some(values.to_vec());
        Ok(())
    }

    /// Register a named family of constraint rows.
    pub fn add_constraints(
        &mut self,
        scope: &str,
        name: &str,
        rows: Vec<Constraint>,
    ) -> ModelResult<()> {
        let full = scoped(scope, name);
        for row in &rows {
            self.check_refs(&full, &row.body)?;
        }
        let slot = self.constraints.len();
        self.claim(&full, Symbol::Constraint, slot)?;
        debug!(constraint = %full, rows = rows.len(), "add constraints");
        self.constraints.push(ConstraintBlock { name: full, rows });
        Ok(())
    }

    pub fn add_constraint(&mut self, scope: &str, name: &str, row: Constraint) -> ModelResult<()> {
        self.add_constraints(scope, name, vec![row])
    }

    /// Register a named derived expression (energy, cost, ...).
    pub fn add_expression(&mut self, scope: &str, name: &str, expr: Expr) -> ModelResult<()> {
        let full = scoped(scope, name);
        self.check_refs(&full, &expr)?;
        let slot = self.expressions.len();
        self.claim(&full, Symbol::Expression, slot)?;
        self.expressions.push(NamedExpression {
            name: full,
            local: name.to_string(),
            expr,
        });
        Ok(())
    }

    fn check_refs(&self, owner: &str, expr: &Expr) -> ModelResult<()> {
        let mut vars = Vec::new();
        expr.collect_vars(&mut vars);
        for r in vars {
            let ok = self
                .vars
                .get(r.var.slot())
                .is_some_and(|b| r.offset < b.shape.len());
            if !ok {
                return Err(ModelError::UnknownName {
                    name: format!("variable {}[{}] referenced by {owner}", r.var, r.offset),
                });
            }
        }
        let mut params = Vec::new();
        expr.collect_params(&mut params);
        for r in params {
            let ok = self
                .params
                .get(r.param.slot())
                .is_some_and(|b| r.offset < b.shape.len());
            if !ok {
                return Err(ModelError::UnknownName {
                    name: format!("parameter {}[{}] referenced by {owner}", r.param, r.offset),
                });
            }
        }
        Ok(())
    }

    pub fn expression(&self, full: &str) -> Option<&Expr> {
        match self.names.get(full) {
            Some((Symbol::Expression, slot)) => self.expressions.get(*slot).map(|e| &e.expr),
            _ => None,
        }
    }

    /// Sum of the expression `local` over every component that defines it.
    pub fn total(&self, local: &str) -> ModelResult<Expr> {
        let terms: Vec<Expr> = self
            .expressions
            .iter()
            .filter(|e| e.local == local)
            .map(|e| e.expr.clone())
            .collect();
        if terms.is_empty() {
            return Err(ModelError::UnknownName {
                name: local.to_string(),
            });
        }
        Ok(Expr::sum(terms))
    }

    pub fn set_objective(&mut self, objective: Objective) {
        info!(objective = %objective.name, "objective selected");
        self.objective = Some(objective);
    }

    /// Minimize the network total of a named expression.
    pub fn minimize_total(&mut self, local: &str) -> ModelResult<()> {
        let expr = self.total(local)?;
        self.set_objective(Objective {
            name: local.to_string(),
            expr,
            sense: ObjectiveSense::Minimize,
        });
        Ok(())
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn set_initial(&mut self, handle: &VarHandle, values: &[f64]) -> ModelResult<()> {
        let block = self.var_block_mut(handle.id)?;
        if values.len() != block.initial.len() {
            return Err(ModelError::ShapeMismatch {
                name: block.name.clone(),
                expected: block.initial.len(),
                actual: values.len(),
            });
        }
        block.initial = values.iter().copied().map(Some).collect();
        Ok(())
    }

    pub fn set_initial_all(&mut self, handle: &VarHandle, value: f64) -> ModelResult<()> {
        let values = vec![value; handle.len()];
        self.set_initial(handle, &values)
    }

    pub fn initial(&self, handle: &VarHandle) -> ModelResult<&[Option<f64>]> {
        Ok(&self.var_block(handle.id)?.initial)
    }

    /// Intersect the bounds of one element with `bounds`.
    pub fn tighten_bounds(
        &mut self,
        handle: &VarHandle,
        offset: usize,
        bounds: Bounds,
    ) -> ModelResult<()> {
        let block = self.var_block_mut(handle.id)?;
        if offset >= block.shape.len() {
            return Err(ModelError::ShapeMismatch {
                name: block.name.clone(),
                expected: block.shape.len(),
                actual: offset + 1,
            });
        }
        block.lower[offset] = block.lower[offset].max(bounds.lower);
        block.upper[offset] = block.upper[offset].min(bounds.upper);
        if block.lower[offset] > block.upper[offset] {
            warn!(var = %block.name, offset, "bounds became empty");
        }
        Ok(())
    }

    /// Fix every element of a block to the given values.
    pub fn fix_var(&mut self, handle: &VarHandle, values: &[f64]) -> ModelResult<()> {
        if values.len() != handle.len() {
            return Err(ModelError::ShapeMismatch {
                name: self.var_block(handle.id)?.name.clone(),
                expected: handle.len(),
                actual: values.len(),
            });
        }
        let block = self.var_block_mut(handle.id)?;
        block.lower.copy_from_slice(values);
        block.upper.copy_from_slice(values);
        Ok(())
    }

    /// Per-element bounds of a variable block.
    pub fn bounds(&self, handle: &VarHandle) -> ModelResult<Vec<Bounds>> {
        let block = self.var_block(handle.id)?;
        Ok(block
            .lower
            .iter()
            .zip(&block.upper)
            .map(|(&l, &u)| Bounds::between(l, u))
            .collect())
    }

    pub fn var_blocks(&self) -> impl Iterator<Item = &VarBlock> {
        self.vars.iter()
    }

    pub fn param_blocks(&self) -> impl Iterator<Item = &ParamBlock> {
        self.params.iter()
    }

    pub fn constraint_blocks(&self) -> impl Iterator<Item = &ConstraintBlock> {
        self.constraints.iter()
    }

    pub fn expressions(&self) -> impl Iterator<Item = &NamedExpression> {
        self.expressions.iter()
    }

    pub fn var_by_name(&self, full: &str) -> Option<VarHandle> {
        match self.names.get(full) {
            Some((Symbol::Var, slot)) => self.vars.get(*slot).map(|b| VarHandle {
                id: Id::from_index(*slot as u32),
                shape: b.shape,
            }),
            _ => None,
        }
    }

    pub fn param_by_name(&self, full: &str) -> Option<ParamHandle> {
        match self.names.get(full) {
            Some((Symbol::Param, slot)) => self.params.get(*slot).map(|b| ParamHandle {
                id: Id::from_index(*slot as u32),
                shape: b.shape,
            }),
            _ => None,
        }
    }

    pub fn constraint_block(&self, full: &str) -> Option<&ConstraintBlock> {
        match self.names.get(full) {
            Some((Symbol::Constraint, slot)) => self.constraints.get(*slot),
            _ => None,
        }
    }

    pub fn var_block(&self, id: VarId) -> ModelResult<&VarBlock> {
        self.vars.get(id.slot()).ok_or_else(|| ModelError::UnknownName {
            name: format!("variable {id}"),
        })
    }

    fn var_block_mut(&mut self, id: VarId) -> ModelResult<&mut VarBlock> {
        self.vars
            .get_mut(id.slot())
            .ok_or_else(|| ModelError::UnknownName {
                name: format!("variable {id}"),
            })
    }

    pub fn param_block(&self, id: ParamId) -> ModelResult<&ParamBlock> {
        self.params.get(id.slot()).ok_or_else(|| ModelError::UnknownName {
            name: format!("parameter {id}"),
        })
    }

    fn param_block_mut(&mut self, id: ParamId) -> ModelResult<&mut ParamBlock> {
        self.params
            .get_mut(id.slot())
            .ok_or_else(|| ModelError::UnknownName {
                name: format!("parameter {id}"),
            })
    }

    /// Names of declared parameter blocks that have no values yet.
    pub fn unbound_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.values.is_none())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Hand the model to an external solver and keep its outcome.
    ///
    /// Every parameter symbol must be bound first. The outcome is stored as
    /// reported; infeasibility and numerical failures are not reinterpreted.
    pub fn solve_with(&mut self, solver: &mut dyn Solver) -> ModelResult<&SolveOutcome> {
        if let Some(name) = self.unbound_params().first() {
            return Err(ModelError::UnboundParameter {
                name: name.to_string(),
            });
        }
        info!(solver = solver.name(), "solving model");
        let outcome = solver.solve(self);
        match &outcome {
            SolveOutcome::Solved(_) => info!("solve finished"),
            SolveOutcome::Infeasible { reason } => warn!(%reason, "model infeasible"),
            SolveOutcome::NumericalFailure { reason } => warn!(%reason, "numerical failure"),
        }
        Ok(self.outcome.insert(outcome))
    }

    pub fn outcome(&self) -> Option<&SolveOutcome> {
        self.outcome.as_ref()
    }

    fn solution(&self, what: &str) -> ModelResult<&Solution> {
        match &self.outcome {
            Some(SolveOutcome::Solved(sol)) => Ok(sol),
            Some(_) => Err(ModelError::NotSolved {
                what: format!("{what} (last solve did not succeed)"),
            }),
            None => Err(ModelError::NotSolved {
                what: what.to_string(),
            }),
        }
    }

    /// Solved values of a variable block.
    pub fn value(&self, handle: &VarHandle) -> ModelResult<Vec<f64>> {
        let name = &self.var_block(handle.id)?.name;
        let sol = self.solution(name)?;
        Ok(sol.values(handle)?.to_vec())
    }

    /// Evaluate an expression against the stored solution.
    pub fn evaluate(&self, expr: &Expr) -> ModelResult<f64> {
        let sol = self.solution("expression")?;
        Ok(expr.eval(&SolutionEnv { ctx: self, sol }))
    }

    /// Evaluate an expression against an arbitrary candidate solution.
    pub fn evaluate_with(&self, expr: &Expr, sol: &Solution) -> f64 {
        expr.eval(&SolutionEnv { ctx: self, sol })
    }

    /// Check a candidate solution against all bounds and constraint rows.
    pub fn verify(&self, sol: &Solution, tol: f64) -> ModelResult<Vec<Violation>> {
        if let Some(name) = self.unbound_params().first() {
            return Err(ModelError::UnboundParameter {
                name: name.to_string(),
            });
        }
        let env = SolutionEnv { ctx: self, sol };
        let mut out = Vec::new();
        for (slot, block) in self.vars.iter().enumerate() {
            for offset in 0..block.shape.len() {
                let v = sol.raw(slot, offset);
                let below = block.lower[offset] - v;
                let above = v - block.upper[offset];
                if v.is_nan() || below > tol || above > tol {
                    out.push(Violation {
                        what: format!("bounds of {}[{}]", block.name, offset),
                        amount: if v.is_nan() { f64::NAN } else { below.max(above) },
                    });
                }
            }
        }
        for block in &self.constraints {
            for (row, c) in block.rows.iter().enumerate() {
                let amount = c.violation(&env);
                if amount.is_nan() || amount > tol {
                    out.push(Violation {
                        what: format!("{}[{}]", block.name, row),
                        amount,
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats {
            variable_blocks: self.vars.len(),
            scalar_variables: self.vars.iter().map(|v| v.shape.len()).sum(),
            parameter_blocks: self.params.len(),
            scalar_parameters: self.params.iter().map(|p| p.shape.len()).sum(),
            expressions: self.expressions.len(),
            ..ModelStats::default()
        };
        for row in self.constraints.iter().flat_map(|b| &b.rows) {
            stats.constraint_rows += 1;
            if row.is_linear() {
                stats.linear_rows += 1;
            } else {
                stats.nonlinear_rows += 1;
            }
        }
        stats
    }
}

struct SolutionEnv<'a> {
    ctx: &'a ModelContext,
    sol: &'a Solution,
}

impl Env for SolutionEnv<'_> {
    fn var(&self, r: VarRef) -> f64 {
        self.sol.raw(r.var.slot(), r.offset)
    }

    fn param(&self, r: ParamRef) -> f64 {
        self.ctx
            .params
            .get(r.param.slot())
            .and_then(|p| p.values.as_ref())
            .and_then(|v| v.get(r.offset))
            .copied()
            .unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_scoped_and_unique() {
        let mut ctx = ModelContext::new();
        ctx.declare_var("pipe", "mass_flow", Shape::vector(3), Bounds::non_negative())
            .unwrap();
        ctx.declare_var("plant", "mass_flow", Shape::vector(3), Bounds::non_negative())
            .unwrap();
        let err = ctx
            .declare_var("pipe", "mass_flow", Shape::vector(3), Bounds::free())
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicateName {
                name: "pipe.mass_flow".into()
            }
        );
        assert!(ctx.var_by_name("plant.mass_flow").is_some());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut ctx = ModelContext::new();
        let err = ctx
            .declare_var("c", "x", Shape::scalar(), Bounds::between(2.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidBounds { .. }));
    }

    #[test]
    fn bind_checks_shape() {
        let mut ctx = ModelContext::new();
        let p = ctx.declare_param("c", "p", Shape::vector(2)).unwrap();
        assert!(ctx.bind_param(&p, &[1.0]).is_err());
        assert!(ctx.bind_param(&p, &[1.0, f64::NAN]).is_err());
        ctx.bind_param(&p, &[1.0, 2.0]).unwrap();
        assert!(ctx.unbound_params().is_empty());
    }

    #[test]
    fn value_before_solve_fails() {
        let mut ctx = ModelContext::new();
        let x = ctx
            .declare_var("c", "x", Shape::vector(2), Bounds::free())
            .unwrap();
        assert!(matches!(ctx.value(&x), Err(ModelError::NotSolved { .. })));
    }

    #[test]
    fn foreign_reference_rejected() {
        let mut ctx = ModelContext::new();
        let mut other = ModelContext::new();
        other
            .declare_var("a", "x", Shape::vector(1), Bounds::free())
            .unwrap();
        let far = other
            .declare_var("a", "y", Shape::vector(4), Bounds::free())
            .unwrap();
        let err = ctx
            .add_constraint("b", "c", Constraint::eq(far.at(3), 0.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownName { .. }));
    }

    #[test]
    fn totals_sum_across_scopes() {
        let mut ctx = ModelContext::new();
        ctx.add_expression("a", "cost", Expr::Const(2.0)).unwrap();
        ctx.add_expression("b", "cost", Expr::Const(3.0)).unwrap();
        let total = ctx.total("cost").unwrap();
        let sol = Solution::zeros(&ctx);
        assert_eq!(ctx.evaluate_with(&total, &sol), 5.0);
        assert!(ctx.total("co2").is_err());
    }
}
