//! Symbolic modeling context for district heating component models.
//!
//! Components declare decision variables, parameter symbols, constraint rows
//! and named expressions into a [`ModelContext`]. Nothing here solves the
//! resulting program: that is the job of an external [`Solver`], whose
//! [`SolveOutcome`] is stored on the context for result queries.

pub mod constraint;
pub mod context;
pub mod error;
pub mod expr;
pub mod handle;
pub mod interval;
pub mod presolve;
pub mod solution;

pub use constraint::{Constraint, Sense};
pub use context::{
    ModelContext, ModelStats, NamedExpression, Objective, ObjectiveSense, Violation, scoped,
};
pub use error::{ModelError, ModelResult};
pub use expr::{Env, Expr, IntervalEnv, ParamRef, VarRef};
pub use handle::{Bounds, ParamHandle, Shape, VarHandle};
pub use interval::Interval;
pub use presolve::{Infeasibility, Screened, screen};
pub use solution::{Solution, SolveOutcome, Solver};
