//! The component contract shared by every network element.

use crate::base::ComponentBase;
use crate::error::ComponentResult;
use crate::horizon::Horizon;
use crate::parameter::{ParamValue, TimeSeriesParameter};
use crate::schema::{ComponentKind, ParamSpec};
use chrono::NaiveDateTime;
use dh_model::{Expr, ModelContext, VarHandle};

/// A network element that turns its parameters into variables, constraint
/// rows and named expressions of a [`ModelContext`].
///
/// Lifecycle: parameters are installed with [`change_param`](Self::change_param)
/// in any order, the component is compiled exactly once, and the parameter
/// symbols it declared are bound with [`set_parameters`](Self::set_parameters)
/// before the context is handed to a solver.
pub trait Component: Send + Sync {
    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Declare this component's variables and governing constraints.
    ///
    /// Time-dependent parameters are sampled at `start + k * step`. Fails
    /// without touching `ctx` when a required parameter is missing or the
    /// configuration is invalid.
    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()>;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn kind(&self) -> ComponentKind {
        self.base().kind()
    }

    fn horizon(&self) -> &Horizon {
        self.base().horizon()
    }

    fn schema(&self) -> &'static [ParamSpec] {
        self.base().schema()
    }

    fn change_param(&mut self, name: &str, value: ParamValue) -> ComponentResult<()> {
        self.base_mut().change_param(name, value)
    }

    fn get_param(&self, name: &str) -> ComponentResult<&TimeSeriesParameter> {
        self.base().get_param(name)
    }

    fn set_parameters(&self, ctx: &mut ModelContext) -> ComponentResult<()> {
        self.base().set_parameters(ctx)
    }

    fn get_var(&self, name: &str) -> ComponentResult<&VarHandle> {
        self.base().get_var(name)
    }

    fn get_slack(&self, name: &str) -> ComponentResult<&VarHandle> {
        self.base().get_slack(name)
    }

    fn get_expression(&self, name: &str) -> ComponentResult<&Expr> {
        self.base().get_expression(name)
    }

    fn get_expression_series(&self, name: &str) -> ComponentResult<&[Expr]> {
        self.base().get_expression_series(name)
    }

    fn get_value(&self, ctx: &ModelContext, name: &str) -> ComponentResult<Vec<f64>> {
        self.base().get_value(ctx, name)
    }

    fn get_result(&self, ctx: &ModelContext, name: &str) -> ComponentResult<f64> {
        self.base().get_result(ctx, name)
    }

    fn get_result_series(&self, ctx: &ModelContext, name: &str) -> ComponentResult<Vec<f64>> {
        self.base().get_result_series(ctx, name)
    }

    fn variable_names(&self) -> Vec<&str> {
        self.base().variable_names().collect()
    }
}
