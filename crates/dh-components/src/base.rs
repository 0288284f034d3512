//! State shared by every component: parameter table, declared symbols and
//! the compile lifecycle.

use crate::error::{ComponentError, ComponentResult};
use crate::horizon::Horizon;
use crate::parameter::{ParamValue, TimeSeriesParameter};
use crate::schema::{self, ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use chrono::NaiveDateTime;
use dh_model::{
    Bounds, Constraint, Expr, ModelContext, ModelError, ParamHandle, Shape, VarHandle,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parameter symbol declared during compile, waiting for `set_parameters`.
#[derive(Debug, Clone)]
struct PendingBinding {
    handle: ParamHandle,
    values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ComponentBase {
    id: String,
    kind: ComponentKind,
    options: ComponentOptions,
    horizon: Horizon,
    schema: &'static [ParamSpec],
    params: BTreeMap<String, TimeSeriesParameter>,
    vars: BTreeMap<String, VarHandle>,
    slacks: BTreeMap<String, VarHandle>,
    expressions: BTreeMap<String, Expr>,
    series: BTreeMap<String, Vec<Expr>>,
    bindings: Vec<PendingBinding>,
    start: Option<NaiveDateTime>,
    compiled: bool,
}

impl ComponentBase {
    /// New base with every schema default already installed.
    pub fn new(
        id: impl Into<String>,
        kind: ComponentKind,
        horizon: Horizon,
        options: ComponentOptions,
    ) -> Self {
        let schema = kind.schema(options.temperature_driven);
        let mut params = BTreeMap::new();
        for spec in schema {
            if let Some(default) = spec.default {
                // defaults are finite constants
                if let Ok(p) = TimeSeriesParameter::scalar(spec.name, default) {
                    params.insert(spec.name.to_string(), describe(p, spec));
                }
            }
        }
        Self {
            id: id.into(),
            kind,
            options,
            horizon,
            schema,
            params,
            vars: BTreeMap::new(),
            slacks: BTreeMap::new(),
            expressions: BTreeMap::new(),
            series: BTreeMap::new(),
            bindings: Vec::new(),
            start: None,
            compiled: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn options(&self) -> ComponentOptions {
        self.options
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn n_steps(&self) -> usize {
        self.horizon.n_steps()
    }

    pub fn schema(&self) -> &'static [ParamSpec] {
        self.schema
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    fn config(&self, what: impl Into<String>) -> ComponentError {
        ComponentError::config(&self.id, what)
    }

    /// Install (or replace) a parameter. Values are only checked against the
    /// horizon at compile time.
    pub fn change_param(&mut self, name: &str, value: ParamValue) -> ComponentResult<()> {
        let spec = schema::find(self.schema, name).ok_or_else(|| {
            ComponentError::UnknownParameter {
                component: self.id.clone(),
                name: name.to_string(),
            }
        })?;
        if self.compiled {
            return Err(ComponentError::AlreadyCompiled {
                component: self.id.clone(),
            });
        }
        let param = value.into_parameter(name)?;
        debug!(component = %self.id, param = name, "parameter changed");
        self.params.insert(name.to_string(), describe(param, spec));
        Ok(())
    }

    pub fn get_param(&self, name: &str) -> ComponentResult<&TimeSeriesParameter> {
        if schema::find(self.schema, name).is_none() {
            return Err(ComponentError::UnknownParameter {
                component: self.id.clone(),
                name: name.to_string(),
            });
        }
        self.params
            .get(name)
            .ok_or_else(|| ComponentError::MissingParameter {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Start a compile: reject a second call and any missing required
    /// parameter before anything is declared.
    pub fn begin_compile(&mut self, start: NaiveDateTime) -> ComponentResult<()> {
        if self.compiled {
            return Err(ComponentError::AlreadyCompiled {
                component: self.id.clone(),
            });
        }
        if let Some(missing) = self
            .schema
            .iter()
            .find(|spec| spec.required && !self.params.contains_key(spec.name))
        {
            return Err(ComponentError::MissingParameter {
                component: self.id.clone(),
                name: missing.name.to_string(),
            });
        }
        self.start = Some(start);
        Ok(())
    }

    pub fn finish_compile(&mut self) {
        self.compiled = true;
        info!(
            component = %self.id,
            kind = %self.kind,
            variables = self.vars.len() + self.slacks.len(),
            symbols = self.bindings.len(),
            "component compiled"
        );
    }

    fn spec(&self, name: &str) -> ComponentResult<&'static ParamSpec> {
        schema::find(self.schema, name).ok_or_else(|| ComponentError::UnknownParameter {
            component: self.id.clone(),
            name: name.to_string(),
        })
    }

    /// Value of a scalar parameter.
    pub fn scalar(&self, name: &str) -> ComponentResult<f64> {
        self.optional_scalar(name)?
            .ok_or_else(|| ComponentError::MissingParameter {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn optional_scalar(&self, name: &str) -> ComponentResult<Option<f64>> {
        self.spec(name)?;
        match self.params.get(name) {
            None => Ok(None),
            Some(p) if p.is_scalar() => Ok(Some(p.value_at(0.0))),
            Some(_) => Err(self.config(format!("{name} must be a single value"))),
        }
    }

    /// Parameter sampled at every step of the horizon.
    pub fn time_series(&self, name: &str) -> ComponentResult<Vec<f64>> {
        self.optional_time_series(name)?
            .ok_or_else(|| ComponentError::MissingParameter {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn optional_time_series(&self, name: &str) -> ComponentResult<Option<Vec<f64>>> {
        self.spec(name)?;
        let start = self.start.ok_or_else(|| ComponentError::NotCompiled {
            component: self.id.clone(),
        })?;
        Ok(self.params.get(name).map(|p| {
            p.sample(start, self.horizon.step_s(), self.horizon.n_steps())
        }))
    }

    /// Parameter sampled at the given positions (distance along a pipe).
    pub fn curve(&self, name: &str, positions: &[f64]) -> ComponentResult<Option<Vec<f64>>> {
        let spec = self.spec(name)?;
        if spec.kind != ParamKind::Curve {
            return Err(self.config(format!("{name} is not a length-indexed parameter")));
        }
        Ok(self
            .params
            .get(name)
            .map(|p| positions.iter().map(|&x| p.value_at(x)).collect()))
    }

    pub fn declare_var(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        shape: Shape,
        bounds: Bounds,
    ) -> ComponentResult<VarHandle> {
        let handle = ctx.declare_var(&self.id, name, shape, bounds)?;
        self.vars.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// One value per step.
    pub fn declare_series(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        bounds: Bounds,
    ) -> ComponentResult<VarHandle> {
        let shape = Shape::vector(self.n_steps());
        self.declare_var(ctx, name, shape, bounds)
    }

    /// Non-negative slack variable, kept apart from the physical variables.
    pub fn declare_slack(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        shape: Shape,
    ) -> ComponentResult<VarHandle> {
        let handle = ctx.declare_var(&self.id, name, shape, Bounds::non_negative())?;
        self.slacks.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Declare a parameter symbol holding the named parameter's values:
    /// one value for scalars, one per step for time series.
    pub fn symbol(&mut self, ctx: &mut ModelContext, name: &str) -> ComponentResult<ParamHandle> {
        let spec = self.spec(name)?;
        let values = match spec.kind {
            ParamKind::Scalar => vec![self.scalar(name)?],
            ParamKind::TimeSeries => self.time_series(name)?,
            ParamKind::Curve => {
                return Err(self.config(format!(
                    "{name} is length-indexed, declare it with derived_symbol"
                )));
            }
        };
        let shape = Shape::vector(values.len());
        self.derived_symbol(ctx, name, shape, values)
    }

    /// Declare a parameter symbol with values computed by the component.
    pub fn derived_symbol(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        shape: Shape,
        values: Vec<f64>,
    ) -> ComponentResult<ParamHandle> {
        if values.len() != shape.len() {
            return Err(ModelError::ShapeMismatch {
                name: dh_model::scoped(&self.id, name),
                expected: shape.len(),
                actual: values.len(),
            }
            .into());
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(self.config(format!("{name} evaluates to non-finite value {bad}")));
        }
        let handle = ctx.declare_param(&self.id, name, shape)?;
        self.bindings.push(PendingBinding { handle, values });
        Ok(handle)
    }

    pub fn add_constraints(
        &self,
        ctx: &mut ModelContext,
        name: &str,
        rows: Vec<Constraint>,
    ) -> ComponentResult<()> {
        ctx.add_constraints(&self.id, name, rows)?;
        Ok(())
    }

    pub fn add_expression(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        expr: Expr,
    ) -> ComponentResult<()> {
        ctx.add_expression(&self.id, name, expr.clone())?;
        self.expressions.insert(name.to_string(), expr);
        Ok(())
    }

    /// Register one expression per step as `name[t]`; the whole series is
    /// available through [`get_expression_series`](Self::get_expression_series).
    pub fn add_expression_series(
        &mut self,
        ctx: &mut ModelContext,
        name: &str,
        exprs: Vec<Expr>,
    ) -> ComponentResult<()> {
        for (t, expr) in exprs.iter().enumerate() {
            self.add_expression(ctx, &format!("{name}[{t}]"), expr.clone())?;
        }
        self.series.insert(name.to_string(), exprs);
        Ok(())
    }

    /// Bind every parameter symbol declared during compile.
    pub fn set_parameters(&self, ctx: &mut ModelContext) -> ComponentResult<()> {
        if !self.compiled {
            return Err(ComponentError::NotCompiled {
                component: self.id.clone(),
            });
        }
        for binding in &self.bindings {
            ctx.bind_param(&binding.handle, &binding.values)?;
        }
        debug!(component = %self.id, symbols = self.bindings.len(), "parameters bound");
        Ok(())
    }

    pub fn get_var(&self, name: &str) -> ComponentResult<&VarHandle> {
        self.vars
            .get(name)
            .ok_or_else(|| ComponentError::UnknownVariable {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn get_slack(&self, name: &str) -> ComponentResult<&VarHandle> {
        self.slacks
            .get(name)
            .ok_or_else(|| ComponentError::UnknownVariable {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn get_expression(&self, name: &str) -> ComponentResult<&Expr> {
        self.expressions
            .get(name)
            .ok_or_else(|| ComponentError::UnknownVariable {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn get_expression_series(&self, name: &str) -> ComponentResult<&[Expr]> {
        self.series
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ComponentError::UnknownVariable {
                component: self.id.clone(),
                name: name.to_string(),
            })
    }

    /// Solved per-step values of a variable or slack.
    pub fn get_value(&self, ctx: &ModelContext, name: &str) -> ComponentResult<Vec<f64>> {
        let handle = self.get_var(name).or_else(|_| self.get_slack(name))?;
        ctx.value(handle).map_err(|e| match e {
            ModelError::NotSolved { .. } => ComponentError::NotSolved {
                component: self.id.clone(),
                name: name.to_string(),
            },
            other => other.into(),
        })
    }

    /// Value of a named expression in the stored solution.
    pub fn get_result(&self, ctx: &ModelContext, name: &str) -> ComponentResult<f64> {
        let expr = self.get_expression(name)?;
        ctx.evaluate(expr).map_err(|e| match e {
            ModelError::NotSolved { .. } => ComponentError::NotSolved {
                component: self.id.clone(),
                name: name.to_string(),
            },
            other => other.into(),
        })
    }

    /// Per-step values of a series expression in the stored solution.
    pub fn get_result_series(&self, ctx: &ModelContext, name: &str) -> ComponentResult<Vec<f64>> {
        self.get_expression_series(name)?
            .iter()
            .map(|expr| {
                ctx.evaluate(expr).map_err(|e| match e {
                    ModelError::NotSolved { .. } => ComponentError::NotSolved {
                        component: self.id.clone(),
                        name: name.to_string(),
                    },
                    other => other.into(),
                })
            })
            .collect()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

fn describe(mut param: TimeSeriesParameter, spec: &ParamSpec) -> TimeSeriesParameter {
    if param.description().is_empty() {
        param = param.with_description(spec.description);
    }
    param.label_unit(spec.unit)
}
