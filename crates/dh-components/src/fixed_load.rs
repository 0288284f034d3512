//! Building load following a fixed heat demand profile.

use crate::base::ComponentBase;
use crate::common::check_positive;
use crate::error::{ComponentError, ComponentResult};
use crate::horizon::Horizon;
use crate::schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use crate::traits::Component;
use chrono::NaiveDateTime;
use dh_core::units::constants::{CP_WATER, J_PER_KWH};
use dh_model::{Bounds, Constraint, Expr, ModelContext, Shape, VarHandle};

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::required(
        "delta_T",
        "Temperature difference between supply and return",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "mult",
        "Number of identical buildings",
        "-",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::required(
        "heat_profile",
        "Heat demand of one building",
        "W",
        ParamKind::TimeSeries,
    ),
];

pub const TEMPERATURE_SCHEMA: &[ParamSpec] = &[
    ParamSpec::with_default(
        "mult",
        "Number of identical buildings",
        "-",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::required(
        "heat_profile",
        "Heat demand of one building",
        "W",
        ParamKind::TimeSeries,
    ),
    ParamSpec::required(
        "mass_flow",
        "Mass flow drawn by one building",
        "kg/s",
        ParamKind::TimeSeries,
    ),
    ParamSpec::with_default(
        "temperature_max",
        "Soft upper bound on supply and return temperature",
        "K",
        ParamKind::Scalar,
        363.15,
    ),
    ParamSpec::with_default(
        "temperature_min",
        "Soft lower bound on supply and return temperature",
        "K",
        ParamKind::Scalar,
        283.15,
    ),
    ParamSpec::optional(
        "temperature_supply_0",
        "Initial guess for the supply temperature",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::optional(
        "temperature_return_0",
        "Initial guess for the return temperature",
        "K",
        ParamKind::Scalar,
    ),
];

/// Heat consumer whose demand is imposed as a profile.
///
/// Variables: `heat_flow`, `mass_flow`; in temperature-driven mode also
/// `Tsup`, `Tret` and the slacks `temperature_max_slack` and
/// `temperature_min_slack` (row 0 supply, row 1 return).
#[derive(Debug, Clone)]
pub struct FixedProfileLoad {
    base: ComponentBase,
}

impl FixedProfileLoad {
    pub fn new(id: impl Into<String>, horizon: Horizon, options: ComponentOptions) -> Self {
        Self {
            base: ComponentBase::new(id, ComponentKind::FixedProfileLoad, horizon, options),
        }
    }

    fn compile_delta_t(
        &mut self,
        ctx: &mut ModelContext,
        profile: Vec<f64>,
    ) -> ComponentResult<()> {
        let b = &mut self.base;
        let n = b.n_steps();
        check_positive(b.id(), b.scalar("delta_T")?, "delta_T")?;

        let q = b.derived_symbol(ctx, "heat_flow_profile", Shape::vector(n), profile)?;
        let delta_t = b.symbol(ctx, "delta_T")?;
        let hf = b.declare_series(ctx, "heat_flow", Bounds::free())?;
        let mf = b.declare_series(ctx, "mass_flow", Bounds::free())?;

        b.add_constraints(
            ctx,
            "fix_heat_flow",
            (0..n).map(|t| Constraint::eq(hf.at(t), q.at(t))).collect(),
        )?;
        b.add_constraints(
            ctx,
            "mass_flow_balance",
            (0..n)
                .map(|t| Constraint::eq(mf.at(t) * CP_WATER * delta_t.at(0), hf.at(t)))
                .collect(),
        )?;
        let step = b.horizon().step_s();
        b.add_expression(ctx, "heat_demand", heat_demand(&hf, n, step))?;
        Ok(())
    }

    fn compile_temperature(
        &mut self,
        ctx: &mut ModelContext,
        mult: f64,
        profile: Vec<f64>,
    ) -> ComponentResult<()> {
        let b = &mut self.base;
        let n = b.n_steps();
        let t_max = b.scalar("temperature_max")?;
        let t_min = b.scalar("temperature_min")?;
        if t_min >= t_max {
            return Err(ComponentError::config(
                b.id(),
                format!("temperature_min {t_min} K must be below temperature_max {t_max} K"),
            ));
        }
        let flow: Vec<f64> = b
            .time_series("mass_flow")?
            .into_iter()
            .map(|m| m * mult)
            .collect();

        let q = b.derived_symbol(ctx, "heat_flow_profile", Shape::vector(n), profile)?;
        let m = b.derived_symbol(ctx, "mass_flow_profile", Shape::vector(n), flow)?;
        let upper = b.symbol(ctx, "temperature_max")?;
        let lower = b.symbol(ctx, "temperature_min")?;

        let hf = b.declare_series(ctx, "heat_flow", Bounds::free())?;
        let mf = b.declare_series(ctx, "mass_flow", Bounds::free())?;
        let t_sup = b.declare_series(ctx, "Tsup", Bounds::free())?;
        let t_ret = b.declare_series(ctx, "Tret", Bounds::free())?;
        let s_max = b.declare_slack(ctx, "temperature_max_slack", Shape::matrix(2, n))?;
        let s_min = b.declare_slack(ctx, "temperature_min_slack", Shape::matrix(2, n))?;

        if let Some(t0) = b.optional_scalar("temperature_supply_0")? {
            ctx.set_initial_all(&t_sup, t0)?;
        }
        if let Some(t0) = b.optional_scalar("temperature_return_0")? {
            ctx.set_initial_all(&t_ret, t0)?;
        }

        b.add_constraints(
            ctx,
            "fix_heat_flow",
            (0..n).map(|t| Constraint::eq(hf.at(t), q.at(t))).collect(),
        )?;
        b.add_constraints(
            ctx,
            "fix_mass_flow",
            (0..n).map(|t| Constraint::eq(mf.at(t), m.at(t))).collect(),
        )?;
        b.add_constraints(
            ctx,
            "energy_balance",
            (0..n)
                .map(|t| {
                    Constraint::eq(hf.at(t), m.at(t) * CP_WATER * (t_sup.at(t) - t_ret.at(t)))
                })
                .collect(),
        )?;

        let lines = [t_sup, t_ret];
        let mut max_rows = Vec::with_capacity(2 * n);
        let mut min_rows = Vec::with_capacity(2 * n);
        for (row, line) in lines.iter().enumerate() {
            for t in 0..n {
                max_rows.push(Constraint::le(line.at(t) - s_max.at2(row, t), upper.at(0)));
                min_rows.push(Constraint::ge(line.at(t) + s_min.at2(row, t), lower.at(0)));
            }
        }
        b.add_constraints(ctx, "soft_temperature_max", max_rows)?;
        b.add_constraints(ctx, "soft_temperature_min", min_rows)?;

        let slack_total = Expr::sum(
            (0..2)
                .flat_map(|row| (0..n).map(move |t| (row, t)))
                .flat_map(|(row, t)| [s_max.at2(row, t), s_min.at2(row, t)]),
        );
        b.add_expression(ctx, "temperature_slack", slack_total)?;
        let step = b.horizon().step_s();
        b.add_expression(ctx, "heat_demand", heat_demand(&hf, n, step))?;
        Ok(())
    }
}

/// Delivered heat over the horizon (kWh).
fn heat_demand(hf: &VarHandle, n: usize, step_s: f64) -> Expr {
    Expr::sum((0..n).map(|t| hf.at(t) * (step_s / J_PER_KWH)))
}

impl Component for FixedProfileLoad {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()> {
        self.base.begin_compile(start)?;
        let mult = self.base.scalar("mult")?;
        let profile: Vec<f64> = self
            .base
            .time_series("heat_profile")?
            .into_iter()
            .map(|q| q * mult)
            .collect();
        if self.base.options().temperature_driven {
            self.compile_temperature(ctx, mult, profile)?;
        } else {
            self.compile_delta_t(ctx, profile)?;
        }
        self.base.finish_compile();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dh_model::Solution;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn horizon() -> Horizon {
        Horizon::from_seconds(3.0 * 3600.0, 3600.0).unwrap()
    }

    fn load() -> FixedProfileLoad {
        let mut l = FixedProfileLoad::new("building", horizon(), ComponentOptions::default());
        l.change_param("delta_T", 20.0.into()).unwrap();
        l.change_param("mult", 2.0.into()).unwrap();
        l.change_param(
            "heat_profile",
            vec![(0.0, 1000.0), (3600.0, 2000.0), (7200.0, 1500.0)].into(),
        )
        .unwrap();
        l
    }

    #[test]
    fn profile_fixes_heat_and_mass_flow() {
        let mut l = load();
        let mut ctx = ModelContext::new();
        l.compile(&mut ctx, start()).unwrap();
        l.set_parameters(&mut ctx).unwrap();

        let heat = [2000.0, 4000.0, 3000.0];
        let flow: Vec<f64> = heat.iter().map(|q| q / (CP_WATER * 20.0)).collect();
        let mut sol = Solution::zeros(&ctx);
        sol.set(l.get_var("heat_flow").unwrap(), &heat).unwrap();
        sol.set(l.get_var("mass_flow").unwrap(), &flow).unwrap();
        assert!(ctx.verify(&sol, 1e-9).unwrap().is_empty());

        sol.set(l.get_var("heat_flow").unwrap(), &[1000.0, 2000.0, 1500.0])
            .unwrap();
        assert!(!ctx.verify(&sol, 1e-9).unwrap().is_empty());

        let demand = ctx.evaluate_with(l.get_expression("heat_demand").unwrap(), &sol);
        assert!((demand - 4500.0 * 3600.0 / J_PER_KWH).abs() < 1e-12);
    }

    #[test]
    fn missing_profile_declares_nothing() {
        let mut l = FixedProfileLoad::new("building", horizon(), ComponentOptions::default());
        l.change_param("delta_T", 20.0.into()).unwrap();
        let mut ctx = ModelContext::new();
        let err = l.compile(&mut ctx, start()).unwrap_err();
        assert!(matches!(err, ComponentError::MissingParameter { ref name, .. } if name == "heat_profile"));
        assert_eq!(ctx.stats().scalar_variables, 0);
    }

    #[test]
    fn temperature_driven_soft_bounds() {
        let options = ComponentOptions {
            temperature_driven: true,
            ..Default::default()
        };
        let mut l = FixedProfileLoad::new("building", horizon(), options);
        l.change_param("heat_profile", 41_800.0.into()).unwrap();
        l.change_param("mass_flow", 1.0.into()).unwrap();
        l.change_param("temperature_supply_0", 343.15.into()).unwrap();
        let mut ctx = ModelContext::new();
        l.compile(&mut ctx, start()).unwrap();
        l.set_parameters(&mut ctx).unwrap();
        assert!(l.get_slack("temperature_max_slack").is_ok());
        assert!(l.get_var("temperature_max_slack").is_err());

        let t_sup = *l.get_var("Tsup").unwrap();
        let t_ret = *l.get_var("Tret").unwrap();
        assert_eq!(ctx.initial(&t_sup).unwrap()[0], Some(343.15));
        assert_eq!(ctx.initial(&t_ret).unwrap()[0], None);

        let mut sol = Solution::zeros(&ctx);
        sol.set(l.get_var("heat_flow").unwrap(), &[41_800.0; 3]).unwrap();
        sol.set(l.get_var("mass_flow").unwrap(), &[1.0; 3]).unwrap();
        sol.set(&t_sup, &[343.15; 3]).unwrap();
        sol.set(&t_ret, &[333.15; 3]).unwrap();
        assert!(ctx.verify(&sol, 1e-6).unwrap().is_empty());

        // supply above the soft maximum needs slack
        sol.set(&t_sup, &[373.15; 3]).unwrap();
        sol.set(&t_ret, &[363.15; 3]).unwrap();
        assert!(!ctx.verify(&sol, 1e-6).unwrap().is_empty());
        let slack = *l.get_slack("temperature_max_slack").unwrap();
        sol.set(&slack, &[10.0, 10.0, 10.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(ctx.verify(&sol, 1e-6).unwrap().is_empty());
        let penalty = ctx.evaluate_with(l.get_expression("temperature_slack").unwrap(), &sol);
        assert_eq!(penalty, 30.0);
    }

    #[test]
    fn delta_t_is_not_a_temperature_mode_parameter() {
        let options = ComponentOptions {
            temperature_driven: true,
            ..Default::default()
        };
        let mut l = FixedProfileLoad::new("building", horizon(), options);
        assert!(matches!(
            l.change_param("delta_T", 20.0.into()),
            Err(ComponentError::UnknownParameter { .. })
        ));
    }
}
