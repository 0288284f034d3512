//! Dispatchable heat production plant.

use crate::base::ComponentBase;
use crate::common::check_positive;
use crate::error::{ComponentError, ComponentResult};
use crate::horizon::Horizon;
use crate::schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use crate::traits::Component;
use chrono::NaiveDateTime;
use dh_core::units::constants::{CP_WATER, J_PER_KWH};
use dh_model::{Bounds, Constraint, Expr, ModelContext, Shape, VarHandle};

const PLANT: [ParamSpec; 8] = [
    ParamSpec::required(
        "efficiency",
        "Conversion efficiency of the plant",
        "-",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "PEF",
        "Primary energy factor of the fuel",
        "-",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::required(
        "CO2",
        "CO2 emission per unit of fuel",
        "kg/kWh",
        ParamKind::Scalar,
    ),
    ParamSpec::required(
        "fuel_cost",
        "Cost of one unit of fuel",
        "EUR/kWh",
        ParamKind::TimeSeries,
    ),
    ParamSpec::required("Qmax", "Maximum heat output", "W", ParamKind::Scalar),
    ParamSpec::optional(
        "ramp",
        "Maximum change of heat output per second",
        "W/s",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "ramp_cost",
        "Cost of changing the heat output",
        "EUR/W",
        ParamKind::Scalar,
        0.0,
    ),
    ParamSpec::optional(
        "CO2_price",
        "Price of emitted CO2",
        "EUR/kg",
        ParamKind::TimeSeries,
    ),
];

pub const SCHEMA: &[ParamSpec] = &[
    PLANT[0],
    PLANT[1],
    PLANT[2],
    PLANT[3],
    PLANT[4],
    PLANT[5],
    PLANT[6],
    PLANT[7],
    ParamSpec::required(
        "delta_T",
        "Temperature difference between supply and return",
        "K",
        ParamKind::Scalar,
    ),
];

pub const TEMPERATURE_SCHEMA: &[ParamSpec] = &[
    PLANT[0],
    PLANT[1],
    PLANT[2],
    PLANT[3],
    PLANT[4],
    PLANT[5],
    PLANT[6],
    PLANT[7],
    ParamSpec::required(
        "mass_flow",
        "Mass flow through the plant",
        "kg/s",
        ParamKind::TimeSeries,
    ),
    ParamSpec::with_default(
        "temperature_max",
        "Maximum supply and return temperature",
        "K",
        ParamKind::Scalar,
        373.15,
    ),
    ParamSpec::with_default(
        "temperature_min",
        "Minimum supply and return temperature",
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

/// Plant with bounded, ramp-limited output.
///
/// Always exposes the named expressions `energy` (kWh primary energy),
/// `cost` (EUR) and `co2` (kg) so the caller can pick any of them as the
/// objective.
#[derive(Debug, Clone)]
pub struct VariableProducer {
    base: ComponentBase,
}

impl VariableProducer {
    pub fn new(id: impl Into<String>, horizon: Horizon, options: ComponentOptions) -> Self {
        Self {
            base: ComponentBase::new(id, ComponentKind::VariableProducer, horizon, options),
        }
    }

    fn validate(&self) -> ComponentResult<()> {
        let b = &self.base;
        let id = b.id();
        check_positive(id, b.scalar("efficiency")?, "efficiency")?;
        check_positive(id, b.scalar("Qmax")?, "Qmax")?;
        if let Some(ramp) = b.optional_scalar("ramp")? {
            check_positive(id, ramp, "ramp")?;
        }
        if b.scalar("ramp_cost")? < 0.0 {
            return Err(ComponentError::config(id, "ramp_cost must not be negative"));
        }
        if b.options().temperature_driven {
            let t_max = b.scalar("temperature_max")?;
            let t_min = b.scalar("temperature_min")?;
            if t_min >= t_max {
                return Err(ComponentError::config(
                    id,
                    format!("temperature_min {t_min} K must be below temperature_max {t_max} K"),
                ));
            }
        } else {
            check_positive(id, b.scalar("delta_T")?, "delta_T")?;
        }
        Ok(())
    }

    /// `heat_flow = mass_flow * cp * delta_T`
    fn delta_t_balance(
        &mut self,
        ctx: &mut ModelContext,
        hf: &VarHandle,
        mf: &VarHandle,
    ) -> ComponentResult<()> {
        let b = &mut self.base;
        let n = b.n_steps();
        let delta_t = b.symbol(ctx, "delta_T")?;
        b.add_constraints(
            ctx,
            "energy_balance",
            (0..n)
                .map(|t| Constraint::eq(hf.at(t), mf.at(t) * CP_WATER * delta_t.at(0)))
                .collect(),
        )
    }

    /// Imposed mass flow with explicit supply and return temperatures.
    fn temperature_balance(
        &mut self,
        ctx: &mut ModelContext,
        hf: &VarHandle,
        mf: &VarHandle,
    ) -> ComponentResult<()> {
        let b = &mut self.base;
        let n = b.n_steps();
        let bounds = Bounds::between(b.scalar("temperature_min")?, b.scalar("temperature_max")?);
        let flow = b.time_series("mass_flow")?;
        let m = b.derived_symbol(ctx, "mass_flow_profile", Shape::vector(n), flow)?;
        let t_sup = b.declare_series(ctx, "Tsup", bounds)?;
        let t_ret = b.declare_series(ctx, "Tret", bounds)?;
        if let Some(t0) = b.optional_scalar("temperature_supply_0")? {
            ctx.set_initial_all(&t_sup, t0)?;
        }
        if let Some(t0) = b.optional_scalar("temperature_return_0")? {
            ctx.set_initial_all(&t_ret, t0)?;
        }
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
        )
    }

    fn ramping(
        &mut self,
        ctx: &mut ModelContext,
        hf: &VarHandle,
    ) -> ComponentResult<Option<VarHandle>> {
        let b = &mut self.base;
        let n = b.n_steps();
        if n < 2 {
            return Ok(None);
        }
        let step = b.horizon().step_s();
        let delta = |t: usize| hf.at(t) - hf.at(t - 1);

        if b.has_param("ramp") {
            let ramp = b.symbol(ctx, "ramp")?;
            b.add_constraints(
                ctx,
                "ramp_up",
                (1..n)
                    .map(|t| Constraint::le(delta(t), ramp.at(0) * step))
                    .collect(),
            )?;
            b.add_constraints(
                ctx,
                "ramp_down",
                (1..n)
                    .map(|t| Constraint::le(-delta(t), ramp.at(0) * step))
                    .collect(),
            )?;
        }

        let ramp_abs =
            b.declare_var(ctx, "ramp_abs", Shape::vector(n - 1), Bounds::non_negative())?;
        b.add_constraints(
            ctx,
            "ramp_abs_pos",
            (1..n)
                .map(|t| Constraint::ge(ramp_abs.at(t - 1), delta(t)))
                .collect(),
        )?;
        b.add_constraints(
            ctx,
            "ramp_abs_neg",
            (1..n)
                .map(|t| Constraint::ge(ramp_abs.at(t - 1), -delta(t)))
                .collect(),
        )?;
        Ok(Some(ramp_abs))
    }

    fn accounting(
        &mut self,
        ctx: &mut ModelContext,
        hf: &VarHandle,
        ramp_abs: Option<VarHandle>,
    ) -> ComponentResult<()> {
        let b = &mut self.base;
        let n = b.n_steps();
        let step = b.horizon().step_s();
        let eff = b.symbol(ctx, "efficiency")?;
        let pef = b.symbol(ctx, "PEF")?;
        let co2 = b.symbol(ctx, "CO2")?;
        let fuel_cost = b.symbol(ctx, "fuel_cost")?;
        let ramp_cost = b.symbol(ctx, "ramp_cost")?;
        let co2_price = if b.has_param("CO2_price") {
            Some(b.symbol(ctx, "CO2_price")?)
        } else {
            None
        };

        // fuel use per step in kWh
        let fuel = |t: usize| hf.at(t) * (step / J_PER_KWH) / eff.at(0);

        let energy = Expr::sum((0..n).map(|t| fuel(t) * pef.at(0)));
        let emissions = Expr::sum((0..n).map(|t| fuel(t) * co2.at(0)));
        let mut cost_terms: Vec<Expr> = (0..n).map(|t| fuel(t) * fuel_cost.at(t)).collect();
        if let Some(ramp_abs) = ramp_abs {
            cost_terms.extend((0..ramp_abs.len()).map(|k| ramp_abs.at(k) * ramp_cost.at(0)));
        }
        if let Some(price) = co2_price {
            cost_terms.extend((0..n).map(|t| fuel(t) * co2.at(0) * price.at(t)));
        }

        b.add_expression(ctx, "energy", energy)?;
        b.add_expression(ctx, "cost", Expr::sum(cost_terms))?;
        b.add_expression(ctx, "co2", emissions)?;
        Ok(())
    }
}

impl Component for VariableProducer {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()> {
        self.base.begin_compile(start)?;
        self.validate()?;

        let q_max = self.base.scalar("Qmax")?;
        let mf_bounds = if self.base.options().allow_flow_reversal {
            Bounds::free()
        } else {
            Bounds::non_negative()
        };
        let hf = self
            .base
            .declare_series(ctx, "heat_flow", Bounds::between(0.0, q_max))?;
        let mf = self.base.declare_series(ctx, "mass_flow", mf_bounds)?;

        if self.base.options().temperature_driven {
            self.temperature_balance(ctx, &hf, &mf)?;
        } else {
            self.delta_t_balance(ctx, &hf, &mf)?;
        }
        let ramp_abs = self.ramping(ctx, &hf)?;
        self.accounting(ctx, &hf, ramp_abs)?;

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

    fn plant() -> VariableProducer {
        let horizon = Horizon::from_seconds(3.0 * 3600.0, 3600.0).unwrap();
        let mut p = VariableProducer::new("plant", horizon, ComponentOptions::default());
        p.change_param("efficiency", 0.5.into()).unwrap();
        p.change_param("PEF", 2.0.into()).unwrap();
        p.change_param("CO2", 0.2.into()).unwrap();
        p.change_param("fuel_cost", 0.1.into()).unwrap();
        p.change_param("Qmax", 1e6.into()).unwrap();
        p.change_param("ramp", 100.0.into()).unwrap();
        p.change_param("ramp_cost", 0.01.into()).unwrap();
        p.change_param("delta_T", 40.0.into()).unwrap();
        p
    }

    fn candidate(ctx: &ModelContext, p: &VariableProducer, heat: &[f64]) -> Solution {
        let mut sol = Solution::zeros(ctx);
        let flow: Vec<f64> = heat.iter().map(|q| q / (CP_WATER * 40.0)).collect();
        let ramp: Vec<f64> = heat.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        sol.set(p.get_var("heat_flow").unwrap(), heat).unwrap();
        sol.set(p.get_var("mass_flow").unwrap(), &flow).unwrap();
        sol.set(p.get_var("ramp_abs").unwrap(), &ramp).unwrap();
        sol
    }

    #[test]
    fn heat_flow_bounds_round_trip() {
        let mut p = plant();
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        let bounds = ctx.bounds(p.get_var("heat_flow").unwrap()).unwrap();
        assert_eq!(bounds.len(), 3);
        assert!(bounds.iter().all(|b| *b == Bounds::between(0.0, 1e6)));
        let flow = ctx.bounds(p.get_var("mass_flow").unwrap()).unwrap();
        assert!(flow.iter().all(|b| *b == Bounds::non_negative()));
    }

    #[test]
    fn ramp_limits_consecutive_steps() {
        let mut p = plant();
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        p.set_parameters(&mut ctx).unwrap();

        let ok = candidate(&ctx, &p, &[100_000.0, 400_000.0, 100_000.0]);
        assert!(ctx.verify(&ok, 1e-6).unwrap().is_empty());

        // 100 W/s over one hour allows at most 360 kW of change
        let too_fast = candidate(&ctx, &p, &[0.0, 400_000.0, 400_000.0]);
        let violations = ctx.verify(&too_fast, 1e-6).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].what.starts_with("plant.ramp_up"));
    }

    #[test]
    fn accounting_expressions() {
        let mut p = plant();
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        p.set_parameters(&mut ctx).unwrap();
        let heat = [1000.0, 2000.0, 1000.0];
        let sol = candidate(&ctx, &p, &heat);

        // 4000 W over one hour each = 4 kWh heat, 8 kWh fuel
        let energy = ctx.evaluate_with(p.get_expression("energy").unwrap(), &sol);
        assert!((energy - 16.0).abs() < 1e-9);
        let co2 = ctx.evaluate_with(p.get_expression("co2").unwrap(), &sol);
        assert!((co2 - 1.6).abs() < 1e-9);
        let cost = ctx.evaluate_with(p.get_expression("cost").unwrap(), &sol);
        assert!((cost - (0.8 + 0.01 * 2000.0)).abs() < 1e-9);
        assert!(p.get_expression("heat").is_err());
    }

    #[test]
    fn co2_price_adds_to_cost() {
        let mut p = plant();
        p.change_param("CO2_price", 0.05.into()).unwrap();
        p.change_param("ramp_cost", 0.0.into()).unwrap();
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        p.set_parameters(&mut ctx).unwrap();
        let sol = candidate(&ctx, &p, &[1000.0, 1000.0, 1000.0]);
        // 6 kWh fuel: 0.6 EUR fuel, 1.2 kg CO2 at 0.05 EUR/kg
        let cost = ctx.evaluate_with(p.get_expression("cost").unwrap(), &sol);
        assert!((cost - 0.66).abs() < 1e-9);
    }

    #[test]
    fn invalid_efficiency_is_rejected_before_declaring() {
        let mut p = plant();
        p.change_param("efficiency", 0.0.into()).unwrap();
        let mut ctx = ModelContext::new();
        assert!(p.compile(&mut ctx, start()).unwrap_err().is_configuration());
        assert_eq!(ctx.stats().variable_blocks, 0);
    }

    #[test]
    fn second_compile_is_an_error() {
        let mut p = plant();
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        assert!(matches!(
            p.compile(&mut ctx, start()),
            Err(ComponentError::AlreadyCompiled { .. })
        ));
    }

    #[test]
    fn temperature_driven_producer() {
        let horizon = Horizon::from_seconds(7200.0, 3600.0).unwrap();
        let options = ComponentOptions {
            temperature_driven: true,
            ..Default::default()
        };
        let mut p = VariableProducer::new("plant", horizon, options);
        for (name, v) in [
            ("efficiency", 0.9),
            ("CO2", 0.2),
            ("fuel_cost", 0.03),
            ("Qmax", 1e6),
            ("mass_flow", 2.0),
            ("temperature_supply_0", 353.15),
            ("temperature_return_0", 323.15),
        ] {
            p.change_param(name, v.into()).unwrap();
        }
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        p.set_parameters(&mut ctx).unwrap();

        let t_sup = *p.get_var("Tsup").unwrap();
        assert!(ctx
            .bounds(&t_sup)
            .unwrap()
            .iter()
            .all(|b| *b == Bounds::between(283.15, 373.15)));

        let mut sol = Solution::from_initial(&ctx);
        let q = 2.0 * CP_WATER * 30.0;
        sol.set(p.get_var("heat_flow").unwrap(), &[q, q]).unwrap();
        sol.set(p.get_var("mass_flow").unwrap(), &[2.0, 2.0]).unwrap();
        assert!(ctx.verify(&sol, 1e-6).unwrap().is_empty());
    }
}
