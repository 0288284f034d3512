//! Building substation: counterflow heat exchanger between the network
//! (primary) loop and the building (secondary) loop.
//!
//! Per step the component emits
//!
//! ```text
//! q        = mf_prim * cp * (Tpsup - Tpret)
//! DTlm     = (DTa - DTb) / ln(DTa / DTb)
//! q        = K / (mf_prim^-b + mf_sec^-b) * DTlm
//! DTa      = Tpsup - T_rad_in
//! DTb      = Tpret - T_rad_out
//! ```
//!
//! together with the bounds that keep the logarithm defined
//! (`DTa >= margin`, `DTb >= margin`, `DTa - DTb >= separation`,
//! `mf_prim >= mf_min`). Nothing is clamped: when no primary flow can keep
//! both approach temperatures positive the model is infeasible.
//!
//! Steps without demand drop the separation, LMTD and exchanger rows. The
//! primary flow is held at `mf_min` and `DTlm` at the margin there, so the
//! balance row leaves `Tpsup = Tpret`.
//!
//! `heat_flow_tot[t] = mult * heat_flow[t]` is published per step next to
//! the `heat_delivered` energy total.

use crate::base::ComponentBase;
use crate::common::check_positive;
use crate::error::{ComponentError, ComponentResult};
use crate::horizon::Horizon;
use crate::schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use crate::traits::Component;
use chrono::NaiveDateTime;
use dh_core::units::constants::{CP_WATER, J_PER_KWH};
use dh_model::{Bounds, Constraint, Expr, ModelContext, Shape};
use tracing::{debug, warn};

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::with_default(
        "mult",
        "Number of identical buildings behind the substation",
        "-",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::required(
        "heat_flow",
        "Heat demand of one building",
        "W",
        ParamKind::TimeSeries,
    ),
    ParamSpec::required(
        "temperature_radiator_in",
        "Secondary supply temperature into the radiators",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::required(
        "temperature_radiator_out",
        "Secondary return temperature out of the radiators",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::optional(
        "temperature_supply_0",
        "Initial guess for the primary supply temperature",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::optional(
        "temperature_return_0",
        "Initial guess for the primary return temperature",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "temperature_max",
        "Maximum primary temperature",
        "K",
        ParamKind::Scalar,
        373.15,
    ),
    ParamSpec::with_default(
        "temperature_min",
        "Minimum primary temperature",
        "K",
        ParamKind::Scalar,
        283.15,
    ),
    ParamSpec::required(
        "thermal_size_HEx",
        "Heat exchanger sizing constant",
        "W/K",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "exponential_HEx",
        "Mass flow exponent of the heat exchanger",
        "-",
        ParamKind::Scalar,
        0.7,
    ),
    ParamSpec::with_default(
        "lmtd_margin",
        "Minimum approach temperature on both ends",
        "K",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::with_default(
        "lmtd_separation",
        "Minimum difference between the two approach temperatures",
        "K",
        ParamKind::Scalar,
        0.1,
    ),
    ParamSpec::with_default(
        "mf_min",
        "Minimum primary mass flow",
        "kg/s",
        ParamKind::Scalar,
        0.01,
    ),
    ParamSpec::with_default(
        "mf_sec_min",
        "Secondary mass flow used when there is no demand",
        "kg/s",
        ParamKind::Scalar,
        1e-3,
    ),
    ParamSpec::optional(
        "mf_prim_0",
        "Initial guess for the primary mass flow",
        "kg/s",
        ParamKind::Scalar,
    ),
];

/// Default initial guess for the primary mass flow (kg/s).
const MF_PRIM_GUESS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Substation {
    base: ComponentBase,
}

/// Validated scalar configuration of one compile.
struct Design {
    t_rad_in: f64,
    t_rad_out: f64,
    t_min: f64,
    t_max: f64,
    margin: f64,
    separation: f64,
    mf_min: f64,
    mf_sec_min: f64,
    mult: f64,
}

impl Substation {
    pub fn new(id: impl Into<String>, horizon: Horizon, options: ComponentOptions) -> Self {
        Self {
            base: ComponentBase::new(id, ComponentKind::Substation, horizon, options),
        }
    }

    fn design(&self) -> ComponentResult<Design> {
        let b = &self.base;
        let id = b.id();
        let t_rad_in = b.scalar("temperature_radiator_in")?;
        let t_rad_out = b.scalar("temperature_radiator_out")?;
        if t_rad_in <= t_rad_out {
            return Err(ComponentError::config(
                id,
                format!(
                    "temperature_radiator_in {t_rad_in} K must exceed \
                     temperature_radiator_out {t_rad_out} K"
                ),
            ));
        }
        let t_min = b.scalar("temperature_min")?;
        let t_max = b.scalar("temperature_max")?;
        if t_min >= t_max {
            return Err(ComponentError::config(
                id,
                format!("temperature_min {t_min} K must be below temperature_max {t_max} K"),
            ));
        }
        check_positive(id, b.scalar("thermal_size_HEx")?, "thermal_size_HEx")?;
        check_positive(id, b.scalar("exponential_HEx")?, "exponential_HEx")?;
        let mult = check_positive(id, b.scalar("mult")?, "mult")?;
        Ok(Design {
            t_rad_in,
            t_rad_out,
            t_min,
            t_max,
            margin: check_positive(id, b.scalar("lmtd_margin")?, "lmtd_margin")?,
            separation: check_positive(id, b.scalar("lmtd_separation")?, "lmtd_separation")?,
            mf_min: check_positive(id, b.scalar("mf_min")?, "mf_min")?,
            mf_sec_min: check_positive(id, b.scalar("mf_sec_min")?, "mf_sec_min")?,
            mult,
        })
    }

    /// Secondary mass flow per step, floored at `mf_sec_min`.
    fn secondary_flow(&self, heat: &[f64], d: &Design) -> Vec<f64> {
        let per_watt = 1.0 / (CP_WATER * (d.t_rad_in - d.t_rad_out));
        let mut floored = 0usize;
        let flows = heat
            .iter()
            .map(|q| {
                let mf = q * per_watt;
                if mf < d.mf_sec_min {
                    floored += 1;
                    d.mf_sec_min
                } else {
                    mf
                }
            })
            .collect();
        if floored > 0 {
            warn!(
                component = %self.base.id(),
                steps = floored,
                floor = d.mf_sec_min,
                "secondary mass flow floored where demand is too low"
            );
        }
        flows
    }

    /// LMTD of the initial temperature guesses, when they are admissible.
    fn lmtd_guess(&self, d: &Design) -> ComponentResult<Option<f64>> {
        let b = &self.base;
        let (Some(t_sup), Some(t_ret)) = (
            b.optional_scalar("temperature_supply_0")?,
            b.optional_scalar("temperature_return_0")?,
        ) else {
            return Ok(None);
        };
        let dta = t_sup - d.t_rad_in;
        let dtb = t_ret - d.t_rad_out;
        if dta - dtb >= d.separation && dtb >= d.margin {
            Ok(Some((dta - dtb) / (dta / dtb).ln()))
        } else {
            Ok(None)
        }
    }
}

impl Component for Substation {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()> {
        self.base.begin_compile(start)?;
        let d = self.design()?;
        let heat = self.base.time_series("heat_flow")?;
        let mf_sec_values = self.secondary_flow(&heat, &d);
        let dtlm_guess = self.lmtd_guess(&d)?;

        let b = &mut self.base;
        let n = b.n_steps();
        let beta = b.scalar("exponential_HEx")?;

        let q = b.symbol(ctx, "heat_flow")?;
        let mf_sec = b.derived_symbol(ctx, "mf_sec", Shape::vector(n), mf_sec_values)?;
        let t_rad_in = b.symbol(ctx, "temperature_radiator_in")?;
        let t_rad_out = b.symbol(ctx, "temperature_radiator_out")?;
        let k_hex = b.symbol(ctx, "thermal_size_HEx")?;
        let mult = b.symbol(ctx, "mult")?;

        let temperatures = Bounds::between(d.t_min, d.t_max);
        let mf_prim = b.declare_series(ctx, "mf_prim", Bounds::at_least(d.mf_min))?;
        let t_sup = b.declare_series(ctx, "Tpsup", temperatures)?;
        let t_ret = b.declare_series(ctx, "Tpret", temperatures)?;
        let dtlm = b.declare_series(ctx, "DTlm", Bounds::at_least(d.margin))?;
        let mf_tot =
            b.declare_series(ctx, "mass_flow_tot", Bounds::at_least(d.mult * d.mf_min))?;

        let mf_prim_0 = b.optional_scalar("mf_prim_0")?.unwrap_or(MF_PRIM_GUESS);
        ctx.set_initial_all(&mf_prim, mf_prim_0)?;
        ctx.set_initial_all(&mf_tot, d.mult * mf_prim_0)?;
        if let Some(t0) = b.optional_scalar("temperature_supply_0")? {
            ctx.set_initial_all(&t_sup, t0)?;
        }
        if let Some(t0) = b.optional_scalar("temperature_return_0")? {
            ctx.set_initial_all(&t_ret, t0)?;
        }
        if let Some(guess) = dtlm_guess {
            ctx.set_initial_all(&dtlm, guess)?;
        }

        let dta = |t: usize| t_sup.at(t) - t_rad_in.at(0);
        let dtb = |t: usize| t_ret.at(t) - t_rad_out.at(0);
        let rows = |f: &dyn Fn(usize) -> Constraint| (0..n).map(f).collect::<Vec<_>>();
        // without demand the primary side carries no heat: Tpsup = Tpret, so
        // the exchanger relations only hold on steps with positive demand
        let (active, idle): (Vec<usize>, Vec<usize>) = (0..n).partition(|&t| heat[t] > 0.0);
        let on = |steps: &[usize], f: &dyn Fn(usize) -> Constraint| {
            steps.iter().map(|&t| f(t)).collect::<Vec<_>>()
        };

        b.add_constraints(
            ctx,
            "primary_balance",
            rows(&|t| {
                Constraint::eq(q.at(t), mf_prim.at(t) * CP_WATER * (t_sup.at(t) - t_ret.at(t)))
            }),
        )?;
        b.add_constraints(
            ctx,
            "supply_approach",
            rows(&|t| Constraint::ge(dta(t), d.margin)),
        )?;
        b.add_constraints(
            ctx,
            "return_approach",
            rows(&|t| Constraint::ge(dtb(t), d.margin)),
        )?;
        b.add_constraints(
            ctx,
            "total_mass_flow",
            rows(&|t| Constraint::eq(mf_tot.at(t), mult.at(0) * mf_prim.at(t))),
        )?;
        if !active.is_empty() {
            b.add_constraints(
                ctx,
                "approach_separation",
                on(&active, &|t| Constraint::ge(dta(t) - dtb(t), d.separation)),
            )?;
            b.add_constraints(
                ctx,
                "lmtd_definition",
                on(&active, &|t| {
                    Constraint::eq(dtlm.at(t), (dta(t) - dtb(t)) / (dta(t) / dtb(t)).ln())
                }),
            )?;
            b.add_constraints(
                ctx,
                "heat_exchanger",
                on(&active, &|t| {
                    let conductance = k_hex.at(0)
                        / (mf_prim.at(t).powf(-beta) + mf_sec.at(t).powf(-beta));
                    Constraint::eq(q.at(t), conductance * dtlm.at(t))
                }),
            )?;
        }
        if !idle.is_empty() {
            debug!(component = %b.id(), steps = ?idle, "no demand; primary flow held at minimum");
            b.add_constraints(
                ctx,
                "idle_flow",
                on(&idle, &|t| Constraint::eq(mf_prim.at(t), d.mf_min)),
            )?;
            b.add_constraints(
                ctx,
                "idle_lmtd",
                on(&idle, &|t| Constraint::eq(dtlm.at(t), d.margin)),
            )?;
        }

        let heat_flow_tot = (0..n).map(|t| mult.at(0) * q.at(t)).collect();
        b.add_expression_series(ctx, "heat_flow_tot", heat_flow_tot)?;
        let step = b.horizon().step_s();
        let delivered = Expr::sum((0..n).map(|t| mult.at(0) * q.at(t) * (step / J_PER_KWH)));
        b.add_expression(ctx, "heat_delivered", delivered)?;

        self.base.finish_compile();
        Ok(())
    }
}
