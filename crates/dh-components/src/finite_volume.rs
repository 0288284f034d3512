//! Pipe with plug-flow heat transport discretized into control volumes.
//!
//! Both lines (supply and return) are split into `N` volumes of length
//! `dx = L / N`. With the Courant number `Co[t] = mf[t] * dt / (rho * A * dx)`
//! every volume follows the explicit upwind update
//!
//! ```text
//! T[i,t] = T[i,t-1] + Co[t] * (T_up[i,t-1] - T[i,t-1]) - Qloss[i,t-1] * dt / (rho * cp * A * dx)
//! Qloss[i,t] = dx * (T[i,t] - Tg[t]) / Rs[i]
//! ```
//!
//! At `Co = 1` this is the index shift `T[i,t] = T[i-1,t-1]`; at zero flow
//! only the loss term remains. The supply line flows from volume 0 to
//! `N - 1`, the return line the other way. `N` must keep the Courant number
//! at maximum flow below the configured `Courant` fraction, which is checked
//! before anything is declared.

use crate::base::ComponentBase;
use crate::common::{buried_pipe_resistance, check_positive, max_mass_flow, pipe_area};
use crate::error::{ComponentError, ComponentResult};
use crate::horizon::Horizon;
use crate::pipe::Endpoints;
use crate::schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use crate::traits::Component;
use chrono::NaiveDateTime;
use dh_core::units::constants::{CP_WATER, J_PER_KWH, RHO_WATER};
use dh_core::units::Length;
use dh_model::{Bounds, Constraint, Expr, ModelContext, Shape, VarHandle};
use tracing::debug;
use uom::si::length::meter;

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::required(
        "diameter",
        "Inner pipe diameter in metres (DN200 is 0.2, not 200)",
        "m",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "max_speed",
        "Maximum flow speed",
        "m/s",
        ParamKind::Scalar,
        3.0,
    ),
    ParamSpec::with_default(
        "Courant",
        "Largest admissible Courant number at maximum flow",
        "-",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::optional(
        "n_volumes",
        "Number of control volumes (derived from the stability bound when absent)",
        "-",
        ParamKind::Scalar,
    ),
    ParamSpec::required(
        "Tg",
        "Undisturbed ground temperature",
        "K",
        ParamKind::TimeSeries,
    ),
    ParamSpec::optional(
        "Rs",
        "Thermal resistance to the ground along the pipe",
        "K m/W",
        ParamKind::Curve,
    ),
    ParamSpec::with_default(
        "insulation_thickness",
        "Thickness of the pipe insulation",
        "m",
        ParamKind::Scalar,
        0.05,
    ),
    ParamSpec::with_default(
        "insulation_conductivity",
        "Thermal conductivity of the insulation",
        "W/(m K)",
        ParamKind::Scalar,
        0.024,
    ),
    ParamSpec::with_default(
        "soil_conductivity",
        "Thermal conductivity of the soil",
        "W/(m K)",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::with_default(
        "depth",
        "Burial depth of the pipe axis",
        "m",
        ParamKind::Scalar,
        1.0,
    ),
    ParamSpec::optional(
        "Tsup0",
        "Initial temperature of the supply line",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::optional(
        "Tret0",
        "Initial temperature of the return line",
        "K",
        ParamKind::Scalar,
    ),
    ParamSpec::with_default(
        "temperature_max",
        "Maximum water temperature",
        "K",
        ParamKind::Scalar,
        373.15,
    ),
    ParamSpec::with_default(
        "temperature_min",
        "Minimum water temperature",
        "K",
        ParamKind::Scalar,
        273.15,
    ),
];

/// Slack on the floor of the stability bound, so exact ratios are not lost
/// to rounding.
const VOLUME_ROUNDING: f64 = 1e-9;

/// Largest volume count that keeps the Courant number at `max_speed` below
/// `courant`: `floor(courant * L / (v_max * dt))`.
pub fn max_stable_volumes(length_m: f64, max_speed: f64, step_s: f64, courant: f64) -> usize {
    let limit = courant * length_m / (max_speed * step_s);
    if limit.is_finite() && limit > 0.0 {
        (limit + VOLUME_ROUNDING).floor() as usize
    } else {
        0
    }
}

/// Spatial layout fixed at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct Discretization {
    pub n_volumes: usize,
    /// Length of one volume (m).
    pub volume_length: f64,
    /// Inner cross-section (m2).
    pub cross_section: f64,
    /// Mass flow at maximum speed (kg/s).
    pub max_mass_flow: f64,
    /// Thermal resistance of each volume (K m/W).
    pub resistance: Vec<f64>,
}

impl Discretization {
    /// Courant number per unit mass flow.
    pub fn advection_factor(&self, step_s: f64) -> f64 {
        step_s / (RHO_WATER * self.cross_section * self.volume_length)
    }

    /// Temperature drop per unit of lost heat flow over one step.
    pub fn loss_factor(&self, step_s: f64) -> f64 {
        step_s / (RHO_WATER * CP_WATER * self.cross_section * self.volume_length)
    }
}

/// One of the two lines of the pipe.
struct Line {
    state: VarHandle,
    inlet: VarHandle,
    outlet: VarHandle,
    loss: VarHandle,
    /// Nominal flow runs from the last volume to the first.
    descending: bool,
}

impl Line {
    /// Volume at position `pos` counted from the nominal inlet.
    fn volume(&self, pos: usize, n_vol: usize) -> usize {
        if self.descending { n_vol - 1 - pos } else { pos }
    }

    fn nominal_upstream(&self, pos: usize, t: usize, n_vol: usize) -> Expr {
        if pos == 0 {
            self.inlet.at(t)
        } else {
            self.state.at2(self.volume(pos - 1, n_vol), t)
        }
    }

    fn reverse_upstream(&self, pos: usize, t: usize, n_vol: usize) -> Expr {
        if pos + 1 == n_vol {
            self.outlet.at(t)
        } else {
            self.state.at2(self.volume(pos + 1, n_vol), t)
        }
    }
}

enum Flow {
    Forward(VarHandle),
    Bidirectional { fwd: VarHandle, rev: VarHandle },
}

#[derive(Debug, Clone)]
pub struct FiniteVolumePipe {
    base: ComponentBase,
    length: Length,
    endpoints: Endpoints,
    layout: Option<Discretization>,
}

impl FiniteVolumePipe {
    pub fn new(
        id: impl Into<String>,
        horizon: Horizon,
        length: Length,
        options: ComponentOptions,
    ) -> Self {
        Self {
            base: ComponentBase::new(id, ComponentKind::FiniteVolumePipe, horizon, options),
            length,
            endpoints: Endpoints::default(),
            layout: None,
        }
    }

    pub fn with_nodes(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.endpoints = Endpoints {
            start_node: Some(start.into()),
            end_node: Some(end.into()),
        };
        self
    }

    pub fn length(&self) -> Length {
        self.length
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Layout chosen by the last successful compile.
    pub fn discretization(&self) -> Option<&Discretization> {
        self.layout.as_ref()
    }

    pub fn n_volumes(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| l.n_volumes)
    }

    pub fn volume_length(&self) -> Option<f64> {
        self.layout.as_ref().map(|l| l.volume_length)
    }

    pub fn cross_section(&self) -> Option<f64> {
        self.layout.as_ref().map(|l| l.cross_section)
    }

    pub fn resistance_per_volume(&self) -> Option<&[f64]> {
        self.layout.as_ref().map(|l| l.resistance.as_slice())
    }

    /// Validate the configuration and fix the spatial layout.
    pub fn discretize(&self) -> ComponentResult<Discretization> {
        let b = &self.base;
        let id = b.id();
        let length = check_positive(id, self.length.get::<meter>(), "length")?;
        let diameter = check_positive(id, b.scalar("diameter")?, "diameter")?;
        let max_speed = check_positive(id, b.scalar("max_speed")?, "max_speed")?;
        let courant = check_positive(id, b.scalar("Courant")?, "Courant")?;
        if courant > 1.0 {
            return Err(ComponentError::config(
                id,
                format!("Courant must not exceed 1, got {courant}"),
            ));
        }
        let step = b.horizon().step_s();
        let limit = max_stable_volumes(length, max_speed, step, courant);

        let n_volumes = match b.optional_scalar("n_volumes")? {
            Some(n) => {
                if !(n >= 1.0 && n.fract() == 0.0) {
                    return Err(ComponentError::config(
                        id,
                        format!("n_volumes must be a positive integer, got {n}"),
                    ));
                }
                let n = n as usize;
                if n > limit {
                    return Err(ComponentError::config(
                        id,
                        format!(
                            "{n} volumes of {:.3} m are crossed in less than one {step} s step \
                             at {max_speed} m/s; at most {limit} volumes are stable",
                            length / n as f64
                        ),
                    ));
                }
                n
            }
            None if limit == 0 => {
                return Err(ComponentError::config(
                    id,
                    format!(
                        "a {length} m pipe is crossed in less than one {step} s step \
                         at {max_speed} m/s"
                    ),
                ));
            }
            None => limit,
        };

        let dx = length / n_volumes as f64;
        let resistance = match b.curve("Rs", &volume_centres(n_volumes, dx))? {
            Some(values) => {
                for rs in &values {
                    check_positive(id, *rs, "Rs")?;
                }
                values
            }
            None => {
                let rs = buried_pipe_resistance(
                    id,
                    diameter,
                    b.scalar("insulation_thickness")?,
                    b.scalar("insulation_conductivity")?,
                    b.scalar("soil_conductivity")?,
                    b.scalar("depth")?,
                )?;
                vec![rs; n_volumes]
            }
        };

        let t_min = b.scalar("temperature_min")?;
        let t_max = b.scalar("temperature_max")?;
        if t_min >= t_max {
            return Err(ComponentError::config(
                id,
                format!("temperature_min {t_min} K must be below temperature_max {t_max} K"),
            ));
        }

        Ok(Discretization {
            n_volumes,
            volume_length: dx,
            cross_section: pipe_area(diameter),
            max_mass_flow: max_mass_flow(diameter, max_speed),
            resistance,
        })
    }

    fn transport_rows(&self, line: &Line, flow: &Flow, layout: &Discretization) -> Vec<Constraint> {
        let n = self.base.n_steps();
        let n_vol = layout.n_volumes;
        let step = self.base.horizon().step_s();
        let k_adv = layout.advection_factor(step);
        let k_loss = layout.loss_factor(step);

        let mut rows = Vec::with_capacity(n_vol * n.saturating_sub(1));
        for pos in 0..n_vol {
            let v = line.volume(pos, n_vol);
            for t in 1..n {
                let prev = line.state.at2(v, t - 1);
                let advection = match flow {
                    Flow::Forward(mf) => {
                        mf.at(t) * (line.nominal_upstream(pos, t - 1, n_vol) - prev.clone())
                    }
                    Flow::Bidirectional { fwd, rev } => {
                        fwd.at(t) * (line.nominal_upstream(pos, t - 1, n_vol) - prev.clone())
                            + rev.at(t) * (line.reverse_upstream(pos, t - 1, n_vol) - prev.clone())
                    }
                };
                rows.push(Constraint::eq(
                    line.state.at2(v, t),
                    prev + k_adv * advection - k_loss * line.loss.at2(v, t - 1),
                ));
            }
        }
        rows
    }

    /// Outlet (and, with reversal, inlet) coupling to the end volumes.
    fn coupling_rows(&self, line: &Line, flow: &Flow, n_vol: usize) -> Vec<Constraint> {
        let n = self.base.n_steps();
        let first = line.volume(0, n_vol);
        let last = line.volume(n_vol - 1, n_vol);
        match flow {
            Flow::Forward(_) => (0..n)
                .map(|t| Constraint::eq(line.outlet.at(t), line.state.at2(last, t)))
                .collect(),
            Flow::Bidirectional { fwd, rev } => (0..n)
                .flat_map(|t| {
                    [
                        Constraint::eq(
                            fwd.at(t) * (line.outlet.at(t) - line.state.at2(last, t)),
                            0.0,
                        ),
                        Constraint::eq(
                            rev.at(t) * (line.inlet.at(t) - line.state.at2(first, t)),
                            0.0,
                        ),
                    ]
                })
                .collect(),
        }
    }
}

fn volume_centres(n_volumes: usize, dx: f64) -> Vec<f64> {
    (0..n_volumes).map(|i| (i as f64 + 0.5) * dx).collect()
}

impl Component for FiniteVolumePipe {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()> {
        self.base.begin_compile(start)?;
        let layout = self.discretize()?;
        let n_vol = layout.n_volumes;
        let cap = layout.max_mass_flow;
        let reversal = self.base.options().allow_flow_reversal;
        debug!(
            component = %self.base.id(),
            n_volumes = n_vol,
            volume_length = layout.volume_length,
            "pipe discretized"
        );

        let b = &mut self.base;
        let n = b.n_steps();
        let tg = b.symbol(ctx, "Tg")?;
        let rs = b.derived_symbol(ctx, "Rs", Shape::vector(n_vol), layout.resistance.clone())?;

        let temperatures =
            Bounds::between(b.scalar("temperature_min")?, b.scalar("temperature_max")?);
        let volumes = Shape::matrix(n_vol, n);
        let supply = Line {
            state: b.declare_var(ctx, "Tsup", volumes, temperatures)?,
            inlet: b.declare_series(ctx, "Tsup_in", temperatures)?,
            outlet: b.declare_series(ctx, "Tsup_out", temperatures)?,
            loss: b.declare_var(ctx, "Qloss_sup", volumes, Bounds::free())?,
            descending: false,
        };
        let ret = Line {
            state: b.declare_var(ctx, "Tret", volumes, temperatures)?,
            inlet: b.declare_series(ctx, "Tret_in", temperatures)?,
            outlet: b.declare_series(ctx, "Tret_out", temperatures)?,
            loss: b.declare_var(ctx, "Qloss_ret", volumes, Bounds::free())?,
            descending: true,
        };
        let mf_bounds = if reversal {
            Bounds::between(-cap, cap)
        } else {
            Bounds::between(0.0, cap)
        };
        let mf = b.declare_series(ctx, "mass_flow", mf_bounds)?;
        let flow = if reversal {
            Flow::Bidirectional {
                fwd: b.declare_series(ctx, "mf_fwd", Bounds::between(0.0, cap))?,
                rev: b.declare_series(ctx, "mf_rev", Bounds::between(0.0, cap))?,
            }
        } else {
            Flow::Forward(mf)
        };

        for (line, param, rows_name) in [
            (&supply, "Tsup0", "initial_supply"),
            (&ret, "Tret0", "initial_return"),
        ] {
            if let Some(t0) = b.optional_scalar(param)? {
                let sym = b.symbol(ctx, param)?;
                ctx.set_initial_all(&line.state, t0)?;
                b.add_constraints(
                    ctx,
                    rows_name,
                    (0..n_vol)
                        .map(|v| Constraint::eq(line.state.at2(v, 0), sym.at(0)))
                        .collect(),
                )?;
            }
        }

        let dx = layout.volume_length;
        for (line, rows_name) in [(&supply, "heat_loss_supply"), (&ret, "heat_loss_return")] {
            let rows = (0..n_vol)
                .flat_map(|v| (0..n).map(move |t| (v, t)))
                .map(|(v, t)| {
                    Constraint::eq(
                        line.loss.at2(v, t),
                        (line.state.at2(v, t) - tg.at(t)) * dx / rs.at(v),
                    )
                })
                .collect();
            b.add_constraints(ctx, rows_name, rows)?;
        }

        if let Flow::Bidirectional { fwd, rev } = &flow {
            b.add_constraints(
                ctx,
                "flow_split",
                (0..n)
                    .map(|t| Constraint::eq(mf.at(t), fwd.at(t) - rev.at(t)))
                    .collect(),
            )?;
            b.add_constraints(
                ctx,
                "complementarity",
                (0..n)
                    .map(|t| Constraint::eq(fwd.at(t) * rev.at(t), 0.0))
                    .collect(),
            )?;
        }

        let transport_supply = self.transport_rows(&supply, &flow, &layout);
        let transport_return = self.transport_rows(&ret, &flow, &layout);
        let coupling_supply = self.coupling_rows(&supply, &flow, n_vol);
        let coupling_return = self.coupling_rows(&ret, &flow, n_vol);

        let b = &mut self.base;
        b.add_constraints(ctx, "transport_supply", transport_supply)?;
        b.add_constraints(ctx, "transport_return", transport_return)?;
        b.add_constraints(ctx, "outlet_supply", coupling_supply)?;
        b.add_constraints(ctx, "outlet_return", coupling_return)?;

        let step = b.horizon().step_s();
        let lost = Expr::sum((0..n_vol).flat_map(|v| {
            let (supply, ret) = (&supply, &ret);
            (0..n).map(move |t| {
                (supply.loss.at2(v, t) + ret.loss.at2(v, t)) * (step / J_PER_KWH)
            })
        }));
        b.add_expression(ctx, "heat_loss", lost)?;

        b.finish_compile();
        self.layout = Some(layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dh_core::units::m;
    use dh_model::Solution;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// 180 m at 3 m/s with 20 s steps: at most three volumes.
    fn pipe(options: ComponentOptions) -> FiniteVolumePipe {
        let horizon = Horizon::from_seconds(80.0, 20.0).unwrap();
        let mut p = FiniteVolumePipe::new("pipe", horizon, m(180.0), options)
            .with_nodes("plant", "street");
        p.change_param("diameter", 0.1.into()).unwrap();
        p.change_param("Tg", 283.15.into()).unwrap();
        p
    }

    fn compiled(mut p: FiniteVolumePipe) -> (FiniteVolumePipe, ModelContext) {
        let mut ctx = ModelContext::new();
        p.compile(&mut ctx, start()).unwrap();
        p.set_parameters(&mut ctx).unwrap();
        (p, ctx)
    }

    /// Row-major `n_vol x n` block from per-volume series.
    fn flatten(rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().flatten().copied().collect()
    }

    fn losses(temps: &[Vec<f64>], tg: f64, dx: f64, rs: &[f64]) -> Vec<Vec<f64>> {
        temps
            .iter()
            .zip(rs)
            .map(|(row, r)| row.iter().map(|t| dx * (t - tg) / r).collect())
            .collect()
    }

    #[test]
    fn derives_volume_count_from_stability_bound() {
        let (p, ctx) = compiled(pipe(ComponentOptions::default()));
        assert_eq!(p.n_volumes(), Some(3));
        assert_eq!(p.volume_length(), Some(60.0));
        let tsup = p.get_var("Tsup").unwrap();
        assert_eq!(tsup.shape, Shape::matrix(3, 4));
        assert!(!ctx.stats().is_linear());
        assert_eq!(max_stable_volumes(180.0, 3.0, 20.0, 0.5), 1);
        assert_eq!(max_stable_volumes(10.0, 3.0, 20.0, 1.0), 0);
    }

    #[test]
    fn unstable_volume_count_is_rejected_before_declaring() {
        let mut p = pipe(ComponentOptions::default());
        p.change_param("n_volumes", 4.0.into()).unwrap();
        let mut ctx = ModelContext::new();
        let err = p.compile(&mut ctx, start()).unwrap_err();
        assert!(matches!(err, ComponentError::Configuration { .. }));
        let stats = ctx.stats();
        assert_eq!(stats.variable_blocks, 0);
        assert_eq!(stats.parameter_blocks, 0);
        assert_eq!(stats.constraint_rows, 0);
        assert!(p.n_volumes().is_none());
    }

    #[test]
    fn fractional_volume_count_is_rejected() {
        let mut p = pipe(ComponentOptions::default());
        p.change_param("n_volumes", 2.5.into()).unwrap();
        let mut ctx = ModelContext::new();
        assert!(p.compile(&mut ctx, start()).unwrap_err().is_configuration());
    }

    #[test]
    fn short_pipe_without_volume_count_is_rejected() {
        let horizon = Horizon::from_seconds(80.0, 20.0).unwrap();
        let mut p = FiniteVolumePipe::new("pipe", horizon, m(30.0), ComponentOptions::default());
        p.change_param("diameter", 0.1.into()).unwrap();
        p.change_param("Tg", 283.15.into()).unwrap();
        let mut ctx = ModelContext::new();
        assert!(p.compile(&mut ctx, start()).unwrap_err().is_configuration());
    }

    #[test]
    fn zero_flow_only_decays() {
        let mut p = pipe(ComponentOptions::default());
        p.change_param("Tsup0", 343.15.into()).unwrap();
        p.change_param("Tret0", 313.15.into()).unwrap();
        let (p, mut ctx) = compiled(p);
        let mf = *p.get_var("mass_flow").unwrap();
        ctx.fix_var(&mf, &[0.0; 4]).unwrap();

        let layout = p.discretization().unwrap().clone();
        let dx = layout.volume_length;
        let rs = layout.resistance.clone();
        let k_loss = layout.loss_factor(20.0);
        let decay = |t0: f64| -> Vec<Vec<f64>> {
            rs.iter()
                .map(|r| {
                    let mut row = vec![t0];
                    for t in 1..4 {
                        let prev: f64 = row[t - 1];
                        row.push(prev - k_loss * dx * (prev - 283.15) / r);
                    }
                    row
                })
                .collect()
        };
        let sup = decay(343.15);
        let ret = decay(313.15);
        assert!(sup[0][3] < sup[0][0] && sup[0][3] > 283.15);

        let mut sol = Solution::zeros(&ctx);
        sol.set(p.get_var("Tsup").unwrap(), &flatten(&sup)).unwrap();
        sol.set(p.get_var("Tret").unwrap(), &flatten(&ret)).unwrap();
        sol.set(p.get_var("Qloss_sup").unwrap(), &flatten(&losses(&sup, 283.15, dx, &rs)))
            .unwrap();
        sol.set(p.get_var("Qloss_ret").unwrap(), &flatten(&losses(&ret, 283.15, dx, &rs)))
            .unwrap();
        // hot water at the inlets must not move at zero flow
        sol.set(p.get_var("Tsup_in").unwrap(), &[363.15; 4]).unwrap();
        sol.set(p.get_var("Tret_in").unwrap(), &[333.15; 4]).unwrap();
        sol.set(p.get_var("Tsup_out").unwrap(), &sup[2]).unwrap();
        sol.set(p.get_var("Tret_out").unwrap(), &ret[0]).unwrap();
        let violations = ctx.verify(&sol, 1e-9).unwrap();
        assert!(violations.is_empty(), "{violations:?}");

        let loss = ctx.evaluate_with(p.get_expression("heat_loss").unwrap(), &sol);
        assert!(loss > 0.0);

        // advecting the inlet into the first volume is not a zero-flow state
        let mut advected = sup.clone();
        advected[0][1] = 363.15;
        sol.set(p.get_var("Tsup").unwrap(), &flatten(&advected)).unwrap();
        assert!(!ctx.verify(&sol, 1e-9).unwrap().is_empty());
    }

    /// Inlet series and initial states for the shift tests; a huge ground
    /// resistance makes the losses negligible.
    fn lossless(options: ComponentOptions) -> (FiniteVolumePipe, ModelContext) {
        let mut p = pipe(options);
        p.change_param("Rs", 1e12.into()).unwrap();
        compiled(p)
    }

    fn set_losses(p: &FiniteVolumePipe, sol: &mut Solution, sup: &[Vec<f64>], ret: &[Vec<f64>]) {
        let rs = vec![1e12; 3];
        sol.set(p.get_var("Qloss_sup").unwrap(), &flatten(&losses(sup, 283.15, 60.0, &rs)))
            .unwrap();
        sol.set(p.get_var("Qloss_ret").unwrap(), &flatten(&losses(ret, 283.15, 60.0, &rs)))
            .unwrap();
    }

    #[test]
    fn full_speed_is_an_index_shift() {
        let (p, ctx) = lossless(ComponentOptions::default());
        let cap = p.discretization().unwrap().max_mass_flow;
        let sup_in = [360.0, 361.0, 362.0, 363.0];
        let ret_in = [320.0, 321.0, 322.0, 323.0];

        // supply: volume 0 takes the inlet, every volume its upstream neighbour
        let mut sup = vec![vec![340.0], vec![345.0], vec![350.0]];
        let mut ret = vec![vec![310.0], vec![315.0], vec![318.0]];
        for t in 1..4 {
            let s: Vec<f64> = (0..3)
                .map(|i| if i == 0 { sup_in[t - 1] } else { sup[i - 1][t - 1] })
                .collect();
            let r: Vec<f64> = (0..3)
                .map(|i| if i == 2 { ret_in[t - 1] } else { ret[i + 1][t - 1] })
                .collect();
            for i in 0..3 {
                sup[i].push(s[i]);
                ret[i].push(r[i]);
            }
        }

        let mut sol = Solution::zeros(&ctx);
        sol.set(p.get_var("mass_flow").unwrap(), &[cap; 4]).unwrap();
        sol.set(p.get_var("Tsup").unwrap(), &flatten(&sup)).unwrap();
        sol.set(p.get_var("Tret").unwrap(), &flatten(&ret)).unwrap();
        sol.set(p.get_var("Tsup_in").unwrap(), &sup_in).unwrap();
        sol.set(p.get_var("Tret_in").unwrap(), &ret_in).unwrap();
        sol.set(p.get_var("Tsup_out").unwrap(), &sup[2]).unwrap();
        sol.set(p.get_var("Tret_out").unwrap(), &ret[0]).unwrap();
        set_losses(&p, &mut sol, &sup, &ret);
        let violations = ctx.verify(&sol, 1e-6).unwrap();
        assert!(violations.is_empty(), "{violations:?}");
        // water entering at t = 0 leaves the supply line three steps later
        assert_eq!(sup[2][3], sup_in[0]);

        sol.set(p.get_var("mass_flow").unwrap(), &[0.5 * cap; 4]).unwrap();
        assert!(!ctx.verify(&sol, 1e-6).unwrap().is_empty());
    }

    #[test]
    fn reversed_flow_shifts_the_other_way() {
        let options = ComponentOptions {
            allow_flow_reversal: true,
            ..Default::default()
        };
        let (p, ctx) = lossless(options);
        let cap = p.discretization().unwrap().max_mass_flow;
        let bounds = ctx.bounds(p.get_var("mass_flow").unwrap()).unwrap();
        assert!(bounds.iter().all(|b| *b == Bounds::between(-cap, cap)));

        let sup_out = [360.0, 361.0, 362.0, 363.0];
        let ret_out = [320.0, 321.0, 322.0, 323.0];
        let mut sup = vec![vec![340.0], vec![345.0], vec![350.0]];
        let mut ret = vec![vec![310.0], vec![315.0], vec![318.0]];
        for t in 1..4 {
            let s: Vec<f64> = (0..3)
                .map(|i| if i == 2 { sup_out[t - 1] } else { sup[i + 1][t - 1] })
                .collect();
            let r: Vec<f64> = (0..3)
                .map(|i| if i == 0 { ret_out[t - 1] } else { ret[i - 1][t - 1] })
                .collect();
            for i in 0..3 {
                sup[i].push(s[i]);
                ret[i].push(r[i]);
            }
        }

        let mut sol = Solution::zeros(&ctx);
        sol.set(p.get_var("mass_flow").unwrap(), &[-cap; 4]).unwrap();
        sol.set(p.get_var("mf_rev").unwrap(), &[cap; 4]).unwrap();
        sol.set(p.get_var("Tsup").unwrap(), &flatten(&sup)).unwrap();
        sol.set(p.get_var("Tret").unwrap(), &flatten(&ret)).unwrap();
        sol.set(p.get_var("Tsup_out").unwrap(), &sup_out).unwrap();
        sol.set(p.get_var("Tret_out").unwrap(), &ret_out).unwrap();
        sol.set(p.get_var("Tsup_in").unwrap(), &sup[0]).unwrap();
        sol.set(p.get_var("Tret_in").unwrap(), &ret[2]).unwrap();
        set_losses(&p, &mut sol, &sup, &ret);
        let violations = ctx.verify(&sol, 1e-6).unwrap();
        assert!(violations.is_empty(), "{violations:?}");

        // flowing both ways at once breaks complementarity
        sol.set(p.get_var("mf_fwd").unwrap(), &[1.0; 4]).unwrap();
        assert!(ctx
            .verify(&sol, 1e-6)
            .unwrap()
            .iter()
            .any(|v| v.what.starts_with("pipe.complementarity")));
    }

    #[test]
    fn bounds_round_trip() {
        let mut p = pipe(ComponentOptions::default());
        p.change_param("temperature_max", 363.15.into()).unwrap();
        let (p, ctx) = compiled(p);
        let cap = max_mass_flow(0.1, 3.0);
        let flow = ctx.bounds(p.get_var("mass_flow").unwrap()).unwrap();
        assert!(flow.iter().all(|b| *b == Bounds::between(0.0, cap)));
        let temps = ctx.bounds(p.get_var("Tret").unwrap()).unwrap();
        assert_eq!(temps.len(), 12);
        assert!(temps.iter().all(|b| *b == Bounds::between(273.15, 363.15)));
        assert!(p.get_var("mf_fwd").is_err());
    }

    #[test]
    fn diameter_is_taken_in_metres() {
        let spec = crate::schema::find(SCHEMA, "diameter").unwrap();
        assert_eq!(spec.unit, "m");

        // DN100 given as 0.1 m at 3 m/s
        let (p, _) = compiled(pipe(ComponentOptions::default()));
        let cap = p.discretization().unwrap().max_mass_flow;
        let expected = RHO_WATER * std::f64::consts::PI * 0.05 * 0.05 * 3.0;
        assert!((cap - expected).abs() < 1e-9, "{cap} vs {expected}");
    }

    #[test]
    fn latest_parameter_value_wins() {
        let mut p = pipe(ComponentOptions::default());
        p.change_param("Tg", 280.0.into()).unwrap();
        p.change_param("Tg", vec![(0.0, 290.0), (60.0, 293.0)].into())
            .unwrap();
        let (p, ctx) = compiled(p);
        let tg = ctx.param_by_name("pipe.Tg").unwrap();
        let values = ctx.param_block(tg.id).unwrap().values.clone().unwrap();
        assert_eq!(values, vec![290.0, 291.0, 292.0, 293.0]);
        assert_eq!(p.get_param("Tg").unwrap().len(), 2);
    }

    #[test]
    fn default_resistance_comes_from_insulation() {
        let (p, _) = compiled(pipe(ComponentOptions::default()));
        let expected = buried_pipe_resistance("pipe", 0.1, 0.05, 0.024, 1.0, 1.0).unwrap();
        assert_eq!(p.resistance_per_volume().unwrap(), &[expected; 3]);
    }
}
