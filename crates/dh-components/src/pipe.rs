//! Lossless pipe without transport delay.

use crate::base::ComponentBase;
use crate::common::{check_positive, max_mass_flow};
use crate::error::ComponentResult;
use crate::horizon::Horizon;
use crate::schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
use crate::traits::Component;
use chrono::NaiveDateTime;
use dh_core::units::Length;
use dh_model::{Bounds, Constraint, ModelContext};
use uom::si::length::meter;

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::optional(
        "diameter",
        "Inner pipe diameter in metres (DN200 is 0.2, not 200)",
        "m",
        ParamKind::Scalar,
    ),
    ParamSpec::optional(
        "max_speed",
        "Maximum flow speed",
        "m/s",
        ParamKind::Scalar,
    ),
];

/// Network nodes joined by a pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub start_node: Option<String>,
    pub end_node: Option<String>,
}

/// Pipe that carries heat from inlet to outlet unchanged.
///
/// The mass flow is capped at `rho * A * max_speed` when both `diameter`
/// and `max_speed` are given.
#[derive(Debug, Clone)]
pub struct SimplePipe {
    base: ComponentBase,
    length: Length,
    endpoints: Endpoints,
}

impl SimplePipe {
    pub fn new(
        id: impl Into<String>,
        horizon: Horizon,
        length: Length,
        options: ComponentOptions,
    ) -> Self {
        Self {
            base: ComponentBase::new(id, ComponentKind::SimplePipe, horizon, options),
            length,
            endpoints: Endpoints::default(),
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

    fn flow_bounds(&self) -> ComponentResult<Bounds> {
        let b = &self.base;
        let reversal = b.options().allow_flow_reversal;
        let cap = match (b.optional_scalar("diameter")?, b.optional_scalar("max_speed")?) {
            (Some(d), Some(v)) => Some(max_mass_flow(
                check_positive(b.id(), d, "diameter")?,
                check_positive(b.id(), v, "max_speed")?,
            )),
            _ => None,
        };
        Ok(match (cap, reversal) {
            (Some(cap), false) => Bounds::between(0.0, cap),
            (Some(cap), true) => Bounds::between(-cap, cap),
            (None, false) => Bounds::non_negative(),
            (None, true) => Bounds::free(),
        })
    }
}

impl Component for SimplePipe {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn compile(&mut self, ctx: &mut ModelContext, start: NaiveDateTime) -> ComponentResult<()> {
        self.base.begin_compile(start)?;
        check_positive(self.base.id(), self.length.get::<meter>(), "length")?;
        let flow = self.flow_bounds()?;

        let b = &mut self.base;
        let n = b.n_steps();
        let q_in = b.declare_series(ctx, "heat_flow_in", Bounds::free())?;
        let q_out = b.declare_series(ctx, "heat_flow_out", Bounds::free())?;
        b.declare_series(ctx, "mass_flow", flow)?;
        b.add_constraints(
            ctx,
            "lossless",
            (0..n).map(|t| Constraint::eq(q_out.at(t), q_in.at(t))).collect(),
        )?;

        self.base.finish_compile();
        Ok(())
    }
}
