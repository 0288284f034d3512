//! Common utilities for component calculations.

use crate::error::{ComponentError, ComponentResult};
use dh_core::numeric::ensure_finite;
use dh_core::units::constants::RHO_WATER;
use std::f64::consts::PI;

/// Inner cross-section of a pipe (m2).
pub fn pipe_area(diameter: f64) -> f64 {
    PI * diameter * diameter / 4.0
}

/// Maximum mass flow through a pipe at the given speed (kg/s).
pub fn max_mass_flow(diameter: f64, max_speed: f64) -> f64 {
    RHO_WATER * pipe_area(diameter) * max_speed
}

/// Ensure a value is finite and strictly positive.
pub fn check_positive(component: &str, value: f64, what: &'static str) -> ComponentResult<f64> {
    let value =
        ensure_finite(value, what).map_err(|e| ComponentError::config(component, e.to_string()))?;
    if value <= 0.0 {
        return Err(ComponentError::config(
            component,
            format!("{what} must be positive, got {value}"),
        ));
    }
    Ok(value)
}

/// Thermal resistance per metre of a single insulated pipe buried in soil
/// (K m / W): insulation layer plus a line source at depth `depth` below a
/// surface held at ground temperature.
pub fn buried_pipe_resistance(
    component: &str,
    diameter: f64,
    insulation_thickness: f64,
    insulation_conductivity: f64,
    soil_conductivity: f64,
    depth: f64,
) -> ComponentResult<f64> {
    check_positive(component, diameter, "diameter")?;
    check_positive(component, insulation_conductivity, "insulation_conductivity")?;
    check_positive(component, soil_conductivity, "soil_conductivity")?;
    check_positive(component, depth, "depth")?;
    if !(insulation_thickness.is_finite() && insulation_thickness >= 0.0) {
        return Err(ComponentError::config(
            component,
            format!("insulation_thickness must be non-negative, got {insulation_thickness}"),
        ));
    }
    let outer = diameter + 2.0 * insulation_thickness;
    if 4.0 * depth <= outer {
        return Err(ComponentError::config(
            component,
            format!("burial depth {depth} m is too shallow for outer diameter {outer} m"),
        ));
    }
    let r_ins = (outer / diameter).ln() / (2.0 * PI * insulation_conductivity);
    let r_soil = (4.0 * depth / outer).ln() / (2.0 * PI * soil_conductivity);
    Ok(r_ins + r_soil)
}
