//! Static parameter schemas for the closed set of component kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a parameter is sampled at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A single value; a series is rejected at compile time.
    Scalar,
    /// Sampled at every step of the horizon.
    TimeSeries,
    /// Sampled along the length of a pipe.
    Curve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub kind: ParamKind,
    pub default: Option<f64>,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(
        name: &'static str,
        description: &'static str,
        unit: &'static str,
        kind: ParamKind,
    ) -> Self {
        Self {
            name,
            description,
            unit,
            kind,
            default: None,
            required: true,
        }
    }

    pub const fn optional(
        name: &'static str,
        description: &'static str,
        unit: &'static str,
        kind: ParamKind,
    ) -> Self {
        Self {
            name,
            description,
            unit,
            kind,
            default: None,
            required: false,
        }
    }

    pub const fn with_default(
        name: &'static str,
        description: &'static str,
        unit: &'static str,
        kind: ParamKind,
        default: f64,
    ) -> Self {
        Self {
            name,
            description,
            unit,
            kind,
            default: Some(default),
            required: false,
        }
    }
}

pub fn find<'a>(schema: &'a [ParamSpec], name: &str) -> Option<&'a ParamSpec> {
    schema.iter().find(|p| p.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    FixedProfileLoad,
    VariableProducer,
    Substation,
    SimplePipe,
    FiniteVolumePipe,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::FixedProfileLoad,
        ComponentKind::VariableProducer,
        ComponentKind::Substation,
        ComponentKind::SimplePipe,
        ComponentKind::FiniteVolumePipe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::FixedProfileLoad => "FixedProfileLoad",
            ComponentKind::VariableProducer => "VariableProducer",
            ComponentKind::Substation => "Substation",
            ComponentKind::SimplePipe => "SimplePipe",
            ComponentKind::FiniteVolumePipe => "FiniteVolumePipe",
        }
    }

    pub fn is_pipe(&self) -> bool {
        matches!(
            self,
            ComponentKind::SimplePipe | ComponentKind::FiniteVolumePipe
        )
    }

    /// Parameter schema of this kind in the given mode.
    pub fn schema(&self, temperature_driven: bool) -> &'static [ParamSpec] {
        use crate::{finite_volume, fixed_load, pipe, producer, substation};
        match (self, temperature_driven) {
            (ComponentKind::FixedProfileLoad, false) => fixed_load::SCHEMA,
            (ComponentKind::FixedProfileLoad, true) => fixed_load::TEMPERATURE_SCHEMA,
            (ComponentKind::VariableProducer, false) => producer::SCHEMA,
            (ComponentKind::VariableProducer, true) => producer::TEMPERATURE_SCHEMA,
            (ComponentKind::Substation, _) => substation::SCHEMA,
            (ComponentKind::SimplePipe, _) => pipe::SCHEMA,
            (ComponentKind::FiniteVolumePipe, _) => finite_volume::SCHEMA,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown component kind '{s}'"))
    }
}

/// Construction flags shared by all kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentOptions {
    /// Model supply and return temperatures explicitly (loads and producers).
    #[serde(default)]
    pub temperature_driven: bool,
    /// Let mass flows take either sign.
    #[serde(default)]
    pub allow_flow_reversal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in ComponentKind::ALL {
            assert_eq!(kind.as_str().parse::<ComponentKind>().unwrap(), kind);
        }
        assert_eq!(
            "substation".parse::<ComponentKind>().unwrap(),
            ComponentKind::Substation
        );
        assert!("Boiler".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn schemas_have_unique_names() {
        for kind in ComponentKind::ALL {
            for mode in [false, true] {
                let schema = kind.schema(mode);
                for (i, p) in schema.iter().enumerate() {
                    assert!(
                        schema[i + 1..].iter().all(|q| q.name != p.name),
                        "{kind}: duplicate {}",
                        p.name
                    );
                    assert!(!(p.required && p.default.is_some()));
                }
            }
        }
    }
}
