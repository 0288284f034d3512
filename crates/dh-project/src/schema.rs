//! Project schema definitions.

use chrono::NaiveDateTime;
use dh_components::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub settings: SettingsDef,
    #[serde(default)]
    pub components: Vec<ComponentDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsDef {
    pub horizon_s: f64,
    pub time_step_s: f64,
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub allow_flow_reversal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentDef {
    pub id: String,
    /// One of the component kind names, e.g. `FiniteVolumePipe`.
    pub kind: String,
    #[serde(default)]
    pub temperature_driven: bool,
    /// Required for pipes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_node: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValueDef>,
}

/// A parameter value as written in a project file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValueDef {
    Scalar(f64),
    /// `[index, value]` pairs, index in seconds or metres.
    Series(Vec<(f64, f64)>),
    Timed(Vec<TimedSampleDef>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimedSampleDef {
    pub time: NaiveDateTime,
    pub value: f64,
}

impl From<&ParamValueDef> for ParamValue {
    fn from(def: &ParamValueDef) -> Self {
        match def {
            ParamValueDef::Scalar(v) => ParamValue::Scalar(*v),
            ParamValueDef::Series(s) => ParamValue::Samples(s.clone()),
            ParamValueDef::Timed(s) => {
                ParamValue::Timed(s.iter().map(|p| (p.time, p.value)).collect())
            }
        }
    }
}

impl From<f64> for ParamValueDef {
    fn from(v: f64) -> Self {
        ParamValueDef::Scalar(v)
    }
}

impl From<Vec<(f64, f64)>> for ParamValueDef {
    fn from(s: Vec<(f64, f64)>) -> Self {
        ParamValueDef::Series(s)
    }
}

impl ComponentDef {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            temperature_driven: false,
            length_m: None,
            start_node: None,
            end_node: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValueDef>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_length(mut self, length_m: f64) -> Self {
        self.length_m = Some(length_m);
        self
    }

    pub fn with_nodes(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_node = Some(start.into());
        self.end_node = Some(end.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_values_parse_in_all_shapes() {
        let yaml = r#"
id: house
kind: FixedProfileLoad
params:
  delta_T: 30
  heat_profile: [[0, 1000.0], [3600, 2000.0]]
  mult:
    - { time: "2014-01-01T00:00:00", value: 2.0 }
"#;
        let def: ComponentDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.params["delta_T"], ParamValueDef::Scalar(30.0));
        assert_eq!(
            def.params["heat_profile"],
            ParamValueDef::Series(vec![(0.0, 1000.0), (3600.0, 2000.0)])
        );
        let ParamValueDef::Timed(samples) = &def.params["mult"] else {
            panic!("expected timed samples");
        };
        assert_eq!(samples[0].value, 2.0);
        assert!(!def.temperature_driven);
        assert!(def.length_m.is_none());
    }
}
