//! Project validation logic.

use crate::schema::{ComponentDef, Project};
use dh_components::schema;
use dh_components::{ComponentKind, Horizon};
use std::collections::HashSet;

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Unknown component kind '{kind}' for {id}")]
    UnknownKind { id: String, kind: String },

    #[error("Unknown parameter {name} for {kind} {id}")]
    UnknownParameter {
        id: String,
        kind: String,
        name: String,
    },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let settings = &project.settings;
    if let Err(e) = Horizon::from_seconds(settings.horizon_s, settings.time_step_s) {
        return Err(ValidationError::InvalidValue {
            field: "settings".to_string(),
            value: format!("{} s / {} s", settings.horizon_s, settings.time_step_s),
            reason: e.to_string(),
        });
    }

    let mut ids = HashSet::new();
    for component in &project.components {
        if !ids.insert(&component.id) {
            return Err(ValidationError::DuplicateId {
                id: component.id.clone(),
                context: "components".to_string(),
            });
        }
        validate_component(component)?;
    }
    Ok(())
}

pub fn parse_kind(component: &ComponentDef) -> Result<ComponentKind, ValidationError> {
    component
        .kind
        .parse()
        .map_err(|_| ValidationError::UnknownKind {
            id: component.id.clone(),
            kind: component.kind.clone(),
        })
}

fn validate_component(component: &ComponentDef) -> Result<(), ValidationError> {
    if component.id.is_empty() || component.id.contains('.') {
        return Err(ValidationError::InvalidValue {
            field: "component id".to_string(),
            value: component.id.clone(),
            reason: "must be non-empty and contain no '.'".to_string(),
        });
    }
    let kind = parse_kind(component)?;

    if kind.is_pipe() {
        match component.length_m {
            Some(l) if l.is_finite() && l > 0.0 => {}
            other => {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.length_m", component.id),
                    value: format!("{other:?}"),
                    reason: "pipes need a positive length".to_string(),
                });
            }
        }
    }

    let specs = kind.schema(component.temperature_driven);
    for name in component.params.keys() {
        if schema::find(specs, name).is_none() {
            return Err(ValidationError::UnknownParameter {
                id: component.id.clone(),
                kind: kind.to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SettingsDef;
    use chrono::NaiveDate;

    fn project(components: Vec<ComponentDef>) -> Project {
        Project {
            version: 1,
            name: "test".to_string(),
            settings: SettingsDef {
                horizon_s: 7200.0,
                time_step_s: 3600.0,
                start_time: NaiveDate::from_ymd_opt(2014, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                allow_flow_reversal: false,
            },
            components,
        }
    }

    #[test]
    fn duplicate_component_ids_fail() {
        let p = project(vec![
            ComponentDef::new("a", "SimplePipe").with_length(10.0),
            ComponentDef::new("a", "SimplePipe").with_length(20.0),
        ]);
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn unknown_kind_fails() {
        let p = project(vec![ComponentDef::new("a", "Boiler")]);
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::UnknownKind { .. })
        ));
    }

    #[test]
    fn pipes_need_length() {
        let p = project(vec![ComponentDef::new("a", "FiniteVolumePipe")]);
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn parameter_names_follow_the_mode() {
        let load = ComponentDef::new("house", "FixedProfileLoad").with_param("mass_flow", 1.0);
        assert!(matches!(
            validate_project(&project(vec![load.clone()])),
            Err(ValidationError::UnknownParameter { .. })
        ));
        let load = ComponentDef {
            temperature_driven: true,
            ..load
        };
        validate_project(&project(vec![load])).unwrap();
    }

    #[test]
    fn uneven_horizon_fails() {
        let mut p = project(vec![]);
        p.settings.time_step_s = 7000.0;
        assert!(validate_project(&p).is_err());
    }
}
