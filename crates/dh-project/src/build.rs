//! Instantiate and compile the components of a project.

use crate::ProjectResult;
use crate::schema::{ComponentDef, Project};
use crate::validate::{ValidationError, parse_kind, validate_project};
use dh_components::{
    Component, ComponentKind, ComponentOptions, FiniteVolumePipe, FixedProfileLoad, Horizon,
    SimplePipe, Substation, VariableProducer,
};
use chrono::NaiveDateTime;
use dh_core::units::m;
use dh_model::ModelContext;
use tracing::info;

/// A project compiled into one model context.
pub struct CompiledProject {
    pub ctx: ModelContext,
    pub components: Vec<Box<dyn Component>>,
}

impl CompiledProject {
    pub fn component(&self, id: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.as_ref())
    }
}

pub fn horizon(project: &Project) -> ProjectResult<Horizon> {
    let s = &project.settings;
    Ok(Horizon::from_seconds(s.horizon_s, s.time_step_s)?)
}

/// Create every component with its parameters applied, in file order.
pub fn build_components(project: &Project) -> ProjectResult<Vec<Box<dyn Component>>> {
    validate_project(project)?;
    let horizon = horizon(project)?;
    project
        .components
        .iter()
        .map(|def| build_component(def, horizon, project.settings.allow_flow_reversal))
        .collect()
}

pub fn build_component(
    def: &ComponentDef,
    horizon: Horizon,
    allow_flow_reversal: bool,
) -> ProjectResult<Box<dyn Component>> {
    let options = ComponentOptions {
        temperature_driven: def.temperature_driven,
        allow_flow_reversal,
    };
    let kind = parse_kind(def)?;
    let length = || {
        def.length_m
            .map(m)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: format!("{}.length_m", def.id),
                value: "None".to_string(),
                reason: "pipes need a positive length".to_string(),
            })
    };

    let mut component: Box<dyn Component> = match kind {
        ComponentKind::FixedProfileLoad => {
            Box::new(FixedProfileLoad::new(def.id.as_str(), horizon, options))
        }
        ComponentKind::VariableProducer => {
            Box::new(VariableProducer::new(def.id.as_str(), horizon, options))
        }
        ComponentKind::Substation => Box::new(Substation::new(def.id.as_str(), horizon, options)),
        ComponentKind::SimplePipe => {
            let pipe = SimplePipe::new(def.id.as_str(), horizon, length()?, options);
            Box::new(match (&def.start_node, &def.end_node) {
                (Some(a), Some(b)) => pipe.with_nodes(a.as_str(), b.as_str()),
                _ => pipe,
            })
        }
        ComponentKind::FiniteVolumePipe => {
            let pipe = FiniteVolumePipe::new(def.id.as_str(), horizon, length()?, options);
            Box::new(match (&def.start_node, &def.end_node) {
                (Some(a), Some(b)) => pipe.with_nodes(a.as_str(), b.as_str()),
                _ => pipe,
            })
        }
    };

    for (name, value) in &def.params {
        component.change_param(name, value.into())?;
    }
    Ok(component)
}

/// Build and compile every component into a fresh context, then bind the
/// parameter symbols once all constraints are defined.
pub fn compile_project(project: &Project) -> ProjectResult<CompiledProject> {
    let mut components = build_components(project)?;
    let mut ctx = ModelContext::new();
    compile_all(&mut components, &mut ctx, project.settings.start_time)?;
    bind_all(&components, &mut ctx)?;
    info!(
        project = %project.name,
        components = components.len(),
        "project compiled"
    );
    Ok(CompiledProject { ctx, components })
}

fn compile_all(
    components: &mut [Box<dyn Component>],
    ctx: &mut ModelContext,
    start: NaiveDateTime,
) -> ProjectResult<()> {
    for component in components.iter_mut() {
        component.compile(ctx, start)?;
    }
    Ok(())
}

fn bind_all(components: &[Box<dyn Component>], ctx: &mut ModelContext) -> ProjectResult<()> {
    for component in components {
        component.set_parameters(ctx)?;
    }
    Ok(())
}
