//! Error types for component configuration and compilation.

use dh_core::error::DhError;
use dh_model::ModelError;
use thiserror::Error;

/// Errors that can occur while configuring or compiling a component.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Configuration error in {component}: {what}")]
    Configuration { component: String, what: String },

    #[error("Missing parameter {name} for {component}")]
    MissingParameter { component: String, name: String },

    #[error("Unknown parameter {name} for {component}")]
    UnknownParameter { component: String, name: String },

    #[error("Unknown variable {name} in {component}")]
    UnknownVariable { component: String, name: String },

    #[error("{component} has not been compiled")]
    NotCompiled { component: String },

    #[error("{component} was already compiled")]
    AlreadyCompiled { component: String },

    #[error("No solved value for {name} in {component}")]
    NotSolved { component: String, name: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl ComponentError {
    pub fn config(component: &str, what: impl Into<String>) -> Self {
        ComponentError::Configuration {
            component: component.to_string(),
            what: what.into(),
        }
    }

    /// True for every error caused by malformed input rather than misuse.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ComponentError::Configuration { .. }
                | ComponentError::MissingParameter { .. }
                | ComponentError::Model(ModelError::DuplicateName { .. })
        )
    }
}

impl From<ComponentError> for DhError {
    fn from(e: ComponentError) -> Self {
        match e {
            ComponentError::Model(inner) => inner.into(),
            ComponentError::NotCompiled { .. }
            | ComponentError::AlreadyCompiled { .. }
            | ComponentError::NotSolved { .. } => DhError::Invariant {
                what: e.to_string(),
            },
            other => DhError::InvalidArg {
                what: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ComponentError::MissingParameter {
            component: "plant".into(),
            name: "Qmax".into(),
        };
        assert!(err.to_string().contains("Qmax"));
        assert!(err.is_configuration());
    }

    #[test]
    fn error_conversion() {
        let err = ComponentError::NotCompiled {
            component: "pipe".into(),
        };
        let dh: DhError = err.into();
        assert!(matches!(dh, DhError::Invariant { .. }));
    }
}
