//! Error types for model context operations.

use dh_core::error::DhError;
use thiserror::Error;

/// Errors raised while registering symbols or reading results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate symbol name: {name}")]
    DuplicateName { name: String },

    #[error("Unknown symbol: {name}")]
    UnknownName { name: String },

    #[error("Shape mismatch for {name}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Parameter {name} was declared but never bound")]
    UnboundParameter { name: String },

    #[error("No solution available: {what}")]
    NotSolved { what: String },

    #[error("Invalid bounds for {name}: lower {lower} > upper {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("Non-finite value for {what}")]
    NonFinite { what: String },
}

pub type ModelResult<T> = Result<T, ModelError>;

impl From<ModelError> for DhError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NonFinite { what } => DhError::InvalidArg { what },
            ModelError::ShapeMismatch { name, .. } => DhError::Invariant {
                what: format!("shape of {name}"),
            },
            other => DhError::InvalidArg {
                what: other.to_string(),
            },
        }
    }
}
