use thiserror::Error;

pub type DhResult<T> = Result<T, DhError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DhError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Invariant violated: {what}")]
    Invariant { what: String },
}
