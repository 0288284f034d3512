//! dh-core: shared foundation for the district heating model crates.
//!
//! Contains:
//! - units (uom SI types + constructors, water properties)
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact IDs for model symbols)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports
pub use error::{DhError, DhResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
