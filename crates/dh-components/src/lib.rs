//! dh-components: thermal component models for district heating networks.
//!
//! Each component owns its parameters and, on [`Component::compile`],
//! declares variables, parameter symbols, constraint rows and named
//! expressions into a shared [`dh_model::ModelContext`]:
//! - [`FixedProfileLoad`]: a consumer following a prescribed heat profile
//! - [`VariableProducer`]: a dispatchable plant with fuel, cost and CO2 accounting
//! - [`Substation`]: an LMTD heat exchanger between network and building
//! - [`SimplePipe`]: a lossless connection
//! - [`FiniteVolumePipe`]: plug flow with heat loss to the ground
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use dh_components::{Component, ComponentOptions, FixedProfileLoad, Horizon};
//! use dh_model::ModelContext;
//!
//! let horizon = Horizon::from_seconds(3.0 * 3600.0, 3600.0).unwrap();
//! let mut load = FixedProfileLoad::new("house", horizon, ComponentOptions::default());
//! load.change_param("delta_T", 30.0.into()).unwrap();
//! load.change_param("heat_profile", vec![(0.0, 1.0e5), (7200.0, 2.0e5)].into())
//!     .unwrap();
//!
//! let start = NaiveDate::from_ymd_opt(2014, 1, 1)
//!     .unwrap()
//!     .and_hms_opt(0, 0, 0)
//!     .unwrap();
//! let mut ctx = ModelContext::new();
//! load.compile(&mut ctx, start).unwrap();
//! load.set_parameters(&mut ctx).unwrap();
//! ```

pub mod base;
pub mod common;
pub mod error;
pub mod finite_volume;
pub mod fixed_load;
pub mod horizon;
pub mod parameter;
pub mod pipe;
pub mod producer;
pub mod schema;
pub mod substation;
pub mod traits;

// Re-exports
pub use base::ComponentBase;
pub use error::{ComponentError, ComponentResult};
pub use finite_volume::{Discretization, FiniteVolumePipe, max_stable_volumes};
pub use fixed_load::FixedProfileLoad;
pub use horizon::Horizon;
pub use parameter::{IndexKind, ParamValue, TimeSeriesParameter};
pub use pipe::{Endpoints, SimplePipe};
pub use producer::VariableProducer;
pub use schema::{ComponentKind, ComponentOptions, ParamKind, ParamSpec};
pub use substation::Substation;
pub use traits::Component;
