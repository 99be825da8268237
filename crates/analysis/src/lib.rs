//! Analysis of epiflow models.
//!
//! - [`Canonical`]: recognised model shapes (SIR, SIRS, SEIR, carrier,
//!   fatal SI, risk-structured SIS, ...) with their standard parameterisation
//! - [`equilibrium`]: disease-free and endemic equilibria, closed-form or
//!   numeric
//! - [`derived`]: R0, final size, oscillation period, age at infection and
//!   other derived quantities
//! - [`ngm`]: next-generation matrices for risk-structured mixing
//! - [`scenario`]: parameter sweeps, run sequentially or in parallel
//!
//! # Example
//!
//! ```
//! use epiflow_analysis::{Canonical, Quantity, derived, equilibrium};
//! use epiflow_core::ParameterSet;
//!
//! let sis = Canonical::sis();
//! let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
//!
//! let r0 = derived::derive(&sis, &params, Quantity::R0)?.value;
//! assert_eq!(r0, 4.0);
//!
//! let eq = equilibrium::equilibria(&sis, &params)?;
//! let endemic = eq.endemic_state().expect("R0 > 1");
//! assert!((endemic.values()[1] - 0.75).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod canonical;
mod error;

pub mod derived;
pub mod equilibrium;
pub mod ngm;
pub mod scenario;

pub use canonical::{Canonical, Shape};
pub use derived::{Derived, Quantity};
pub use equilibrium::{Endemic, Equilibria};
pub use error::AnalysisError;
