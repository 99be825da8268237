//! Core types for epiflow, a compartmental epidemic model engine.
//!
//! This crate defines models as data and evaluates them:
//!
//! - [`Model`]: compartments, declared parameters and [`Flow`]s, validated
//!   once at construction
//! - [`Expr`]: algebraic rate expressions built with ordinary operators
//! - [`ParameterSet`]: named values bound to a model with [`Model::bind`]
//! - [`Bound`]: a model with resolved parameters; evaluates flow rates and
//!   derivatives as pure functions of the state
//! - [`State`], [`Trajectory`]: compartment values and integration output
//! - [`Observer`]: receives solver events and optionally returns actions
//!
//! # Example
//!
//! ```
//! use epiflow_core::{Flow, Model, ParameterSet, expr::{comp, param}};
//!
//! let model = Model::builder()
//!     .compartments(["S", "I", "R"])
//!     .parameters(["beta", "gamma"])
//!     .flow(Flow::transfer("S", "I", param("beta") * comp("S") * comp("I")))
//!     .flow(Flow::transfer("I", "R", param("gamma") * comp("I")))
//!     .build()?;
//!
//! let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
//! let bound = model.bind(&params)?;
//! let dy = bound.derivative_vec(&[0.99, 0.01, 0.0]);
//! assert!(dy[1] > 0.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod evaluate;
mod flow;
mod model;
mod observer;
mod params;
mod state;
mod step;
mod trajectory;

pub mod expr;

pub use evaluate::Bound;
pub use expr::Expr;
pub use flow::{Endpoint, Flow, Transmission};
pub use model::{Malformed, Model, ModelBuilder, ModelError, Reference};
pub use observer::Observer;
pub use params::{ParameterError, ParameterSet};
pub use state::{State, StateError};
pub use step::StepIntegrable;
pub use trajectory::{Sample, Trajectory};
