//! Numerical solvers for epiflow models.
//!
//! - [`integrate`]: RK4 with relative-change step control, or adaptive
//!   Dormand–Prince, sampled on a time grid
//! - [`steady`]: steady states by long-horizon integration
//! - [`newton`]: damped Newton iteration for equilibria
//! - [`bisection`]: bracketed scalar root finding
//! - [`jacobian`]: forward-difference Jacobians
//!
//! Each iterative solver accepts an [`Observer`](epiflow_core::Observer) that
//! sees one event per iteration or sample and may stop the solver early.

pub mod bisection;
pub mod integrate;
pub mod jacobian;
pub mod newton;
pub mod steady;
