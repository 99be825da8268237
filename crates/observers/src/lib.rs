//! Reusable observers for epiflow solvers.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work across the integrator, Newton and bisection solvers.
//!
//! # Modules
//!
//! - [`traits`]: Capability traits for cross-solver observers
//!   ([`HasResidual`], [`HasIteration`], [`CanStopEarly`])
//!
//! # Observers
//!
//! - [`LogProgress`]: logs events through the `log` facade
//! - [`Settled`]: stops a solver once its residual stays below a tolerance
//! - [`History`]: records the residual of every event
//!
//! [`Observer`]: epiflow_core::Observer
//! [`HasResidual`]: traits::HasResidual
//! [`HasIteration`]: traits::HasIteration
//! [`CanStopEarly`]: traits::CanStopEarly

mod history;
mod progress;
mod settled;

pub mod traits;

pub use history::History;
pub use progress::LogProgress;
pub use settled::Settled;
