//! Capability traits for cross-solver observers.
//!
//! These traits abstract over solver-specific event and action types, enabling
//! observers to work generically across different solvers.
//!
//! # Event traits
//!
//! - [`HasResidual`]: events that carry a residual magnitude
//! - [`HasIteration`]: events that carry an iteration or sample counter
//!
//! # Action traits
//!
//! - [`CanStopEarly`]: actions that can signal early termination
//!
//! # Example
//!
//! ```rust
//! use epiflow_core::Observer;
//! use epiflow_observers::traits::{CanStopEarly, HasResidual};
//!
//! struct GoodEnough {
//!     tolerance: f64,
//!     min_iters: usize,
//!     iter: usize,
//! }
//!
//! impl<E: HasResidual, A: CanStopEarly> Observer<E, A> for GoodEnough {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         self.iter += 1;
//!         if self.iter >= self.min_iters && event.residual().abs() < self.tolerance {
//!             return Some(A::stop_early());
//!         }
//!         None
//!     }
//! }
//! ```

use epiflow_solvers::{bisection, integrate, newton};

/// An event that carries a residual value.
pub trait HasResidual {
    /// Returns the residual for this event.
    ///
    /// For the integrator this is the largest absolute derivative component,
    /// which falls to zero as the model approaches a steady state.
    fn residual(&self) -> f64;
}

/// An event that carries a counter.
pub trait HasIteration {
    /// Returns the iteration (or sample) number of this event.
    fn iteration(&self) -> usize;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the solver early.
    fn stop_early() -> Self;
}

// --- HasResidual ---

impl HasResidual for bisection::Event<'_> {
    fn residual(&self) -> f64 {
        self.residual
    }
}

impl HasResidual for newton::Event<'_> {
    fn residual(&self) -> f64 {
        self.residual_norm
    }
}

impl HasResidual for integrate::Event<'_> {
    fn residual(&self) -> f64 {
        self.derivative_norm()
    }
}

// --- HasIteration ---

impl HasIteration for bisection::Event<'_> {
    fn iteration(&self) -> usize {
        self.iter
    }
}

impl HasIteration for newton::Event<'_> {
    fn iteration(&self) -> usize {
        self.iter
    }
}

impl HasIteration for integrate::Event<'_> {
    fn iteration(&self) -> usize {
        self.step
    }
}

// --- CanStopEarly ---

impl CanStopEarly for bisection::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanStopEarly for newton::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanStopEarly for integrate::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
