use epiflow_core::State;

/// Indicates how the Newton solver terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The residual norm reached the tolerance.
    Converged,
    /// Reached the iteration limit without converging.
    MaxIters,
    /// No damped step reduced the residual, or steps became negligible.
    Stalled,
    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of a Newton solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: Status,

    /// The final iterate.
    pub x: State,

    /// Infinity norm of the residual at `x`.
    pub residual_norm: f64,

    pub iters: usize,

    /// Number of residual evaluations, including those for the Jacobian.
    pub evaluations: usize,
}

impl Solution {
    /// Returns true if the solver converged.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status == Status::Converged
    }
}
