use epiflow_core::Trajectory;

/// Indicates how the integrator terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reached the end of the time grid.
    Complete,

    /// Stopped early due to an observer action.
    StoppedByObserver,
}

/// The result of an integration.
#[derive(Debug, Clone)]
pub struct Solution {
    /// How the integrator terminated.
    pub status: Status,

    /// Samples at each reached grid point, including the initial state.
    pub trajectory: Trajectory,

    /// Number of right-hand-side evaluations.
    pub evaluations: usize,
}
