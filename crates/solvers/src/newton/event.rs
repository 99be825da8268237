/// Event emitted after each accepted Newton step.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Iteration counter (1-based).
    pub iter: usize,

    /// The iterate after the step.
    pub x: &'a [f64],

    /// Infinity norm of the residual at `x`.
    pub residual_norm: f64,

    /// Damping factor applied to the full Newton step.
    pub damping: f64,
}
