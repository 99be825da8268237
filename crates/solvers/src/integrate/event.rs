use epiflow_core::Sample;

/// Event emitted by the integrator for each recorded sample.
///
/// Step 0 is the initial state before any integration.
/// Steps 1..N are emitted as each grid point is reached.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// The sample index (0 for the initial state).
    pub step: usize,

    /// The sample just recorded.
    pub sample: &'a Sample,

    /// The net derivative of every compartment at this sample.
    pub derivative: &'a [f64],
}

impl Event<'_> {
    /// Returns the largest absolute derivative component.
    #[must_use]
    pub fn derivative_norm(&self) -> f64 {
        self.derivative
            .iter()
            .fold(0.0_f64, |norm, d| norm.max(d.abs()))
    }
}
