use epiflow_core::Observer;

use crate::traits::HasResidual;

/// Records the residual of every event it sees.
///
/// Useful for inspecting convergence after a solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    residuals: Vec<f64>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Returns true if every recorded residual magnitude is no larger than
    /// the one before it.
    #[must_use]
    pub fn is_monotone(&self) -> bool {
        self.residuals
            .windows(2)
            .all(|pair| pair[1].abs() <= pair[0].abs())
    }
}

impl<E: HasResidual, A> Observer<E, A> for History {
    fn observe(&mut self, event: &E) -> Option<A> {
        self.residuals.push(event.residual());
        None
    }
}

/// Allows `&mut History` to be passed to solvers that take an observer by
/// value, so the residuals can be read after the solve.
impl<E: HasResidual, A> Observer<E, A> for &mut History {
    fn observe(&mut self, event: &E) -> Option<A> {
        (*self).observe(event)
    }
}
