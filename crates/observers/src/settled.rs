use epiflow_core::Observer;

use crate::traits::{CanStopEarly, HasResidual};

/// Stops a solver once the residual has stayed below a tolerance for a
/// number of consecutive events.
///
/// With the integrator this detects a steady state: the residual is the
/// largest derivative component at each sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    tolerance: f64,
    patience: usize,
    streak: usize,
}

impl Settled {
    /// Stops on the first event whose residual magnitude is below `tolerance`.
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            patience: 1,
            streak: 0,
        }
    }

    /// Requires `patience` consecutive events below tolerance. Zero is
    /// treated as one.
    #[must_use]
    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = patience.max(1);
        self
    }

    /// Returns true once the stop condition has been met.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.streak >= self.patience
    }
}

impl<E: HasResidual, A: CanStopEarly> Observer<E, A> for Settled {
    fn observe(&mut self, event: &E) -> Option<A> {
        if event.residual().abs() < self.tolerance {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.is_settled().then(A::stop_early)
    }
}

/// Allows `&mut Settled` to be passed to solvers that take an observer by
/// value, so [`Settled::is_settled`] can be checked after the solve.
impl<E: HasResidual, A: CanStopEarly> Observer<E, A> for &mut Settled {
    fn observe(&mut self, event: &E) -> Option<A> {
        (*self).observe(event)
    }
}
