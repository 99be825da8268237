use epiflow_core::Observer;
use log::Level;

use crate::traits::{HasIteration, HasResidual};

/// Logs solver events through the `log` facade.
///
/// Every `every`-th event is logged at the configured level (debug by
/// default) with the observer's label, the event counter and its residual.
/// The observer never returns an action.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
    every: usize,
    level: Level,
}

impl LogProgress {
    /// Creates an observer that logs every event.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            every: 1,
            level: Level::Debug,
        }
    }

    /// Logs only every `every`-th event. Zero is treated as one.
    #[must_use]
    pub fn every(mut self, every: usize) -> Self {
        self.every = every.max(1);
        self
    }

    #[must_use]
    pub fn at_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl<E: HasResidual + HasIteration, A> Observer<E, A> for LogProgress {
    fn observe(&mut self, event: &E) -> Option<A> {
        let iteration = event.iteration();
        if iteration % self.every == 0 {
            log::log!(
                self.level,
                "{}: #{iteration} residual {:e}",
                self.label,
                event.residual()
            );
        }
        None
    }
}
