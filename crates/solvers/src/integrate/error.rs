use epiflow_core::Trajectory;
use ode_solvers::dop_shared::IntegrationError;
use thiserror::Error;

use super::{ConfigError, GridError};

/// Errors that can occur during integration.
///
/// [`Error::Divergence`] is not fatal: it carries every sample produced
/// before the state blew up.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid time grid: {0}")]
    Grid(#[from] GridError),

    #[error("invalid integrator config: {0}")]
    Config(#[from] ConfigError),

    #[error("initial state has {actual} values but the model has {expected} compartments")]
    StateLength { expected: usize, actual: usize },

    #[error("integration diverged at t = {time}")]
    Divergence { time: f64, partial: Box<Trajectory> },

    #[error("adaptive stepper failed")]
    Adaptive(#[from] IntegrationError),

    #[error("adaptive stepper produced no sample at t = {time}")]
    MissedSample { time: f64 },

    #[error("step {step:e} no longer advances t = {time}")]
    StepUnderflow { time: f64, step: f64 },
}

impl Error {
    /// Returns the trajectory produced before divergence, if any.
    #[must_use]
    pub fn partial(&self) -> Option<&Trajectory> {
        match self {
            Error::Divergence { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub(crate) fn divergence(time: f64, partial: Trajectory) -> Self {
        Self::Divergence {
            time,
            partial: Box::new(partial),
        }
    }
}
