use epiflow_core::{ParameterError, StateError};
use epiflow_solvers::{bisection, integrate, newton};
use thiserror::Error;

use crate::{Quantity, Shape};

/// Errors raised by equilibrium and derived-quantity analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("{quantity} is not supported for {shape} models")]
    UnsupportedModelShape { shape: Shape, quantity: Quantity },

    #[error("{quantity} is undefined: {reason}")]
    UndefinedQuantity {
        quantity: Quantity,
        reason: &'static str,
    },

    #[error("no equilibrium found (residual norm {residual_norm:e})")]
    NoEquilibrium { residual_norm: f64 },

    #[error("integration failed")]
    Integration(#[source] Box<integrate::Error>),

    #[error("newton solve failed")]
    Newton(#[from] newton::Error),

    #[error("root bracketing failed")]
    Bisection(#[from] bisection::Error),
}

impl AnalysisError {
    pub(crate) fn unsupported(shape: Shape, quantity: Quantity) -> Self {
        Self::UnsupportedModelShape { shape, quantity }
    }

    pub(crate) fn undefined(quantity: Quantity, reason: &'static str) -> Self {
        Self::UndefinedQuantity { quantity, reason }
    }
}

impl From<integrate::Error> for AnalysisError {
    fn from(error: integrate::Error) -> Self {
        Self::Integration(Box::new(error))
    }
}
