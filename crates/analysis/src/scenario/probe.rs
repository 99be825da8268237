use std::error::Error as StdError;

use epiflow_core::{Model, ParameterSet, State};
use epiflow_solvers::steady;

use super::Record;
use crate::{AnalysisError, Canonical, Quantity, derived};

/// Boxed error returned by a failed probe.
pub type ProbeError = Box<dyn StdError + Send + Sync>;

/// Measures one scenario cell.
///
/// Closures of the form `Fn(&ParameterSet) -> Result<Record, E>` implement
/// `Probe` for any error type convertible into [`ProbeError`].
pub trait Probe {
    /// Evaluates the cell's parameter set.
    ///
    /// # Errors
    ///
    /// Any error is recorded as a failed row; it does not stop the scenario.
    fn probe(&self, params: &ParameterSet) -> Result<Record, ProbeError>;
}

impl<F, E> Probe for F
where
    F: Fn(&ParameterSet) -> Result<Record, E>,
    E: Into<ProbeError>,
{
    fn probe(&self, params: &ParameterSet) -> Result<Record, ProbeError> {
        self(params).map_err(Into::into)
    }
}

/// Records derived quantities of a canonical model.
///
/// A quantity that is undefined for a cell's parameters is recorded as
/// `NaN`; any other error fails the cell.
#[derive(Debug, Clone)]
pub struct Quantities {
    canonical: Canonical,
    quantities: Vec<Quantity>,
}

impl Quantities {
    #[must_use]
    pub fn new(canonical: Canonical, quantities: impl IntoIterator<Item = Quantity>) -> Self {
        Self {
            canonical,
            quantities: quantities.into_iter().collect(),
        }
    }
}

impl Probe for Quantities {
    fn probe(&self, params: &ParameterSet) -> Result<Record, ProbeError> {
        self.quantities
            .iter()
            .map(|&quantity| {
                let value = match derived::derive(&self.canonical, params, quantity) {
                    Ok(derived) => derived.value,
                    Err(AnalysisError::UndefinedQuantity { .. }) => f64::NAN,
                    Err(error) => return Err(ProbeError::from(error)),
                };
                Ok((quantity.name(), value))
            })
            .collect()
    }
}

/// Integrates a model to its steady state and records every compartment.
#[derive(Debug, Clone)]
pub struct SteadyState {
    model: Model,
    initial: State,
    config: steady::Config,
}

impl SteadyState {
    #[must_use]
    pub fn new(model: Model, initial: State) -> Self {
        Self {
            model,
            initial,
            config: steady::Config::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: steady::Config) -> Self {
        self.config = config;
        self
    }
}

impl Probe for SteadyState {
    fn probe(&self, params: &ParameterSet) -> Result<Record, ProbeError> {
        let bound = self.model.bind(params)?;
        let relaxed = steady::relax(&bound, &self.initial, &self.config)?;
        if relaxed.status != steady::Status::Converged {
            return Err(AnalysisError::NoEquilibrium {
                residual_norm: relaxed.derivative_norm,
            }
            .into());
        }

        Ok(self
            .model
            .compartments()
            .iter()
            .zip(relaxed.state.values())
            .map(|(name, value)| (name.as_str(), *value))
            .collect())
    }
}
