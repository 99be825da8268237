//! Evaluation of a model's flows for a bound parameter set.
//!
//! [`Model::bind`] resolves a [`ParameterSet`] against the model's declared
//! parameters once, producing a [`Bound`] model whose derivative evaluation is
//! a pure function of the state.

use crate::{
    model::Model,
    params::{ParameterError, ParameterSet},
};

/// A model paired with a checked, index-resolved parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound<'m> {
    model: &'m Model,
    values: Vec<f64>,
}

impl Model {
    /// Binds a parameter set to this model.
    ///
    /// The set must provide exactly the model's declared parameters, each
    /// with a finite value.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if a declared parameter is missing or
    /// non-finite, or if the set contains a name the model does not declare.
    pub fn bind(&self, params: &ParameterSet) -> Result<Bound<'_>, ParameterError> {
        if let Some((name, _)) = params
            .iter()
            .find(|(name, _)| !self.declared_parameters().iter().any(|p| p == name))
        {
            return Err(ParameterError::Unknown {
                name: name.to_string(),
            });
        }

        let values = self
            .declared_parameters()
            .iter()
            .map(|name| params.require(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Bound {
            model: self,
            values,
        })
    }
}

impl<'m> Bound<'m> {
    #[must_use]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Returns the bound value of a declared parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.model
            .declared_parameters()
            .iter()
            .position(|p| p == name)
            .map(|i| self.values[i])
    }

    /// Returns the instantaneous rate of every flow, in flow order.
    ///
    /// # Panics
    ///
    /// Panics if `y` is shorter than the number of compartments.
    #[must_use]
    pub fn rates(&self, y: &[f64]) -> Vec<f64> {
        let total: f64 = y.iter().sum();
        self.model
            .compiled
            .iter()
            .map(|flow| {
                let rate = flow.rate.eval(y, &self.values, total);
                if flow.frequency {
                    if total == 0.0 { 0.0 } else { rate / total }
                } else {
                    rate
                }
            })
            .collect()
    }

    /// Writes the net derivative of every compartment into `dy`.
    ///
    /// Each flow debits its source and credits its target, so the sum of
    /// `dy` equals external inflow minus external outflow.
    ///
    /// # Panics
    ///
    /// Panics if `y` or `dy` is shorter than the number of compartments.
    pub fn derivative(&self, y: &[f64], dy: &mut [f64]) {
        dy.iter_mut().for_each(|d| *d = 0.0);

        for (flow, rate) in self.model.compiled.iter().zip(self.rates(y)) {
            if let Some(source) = flow.source {
                dy[source] -= rate;
            }
            if let Some(target) = flow.target {
                dy[target] += rate;
            }
        }
    }

    /// Returns the net derivative of every compartment.
    ///
    /// # Panics
    ///
    /// Panics if `y` is shorter than the number of compartments.
    #[must_use]
    pub fn derivative_vec(&self, y: &[f64]) -> Vec<f64> {
        let mut dy = vec![0.0; self.model.compartment_count()];
        self.derivative(y, &mut dy);
        dy
    }

    /// Returns the net change of the total population: external inflow minus
    /// external outflow.
    #[must_use]
    pub fn net_external_flow(&self, y: &[f64]) -> f64 {
        self.model
            .compiled
            .iter()
            .zip(self.rates(y))
            .map(|(flow, rate)| match (flow.source, flow.target) {
                (None, Some(_)) => rate,
                (Some(_), None) => -rate,
                _ => 0.0,
            })
            .sum()
    }
}
