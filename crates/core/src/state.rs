#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::step::StepIntegrable;

/// Compartment values in model order.
///
/// Values are counts or population fractions depending on how the model is
/// used; the engine does not distinguish between them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct State {
    values: Vec<f64>,
}

/// Errors raised when building a [`State`] for a model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("unknown compartment `{name}`")]
    UnknownCompartment { name: String },

    #[error("expected {expected} compartment values, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("compartment `{name}` has invalid value {value}")]
    InvalidValue { name: String, value: f64 },
}

impl State {
    /// Wraps raw values without validation.
    ///
    /// Prefer [`Model::state`](crate::Model::state), which checks names and
    /// signs against the model.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the total population `N`.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Clamps negative values to zero, returning true if any value changed.
    pub fn clamp_negative(&mut self) -> bool {
        let mut clamped = false;
        for value in &mut self.values {
            if *value < 0.0 {
                *value = 0.0;
                clamped = true;
            }
        }
        clamped
    }

    /// Returns the largest absolute value, or NaN if any value is NaN.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| {
            if v.is_nan() || acc.is_nan() {
                f64::NAN
            } else {
                acc.max(v.abs())
            }
        })
    }
}

impl StepIntegrable<f64> for State {
    type Derivative = [f64];

    fn step(&self, derivative: &[f64], delta: f64) -> Self {
        let values = self
            .values
            .iter()
            .zip(derivative)
            .map(|(y, dy)| y + dy * delta)
            .collect();
        Self { values }
    }
}

impl From<Vec<f64>> for State {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl AsRef<[f64]> for State {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_negative_reports_change() {
        let mut state = State::new(vec![0.5, -1e-12, 0.5]);
        assert!(state.clamp_negative());
        assert_eq!(state.values(), &[0.5, 0.0, 0.5]);
        assert!(!state.clamp_negative());
    }

    #[test]
    fn max_abs_propagates_nan() {
        assert_eq!(State::new(vec![1.0, -3.0]).max_abs(), 3.0);
        assert!(State::new(vec![1.0, f64::NAN]).max_abs().is_nan());
    }
}
