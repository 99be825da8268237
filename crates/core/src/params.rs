use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named real-valued parameters for one model run.
///
/// A parameter set is a plain ordered map. It is checked against a model's
/// declared parameters when bound with [`Model::bind`](crate::Model::bind).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

/// Errors raised when a parameter set does not satisfy a model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("missing parameter `{name}`")]
    Missing { name: String },

    #[error("parameter `{name}` is not declared by the model")]
    Unknown { name: String },

    #[error("parameter `{name}` is not finite: {value}")]
    NonFinite { name: String, value: f64 },
}

impl ParameterSet {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Sets a value, returning the previous one if present.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    /// Returns the value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Returns the value for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Missing`] if the name is absent, or
    /// [`ParameterError::NonFinite`] if its value is NaN or infinite.
    pub fn require(&self, name: &str) -> Result<f64, ParameterError> {
        let value = self.get(name).ok_or_else(|| ParameterError::Missing {
            name: name.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ParameterError::NonFinite {
                name: name.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Returns true if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for ParameterSet {
    fn from(pairs: [(K, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_pairs() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("beta"), Some(2.0));
        assert_eq!(params.get("mu"), None);

        let names: Vec<_> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["beta", "gamma"]);
    }

    #[test]
    fn with_overrides_existing_value() {
        let base = ParameterSet::new().with("beta", 2.0);
        let changed = base.clone().with("beta", 3.0);

        assert_eq!(base.get("beta"), Some(2.0));
        assert_eq!(changed.get("beta"), Some(3.0));
    }

    #[test]
    fn require_reports_missing_and_non_finite() {
        let params = ParameterSet::from([("beta", f64::INFINITY)]);

        assert!(matches!(
            params.require("gamma"),
            Err(ParameterError::Missing { name }) if name == "gamma"
        ));
        assert!(matches!(
            params.require("beta"),
            Err(ParameterError::NonFinite { .. })
        ));
    }
}
