//! Declarative compartmental models.
//!
//! A [`Model`] is an ordered list of compartments, a list of declared
//! parameters, and a list of [`Flow`]s between them. Every name a flow uses is
//! checked when the model is built, so a constructed model cannot fail
//! structurally later on.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use thiserror::Error;

use crate::{
    expr::Compiled,
    flow::{Endpoint, Flow, Transmission},
    state::{State, StateError},
};

/// A name used by a flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Compartment(String),
    Parameter(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Compartment(name) => write!(f, "compartment `{name}`"),
            Reference::Parameter(name) => write!(f, "parameter `{name}`"),
        }
    }
}

/// Why a flow is structurally invalid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Malformed {
    #[error("unknown {0}")]
    UnknownReference(Reference),

    #[error("source and target are the same compartment")]
    SelfLoop,

    #[error("flow neither starts nor ends in a compartment")]
    ExternalToExternal,

    #[error("non-finite constant {0}")]
    NonFiniteConstant(f64),
}

/// Errors raised while building a [`Model`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model has no compartments")]
    Empty,

    #[error("duplicate compartment `{name}`")]
    DuplicateCompartment { name: String },

    #[error("duplicate parameter `{name}`")]
    DuplicateParameter { name: String },

    #[error("malformed flow #{flow} ({description}): {reason}")]
    Malformed {
        flow: usize,
        description: String,
        reason: Malformed,
    },
}

impl ModelError {
    /// Returns the unknown name if this error is an unresolved reference.
    #[must_use]
    pub fn unknown_reference(&self) -> Option<&Reference> {
        match self {
            ModelError::Malformed {
                reason: Malformed::UnknownReference(reference),
                ..
            } => Some(reference),
            _ => None,
        }
    }
}

/// A flow with endpoints and rate resolved to indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledFlow {
    pub(crate) source: Option<usize>,
    pub(crate) target: Option<usize>,
    pub(crate) frequency: bool,
    pub(crate) rate: Compiled,
}

/// A validated, immutable compartmental model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: Option<String>,
    compartments: Vec<String>,
    index: HashMap<String, usize>,
    parameters: Vec<String>,
    flows: Vec<Flow>,
    pub(crate) compiled: Vec<CompiledFlow>,
}

impl Model {
    /// Starts building a model.
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Returns the model name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the compartment names in declaration order.
    #[must_use]
    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    #[must_use]
    pub fn compartment_count(&self) -> usize {
        self.compartments.len()
    }

    /// Returns the position of a compartment in state vectors.
    #[must_use]
    pub fn index_of(&self, compartment: &str) -> Option<usize> {
        self.index.get(compartment).copied()
    }

    /// Returns the declared parameter names in declaration order.
    ///
    /// This is the exact key set a [`ParameterSet`](crate::ParameterSet) must
    /// supply when bound.
    #[must_use]
    pub fn declared_parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Returns the parameters referenced by at least one flow.
    #[must_use]
    pub fn referenced_parameters(&self) -> BTreeSet<&str> {
        self.flows
            .iter()
            .flat_map(|flow| flow.rate().parameters())
            .collect()
    }

    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Returns true if no flow enters or leaves the model.
    ///
    /// The total population of a closed model is conserved.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.flows.iter().all(|flow| !flow.is_external())
    }

    /// Builds a state from `(compartment, value)` pairs.
    ///
    /// Compartments that are not mentioned start at zero.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if a name is unknown or a value is negative
    /// or non-finite.
    pub fn state<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<State, StateError> {
        let mut values = vec![0.0; self.compartment_count()];
        for (name, value) in pairs {
            let index = self
                .index_of(name)
                .ok_or_else(|| StateError::UnknownCompartment {
                    name: name.to_string(),
                })?;
            values[index] = value;
        }
        self.state_from_values(values)
    }

    /// Builds a state from values in compartment order.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if the length does not match the number of
    /// compartments or a value is negative or non-finite.
    pub fn state_from_values(&self, values: Vec<f64>) -> Result<State, StateError> {
        if values.len() != self.compartment_count() {
            return Err(StateError::Length {
                expected: self.compartment_count(),
                actual: values.len(),
            });
        }
        for (name, &value) in self.compartments.iter().zip(&values) {
            if !value.is_finite() || value < 0.0 {
                return Err(StateError::InvalidValue {
                    name: name.clone(),
                    value,
                });
            }
        }
        Ok(State::new(values))
    }
}

/// Builder for [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    name: Option<String>,
    compartments: Vec<String>,
    parameters: Vec<String>,
    flows: Vec<Flow>,
}

impl ModelBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn compartment(mut self, name: impl Into<String>) -> Self {
        self.compartments.push(name.into());
        self
    }

    #[must_use]
    pub fn compartments<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.compartments.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(name.into());
        self
    }

    #[must_use]
    pub fn parameters<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.parameters.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn flow(mut self, flow: Flow) -> Self {
        self.flows.push(flow);
        self
    }

    #[must_use]
    pub fn flows(mut self, flows: impl IntoIterator<Item = Flow>) -> Self {
        self.flows.extend(flows);
        self
    }

    /// Validates the definition and builds the model.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if there are no compartments, a compartment or
    /// parameter is declared twice, or a flow is malformed.
    pub fn build(self) -> Result<Model, ModelError> {
        let Self {
            name,
            compartments,
            parameters,
            flows,
        } = self;

        if compartments.is_empty() {
            return Err(ModelError::Empty);
        }

        let index = unique_index(&compartments)
            .map_err(|name| ModelError::DuplicateCompartment { name })?;
        let parameter_index =
            unique_index(&parameters).map_err(|name| ModelError::DuplicateParameter { name })?;

        let compiled = flows
            .iter()
            .enumerate()
            .map(|(i, flow)| {
                compile_flow(flow, &index, &parameter_index).map_err(|reason| {
                    ModelError::Malformed {
                        flow: i,
                        description: flow.to_string(),
                        reason,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Model {
            name,
            compartments,
            index,
            parameters,
            flows,
            compiled,
        })
    }
}

/// Maps names to positions, returning the first duplicate as an error.
fn unique_index(names: &[String]) -> Result<HashMap<String, usize>, String> {
    let mut index = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if index.insert(name.clone(), i).is_some() {
            return Err(name.clone());
        }
    }
    Ok(index)
}

fn compile_flow(
    flow: &Flow,
    compartments: &HashMap<String, usize>,
    parameters: &HashMap<String, usize>,
) -> Result<CompiledFlow, Malformed> {
    let resolve = |endpoint: &Endpoint| -> Result<Option<usize>, Malformed> {
        match endpoint {
            Endpoint::External => Ok(None),
            Endpoint::Compartment(name) => compartments
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| Malformed::UnknownReference(Reference::Compartment(name.clone()))),
        }
    };

    let source = resolve(flow.source())?;
    let target = resolve(flow.target())?;

    match (source, target) {
        (None, None) => return Err(Malformed::ExternalToExternal),
        (Some(a), Some(b)) if a == b => return Err(Malformed::SelfLoop),
        _ => {}
    }

    let rate = flow.rate().compile(compartments, parameters)?;

    Ok(CompiledFlow {
        source,
        target,
        frequency: flow.transmission() == Transmission::Frequency,
        rate,
    })
}
