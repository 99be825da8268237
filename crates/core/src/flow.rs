use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::expr::{self, Expr};

/// How a flow's rate scales with population size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Transmission {
    /// The rate expression is used as written.
    ///
    /// Mass-action terms such as `beta * S * I` scale with absolute counts.
    #[default]
    Density,

    /// The rate expression is divided by the total population `N`.
    ///
    /// When `N` is exactly zero the flow is zero.
    Frequency,
}

/// One end of a [`Flow`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A declared compartment.
    Compartment(String),
    /// Outside the model: births come from here and deaths go here.
    External,
}

impl Endpoint {
    /// Returns the compartment name, if any.
    #[must_use]
    pub fn compartment(&self) -> Option<&str> {
        match self {
            Endpoint::Compartment(name) => Some(name),
            Endpoint::External => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Compartment(name) => write!(f, "{name}"),
            Endpoint::External => write!(f, "∅"),
        }
    }
}

/// A directed movement of population between compartments.
///
/// The rate is the absolute amount moved per unit time: the source loses it
/// and the destination gains it.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    from: Endpoint,
    to: Endpoint,
    transmission: Transmission,
    rate: Expr,
}

impl Flow {
    /// Creates a density-dependent flow between two endpoints.
    #[must_use]
    pub fn new(from: Endpoint, to: Endpoint, rate: Expr) -> Self {
        Self {
            from,
            to,
            transmission: Transmission::Density,
            rate,
        }
    }

    /// Creates a flow from one compartment to another.
    #[must_use]
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, rate: Expr) -> Self {
        Self::new(
            Endpoint::Compartment(from.into()),
            Endpoint::Compartment(to.into()),
            rate,
        )
    }

    /// Creates an inflow from outside the model (births, immigration).
    #[must_use]
    pub fn birth(to: impl Into<String>, rate: Expr) -> Self {
        Self::new(Endpoint::External, Endpoint::Compartment(to.into()), rate)
    }

    /// Creates an outflow leaving the model (natural or disease-induced death).
    #[must_use]
    pub fn death(from: impl Into<String>, rate: Expr) -> Self {
        Self::new(Endpoint::Compartment(from.into()), Endpoint::External, rate)
    }

    /// Marks the flow as frequency dependent.
    #[must_use]
    pub fn frequency(self) -> Self {
        self.with_transmission(Transmission::Frequency)
    }

    /// Sets the transmission mode.
    #[must_use]
    pub fn with_transmission(mut self, transmission: Transmission) -> Self {
        self.transmission = transmission;
        self
    }

    /// Returns the endpoint the flow leaves.
    #[must_use]
    pub fn source(&self) -> &Endpoint {
        &self.from
    }

    /// Returns the endpoint the flow enters.
    #[must_use]
    pub fn target(&self) -> &Endpoint {
        &self.to
    }

    #[must_use]
    pub fn transmission(&self) -> Transmission {
        self.transmission
    }

    #[must_use]
    pub fn rate(&self) -> &Expr {
        &self.rate
    }

    /// Returns true if either end of the flow is outside the model.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.from == Endpoint::External || self.to == Endpoint::External
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transmission {
            Transmission::Density => write!(f, "{} -> {}: {}", self.from, self.to, self.rate),
            Transmission::Frequency => {
                write!(f, "{} -> {}: ", self.from, self.to)?;
                expr::operand(f, &self.rate, expr::PRODUCT)?;
                f.write_str("/N")
            }
        }
    }
}
