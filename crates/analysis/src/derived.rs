//! Derived epidemiological quantities.
//!
//! Closed forms for the recognised shapes plus numeric counterparts that work
//! on any model: [`final_size_by_integration`] and [`damped_period`].

use std::{f64::consts::PI, fmt};

use epiflow_core::{Model, ParameterSet, State, StateError, Transmission};
use epiflow_solvers::{bisection, steady};
use nalgebra::DMatrix;

use crate::{
    AnalysisError, Canonical, Shape,
    equilibrium::{self, Endemic},
    ngm,
};

/// A quantity that can be derived from a canonical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Basic reproduction number.
    R0,
    /// Fraction of a fully susceptible population ever infected (SIR only).
    FinalSize,
    /// Period of damped oscillations about the endemic equilibrium.
    OscillationPeriod,
    /// Mean age at infection, `1 / (mu (R0 - 1))`.
    AgeAtInfection,
    /// Infectious fraction at the endemic equilibrium, carriers included; zero
    /// if there is none.
    EndemicPrevalence,
    /// Susceptible fraction at the endemic equilibrium.
    EquilibriumSusceptible,
    /// Endemic over disease-free population size (fatal SI only).
    PopulationRatio,
}

impl Quantity {
    pub const ALL: [Quantity; 7] = [
        Quantity::R0,
        Quantity::FinalSize,
        Quantity::OscillationPeriod,
        Quantity::AgeAtInfection,
        Quantity::EndemicPrevalence,
        Quantity::EquilibriumSusceptible,
        Quantity::PopulationRatio,
    ];

    /// Short name used as a column label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Quantity::R0 => "R0",
            Quantity::FinalSize => "final_size",
            Quantity::OscillationPeriod => "period",
            Quantity::AgeAtInfection => "age_at_infection",
            Quantity::EndemicPrevalence => "prevalence",
            Quantity::EquilibriumSusceptible => "S*",
            Quantity::PopulationRatio => "N*/N0",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A derived value tagged with what it is and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub shape: Shape,
    pub quantity: Quantity,
    pub value: f64,
}

/// Computes one derived quantity.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsupportedModelShape`] if the quantity has no
/// meaning for the shape, [`AnalysisError::UndefinedQuantity`] if it is
/// undefined for these parameters, or a parameter error if the set does not
/// match the model.
pub fn derive(
    canonical: &Canonical,
    params: &ParameterSet,
    quantity: Quantity,
) -> Result<Derived, AnalysisError> {
    let shape = canonical.shape();
    let value = match quantity {
        Quantity::R0 => r0(canonical, params)?,
        Quantity::FinalSize => final_size(canonical, params)?,
        Quantity::OscillationPeriod => oscillation_period(canonical, params)?,
        Quantity::AgeAtInfection => age_at_infection(canonical, params)?,
        Quantity::EndemicPrevalence => {
            let eq = equilibrium::equilibria(canonical, params)?;
            match &eq.endemic {
                Endemic::Point(state) => share(canonical, state, "I"),
                Endemic::Absent { .. } => 0.0,
            }
        }
        Quantity::EquilibriumSusceptible => {
            let eq = equilibrium::equilibria(canonical, params)?;
            match &eq.endemic {
                Endemic::Point(state) => share(canonical, state, "S"),
                Endemic::Absent { .. } => {
                    return Err(AnalysisError::undefined(
                        quantity,
                        "there is no endemic equilibrium",
                    ));
                }
            }
        }
        Quantity::PopulationRatio => population_ratio(canonical, params)?,
    };

    log::debug!("{quantity} of {shape} model = {value}");
    Ok(Derived {
        shape,
        quantity,
        value,
    })
}

/// Returns the basic reproduction number.
///
/// # Errors
///
/// Returns a parameter error if the set does not match the model, or
/// [`AnalysisError::UndefinedQuantity`] if a rate in a denominator is not
/// positive.
pub fn r0(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    canonical.model().bind(params)?;
    let p = |name: &str| params.require(name);
    let quotient = |numerator: f64, denominator: f64, reason| {
        if denominator > 0.0 {
            Ok(numerator / denominator)
        } else {
            Err(AnalysisError::undefined(Quantity::R0, reason))
        }
    };

    match canonical.shape() {
        Shape::Sir | Shape::Sis => quotient(p("beta")?, p("gamma")?, "gamma must be positive"),

        Shape::SirDemography | Shape::Sirs => quotient(
            p("beta")?,
            p("gamma")? + p("mu")?,
            "gamma + mu must be positive",
        ),

        Shape::Seir => {
            let (beta, sigma, gamma, mu) = (p("beta")?, p("sigma")?, p("gamma")?, p("mu")?);
            quotient(
                beta * sigma,
                (sigma + mu) * (gamma + mu),
                "sigma + mu and gamma + mu must be positive",
            )
        }

        Shape::Carrier => {
            let (beta, epsilon, q) = (p("beta")?, p("epsilon")?, p("q")?);
            let (gamma, big_gamma, mu) = (p("gamma")?, p("Gamma")?, p("mu")?);
            let reason = "gamma + mu and Gamma + mu must be positive";
            let direct = quotient(beta, gamma + mu, reason)?;
            let carried = quotient(q * gamma * epsilon, big_gamma + mu, reason)?;
            Ok(direct * (1.0 + carried))
        }

        Shape::FatalSi(transmission) => {
            let (beta, mu, nu, rho) = (p("beta")?, p("mu")?, p("nu")?, p("rho")?);
            if mu <= 0.0 || !(0.0..1.0).contains(&rho) {
                return Err(AnalysisError::undefined(
                    Quantity::R0,
                    "mu must be positive and rho in [0, 1)",
                ));
            }
            Ok(match transmission {
                Transmission::Density => beta * (nu / mu) * (1.0 - rho) / mu,
                Transmission::Frequency => beta * (1.0 - rho) / mu,
            })
        }

        Shape::RiskStructuredSis { .. } => ngm::waifw_r0(canonical, params),
    }
}

/// Solves the SIR final-size relation for the susceptible fraction left
/// after the epidemic, `S∞`:
///
/// `ln(S∞ / s0) = -r0 (1 - S∞ - r_init)`
///
/// where `s0` and `r_init` are the initial susceptible and recovered
/// fractions. When nobody is initially infected and `r0 * s0 <= 1` no
/// epidemic occurs and `s0` is returned. Otherwise the root below `s0`
/// is found by bisection.
///
/// # Errors
///
/// Returns [`AnalysisError::UndefinedQuantity`] if `r0` is negative or the
/// fractions are outside `[0, 1]` or sum to more than one.
pub fn final_size_implicit(r0: f64, s0: f64, r_init: f64) -> Result<f64, AnalysisError> {
    const SLACK: f64 = 1e-12;

    if !r0.is_finite() || r0 < 0.0 {
        return Err(AnalysisError::undefined(
            Quantity::FinalSize,
            "R0 must be finite and non-negative",
        ));
    }
    if !(s0 > 0.0 && s0 <= 1.0) || !(0.0..=1.0).contains(&r_init) || s0 + r_init > 1.0 + SLACK {
        return Err(AnalysisError::undefined(
            Quantity::FinalSize,
            "initial fractions must lie in [0, 1] and sum to at most one",
        ));
    }

    let i0 = (1.0 - s0 - r_init).max(0.0);
    if r0 == 0.0 || (i0 <= SLACK && r0 * s0 <= 1.0) {
        return Ok(s0);
    }

    let relation = |s: f64| (s / s0).ln() + r0 * (1.0 - s - r_init);
    let upper = s0.min(1.0 / r0);
    let lower = (0.5 * s0 * (-r0 * (1.0 - r_init)).exp()).max(f64::MIN_POSITIVE);

    let solution =
        bisection::solve_unobserved(relation, [lower, upper], &bisection::Config::default())?;
    Ok(solution.x)
}

/// Integrates a model until it stops changing and returns the final value of
/// the `susceptible` compartment.
///
/// # Errors
///
/// Returns an error if the parameters or state do not match the model, if
/// the compartment is unknown, if integration fails, or
/// [`AnalysisError::NoEquilibrium`] if the model is still changing at the
/// configured horizon.
pub fn final_size_by_integration(
    model: &Model,
    params: &ParameterSet,
    initial: &State,
    susceptible: &str,
    config: &steady::Config,
) -> Result<f64, AnalysisError> {
    let index = model
        .index_of(susceptible)
        .ok_or_else(|| StateError::UnknownCompartment {
            name: susceptible.to_string(),
        })?;

    let bound = model.bind(params)?;
    let relaxed = steady::relax(&bound, initial, config)?;
    if relaxed.status != steady::Status::Converged {
        return Err(AnalysisError::NoEquilibrium {
            residual_norm: relaxed.derivative_norm,
        });
    }

    Ok(relaxed.state.values()[index])
}

/// Returns the period of the slowest-decaying oscillatory mode of a
/// Jacobian, `2π / |Im λ|`, or `None` if every eigenvalue is real.
#[must_use]
pub fn damped_period(jacobian: &DMatrix<f64>) -> Option<f64> {
    const REAL_TOL: f64 = 1e-12;

    if jacobian.is_empty() || !jacobian.is_square() {
        return None;
    }
    let scale = jacobian.amax().max(1.0);

    jacobian
        .complex_eigenvalues()
        .iter()
        .filter(|lambda| lambda.im.abs() > REAL_TOL * scale)
        .max_by(|a, b| a.re.total_cmp(&b.re))
        .map(|lambda| 2.0 * PI / lambda.im.abs())
}

fn final_size(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    if canonical.shape() != Shape::Sir {
        return Err(AnalysisError::unsupported(
            canonical.shape(),
            Quantity::FinalSize,
        ));
    }
    let s_inf = final_size_implicit(r0(canonical, params)?, 1.0, 0.0)?;
    Ok(1.0 - s_inf)
}

fn oscillation_period(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    let quantity = Quantity::OscillationPeriod;
    let shape = canonical.shape();
    if !matches!(shape, Shape::SirDemography | Shape::Seir | Shape::Sirs) {
        return Err(AnalysisError::unsupported(shape, quantity));
    }

    let r0 = r0(canonical, params)?;
    let p = |name: &str| params.require(name);
    let mu = p("mu")?;
    if r0 <= 1.0 {
        return Err(AnalysisError::undefined(quantity, "needs R0 > 1"));
    }

    // SIR and SEIR periods scale with the mean age at infection.
    let mean_age = || {
        if mu > 0.0 {
            Ok(1.0 / (mu * (r0 - 1.0)))
        } else {
            Err(AnalysisError::undefined(quantity, "needs mu > 0"))
        }
    };

    match shape {
        Shape::SirDemography => {
            let generation = 1.0 / (p("gamma")? + mu);
            Ok(2.0 * PI * (mean_age()? * generation).sqrt())
        }
        Shape::Seir => {
            let generation = 1.0 / (p("sigma")? + mu) + 1.0 / (p("gamma")? + mu);
            Ok(2.0 * PI * (mean_age()? * generation).sqrt())
        }
        _ => {
            // Waning alone sustains the endemic state.
            let (beta, gamma, omega) = (p("beta")?, p("gamma")?, p("omega")?);
            if mu + omega <= 0.0 {
                return Err(AnalysisError::undefined(quantity, "needs mu + omega > 0"));
            }
            let i = (1.0 - 1.0 / r0) * (mu + omega) / (gamma + mu + omega);
            let trace = -(beta * i + mu + omega);
            let det = beta * i * (gamma + mu + omega);
            let discriminant = 4.0 * det - trace * trace;
            if discriminant <= 0.0 {
                return Err(AnalysisError::undefined(
                    quantity,
                    "the endemic equilibrium is not oscillatory",
                ));
            }
            Ok(4.0 * PI / discriminant.sqrt())
        }
    }
}

fn age_at_infection(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    let quantity = Quantity::AgeAtInfection;
    if !canonical.shape().has_demography() {
        return Err(AnalysisError::unsupported(canonical.shape(), quantity));
    }

    let r0 = r0(canonical, params)?;
    let mu = params.require("mu")?;
    if r0 <= 1.0 || mu <= 0.0 {
        return Err(AnalysisError::undefined(quantity, "needs R0 > 1 and mu > 0"));
    }
    Ok(1.0 / (mu * (r0 - 1.0)))
}

fn population_ratio(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    let Shape::FatalSi(transmission) = canonical.shape() else {
        return Err(AnalysisError::unsupported(
            canonical.shape(),
            Quantity::PopulationRatio,
        ));
    };

    let r0 = r0(canonical, params)?;
    if r0 <= 1.0 {
        return Ok(1.0);
    }
    let rho = params.require("rho")?;
    Ok(match transmission {
        Transmission::Density => 1.0 / r0 + (1.0 - rho) * (1.0 - 1.0 / r0),
        Transmission::Frequency => equilibrium::fatal_si_population_ratio(r0, rho),
    })
}

/// Returns the share of the population in class `S` or `I`.
///
/// Risk-structured models sum the class over every group. Carriers transmit,
/// so the carrier shape counts `C` as infectious along with `I`.
fn share(canonical: &Canonical, state: &State, class: &str) -> f64 {
    let model = canonical.model();
    let total = state.total();
    if total <= 0.0 {
        return 0.0;
    }

    let names: Vec<String> = match canonical.shape() {
        Shape::RiskStructuredSis { groups } => (1..=groups).map(|g| format!("{class}{g}")).collect(),
        Shape::Carrier if class == "I" => vec!["I".to_string(), "C".to_string()],
        _ => vec![class.to_string()],
    };
    names
        .iter()
        .filter_map(|name| model.index_of(name))
        .map(|i| state.values()[i])
        .sum::<f64>()
        / total
}
