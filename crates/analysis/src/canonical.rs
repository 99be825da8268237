//! The recognised model shapes and their canonical definitions.
//!
//! Every canonical model except fatal SI is written for population fractions
//! with frequency-dependent transmission, so the closed forms in
//! [`equilibrium`](crate::equilibrium) and [`derived`](crate::derived) hold for
//! any total population once values are divided by `N`. Fatal SI tracks
//! absolute numbers because its population size is itself an outcome.
//!
//! | shape | compartments | parameters |
//! |-------|--------------|------------|
//! | SIR | S I R | beta gamma |
//! | SIR with demography | S I R | beta gamma mu |
//! | SIS | S I | beta gamma |
//! | SIRS | S I R | beta gamma mu omega |
//! | SEIR | S E I R | beta sigma gamma mu |
//! | carrier | S I C R | beta epsilon q gamma Gamma mu |
//! | fatal SI | S I | beta mu nu rho |
//! | risk-structured SIS | S1 I1 … Sg Ig | beta_i_j gamma n_i |

use std::fmt;

use epiflow_core::{
    Flow, Model, ModelBuilder, Transmission,
    expr::{Expr, comp, param, total},
};

/// A recognised model structure with closed-form analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Closed-cohort SIR epidemic.
    Sir,
    /// SIR with births and deaths at equal rate `mu`.
    SirDemography,
    /// SIS with no immunity.
    Sis,
    /// SIR with demography and waning immunity at rate `omega`.
    Sirs,
    /// SIR with demography and a latent class left at rate `sigma`.
    Seir,
    /// SIR with demography where a fraction `q` of infecteds become
    /// carriers, transmitting at relative rate `epsilon` and recovering at
    /// rate `Gamma`.
    Carrier,
    /// SI with constant births `nu` and infection-induced mortality: a
    /// fraction `rho` of infecteds die of the disease.
    FatalSi(Transmission),
    /// SIS in `groups` risk groups mixing through a WAIFW matrix.
    RiskStructuredSis { groups: usize },
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Sir => write!(f, "SIR"),
            Shape::SirDemography => write!(f, "SIR with demography"),
            Shape::Sis => write!(f, "SIS"),
            Shape::Sirs => write!(f, "SIRS"),
            Shape::Seir => write!(f, "SEIR"),
            Shape::Carrier => write!(f, "carrier-state"),
            Shape::FatalSi(Transmission::Density) => write!(f, "fatal SI (density)"),
            Shape::FatalSi(Transmission::Frequency) => write!(f, "fatal SI (frequency)"),
            Shape::RiskStructuredSis { groups } => write!(f, "{groups}-group risk-structured SIS"),
        }
    }
}

impl Shape {
    /// Returns true if births balance natural deaths at a common rate `mu`,
    /// keeping the population constant.
    #[must_use]
    pub fn has_demography(&self) -> bool {
        matches!(
            self,
            Shape::SirDemography | Shape::Sirs | Shape::Seir | Shape::Carrier
        )
    }
}

/// A model tagged with its recognised shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonical {
    shape: Shape,
    model: Model,
}

impl Canonical {
    /// The closed-cohort SIR model.
    #[must_use]
    pub fn sir() -> Self {
        Self::assemble(
            Shape::Sir,
            Model::builder()
                .name("SIR")
                .compartments(["S", "I", "R"])
                .parameters(["beta", "gamma"])
                .flow(infection("S", "I", param("beta") * comp("I")))
                .flow(Flow::transfer("I", "R", param("gamma") * comp("I"))),
        )
    }

    /// SIR with births into `S` balancing deaths from every class.
    #[must_use]
    pub fn sir_demography() -> Self {
        Self::assemble(
            Shape::SirDemography,
            demography(
                Model::builder()
                    .name("SIR with demography")
                    .compartments(["S", "I", "R"])
                    .parameters(["beta", "gamma", "mu"])
                    .flow(infection("S", "I", param("beta") * comp("I")))
                    .flow(Flow::transfer("I", "R", param("gamma") * comp("I"))),
                &["S", "I", "R"],
            ),
        )
    }

    #[must_use]
    pub fn sis() -> Self {
        Self::assemble(
            Shape::Sis,
            Model::builder()
                .name("SIS")
                .compartments(["S", "I"])
                .parameters(["beta", "gamma"])
                .flow(infection("S", "I", param("beta") * comp("I")))
                .flow(Flow::transfer("I", "S", param("gamma") * comp("I"))),
        )
    }

    /// SIR with demography and waning immunity returning `R` to `S`.
    #[must_use]
    pub fn sirs() -> Self {
        Self::assemble(
            Shape::Sirs,
            demography(
                Model::builder()
                    .name("SIRS")
                    .compartments(["S", "I", "R"])
                    .parameters(["beta", "gamma", "mu", "omega"])
                    .flow(infection("S", "I", param("beta") * comp("I")))
                    .flow(Flow::transfer("I", "R", param("gamma") * comp("I")))
                    .flow(Flow::transfer("R", "S", param("omega") * comp("R"))),
                &["S", "I", "R"],
            ),
        )
    }

    #[must_use]
    pub fn seir() -> Self {
        Self::assemble(
            Shape::Seir,
            demography(
                Model::builder()
                    .name("SEIR")
                    .compartments(["S", "E", "I", "R"])
                    .parameters(["beta", "sigma", "gamma", "mu"])
                    .flow(infection("S", "E", param("beta") * comp("I")))
                    .flow(Flow::transfer("E", "I", param("sigma") * comp("E")))
                    .flow(Flow::transfer("I", "R", param("gamma") * comp("I"))),
                &["S", "E", "I", "R"],
            ),
        )
    }

    /// SIR with demography and an infectious carrier class `C`.
    #[must_use]
    pub fn carrier() -> Self {
        let gamma_i = param("gamma") * comp("I");
        Self::assemble(
            Shape::Carrier,
            demography(
                Model::builder()
                    .name("carrier")
                    .compartments(["S", "I", "C", "R"])
                    .parameters(["beta", "epsilon", "q", "gamma", "Gamma", "mu"])
                    .flow(infection(
                        "S",
                        "I",
                        param("beta") * (comp("I") + param("epsilon") * comp("C")),
                    ))
                    .flow(Flow::transfer("I", "C", param("q") * gamma_i.clone()))
                    .flow(Flow::transfer("I", "R", (1.0 - param("q")) * gamma_i))
                    .flow(Flow::transfer("C", "R", param("Gamma") * comp("C"))),
                &["S", "I", "C", "R"],
            ),
        )
    }

    /// SI with constant births and disease-induced mortality.
    ///
    /// Infecteds leave at total rate `mu / (1 - rho)`, so a fraction `rho`
    /// of them die of the infection. The disease-free population is
    /// `N0 = nu / mu`.
    #[must_use]
    pub fn fatal_si(transmission: Transmission) -> Self {
        let name = match transmission {
            Transmission::Density => "fatal SI (density)",
            Transmission::Frequency => "fatal SI (frequency)",
        };
        Self::assemble(
            Shape::FatalSi(transmission),
            Model::builder()
                .name(name)
                .compartments(["S", "I"])
                .parameters(["beta", "mu", "nu", "rho"])
                .flow(Flow::birth("S", param("nu")))
                .flow(
                    Flow::transfer("S", "I", param("beta") * comp("S") * comp("I"))
                        .with_transmission(transmission),
                )
                .flow(Flow::death("S", param("mu") * comp("S")))
                .flow(Flow::death(
                    "I",
                    param("mu") * comp("I") / (1.0 - param("rho")),
                )),
        )
    }

    /// SIS in `groups` risk groups.
    ///
    /// Group `i` holds a fraction `n_i` of the population. Susceptibles in
    /// group `i` are infected by group `j` at rate `beta_i_j * S_i * I_j`;
    /// every group recovers at rate `gamma`. Groups are numbered from 1.
    /// Zero groups yield a model with no compartments, which is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if `groups` is zero.
    pub fn risk_structured_sis(groups: usize) -> Result<Self, epiflow_core::ModelError> {
        let mut builder = Model::builder()
            .name(format!("{groups}-group risk-structured SIS"))
            .parameter("gamma");

        for i in 1..=groups {
            builder = builder
                .compartments([susceptible(i), infectious(i)])
                .parameter(group_size(i));
            for j in 1..=groups {
                builder = builder.parameter(waifw(i, j));
            }
        }

        for i in 1..=groups {
            let force = (1..=groups)
                .map(|j| param(waifw(i, j)) * comp(infectious(j)))
                .reduce(|a, b| a + b)
                .unwrap_or(Expr::Const(0.0));

            builder = builder
                .flow(Flow::transfer(
                    susceptible(i),
                    infectious(i),
                    force * comp(susceptible(i)),
                ))
                .flow(Flow::transfer(
                    infectious(i),
                    susceptible(i),
                    param("gamma") * comp(infectious(i)),
                ));
        }

        Ok(Self {
            shape: Shape::RiskStructuredSis { groups },
            model: builder.build()?,
        })
    }

    /// Returns the canonical shape that `model` is structurally identical to.
    ///
    /// Compartments, parameters and flows must match exactly; the model name
    /// is ignored.
    #[must_use]
    pub fn recognize(model: &Model) -> Option<Self> {
        let mut candidates = vec![
            Self::sir(),
            Self::sir_demography(),
            Self::sis(),
            Self::sirs(),
            Self::seir(),
            Self::carrier(),
            Self::fatal_si(Transmission::Density),
            Self::fatal_si(Transmission::Frequency),
        ];
        if model.compartment_count() % 2 == 0 {
            candidates.extend(Self::risk_structured_sis(model.compartment_count() / 2).ok());
        }

        candidates.into_iter().find(|candidate| {
            let other = &candidate.model;
            other.compartments() == model.compartments()
                && other.declared_parameters() == model.declared_parameters()
                && other.flows() == model.flows()
        })
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    fn assemble(shape: Shape, builder: ModelBuilder) -> Self {
        // Known-good definitions, expect is safe
        let model = builder.build().expect("canonical model is well formed");
        Self { shape, model }
    }
}

/// Frequency-dependent infection of `from` by `force * from / N`.
fn infection(from: &str, to: &str, force: Expr) -> Flow {
    Flow::transfer(from, to, force * comp(from)).frequency()
}

/// Adds births `mu * N` into `S` and deaths `mu` from each listed class.
fn demography(builder: ModelBuilder, classes: &[&str]) -> ModelBuilder {
    classes.iter().fold(
        builder.flow(Flow::birth("S", param("mu") * total())),
        |builder, class| builder.flow(Flow::death(*class, param("mu") * comp(*class))),
    )
}

pub(crate) fn susceptible(group: usize) -> String {
    format!("S{group}")
}

pub(crate) fn infectious(group: usize) -> String {
    format!("I{group}")
}

pub(crate) fn group_size(group: usize) -> String {
    format!("n_{group}")
}

pub(crate) fn waifw(to: usize, from: usize) -> String {
    format!("beta_{to}_{from}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use epiflow_core::ParameterSet;

    #[test]
    fn canonical_models_build() {
        for canonical in [
            Canonical::sir(),
            Canonical::sir_demography(),
            Canonical::sis(),
            Canonical::sirs(),
            Canonical::seir(),
            Canonical::carrier(),
            Canonical::fatal_si(Transmission::Density),
            Canonical::fatal_si(Transmission::Frequency),
        ] {
            assert!(canonical.model().compartment_count() >= 2);
        }
    }

    #[test]
    fn demography_keeps_fractions_constant() {
        let canonical = Canonical::seir();
        let params =
            ParameterSet::from([("beta", 3.0), ("sigma", 0.2), ("gamma", 0.1), ("mu", 0.01)]);
        let bound = canonical.model().bind(&params).expect("valid params");

        let dy = bound.derivative_vec(&[0.7, 0.1, 0.1, 0.1]);
        let sum: f64 = dy.iter().sum();
        assert!(sum.abs() < 1e-15);
    }

    #[test]
    fn risk_structured_declares_matrix() {
        let canonical = Canonical::risk_structured_sis(2).expect("two groups");
        let model = canonical.model();

        assert_eq!(model.compartments(), ["S1", "I1", "S2", "I2"]);
        assert!(model.declared_parameters().contains(&"beta_1_2".to_string()));
        assert!(model.declared_parameters().contains(&"n_2".to_string()));
        assert!(Canonical::risk_structured_sis(0).is_err());
    }

    #[test]
    fn recognizes_structurally_identical_models() {
        let user = Model::builder()
            .name("my sis")
            .compartments(["S", "I"])
            .parameters(["beta", "gamma"])
            .flow(Flow::transfer("S", "I", param("beta") * comp("I") * comp("S")).frequency())
            .flow(Flow::transfer("I", "S", param("gamma") * comp("I")))
            .build()
            .expect("valid model");

        let canonical = Canonical::recognize(&user).expect("recognised");
        assert_eq!(canonical.shape(), Shape::Sis);

        let density = Model::builder()
            .compartments(["S", "I"])
            .parameters(["beta", "gamma"])
            .flow(Flow::transfer("S", "I", param("beta") * comp("I") * comp("S")))
            .flow(Flow::transfer("I", "S", param("gamma") * comp("I")))
            .build()
            .expect("valid model");
        assert!(Canonical::recognize(&density).is_none());
    }

    #[test]
    fn recognizes_risk_groups() {
        let model = Canonical::risk_structured_sis(3)
            .expect("three groups")
            .model()
            .clone();
        let recognised = Canonical::recognize(&model).expect("recognised");

        assert_eq!(recognised.shape(), Shape::RiskStructuredSis { groups: 3 });
    }
}
