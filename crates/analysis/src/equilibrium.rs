//! Disease-free and endemic equilibria.
//!
//! [`equilibria`] evaluates closed forms for every recognised shape except
//! the risk-structured SIS, whose endemic point is found numerically.
//! [`equilibria_numeric`] works for any model: it runs damped Newton on the
//! flow balance and falls back to long-horizon integration when Newton does
//! not converge.

use epiflow_core::{Bound, Model, ParameterSet, State, StateError, Transmission};
use epiflow_solvers::{newton, steady};

use crate::{
    AnalysisError, Canonical, Shape,
    canonical::{group_size, infectious},
    derived,
};

/// Infected share below which a numeric equilibrium counts as disease free.
const ENDEMIC_FLOOR: f64 = 1e-9;

/// Net flow of a conserved group, relative to the summed flow magnitudes.
const CONSERVATION_TOL: f64 = 1e-12;

/// The endemic equilibrium, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Endemic {
    /// The endemic state, with every infected class positive.
    Point(State),
    /// No endemic equilibrium exists for these parameters, typically
    /// because `r0 <= 1`.
    Absent { r0: f64 },
}

/// Equilibria of a canonical model.
#[derive(Debug, Clone, PartialEq)]
pub struct Equilibria {
    pub shape: Shape,
    pub r0: f64,
    pub disease_free: State,
    pub endemic: Endemic,
}

impl Equilibria {
    /// Returns the endemic state, if any.
    #[must_use]
    pub fn endemic_state(&self) -> Option<&State> {
        match &self.endemic {
            Endemic::Point(state) => Some(state),
            Endemic::Absent { .. } => None,
        }
    }
}

/// How a numeric equilibrium was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Newton,
    Relaxation,
}

/// An equilibrium found by [`equilibria_numeric`].
#[derive(Debug, Clone, PartialEq)]
pub struct NumericEquilibrium {
    pub state: State,
    pub method: Method,

    /// Infinity norm of the residual at `state`.
    ///
    /// For Newton this includes any conservation rows; for relaxation it is
    /// the largest derivative component.
    pub residual_norm: f64,
}

/// Computes the disease-free and endemic equilibria of a canonical model.
///
/// Values are population fractions, except for fatal SI which is in absolute
/// numbers with disease-free population `nu / mu`.
///
/// # Errors
///
/// Returns an error if the parameters do not match the model, if R0 is
/// undefined for them, or if the numeric search for a risk-structured
/// endemic point fails.
pub fn equilibria(
    canonical: &Canonical,
    params: &ParameterSet,
) -> Result<Equilibria, AnalysisError> {
    let r0 = derived::r0(canonical, params)?;
    let p = |name: &str| params.require(name);
    let shape = canonical.shape();
    let model = canonical.model();

    let (disease_free, endemic) = match shape {
        Shape::Sir => (model.state([("S", 1.0)])?, None),

        Shape::Sis => (
            model.state([("S", 1.0)])?,
            (r0 > 1.0).then(|| vec![1.0 / r0, 1.0 - 1.0 / r0]),
        ),

        Shape::SirDemography => {
            let (beta, gamma, mu) = (p("beta")?, p("gamma")?, p("mu")?);
            let endemic = (r0 > 1.0 && mu > 0.0).then(|| {
                let i = mu * (r0 - 1.0) / beta;
                vec![1.0 / r0, i, gamma * i / mu]
            });
            (model.state([("S", 1.0)])?, endemic)
        }

        Shape::Sirs => {
            let (gamma, mu, omega) = (p("gamma")?, p("mu")?, p("omega")?);
            let endemic = (r0 > 1.0 && mu + omega > 0.0).then(|| {
                let i = (1.0 - 1.0 / r0) * (mu + omega) / (gamma + mu + omega);
                vec![1.0 / r0, i, gamma * i / (mu + omega)]
            });
            (model.state([("S", 1.0)])?, endemic)
        }

        Shape::Seir => {
            let (beta, sigma, gamma, mu) = (p("beta")?, p("sigma")?, p("gamma")?, p("mu")?);
            let endemic = (r0 > 1.0 && mu > 0.0).then(|| {
                let i = mu * (r0 - 1.0) / beta;
                vec![1.0 / r0, (gamma + mu) * i / sigma, i, gamma * i / mu]
            });
            (model.state([("S", 1.0)])?, endemic)
        }

        Shape::Carrier => {
            let (q, gamma, big_gamma, mu) = (p("q")?, p("gamma")?, p("Gamma")?, p("mu")?);
            let endemic = (r0 > 1.0 && mu > 0.0).then(|| {
                let s = 1.0 / r0;
                let i = mu * (1.0 - s) / (gamma + mu);
                let c = q * gamma * i / (big_gamma + mu);
                let r = ((1.0 - q) * gamma * i + big_gamma * c) / mu;
                vec![s, i, c, r]
            });
            (model.state([("S", 1.0)])?, endemic)
        }

        Shape::FatalSi(transmission) => {
            let (mu, nu, rho) = (p("mu")?, p("nu")?, p("rho")?);
            let n0 = nu / mu;
            let endemic = (r0 > 1.0).then(|| match transmission {
                Transmission::Density => {
                    let s = n0 / r0;
                    vec![s, (1.0 - rho) * (n0 - s)]
                }
                Transmission::Frequency => {
                    let n = n0 * fatal_si_population_ratio(r0, rho);
                    vec![n / r0, n * (1.0 - 1.0 / r0)]
                }
            });
            (model.state([("S", n0)])?, endemic)
        }

        Shape::RiskStructuredSis { groups } => {
            return risk_structured(canonical, params, groups, r0);
        }
    };

    let endemic = match endemic {
        Some(values) => Endemic::Point(model.state_from_values(values)?),
        None => Endemic::Absent { r0 },
    };

    Ok(Equilibria {
        shape,
        r0,
        disease_free,
        endemic,
    })
}

/// Finds an equilibrium of any model near `guess`.
///
/// A set of compartments connected by transfers whose total never changes
/// (a closed cohort, or births exactly balancing deaths) makes the plain flow
/// balance singular. For each such set the balance row of its first
/// compartment is replaced by "total equals the total in `guess`", so the
/// equilibrium found has the same population as the guess.
///
/// If Newton does not converge the model is integrated from `guess` until its
/// derivative vanishes.
///
/// Only the one equilibrium reached from `guess` is returned. A general model
/// has no designated infected compartments, so which point that is (disease
/// free or endemic) depends on the guess: seed inside the basin of each point
/// to find both. [`equilibria`] returns the pair for recognised shapes.
///
/// # Errors
///
/// Returns an error if the parameters or guess do not match the model, if
/// the guess is non-finite, or if neither method converges.
pub fn equilibria_numeric(
    model: &Model,
    params: &ParameterSet,
    guess: &State,
    config: &newton::Config,
) -> Result<NumericEquilibrium, AnalysisError> {
    let bound = model.bind(params)?;
    if guess.len() != model.compartment_count() {
        return Err(StateError::Length {
            expected: model.compartment_count(),
            actual: guess.len(),
        }
        .into());
    }

    let constraints: Vec<_> = conserved_components(&bound, guess.values())
        .into_iter()
        .map(|members| {
            let total = members.iter().map(|&i| guess.values()[i]).sum::<f64>();
            (members, total)
        })
        .collect();

    let residual = |x: &[f64], r: &mut [f64]| {
        bound.derivative(x, r);
        for (members, total) in &constraints {
            r[members[0]] = members.iter().map(|&i| x[i]).sum::<f64>() - total;
        }
    };

    let reason = match newton::solve_unobserved(residual, guess.values(), config) {
        Ok(solution) if solution.is_converged() => {
            log::debug!(
                "newton converged in {} iterations (residual {:e})",
                solution.iters,
                solution.residual_norm
            );
            return Ok(NumericEquilibrium {
                state: solution.x,
                method: Method::Newton,
                residual_norm: solution.residual_norm,
            });
        }
        Ok(solution) => format!("{:?}", solution.status),
        Err(
            error @ (newton::Error::SingularJacobian { .. }
            | newton::Error::NonFiniteResidual { .. }),
        ) => error.to_string(),
        Err(error) => return Err(error.into()),
    };

    log::warn!("newton did not converge ({reason}), relaxing by integration");

    let relaxed = steady::relax(&bound, guess, &steady::Config::default())?;
    if relaxed.status != steady::Status::Converged {
        return Err(AnalysisError::NoEquilibrium {
            residual_norm: relaxed.derivative_norm,
        });
    }

    Ok(NumericEquilibrium {
        state: relaxed.state,
        method: Method::Relaxation,
        residual_norm: relaxed.derivative_norm,
    })
}

/// Returns `N*/N0` for fatal SI with frequency-dependent transmission.
pub(crate) fn fatal_si_population_ratio(r0: f64, rho: f64) -> f64 {
    1.0 / (1.0 / r0 + (1.0 - 1.0 / r0) / (1.0 - rho))
}

fn risk_structured(
    canonical: &Canonical,
    params: &ParameterSet,
    groups: usize,
    r0: f64,
) -> Result<Equilibria, AnalysisError> {
    let model = canonical.model();
    let sizes = (1..=groups)
        .map(|g| params.require(&group_size(g)))
        .collect::<Result<Vec<_>, _>>()?;

    // Compartments are ordered S1, I1, S2, I2, ...
    let split = |infected: f64| {
        model.state_from_values(
            sizes
                .iter()
                .flat_map(|n| [(1.0 - infected) * n, infected * n])
                .collect(),
        )
    };

    let disease_free = split(0.0)?;
    let endemic = if r0 > 1.0 {
        let found = equilibria_numeric(model, params, &split(0.5)?, &newton::Config::default())?;
        let infected: f64 = (1..=groups)
            .filter_map(|g| model.index_of(&infectious(g)))
            .map(|i| found.state.values()[i])
            .sum();
        if infected > ENDEMIC_FLOOR * sizes.iter().sum::<f64>() {
            Endemic::Point(found.state)
        } else {
            Endemic::Absent { r0 }
        }
    } else {
        Endemic::Absent { r0 }
    };

    Ok(Equilibria {
        shape: canonical.shape(),
        r0,
        disease_free,
        endemic,
    })
}

/// Groups compartments joined by transfers and returns the groups whose
/// total does not change, each sorted by compartment index.
///
/// A group touched by external flows can still conserve its total when
/// births balance deaths, so each group's net flow is evaluated at `guess`
/// and at two perturbations of it rather than inferred from topology.
fn conserved_components(bound: &Bound<'_>, guess: &[f64]) -> Vec<Vec<usize>> {
    let model = bound.model();
    let n = model.compartment_count();
    let mut parent: Vec<usize> = (0..n).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for flow in model.flows() {
        let ends = [flow.source(), flow.target()]
            .map(|end| end.compartment().and_then(|name| model.index_of(name)));
        if let [Some(a), Some(b)] = ends {
            let (ra, rb) = (root(&mut parent, a), root(&mut parent, b));
            parent[ra.max(rb)] = ra.min(rb);
        }
    }

    let mut components: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        let r = root(&mut parent, i);
        components[r].push(i);
    }

    let scale = (guess.iter().sum::<f64>() / n as f64).max(1e-6);
    let spread = |i: usize| (i + 1) as f64 / n as f64;
    let probes = [
        guess.to_vec(),
        (0..n)
            .map(|i| guess[i] * (1.0 + 0.1 * spread(i)) + 0.01 * scale * spread(i))
            .collect(),
        (0..n)
            .map(|i| guess[i] * (1.0 - 0.05 * spread(i)) + 0.02 * scale * spread(n - 1 - i))
            .collect::<Vec<_>>(),
    ];
    let evaluated: Vec<(Vec<f64>, f64)> = probes
        .iter()
        .map(|y| {
            let magnitude = bound.rates(y).iter().map(|r| r.abs()).sum::<f64>();
            (bound.derivative_vec(y), CONSERVATION_TOL * magnitude)
        })
        .collect();

    components
        .into_iter()
        .filter(|members| {
            !members.is_empty()
                && evaluated.iter().all(|(dy, tol)| {
                    members.iter().map(|&i| dy[i]).sum::<f64>().abs() <= *tol
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use epiflow_core::{
        Flow,
        expr::{comp, param},
    };

    fn assert_balanced(canonical: &Canonical, params: &ParameterSet, state: &State) {
        let bound = canonical.model().bind(params).expect("valid params");
        let dy = bound.derivative_vec(state.values());
        let scale = state.total().max(1.0);
        for d in dy {
            assert!(d.abs() < 1e-12 * scale, "derivative {d} is not zero");
        }
    }

    #[test]
    fn sir_has_no_endemic_state() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
        let eq = equilibria(&Canonical::sir(), &params).expect("valid params");

        assert_eq!(eq.endemic, Endemic::Absent { r0: 4.0 });
        assert_eq!(eq.disease_free.values(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn sir_demography_closed_form() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5), ("mu", 0.0003)]);
        let canonical = Canonical::sir_demography();
        let eq = equilibria(&canonical, &params).expect("valid params");
        let state = eq.endemic_state().expect("endemic");

        let r0 = 2.0 / 0.5003;
        assert_relative_eq!(eq.r0, r0, epsilon = 1e-12);
        assert_relative_eq!(state.values()[0], 0.5003 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(state.values()[1], 0.0003 / 2.0 * (r0 - 1.0), epsilon = 1e-12);
        assert_relative_eq!(state.total(), 1.0, epsilon = 1e-12);
        assert_balanced(&canonical, &params, state);
    }

    #[test]
    fn closed_forms_balance_flows() {
        let cases = [
            (
                Canonical::sis(),
                ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]),
            ),
            (
                Canonical::sirs(),
                ParameterSet::from([("beta", 3.0), ("gamma", 1.0), ("mu", 0.02), ("omega", 0.1)]),
            ),
            (
                Canonical::seir(),
                ParameterSet::from([("beta", 5.0), ("sigma", 0.5), ("gamma", 1.0), ("mu", 0.02)]),
            ),
            (
                Canonical::carrier(),
                ParameterSet::from([
                    ("beta", 2.0),
                    ("epsilon", 0.1),
                    ("q", 0.2),
                    ("gamma", 0.5),
                    ("Gamma", 0.01),
                    ("mu", 0.02),
                ]),
            ),
            (
                Canonical::fatal_si(Transmission::Density),
                ParameterSet::from([("beta", 0.002), ("mu", 0.1), ("nu", 100.0), ("rho", 0.5)]),
            ),
            (
                Canonical::fatal_si(Transmission::Frequency),
                ParameterSet::from([("beta", 2.0), ("mu", 0.1), ("nu", 100.0), ("rho", 0.5)]),
            ),
        ];

        for (canonical, params) in cases {
            let eq = equilibria(&canonical, &params).expect("valid params");
            assert_balanced(&canonical, &params, &eq.disease_free);
            let state = eq.endemic_state().expect("endemic");
            assert_balanced(&canonical, &params, state);
        }
    }

    #[test]
    fn subcritical_has_no_endemic_state() {
        let params = ParameterSet::from([("beta", 0.4), ("gamma", 0.5)]);
        let eq = equilibria(&Canonical::sis(), &params).expect("valid params");

        assert!(matches!(eq.endemic, Endemic::Absent { r0 } if (r0 - 0.8).abs() < 1e-12));
    }

    #[test]
    fn fatal_si_population_shrinks() {
        let params = ParameterSet::from([("beta", 0.002), ("mu", 0.1), ("nu", 100.0), ("rho", 0.5)]);
        let eq = equilibria(&Canonical::fatal_si(Transmission::Density), &params)
            .expect("valid params");

        assert_relative_eq!(eq.disease_free.total(), 1000.0);
        let n = eq.endemic_state().expect("endemic").total();
        let r0 = eq.r0;
        assert_relative_eq!(n / 1000.0, 1.0 / r0 + 0.5 * (1.0 - 1.0 / r0), epsilon = 1e-12);
    }

    #[test]
    fn newton_matches_closed_form_on_closed_model() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
        let canonical = Canonical::sis();
        let guess = State::new(vec![0.5, 0.5]);

        let found = equilibria_numeric(canonical.model(), &params, &guess, &newton::Config::default())
            .expect("converges");

        assert_eq!(found.method, Method::Newton);
        assert_relative_eq!(found.state.values()[0], 0.25, epsilon = 1e-10);
        assert_relative_eq!(found.state.values()[1], 0.75, epsilon = 1e-10);
    }

    #[test]
    fn guess_selects_which_equilibrium_is_found() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
        let canonical = Canonical::sis();
        let model = canonical.model();
        let config = newton::Config::default();

        let disease_free = equilibria_numeric(model, &params, &State::new(vec![1.0, 0.0]), &config)
            .expect("converges");
        assert_eq!(disease_free.state.values(), [1.0, 0.0]);

        let endemic = equilibria_numeric(model, &params, &State::new(vec![0.5, 0.5]), &config)
            .expect("converges");
        assert_relative_eq!(endemic.state.values()[1], 0.75, epsilon = 1e-10);
    }

    #[test]
    fn newton_matches_closed_form_with_demography() {
        let params = ParameterSet::from([("beta", 5.0), ("sigma", 0.5), ("gamma", 1.0), ("mu", 0.02)]);
        let canonical = Canonical::seir();
        let expected = equilibria(&canonical, &params).expect("valid params");
        let expected = expected.endemic_state().expect("endemic");

        let guess = State::new(vec![0.3, 0.05, 0.05, 0.6]);
        let found = equilibria_numeric(canonical.model(), &params, &guess, &newton::Config::default())
            .expect("converges");

        for (a, b) in found.state.values().iter().zip(expected.values()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn conserved_components_split_independent_groups() {
        let model = Model::builder()
            .compartments(["A", "B", "C", "D"])
            .parameters(["k"])
            .flow(Flow::transfer("A", "B", param("k") * comp("A")))
            .flow(Flow::transfer("C", "D", param("k") * comp("C")))
            .flow(Flow::death("D", param("k") * comp("D")))
            .build()
            .expect("valid model");
        let bound = model
            .bind(&ParameterSet::from([("k", 1.0)]))
            .expect("valid params");

        assert_eq!(
            conserved_components(&bound, &[1.0, 0.0, 1.0, 0.0]),
            vec![vec![0, 1]]
        );
    }

    #[test]
    fn balanced_demography_is_conserved() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5), ("mu", 0.02)]);
        let canonical = Canonical::sir_demography();
        let bound = canonical.model().bind(&params).expect("valid params");
        assert_eq!(
            conserved_components(&bound, &[0.5, 0.1, 0.4]),
            vec![vec![0, 1, 2]]
        );

        let params = ParameterSet::from([("beta", 0.002), ("mu", 0.1), ("nu", 100.0), ("rho", 0.5)]);
        let canonical = Canonical::fatal_si(Transmission::Density);
        let bound = canonical.model().bind(&params).expect("valid params");
        assert!(conserved_components(&bound, &[500.0, 100.0]).is_empty());
    }

    #[test]
    fn risk_structured_endemic_state_balances() {
        let params = ParameterSet::from([
            ("beta_1_1", 10.0),
            ("beta_1_2", 0.1),
            ("beta_2_1", 0.1),
            ("beta_2_2", 1.0),
            ("gamma", 1.0),
            ("n_1", 0.2),
            ("n_2", 0.8),
        ]);
        let canonical = Canonical::risk_structured_sis(2).expect("two groups");
        let eq = equilibria(&canonical, &params).expect("valid params");
        let state = eq.endemic_state().expect("endemic");

        assert_balanced(&canonical, &params, state);
        assert_relative_eq!(state.values()[0] + state.values()[1], 0.2, epsilon = 1e-10);
        assert_relative_eq!(state.values()[2] + state.values()[3], 0.8, epsilon = 1e-10);
        assert!(state.values()[1] > 0.0);
    }

    #[test]
    fn rejects_mismatched_guess() {
        let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
        let err = equilibria_numeric(
            Canonical::sis().model(),
            &params,
            &State::new(vec![1.0]),
            &newton::Config::default(),
        )
        .unwrap_err();

        assert!(matches!(err, AnalysisError::State(StateError::Length { .. })));
    }
}
