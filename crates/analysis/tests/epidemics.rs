//! End-to-end behaviour of canonical epidemic models.

use approx::assert_relative_eq;
use epiflow_analysis::{
    AnalysisError, Canonical, Endemic, Quantity, derived,
    equilibrium::{self, Method},
    ngm,
    scenario::{Execution, Quantities, Scenario, SteadyState, Sweep},
};
use epiflow_core::{
    Flow, Malformed, Model, ModelError, ParameterError, ParameterSet, Reference, State,
    expr::{comp, param},
};
use epiflow_observers::LogProgress;
use epiflow_solvers::{
    integrate::{self, Method as Stepper, TimeGrid},
    newton, steady,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sir(beta: f64, gamma: f64) -> ParameterSet {
    ParameterSet::from([("beta", beta), ("gamma", gamma)])
}

#[test]
fn closed_cohort_conserves_population() {
    init_logging();
    let canonical = Canonical::sir();
    let bound = canonical.model().bind(&sir(2.0, 0.5)).expect("valid params");
    let initial = canonical
        .model()
        .state([("S", 0.99), ("I", 0.01)])
        .expect("valid state");

    let solution = integrate::integrate(
        &bound,
        &initial,
        &TimeGrid::uniform(0.0, 100.0, 0.5),
        &integrate::Config::default(),
        LogProgress::new("sir").every(20),
    )
    .expect("integrates");

    assert_eq!(solution.status, integrate::Status::Complete);
    for total in solution.trajectory.totals() {
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn sir_threshold_at_gamma_over_beta() {
    let canonical = Canonical::sir();
    let bound = canonical.model().bind(&sir(2.0, 0.5)).expect("valid params");
    let grid = TimeGrid::uniform(0.0, 40.0, 0.25);
    let config = integrate::Config::default();

    let above = canonical
        .model()
        .state([("S", 0.9), ("I", 0.01), ("R", 0.09)])
        .expect("valid state");
    let infected = integrate::integrate_unobserved(&bound, &above, &grid, &config)
        .expect("integrates")
        .trajectory
        .series("I")
        .expect("I exists");
    let peak = infected.iter().copied().fold(0.0, f64::max);
    assert!(peak > 0.1, "epidemic should take off, peak {peak}");

    let below = canonical
        .model()
        .state([("S", 0.2), ("I", 0.01), ("R", 0.79)])
        .expect("valid state");
    let infected = integrate::integrate_unobserved(&bound, &below, &grid, &config)
        .expect("integrates")
        .trajectory
        .series("I")
        .expect("I exists");
    assert!(infected.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[test]
fn sir_threshold_is_sharp() {
    // gamma / beta = 0.25
    let canonical = Canonical::sir();
    let bound = canonical.model().bind(&sir(2.0, 0.5)).expect("valid params");
    let grid = TimeGrid::uniform(0.0, 20.0, 0.25);
    let config = integrate::Config::default();
    let infected = |s0: f64| {
        let initial = canonical
            .model()
            .state([("S", s0), ("I", 0.01), ("R", 0.99 - s0)])
            .expect("valid state");
        integrate::integrate_unobserved(&bound, &initial, &grid, &config)
            .expect("integrates")
            .trajectory
            .series("I")
            .expect("I exists")
    };

    let above = infected(0.26);
    assert!(above[1] > above[0], "I should rise: {} -> {}", above[0], above[1]);

    let below = infected(0.24);
    assert!(below[1] < below[0], "I should fall: {} -> {}", below[0], below[1]);
    assert!(below.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[test]
fn sir_demography_settles_on_endemic_state() {
    let canonical = Canonical::sir_demography();
    let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5), ("mu", 0.0003)]);
    let bound = canonical.model().bind(&params).expect("valid params");
    let initial = canonical
        .model()
        .state([("S", 0.3), ("I", 0.0005), ("R", 0.6995)])
        .expect("valid state");

    let config = integrate::Config::new(Stepper::Dopri5 {
        abs_tol: 1e-12,
        rel_tol: 1e-9,
    })
    .expect("valid config");
    let solution = integrate::integrate_unobserved(
        &bound,
        &initial,
        &TimeGrid::uniform(0.0, 40_000.0, 100.0),
        &config,
    )
    .expect("integrates");
    let last = solution.trajectory.last().expect("samples");

    let r0 = 2.0 / 0.5003;
    assert_relative_eq!(last.values[0], 0.5003 / 2.0, max_relative = 0.01);
    assert_relative_eq!(last.values[1], 0.0003 / 2.0 * (r0 - 1.0), max_relative = 0.01);
}

#[test]
fn sir_demography_settles_under_default_stepper() {
    let canonical = Canonical::sir_demography();
    let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5), ("mu", 0.0003)]);
    let bound = canonical.model().bind(&params).expect("valid params");
    let initial = canonical
        .model()
        .state([("S", 0.3), ("I", 0.0005), ("R", 0.6995)])
        .expect("valid state");

    let solution = integrate::integrate_unobserved(
        &bound,
        &initial,
        &TimeGrid::uniform(0.0, 60_000.0, 100.0),
        &integrate::Config::default(),
    )
    .expect("integrates");
    let last = solution.trajectory.last().expect("samples");

    let derivative = bound.derivative_vec(&last.values);
    let norm = derivative.iter().map(|d| d * d).sum::<f64>().sqrt();
    assert!(norm < 1e-8, "derivative norm {norm}");

    let r0 = 2.0 / 0.5003;
    assert_relative_eq!(last.values[0], 0.5003 / 2.0, max_relative = 1e-3);
    assert_relative_eq!(last.values[1], 0.0003 / 2.0 * (r0 - 1.0), max_relative = 1e-3);
}

#[test]
fn sis_relaxes_to_closed_form() {
    let canonical = Canonical::sis();
    let params = sir(2.0, 0.5);
    let bound = canonical.model().bind(&params).expect("valid params");
    let initial = canonical
        .model()
        .state([("S", 0.99), ("I", 0.01)])
        .expect("valid state");

    let relaxed = steady::relax(&bound, &initial, &steady::Config::default()).expect("relaxes");

    assert_eq!(relaxed.status, steady::Status::Converged);
    assert_relative_eq!(relaxed.state.values()[0], 0.25, epsilon = 1e-8);
    assert_relative_eq!(relaxed.state.values()[1], 0.75, epsilon = 1e-8);
}

#[test]
fn frequency_term_vanishes_without_population() {
    let canonical = Canonical::sis();
    let bound = canonical.model().bind(&sir(2.0, 0.5)).expect("valid params");

    assert!(bound.rates(&[0.0, 0.0]).iter().all(|r| *r == 0.0));
    assert!(bound.derivative_vec(&[0.0, 0.0]).iter().all(|d| *d == 0.0));
}

#[test]
fn undeclared_compartment_is_malformed() {
    let err = Model::builder()
        .compartments(["S", "I"])
        .parameters(["beta"])
        .flow(Flow::transfer("S", "I", param("beta") * comp("S") * comp("X")))
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        ModelError::Malformed {
            reason: Malformed::UnknownReference(Reference::Compartment(ref name)),
            ..
        } if name == "X"
    ));
}

#[test]
fn bind_rejects_incomplete_parameters() {
    let err = Canonical::sir()
        .model()
        .bind(&ParameterSet::from([("beta", 2.0)]))
        .unwrap_err();
    assert_eq!(
        err,
        ParameterError::Missing {
            name: "gamma".into()
        }
    );

    let err = derived::r0(&Canonical::sir(), &sir(2.0, 0.5).with("mu", 0.1)).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Parameter(ParameterError::Unknown { .. })
    ));
}

#[test]
fn divergence_keeps_partial_trajectory() {
    let model = Model::builder()
        .compartments(["A"])
        .parameters(["k"])
        .flow(Flow::birth("A", param("k") * comp("A") * comp("A")))
        .build()
        .expect("valid model");
    let bound = model
        .bind(&ParameterSet::from([("k", 1.0)]))
        .expect("valid params");

    let err = integrate::integrate_unobserved(
        &bound,
        &State::new(vec![1.0]),
        &TimeGrid::uniform(0.0, 2.0, 0.25),
        &integrate::Config::default(),
    )
    .unwrap_err();

    let partial = err.partial().expect("divergence carries samples");
    assert!(!partial.is_empty());
    assert!(partial.last().expect("samples").time < 1.0);
}

#[test]
fn closed_forms_agree_with_newton() {
    let cases = [
        (
            Canonical::sirs(),
            ParameterSet::from([("beta", 3.0), ("gamma", 1.0), ("mu", 0.02), ("omega", 0.1)]),
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
    ];

    for (canonical, params) in cases {
        let expected = equilibrium::equilibria(&canonical, &params).expect("valid params");
        let expected = expected.endemic_state().expect("endemic");

        // Start a few percent away from the closed form, keeping N = 1: the
        // population size is neutral when births balance deaths.
        let perturbed: Vec<f64> = expected
            .values()
            .iter()
            .enumerate()
            .map(|(i, v)| v * if i % 2 == 0 { 1.05 } else { 0.95 })
            .collect();
        let total: f64 = perturbed.iter().sum();
        let guess = State::new(perturbed.into_iter().map(|v| v / total).collect());
        let found = equilibrium::equilibria_numeric(
            canonical.model(),
            &params,
            &guess,
            &newton::Config::default(),
        )
        .expect("converges");

        assert_eq!(found.method, Method::Newton);
        for (a, b) in found.state.values().iter().zip(expected.values()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn final_size_matches_long_integration() {
    let canonical = Canonical::sir();
    let params = sir(2.5, 1.0);
    let initial = canonical
        .model()
        .state([("S", 0.999), ("I", 0.001)])
        .expect("valid state");

    let integrated = derived::final_size_by_integration(
        canonical.model(),
        &params,
        &initial,
        "S",
        &steady::Config::default(),
    )
    .expect("settles");
    let implicit = derived::final_size_implicit(2.5, 0.999, 0.0).expect("valid");

    assert_relative_eq!(integrated, implicit, epsilon = 1e-6);
}

#[test]
fn two_group_r0_is_dominant_eigenvalue_and_threshold() {
    let canonical = Canonical::risk_structured_sis(2).expect("two groups");
    let params = |scale: f64| {
        ParameterSet::from([
            ("beta_1_1", 4.0 * scale),
            ("beta_1_2", 0.5 * scale),
            ("beta_2_1", 0.5 * scale),
            ("beta_2_2", 0.5 * scale),
            ("gamma", 1.0),
            ("n_1", 0.2),
            ("n_2", 0.8),
        ])
    };

    // K = [[0.8, 0.1], [0.4, 0.4]]
    let (tr, det) = (1.2_f64, 0.8 * 0.4 - 0.1 * 0.4);
    let dominant = 0.5 * (tr + (tr * tr - 4.0 * det).sqrt());
    let r0 = ngm::waifw_r0(&canonical, &params(1.0)).expect("valid params");
    assert_relative_eq!(r0, dominant, epsilon = 1e-10);

    // Scaling every beta scales R0; cross the threshold in both directions.
    let sub = equilibrium::equilibria(&canonical, &params(0.9 / dominant)).expect("valid");
    assert!(matches!(sub.endemic, Endemic::Absent { .. }));

    let supra = equilibrium::equilibria(&canonical, &params(1.5 / dominant)).expect("valid");
    let state = supra.endemic_state().expect("endemic");
    assert!(state.values()[1] > 0.0 && state.values()[3] > 0.0);
}

#[test]
fn parallel_sweep_matches_sequential() {
    let base = ParameterSet::from([("beta", 2.0), ("gamma", 0.5), ("mu", 0.02), ("omega", 0.1)]);
    let probe = Quantities::new(
        Canonical::sirs(),
        [
            Quantity::R0,
            Quantity::EndemicPrevalence,
            Quantity::OscillationPeriod,
        ],
    );
    let scenario = Scenario::new(&base)
        .sweep(Sweep::linear("beta", 0.2, 4.0, 20).expect("valid range"))
        .sweep(Sweep::log10("omega", 1e-4, 1e2, 13).expect("valid range"));

    let sequential = scenario.run(&probe, Execution::Sequential).expect("runs");
    let parallel = scenario
        .run(&probe, Execution::Parallel { threads: Some(3) })
        .expect("runs");

    assert_eq!(parallel.len(), 20 * 13);
    for (a, b) in sequential.rows().iter().zip(parallel.rows()) {
        assert_eq!(a.inputs, b.inputs);
    }
    let (r0_a, r0_b) = (sequential.column("R0"), parallel.column("R0"));
    assert_eq!(r0_a, r0_b);

    // Below threshold the period is undefined and recorded as NaN.
    assert!(sequential.column("period")[0].is_nan());
    assert_eq!(sequential.failures(), 0);
}

#[test]
fn steady_state_probe_matches_closed_form() {
    let canonical = Canonical::sirs();
    let base = ParameterSet::from([("beta", 3.0), ("gamma", 1.0), ("mu", 0.02), ("omega", 0.1)]);
    let initial = canonical
        .model()
        .state([("S", 0.9), ("I", 0.01), ("R", 0.09)])
        .expect("valid state");
    let probe = SteadyState::new(canonical.model().clone(), initial);

    let table = Scenario::new(&base)
        .sweep(Sweep::values("omega", [0.05, 0.2, 1.0]))
        .run(&probe, Execution::Parallel { threads: None })
        .expect("runs");

    for row in table.rows() {
        let omega = row.input("omega").expect("swept");
        let params = base.clone().with("omega", omega);
        let prevalence = derived::derive(&canonical, &params, Quantity::EndemicPrevalence)
            .expect("valid")
            .value;

        let record = row.record().expect("probe succeeds");
        assert_relative_eq!(record.get("I").expect("I recorded"), prevalence, epsilon = 1e-7);
    }
}
