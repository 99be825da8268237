//! Numerical integration of bound models over a time grid.
//!
//! The default method is classic fourth-order Runge–Kutta with substeps
//! sized so that no compartment changes by more than a configured fraction
//! (1% by default) per substep. Adaptive Dormand–Prince methods are available
//! through [`Method`] for models whose time scales are widely separated.
//!
//! Every sample is checked against two guards:
//!
//! - values that dip below zero are clamped and the sample is flagged
//!   [`clamped`](epiflow_core::Sample::clamped)
//! - non-finite values or magnitudes above the divergence bound stop the run
//!   with [`Error::Divergence`], which carries the partial trajectory
//!
//! # Example
//!
//! ```
//! use epiflow_core::{Flow, Model, ParameterSet, expr::{comp, param}};
//! use epiflow_solvers::integrate::{self, Config, TimeGrid};
//!
//! let model = Model::builder()
//!     .compartments(["S", "I", "R"])
//!     .parameters(["beta", "gamma"])
//!     .flow(Flow::transfer("S", "I", param("beta") * comp("S") * comp("I")))
//!     .flow(Flow::transfer("I", "R", param("gamma") * comp("I")))
//!     .build()?;
//! let params = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
//! let bound = model.bind(&params)?;
//! let initial = model.state([("S", 0.99), ("I", 0.01)])?;
//!
//! let solution = integrate::integrate_unobserved(
//!     &bound,
//!     &initial,
//!     &TimeGrid::uniform(0.0, 50.0, 1.0),
//!     &Config::default(),
//! )?;
//!
//! assert_eq!(solution.trajectory.len(), 51);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod action;
mod adaptive;
mod config;
mod error;
mod event;
mod grid;
mod record;
mod rk4;
mod solution;
mod stepper;

pub use action::Action;
pub use config::{Config, ConfigError, Method};
pub use error::Error;
pub use event::Event;
pub use grid::{GridError, TimeGrid};
pub use solution::{Solution, Status};

use epiflow_core::{Bound, Observer, State};

use adaptive::{Adaptive, Pair};
use record::Recorder;
use rk4::Rk4;
use stepper::{Interrupt, Stepper};

/// Integrates a bound model from an initial state across a time grid.
///
/// # Algorithm
///
/// 1. Expand and validate the grid.
/// 2. Record the initial state (clamping any negative zeros) as sample 0.
/// 3. For each following grid point:
///    - Advance the state with the configured method.
///    - Record the sample, flagged if any substep clamped a value.
///    - Emit an [`Event`]; stop if the observer returns [`Action::StopEarly`].
///
/// # Errors
///
/// Returns an error if the grid is invalid, the initial state does not match
/// the model, or the adaptive stepper fails. Divergence is reported as
/// [`Error::Divergence`] with every sample recorded before it.
pub fn integrate<Obs>(
    bound: &Bound<'_>,
    initial: &State,
    grid: &TimeGrid,
    config: &Config,
    observer: Obs,
) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let expected = bound.model().compartment_count();
    if initial.len() != expected {
        return Err(Error::StateLength {
            expected,
            actual: initial.len(),
        });
    }
    let points = grid.points()?;

    log::debug!(
        "integrating `{}` over [{}, {}] with {} samples using {:?}",
        bound.model().name().unwrap_or("model"),
        points[0],
        points[points.len() - 1],
        points.len(),
        config.method(),
    );

    match config.method() {
        Method::Rk4 => drive(
            Rk4::new(bound, config),
            bound,
            initial,
            &points,
            config,
            observer,
        ),
        Method::Dopri5 { abs_tol, rel_tol } => drive(
            Adaptive::new(bound, config, Pair::Dopri5, abs_tol, rel_tol),
            bound,
            initial,
            &points,
            config,
            observer,
        ),
        Method::Dop853 { abs_tol, rel_tol } => drive(
            Adaptive::new(bound, config, Pair::Dop853, abs_tol, rel_tol),
            bound,
            initial,
            &points,
            config,
            observer,
        ),
    }
}

/// Integrates without observation.
///
/// This is a convenience wrapper around [`integrate`] that discards events.
///
/// # Errors
///
/// See [`integrate`].
pub fn integrate_unobserved(
    bound: &Bound<'_>,
    initial: &State,
    grid: &TimeGrid,
    config: &Config,
) -> Result<Solution, Error> {
    integrate(bound, initial, grid, config, ())
}

fn drive<S, Obs>(
    mut stepper: S,
    bound: &Bound<'_>,
    initial: &State,
    points: &[f64],
    config: &Config,
    observer: Obs,
) -> Result<Solution, Error>
where
    S: Stepper,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let mut recorder = Recorder::new(bound, points.len(), observer);
    let mut y = initial.values().to_vec();

    let clamped = stepper::clamp(&mut y, points[0], config);
    if stepper::diverged(&y, config.divergence_bound()) {
        return Err(Error::divergence(points[0], recorder.into_trajectory()));
    }
    if let Some(Action::StopEarly) = recorder.record(points[0], &y, clamped) {
        return Ok(Solution {
            status: Status::StoppedByObserver,
            trajectory: recorder.into_trajectory(),
            evaluations: stepper.evaluations(),
        });
    }

    for window in points.windows(2) {
        let (from, to) = (window[0], window[1]);

        let clamped = match stepper.advance(&mut y, from, to) {
            Ok(clamped) => clamped,
            Err(Interrupt::Diverged { time }) => {
                log::warn!("integration diverged at t = {time}");
                return Err(Error::divergence(time, recorder.into_trajectory()));
            }
            Err(Interrupt::Adaptive(error)) => return Err(Error::Adaptive(error)),
            Err(Interrupt::MissedSample { time }) => {
                return Err(Error::MissedSample { time });
            }
            Err(Interrupt::StepUnderflow { time, step }) => {
                return Err(Error::StepUnderflow { time, step });
            }
        };

        if let Some(Action::StopEarly) = recorder.record(to, &y, clamped) {
            log::debug!("integration stopped by observer at t = {to}");
            return Ok(Solution {
                status: Status::StoppedByObserver,
                trajectory: recorder.into_trajectory(),
                evaluations: stepper.evaluations(),
            });
        }
    }

    Ok(Solution {
        status: Status::Complete,
        trajectory: recorder.into_trajectory(),
        evaluations: stepper.evaluations(),
    })
}
