//! Damped Newton iteration for systems of equations.
//!
//! Each iteration builds a forward-difference Jacobian, solves for the full
//! Newton step with an LU decomposition and halves the step until the
//! residual norm decreases. Iterates can be projected onto non-negative
//! values, which keeps compartment solutions physical.

mod config;
mod error;
mod event;
mod solution;

pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use solution::{Solution, Status};

use epiflow_core::{Observer, State, StepIntegrable};
use nalgebra::DVector;

use crate::jacobian;

/// Control actions supported by the Newton solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop and return the current iterate.
    StopEarly,
}

/// Solves `f(x) = 0` starting from `x0`.
///
/// `f` writes the residual of its first argument into its second; both have
/// the length of `x0`.
///
/// # Errors
///
/// Returns an error if the initial guess or a residual is non-finite, or if
/// the Jacobian is singular.
pub fn solve<F, Obs>(
    mut f: F,
    x0: &[f64],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    F: FnMut(&[f64], &mut [f64]),
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFiniteGuess);
    }

    let n = x0.len();
    let mut x = State::new(x0.to_vec());
    if config.nonnegative() {
        x.clamp_negative();
    }

    let mut residual = vec![0.0; n];
    f(x.values(), &mut residual);
    let mut evaluations = 1;
    let mut norm = finite_norm(&residual, 0)?;

    let finish = |status, x, norm, iters, evaluations| {
        Ok(Solution {
            status,
            x,
            residual_norm: norm,
            iters,
            evaluations,
        })
    };

    if norm <= config.residual_tol() {
        return finish(Status::Converged, x, norm, 0, evaluations);
    }

    let mut trial_residual = vec![0.0; n];

    for iter in 1..=config.max_iters() {
        let jac = jacobian::forward_difference(&mut f, x.values(), &residual, config.fd_step());
        evaluations += n;

        let rhs = -DVector::from_column_slice(&residual);
        let Some(step) = jac.lu().solve(&rhs) else {
            return Err(Error::SingularJacobian { iter });
        };

        let mut damping = 1.0;
        let accepted = loop {
            let mut trial = x.step(step.as_slice(), damping);
            if config.nonnegative() {
                trial.clamp_negative();
            }
            f(trial.values(), &mut trial_residual);
            evaluations += 1;

            let trial_norm = norm_inf(&trial_residual);
            if trial_norm.is_finite() && trial_norm < norm {
                break Some((trial, trial_norm));
            }

            damping *= 0.5;
            if damping < config.min_damping() {
                break None;
            }
        };

        let Some((trial, trial_norm)) = accepted else {
            log::debug!("newton stalled at iteration {iter} with residual {norm:e}");
            return finish(Status::Stalled, x, norm, iter, evaluations);
        };

        let moved = trial
            .values()
            .iter()
            .zip(x.values())
            .fold(0.0_f64, |max, (a, b)| max.max((a - b).abs()));

        x = trial;
        norm = trial_norm;
        std::mem::swap(&mut residual, &mut trial_residual);

        let event = Event {
            iter,
            x: x.values(),
            residual_norm: norm,
            damping,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return finish(Status::StoppedByObserver, x, norm, iter, evaluations);
        }

        if norm <= config.residual_tol() {
            return finish(Status::Converged, x, norm, iter, evaluations);
        }
        if moved <= config.step_tol() * x.max_abs().max(1.0) {
            return finish(Status::Stalled, x, norm, iter, evaluations);
        }
    }

    finish(Status::MaxIters, x, norm, config.max_iters(), evaluations)
}

/// Runs Newton without observation.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved<F>(f: F, x0: &[f64], config: &Config) -> Result<Solution, Error>
where
    F: FnMut(&[f64], &mut [f64]),
{
    solve(f, x0, config, ())
}

fn norm_inf(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |max, v| {
        if v.is_nan() { f64::NAN } else { max.max(v.abs()) }
    })
}

fn finite_norm(values: &[f64], iter: usize) -> Result<f64, Error> {
    let norm = norm_inf(values);
    if norm.is_finite() {
        Ok(norm)
    } else {
        Err(Error::NonFiniteResidual { iter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn solves_nonlinear_system() {
        // x^2 + y^2 = 4, x = y
        let f = |x: &[f64], r: &mut [f64]| {
            r[0] = x[0] * x[0] + x[1] * x[1] - 4.0;
            r[1] = x[0] - x[1];
        };

        let solution = solve_unobserved(f, &[1.0, 0.5], &Config::default()).expect("solves");

        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.x.values()[0], 2.0_f64.sqrt(), epsilon = 1e-10);
        assert_relative_eq!(solution.x.values()[1], 2.0_f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn damping_recovers_from_overshoot() {
        // The full step from x = 1 lands at 3; half of it hits the root at 2.
        let f = |x: &[f64], r: &mut [f64]| r[0] = (x[0] + 1.0) * (x[0] - 2.0);

        let mut dampings = Vec::new();
        let solution = solve(f, &[1.0], &Config::default(), |event: &Event<'_>| {
            dampings.push(event.damping);
            None
        })
        .expect("solves");

        assert!(solution.is_converged());
        assert_relative_eq!(solution.x.values()[0], 2.0, epsilon = 1e-10);
        assert_eq!(dampings.first(), Some(&0.5));
    }

    #[test]
    fn projection_keeps_iterates_nonnegative() {
        let f = |x: &[f64], r: &mut [f64]| r[0] = x[0] * x[0] - 4.0;

        let mut iterates = Vec::new();
        let solution = solve(f, &[0.1], &Config::default(), |event: &Event<'_>| {
            iterates.push(event.x[0]);
            None
        })
        .expect("solves");

        assert!(solution.is_converged());
        assert_relative_eq!(solution.x.values()[0], 2.0, epsilon = 1e-10);
        assert!(iterates.iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn converged_guess_takes_no_iterations() {
        let solution = solve_unobserved(
            |x: &[f64], r: &mut [f64]| r[0] = x[0] - 3.0,
            &[3.0],
            &Config::default(),
        )
        .expect("solves");

        assert_eq!(solution.iters, 0);
        assert_eq!(solution.evaluations, 1);
    }

    #[test]
    fn singular_jacobian_is_an_error() {
        // The second residual does not depend on x.
        let f = |x: &[f64], r: &mut [f64]| {
            r[0] = x[0] + x[1];
            r[1] = 1.0;
        };

        let result = solve_unobserved(f, &[1.0, 1.0], &Config::default());
        assert_eq!(result, Err(Error::SingularJacobian { iter: 1 }));
    }

    #[test]
    fn observer_sees_decreasing_residuals() {
        let f = |x: &[f64], r: &mut [f64]| r[0] = x[0].powi(3) - 8.0;

        let mut norms = Vec::new();
        let solution = solve(f, &[5.0], &Config::default(), |event: &Event<'_>| {
            norms.push(event.residual_norm);
            None
        })
        .expect("solves");

        assert!(solution.is_converged());
        assert!(norms.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn zero_iteration_budget_reports_max_iters() {
        let config = Config::new(0, 1e-12, 1e-14).expect("valid config");
        let solution = solve_unobserved(|x: &[f64], r: &mut [f64]| r[0] = x[0] - 3.0, &[1.0], &config)
            .expect("a validated config is always accepted");

        assert_eq!(solution.status, Status::MaxIters);
        assert_eq!(solution.iters, 0);
        assert_eq!(solution.x.values(), [1.0]);
    }

    #[test]
    fn rejects_non_finite_guess() {
        let result = solve_unobserved(
            |x: &[f64], r: &mut [f64]| r[0] = x[0],
            &[f64::NAN],
            &Config::default(),
        );
        assert_eq!(result, Err(Error::NonFiniteGuess));
    }
}
