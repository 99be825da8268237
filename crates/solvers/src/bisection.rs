//! Bisection on a bracketed scalar function.
//!
//! Used for implicit relations such as the final-size equation, where the
//! root is known to lie inside an interval and robustness matters more than
//! speed.

mod bracket;
mod config;
mod error;
mod solution;

pub use bracket::{Bracket, BracketError, Sign};
pub use config::{Config, ConfigError};
pub use error::Error;
pub use solution::{Solution, Status};

use epiflow_core::Observer;

/// Control actions supported by the bisection solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solver early and return the best point found so far.
    StopEarly,
}

/// Iteration event emitted by the bisection solver.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Iteration counter (1-based).
    pub iter: usize,
    /// Search bracket before this iteration's update.
    pub bracket: &'a Bracket,
    /// The midpoint that was evaluated.
    pub x: f64,
    /// Residual at the midpoint.
    pub residual: f64,
}

/// Finds a root of `f` inside `bracket` by bisection.
///
/// The endpoints may be given in either order but must be finite, distinct
/// and have residuals of opposite sign.
///
/// # Errors
///
/// Returns an error if the config or bracket is invalid, or if `f` returns a
/// non-finite value.
pub fn solve<F, Obs>(
    mut f: F,
    bracket: [f64; 2],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    F: FnMut(f64) -> f64,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    config.validate()?;
    let [left, right] = Bracket::ordered(bracket)?;

    let left_residual = finite(left, f(left))?;
    let right_residual = finite(right, f(right))?;

    let mut best = if left_residual.abs() <= right_residual.abs() {
        (left, left_residual)
    } else {
        (right, right_residual)
    };
    if best.1.abs() <= config.residual_tol {
        return Ok(finish(best, Status::Converged, 0));
    }

    let mut bracket = Bracket::new([left, right], left_residual, right_residual)?;

    for iter in 1..=config.max_iters {
        let x = bracket.midpoint();
        let residual = finite(x, f(x))?;

        if residual.abs() < best.1.abs() {
            best = (x, residual);
        }

        let event = Event {
            iter,
            bracket: &bracket,
            x,
            residual,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(finish(best, Status::StoppedByObserver, iter));
        }

        bracket.shrink(x, residual);

        if residual.abs() <= config.residual_tol
            || bracket.is_x_converged(config.x_abs_tol, config.x_rel_tol)
        {
            return Ok(finish((x, residual), Status::Converged, iter));
        }
    }

    Ok(finish(best, Status::MaxIters, config.max_iters))
}

/// Runs bisection without observation.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved<F>(f: F, bracket: [f64; 2], config: &Config) -> Result<Solution, Error>
where
    F: FnMut(f64) -> f64,
{
    solve(f, bracket, config, ())
}

fn finite(x: f64, residual: f64) -> Result<f64, Error> {
    if residual.is_finite() {
        Ok(residual)
    } else {
        Err(Error::NonFiniteResidual { x, residual })
    }
}

fn finish((x, residual): (f64, f64), status: Status, iters: usize) -> Solution {
    Solution {
        status,
        x,
        residual,
        iters,
    }
}
