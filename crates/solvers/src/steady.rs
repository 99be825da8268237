//! Steady states by long-horizon integration.
//!
//! [`relax`] integrates a bound model until the largest derivative component
//! falls below a tolerance. It is slower than Newton iteration but converges
//! from any initial condition in the basin of a stable equilibrium, so it
//! serves as the fallback when Newton fails.

use epiflow_core::{Bound, State};
use thiserror::Error;

use crate::integrate::{self, Action, Event, TimeGrid};

/// Configuration for steady-state relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    check_interval: f64,
    max_time: f64,
    derivative_tol: f64,
    integrator: integrate::Config,
}

/// Errors that can occur when validating a relaxation config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("check_interval must be finite and positive")]
    CheckInterval,

    #[error("max_time must be finite and at least check_interval")]
    MaxTime,

    #[error("derivative_tol must be finite and positive")]
    DerivativeTol,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: 10.0,
            max_time: 1e6,
            derivative_tol: 1e-10,
            integrator: integrate::Config::default(),
        }
    }
}

impl Config {
    /// Creates a validated config using the default integrator.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is non-finite or not positive, or if
    /// `max_time` is shorter than `check_interval`.
    pub fn new(check_interval: f64, max_time: f64, derivative_tol: f64) -> Result<Self, ConfigError> {
        if !check_interval.is_finite() || check_interval <= 0.0 {
            return Err(ConfigError::CheckInterval);
        }
        if !max_time.is_finite() || max_time < check_interval {
            return Err(ConfigError::MaxTime);
        }
        if !derivative_tol.is_finite() || derivative_tol <= 0.0 {
            return Err(ConfigError::DerivativeTol);
        }
        Ok(Self {
            check_interval,
            max_time,
            derivative_tol,
            integrator: integrate::Config::default(),
        })
    }

    /// Sets the integrator used for each chunk.
    #[must_use]
    pub fn with_integrator(mut self, integrator: integrate::Config) -> Self {
        self.integrator = integrator;
        self
    }

    #[must_use]
    pub fn check_interval(&self) -> f64 {
        self.check_interval
    }

    #[must_use]
    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    #[must_use]
    pub fn derivative_tol(&self) -> f64 {
        self.derivative_tol
    }

    #[must_use]
    pub fn integrator(&self) -> &integrate::Config {
        &self.integrator
    }
}

/// Indicates how relaxation terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The derivative norm fell below the tolerance.
    Converged,
    /// Reached `max_time` first.
    MaxTime,
}

/// The result of a relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relaxed {
    pub status: Status,

    /// The final state.
    pub state: State,

    /// Elapsed model time.
    pub time: f64,

    /// Largest absolute derivative component at `state`.
    pub derivative_norm: f64,

    /// True if any chunk clamped a value at zero.
    pub clamped: bool,
}

/// Integrates until the model stops changing.
///
/// The derivative is checked every `check_interval` units of model time.
///
/// # Errors
///
/// Returns an [`integrate::Error`] if the state does not match the model or
/// integration diverges.
pub fn relax(
    bound: &Bound<'_>,
    initial: &State,
    config: &Config,
) -> Result<Relaxed, integrate::Error> {
    let tol = config.derivative_tol;
    let observer = |event: &Event<'_>| (event.derivative_norm() < tol).then_some(Action::StopEarly);

    let solution = integrate::integrate(
        bound,
        initial,
        &TimeGrid::uniform(0.0, config.max_time, config.check_interval),
        &config.integrator,
        observer,
    )?;

    let trajectory = solution.trajectory;
    let (time, state) = match trajectory.last() {
        Some(sample) => (sample.time, State::new(sample.values.clone())),
        None => (0.0, initial.clone()),
    };
    let derivative_norm = norm(&bound.derivative_vec(state.values()));

    let status = match solution.status {
        integrate::Status::StoppedByObserver => {
            log::debug!("relaxed to steady state at t = {time}");
            Status::Converged
        }
        integrate::Status::Complete => {
            log::debug!("relaxation reached t = {time} with derivative norm {derivative_norm:e}");
            Status::MaxTime
        }
    };

    Ok(Relaxed {
        status,
        state,
        time,
        derivative_norm,
        clamped: trajectory.any_clamped(),
    })
}

fn norm(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |max, v| max.max(v.abs()))
}
