use thiserror::Error;

/// Configuration for the damped Newton solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    residual_tol: f64,
    step_tol: f64,
    fd_step: f64,
    min_damping: f64,
    nonnegative: bool,
}

/// Errors that can occur when validating a Newton config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("residual_tol must be finite and non-negative")]
    ResidualTol,

    #[error("step_tol must be finite and non-negative")]
    StepTol,

    #[error("fd_step must be finite and positive")]
    FdStep,

    #[error("min_damping must be in (0, 1]")]
    MinDamping,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 100,
            residual_tol: 1e-12,
            step_tol: 1e-14,
            fd_step: 1e-7,
            min_damping: 1.0 / 1024.0,
            nonnegative: true,
        }
    }
}

impl Config {
    /// Creates a config with validated tolerances and default damping.
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance is negative or non-finite.
    pub fn new(max_iters: usize, residual_tol: f64, step_tol: f64) -> Result<Self, ConfigError> {
        if !residual_tol.is_finite() || residual_tol < 0.0 {
            return Err(ConfigError::ResidualTol);
        }
        if !step_tol.is_finite() || step_tol < 0.0 {
            return Err(ConfigError::StepTol);
        }
        Ok(Self {
            max_iters,
            residual_tol,
            step_tol,
            ..Self::default()
        })
    }

    /// Sets the relative finite-difference step for the Jacobian.
    ///
    /// # Errors
    ///
    /// Returns an error unless `step` is finite and positive.
    pub fn with_fd_step(mut self, step: f64) -> Result<Self, ConfigError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::FdStep);
        }
        self.fd_step = step;
        Ok(self)
    }

    /// Sets the smallest damping factor tried before the solver stalls.
    ///
    /// # Errors
    ///
    /// Returns an error unless `damping` is in `(0, 1]`.
    pub fn with_min_damping(mut self, damping: f64) -> Result<Self, ConfigError> {
        if !(damping > 0.0 && damping <= 1.0) {
            return Err(ConfigError::MinDamping);
        }
        self.min_damping = damping;
        Ok(self)
    }

    /// Allows iterates to leave the non-negative orthant.
    #[must_use]
    pub fn allow_negative(mut self) -> Self {
        self.nonnegative = false;
        self
    }

    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    #[must_use]
    pub fn residual_tol(&self) -> f64 {
        self.residual_tol
    }

    #[must_use]
    pub fn step_tol(&self) -> f64 {
        self.step_tol
    }

    #[must_use]
    pub fn fd_step(&self) -> f64 {
        self.fd_step
    }

    #[must_use]
    pub fn min_damping(&self) -> f64 {
        self.min_damping
    }

    /// Returns true if iterates are projected onto non-negative values.
    #[must_use]
    pub fn nonnegative(&self) -> bool {
        self.nonnegative
    }
}
