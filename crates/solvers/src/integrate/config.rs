use thiserror::Error;

/// Supported numerical integration methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    /// Classic fourth-order Runge–Kutta with relative-change step control.
    ///
    /// Each grid interval is subdivided so that no compartment changes by more
    /// than the configured fraction per substep. Suitable for the smooth,
    /// non-stiff right-hand sides of most compartmental models.
    Rk4,

    /// Adaptive Dormand–Prince 5(4) Runge–Kutta method.
    ///
    /// An explicit embedded method that adjusts its step to keep the local
    /// error within `abs_tol` and `rel_tol`. Efficient when fast epidemic
    /// dynamics sit on top of slow demographic turnover.
    Dopri5 { abs_tol: f64, rel_tol: f64 },

    /// Adaptive Dormand–Prince 8(5,3) Runge–Kutta method.
    ///
    /// A higher-order embedded method for long horizons or very tight
    /// tolerances.
    Dop853 { abs_tol: f64, rel_tol: f64 },
}

/// Configuration for the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    method: Method,
    max_relative_change: f64,
    relative_floor: f64,
    min_step: f64,
    divergence_bound: f64,
    clamp_tolerance: f64,
}

/// Errors that can occur when validating an integrator config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_relative_change must be in (0, 1]")]
    MaxRelativeChange,

    #[error("relative_floor must be finite and positive")]
    RelativeFloor,

    #[error("min_step must be finite and positive")]
    MinStep,

    #[error("divergence_bound must be positive")]
    DivergenceBound,

    #[error("clamp_tolerance must be finite and non-negative")]
    ClampTolerance,

    #[error("adaptive tolerances must be finite and positive")]
    Tolerance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: Method::Rk4,
            max_relative_change: 0.01,
            relative_floor: 1e-6,
            min_step: 1e-9,
            divergence_bound: 1e12,
            clamp_tolerance: 1e-9,
        }
    }
}

impl Config {
    /// Creates a config using the given method and default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if an adaptive method has a non-positive tolerance.
    pub fn new(method: Method) -> Result<Self, ConfigError> {
        Self::default().with_method(method)
    }

    /// Sets the integration method.
    ///
    /// # Errors
    ///
    /// Returns an error if an adaptive method has a non-positive tolerance.
    pub fn with_method(mut self, method: Method) -> Result<Self, ConfigError> {
        if let Method::Dopri5 { abs_tol, rel_tol } | Method::Dop853 { abs_tol, rel_tol } = method
        {
            if !(abs_tol.is_finite() && abs_tol > 0.0 && rel_tol.is_finite() && rel_tol > 0.0) {
                return Err(ConfigError::Tolerance);
            }
        }
        self.method = method;
        Ok(self)
    }

    /// Sets the largest allowed relative change of any compartment per RK4 substep.
    ///
    /// # Errors
    ///
    /// Returns an error unless `fraction` is in `(0, 1]`.
    pub fn with_max_relative_change(mut self, fraction: f64) -> Result<Self, ConfigError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::MaxRelativeChange);
        }
        self.max_relative_change = fraction;
        Ok(self)
    }

    /// Sets the scale below which compartment changes are measured against
    /// `relative_floor * N` instead of the compartment's own value.
    ///
    /// # Errors
    ///
    /// Returns an error unless `floor` is finite and positive.
    pub fn with_relative_floor(mut self, floor: f64) -> Result<Self, ConfigError> {
        if !(floor.is_finite() && floor > 0.0) {
            return Err(ConfigError::RelativeFloor);
        }
        self.relative_floor = floor;
        Ok(self)
    }

    /// Sets the smallest RK4 substep; steps this small are always accepted.
    ///
    /// # Errors
    ///
    /// Returns an error unless `step` is finite and positive.
    pub fn with_min_step(mut self, step: f64) -> Result<Self, ConfigError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ConfigError::MinStep);
        }
        self.min_step = step;
        Ok(self)
    }

    /// Sets the magnitude above which the state is considered to have diverged.
    ///
    /// # Errors
    ///
    /// Returns an error unless `bound` is positive.
    pub fn with_divergence_bound(mut self, bound: f64) -> Result<Self, ConfigError> {
        if !(bound > 0.0) {
            return Err(ConfigError::DivergenceBound);
        }
        self.divergence_bound = bound;
        Ok(self)
    }

    /// Sets how far below zero a value may fall before clamping is logged.
    ///
    /// Values below zero are always clamped; this only controls whether a
    /// warning is emitted.
    ///
    /// # Errors
    ///
    /// Returns an error unless `tolerance` is finite and non-negative.
    pub fn with_clamp_tolerance(mut self, tolerance: f64) -> Result<Self, ConfigError> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(ConfigError::ClampTolerance);
        }
        self.clamp_tolerance = tolerance;
        Ok(self)
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn max_relative_change(&self) -> f64 {
        self.max_relative_change
    }

    #[must_use]
    pub fn relative_floor(&self) -> f64 {
        self.relative_floor
    }

    #[must_use]
    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    #[must_use]
    pub fn divergence_bound(&self) -> f64 {
        self.divergence_bound
    }

    #[must_use]
    pub fn clamp_tolerance(&self) -> f64 {
        self.clamp_tolerance
    }
}
