use ode_solvers::dop_shared::IntegrationError;

use super::Config;

/// Advances a state across one grid interval.
pub(super) trait Stepper {
    /// Advances `y` from `from` to `to` in place.
    ///
    /// Returns true if any value was clamped at zero along the way.
    fn advance(&mut self, y: &mut [f64], from: f64, to: f64) -> Result<bool, Interrupt>;

    /// Number of right-hand-side evaluations so far.
    fn evaluations(&self) -> usize;
}

/// Reasons a stepper stops before reaching the end of an interval.
#[derive(Debug)]
pub(super) enum Interrupt {
    Diverged { time: f64 },
    Adaptive(IntegrationError),
    MissedSample { time: f64 },
    StepUnderflow { time: f64, step: f64 },
}

/// Returns true if any value is non-finite or larger than the bound.
pub(super) fn diverged(y: &[f64], bound: f64) -> bool {
    y.iter().any(|v| !v.is_finite() || v.abs() > bound)
}

/// Clamps negative values to zero, returning true if any were clamped.
///
/// Undershoots deeper than the configured tolerance are logged.
pub(super) fn clamp(y: &mut [f64], time: f64, config: &Config) -> bool {
    let mut clamped = false;
    for (i, value) in y.iter_mut().enumerate() {
        if *value < 0.0 {
            if *value < -config.clamp_tolerance() {
                log::warn!("compartment {i} clamped from {value:e} to zero at t = {time}");
            }
            *value = 0.0;
            clamped = true;
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_check() {
        assert!(!diverged(&[1.0, 2.0], 10.0));
        assert!(diverged(&[1.0, 20.0], 10.0));
        assert!(diverged(&[f64::NAN, 0.0], 10.0));
        assert!(diverged(&[f64::INFINITY], f64::INFINITY));
    }

    #[test]
    fn clamps_small_and_large_undershoots() {
        let config = Config::default();
        let mut y = [0.5, -1e-15, -0.1];

        assert!(clamp(&mut y, 0.0, &config));
        assert_eq!(y, [0.5, 0.0, 0.0]);
        assert!(!clamp(&mut y, 0.0, &config));
    }
}
