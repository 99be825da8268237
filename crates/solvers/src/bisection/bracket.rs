use thiserror::Error;

/// Errors that can occur when validating a bracket.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BracketError {
    #[error("non-finite endpoint(s)")]
    NonFinite,

    #[error("zero width")]
    ZeroWidth,

    #[error("no sign change: f({left}) = {left_residual}, f({right}) = {right_residual}")]
    NoSignChange {
        left: f64,
        right: f64,
        left_residual: f64,
        right_residual: f64,
    },
}

/// The sign of a residual for bracket logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Residual is positive (or zero).
    Positive,
    /// Residual is negative.
    Negative,
}

impl Sign {
    /// Returns the sign of a residual value.
    #[must_use]
    pub fn of(value: f64) -> Self {
        if value >= 0.0 {
            Sign::Positive
        } else {
            Sign::Negative
        }
    }
}

/// Current bracket bounds and the residual sign at the left bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    left: f64,
    right: f64,
    left_sign: Sign,
}

impl Bracket {
    /// Orders and validates endpoints.
    pub(super) fn ordered(bracket: [f64; 2]) -> Result<[f64; 2], BracketError> {
        let [a, b] = bracket;
        if !a.is_finite() || !b.is_finite() {
            return Err(BracketError::NonFinite);
        }

        #[allow(clippy::float_cmp)]
        if a == b {
            return Err(BracketError::ZeroWidth);
        }

        Ok(if a < b { [a, b] } else { [b, a] })
    }

    /// Creates a bracket from ordered endpoints and their residuals.
    pub(super) fn new(
        [left, right]: [f64; 2],
        left_residual: f64,
        right_residual: f64,
    ) -> Result<Self, BracketError> {
        let left_sign = Sign::of(left_residual);
        if left_sign == Sign::of(right_residual) {
            return Err(BracketError::NoSignChange {
                left,
                right,
                left_residual,
                right_residual,
            });
        }
        Ok(Self {
            left,
            right,
            left_sign,
        })
    }

    #[must_use]
    pub fn as_array(&self) -> [f64; 2] {
        [self.left, self.right]
    }

    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.left + self.right)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Returns true if the bracket width satisfies the x tolerances.
    #[must_use]
    pub fn is_x_converged(&self, x_abs_tol: f64, x_rel_tol: f64) -> bool {
        self.width() <= x_abs_tol + x_rel_tol * self.midpoint().abs()
    }

    /// Replaces the endpoint whose residual has the same sign as `residual`.
    pub(super) fn shrink(&mut self, x: f64, residual: f64) {
        if Sign::of(residual) == self.left_sign {
            self.left = x;
        } else {
            self.right = x;
        }
    }
}
