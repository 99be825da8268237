use thiserror::Error;

/// The times at which a trajectory is sampled.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeGrid {
    /// Evenly spaced samples from `start` to `end` inclusive.
    ///
    /// If `end - start` is not a multiple of `step`, the final sample is
    /// placed exactly at `end`.
    Uniform { start: f64, end: f64, step: f64 },

    /// Explicit, strictly increasing sample times.
    Points(Vec<f64>),
}

/// Errors that can occur when expanding a [`TimeGrid`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GridError {
    #[error("grid values must be finite")]
    NonFinite,

    #[error("step must be positive, got {0}")]
    NonPositiveStep(f64),

    #[error("end ({end}) is before start ({start})")]
    Reversed { start: f64, end: f64 },

    #[error("sample times must be strictly increasing (at index {0})")]
    NotIncreasing(usize),

    #[error("grid has no sample times")]
    Empty,
}

impl TimeGrid {
    /// Creates a uniform grid.
    #[must_use]
    pub fn uniform(start: f64, end: f64, step: f64) -> Self {
        Self::Uniform { start, end, step }
    }

    /// Expands the grid into validated sample times.
    ///
    /// # Errors
    ///
    /// Returns a [`GridError`] if values are non-finite, the step is not
    /// positive, or the times are not increasing.
    pub fn points(&self) -> Result<Vec<f64>, GridError> {
        match self {
            TimeGrid::Uniform { start, end, step } => {
                let (start, end, step) = (*start, *end, *step);
                if !(start.is_finite() && end.is_finite() && step.is_finite()) {
                    return Err(GridError::NonFinite);
                }
                if step <= 0.0 {
                    return Err(GridError::NonPositiveStep(step));
                }
                if end < start {
                    return Err(GridError::Reversed { start, end });
                }

                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let intervals = ((end - start) / step).floor() as usize;

                #[allow(clippy::cast_precision_loss)]
                let mut points: Vec<f64> =
                    (0..=intervals).map(|i| start + step * i as f64).collect();

                let last = points.last().copied().unwrap_or(start);
                if end - last > step * 1e-9 {
                    points.push(end);
                } else if let Some(last) = points.last_mut() {
                    *last = end;
                }
                Ok(points)
            }
            TimeGrid::Points(points) => {
                if points.is_empty() {
                    return Err(GridError::Empty);
                }
                if points.iter().any(|t| !t.is_finite()) {
                    return Err(GridError::NonFinite);
                }
                if let Some(i) = points.windows(2).position(|w| w[1] <= w[0]) {
                    return Err(GridError::NotIncreasing(i + 1));
                }
                Ok(points.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn uniform_includes_both_ends() {
        let points = TimeGrid::uniform(0.0, 1.0, 0.25).points().unwrap();
        assert_eq!(points, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn uniform_appends_partial_interval() {
        let points = TimeGrid::uniform(0.0, 1.0, 0.4).points().unwrap();
        assert_eq!(points.len(), 4);
        assert_relative_eq!(points[2], 0.8);
        assert_relative_eq!(points[3], 1.0);
    }

    #[test]
    fn zero_length_grid_is_single_point() {
        let points = TimeGrid::uniform(5.0, 5.0, 1.0).points().unwrap();
        assert_eq!(points, vec![5.0]);
    }

    #[test]
    fn rejects_bad_grids() {
        assert_eq!(
            TimeGrid::uniform(0.0, 1.0, 0.0).points(),
            Err(GridError::NonPositiveStep(0.0))
        );
        assert_eq!(
            TimeGrid::uniform(1.0, 0.0, 0.1).points(),
            Err(GridError::Reversed {
                start: 1.0,
                end: 0.0
            })
        );
        assert_eq!(
            TimeGrid::Points(vec![0.0, 2.0, 1.0]).points(),
            Err(GridError::NotIncreasing(2))
        );
        assert_eq!(TimeGrid::Points(vec![]).points(), Err(GridError::Empty));
    }
}
