use super::ScenarioError;

/// The values taken by one parameter across a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    parameter: String,
    values: Vec<f64>,
}

impl Sweep {
    /// Sweeps `parameter` over explicit values, in the order given.
    #[must_use]
    pub fn values(parameter: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            parameter: parameter.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Sweeps `parameter` over `count` evenly spaced values from `start` to
    /// `end` inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidRange`] if an endpoint is not finite or
    /// `count` is zero.
    pub fn linear(
        parameter: impl Into<String>,
        start: f64,
        end: f64,
        count: usize,
    ) -> Result<Self, ScenarioError> {
        let parameter = parameter.into();
        check_range(&parameter, start, end, count)?;
        let values = spaced(start, end, count);
        Ok(Self { parameter, values })
    }

    /// Sweeps `parameter` over `count` values evenly spaced in `log10` from
    /// `start` to `end` inclusive, e.g. a waning rate from `1e-4` to `1e2`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidRange`] if an endpoint is not finite
    /// and positive or `count` is zero.
    pub fn log10(
        parameter: impl Into<String>,
        start: f64,
        end: f64,
        count: usize,
    ) -> Result<Self, ScenarioError> {
        let parameter = parameter.into();
        check_range(&parameter, start, end, count)?;
        if start <= 0.0 || end <= 0.0 {
            return Err(ScenarioError::InvalidRange {
                name: parameter,
                reason: "log sweep endpoints must be positive",
            });
        }

        let mut values: Vec<f64> = spaced(start.log10(), end.log10(), count)
            .into_iter()
            .map(|exponent| 10f64.powf(exponent))
            .collect();
        // Pin the endpoints against powf rounding.
        values[0] = start;
        if let Some(last) = values.last_mut() {
            *last = if count == 1 { start } else { end };
        }
        Ok(Self { parameter, values })
    }

    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn check_range(parameter: &str, start: f64, end: f64, count: usize) -> Result<(), ScenarioError> {
    let reason = if !start.is_finite() || !end.is_finite() {
        "endpoints must be finite"
    } else if count == 0 {
        "count must be at least one"
    } else {
        return Ok(());
    };
    Err(ScenarioError::InvalidRange {
        name: parameter.to_string(),
        reason,
    })
}

fn spaced(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count)
        .map(|i| {
            if i == count - 1 {
                end
            } else {
                start + step * i as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn linear_includes_endpoints() {
        let sweep = Sweep::linear("beta", 1.0, 2.0, 5).expect("valid range");
        assert_eq!(sweep.points(), [1.0, 1.25, 1.5, 1.75, 2.0]);

        let single = Sweep::linear("beta", 3.0, 4.0, 1).expect("valid range");
        assert_eq!(single.points(), [3.0]);
    }

    #[test]
    fn log10_spans_decades() {
        let sweep = Sweep::log10("omega", 1e-4, 1e2, 7).expect("valid range");
        let points = sweep.points();

        assert_eq!(points.len(), 7);
        assert_eq!(points[0], 1e-4);
        assert_eq!(points[6], 1e2);
        assert_relative_eq!(points[3], 0.1, max_relative = 1e-12);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(matches!(
            Sweep::linear("beta", 0.0, f64::NAN, 3),
            Err(ScenarioError::InvalidRange { .. })
        ));
        assert!(matches!(
            Sweep::linear("beta", 0.0, 1.0, 0),
            Err(ScenarioError::InvalidRange { .. })
        ));
        assert!(matches!(
            Sweep::log10("omega", 0.0, 1.0, 3),
            Err(ScenarioError::InvalidRange { .. })
        ));
    }
}
