use crate::state::State;

/// One sample of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    /// Compartment values in model order.
    pub values: Vec<f64>,
    /// True if any value was clamped to zero to produce this sample.
    pub clamped: bool,
}

impl Sample {
    /// Returns the total population at this sample.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// An ordered sequence of samples produced by integrating a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    compartments: Vec<String>,
    samples: Vec<Sample>,
}

impl Trajectory {
    /// Creates an empty trajectory for the given compartment names.
    #[must_use]
    pub fn new(compartments: Vec<String>) -> Self {
        Self {
            compartments,
            samples: Vec::new(),
        }
    }

    /// Creates an empty trajectory with room for `capacity` samples.
    #[must_use]
    pub fn with_capacity(compartments: Vec<String>, capacity: usize) -> Self {
        Self {
            compartments,
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Appends a sample.
    ///
    /// Integrators call this while producing a trajectory; samples must be
    /// appended in increasing time order.
    pub fn push(&mut self, sample: Sample) {
        debug_assert!(
            self.samples.last().is_none_or(|last| last.time <= sample.time),
            "samples must be appended in time order"
        );
        self.samples.push(sample);
    }

    #[must_use]
    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Returns the sample times.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|sample| sample.time)
    }

    /// Returns the values of one compartment over time.
    #[must_use]
    pub fn series(&self, compartment: &str) -> Option<Vec<f64>> {
        let index = self.compartments.iter().position(|c| c == compartment)?;
        Some(self.samples.iter().map(|s| s.values[index]).collect())
    }

    /// Returns the total population over time.
    #[must_use]
    pub fn totals(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::total).collect()
    }

    /// Returns true if any sample was clamped at the zero boundary.
    #[must_use]
    pub fn any_clamped(&self) -> bool {
        self.samples.iter().any(|s| s.clamped)
    }

    /// Returns the last sample as a [`State`].
    #[must_use]
    pub fn final_state(&self) -> Option<State> {
        self.last().map(|s| State::new(s.values.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory() -> Trajectory {
        let mut trajectory = Trajectory::new(vec!["S".into(), "I".into()]);
        trajectory.push(Sample {
            time: 0.0,
            values: vec![0.9, 0.1],
            clamped: false,
        });
        trajectory.push(Sample {
            time: 1.0,
            values: vec![0.8, 0.2],
            clamped: true,
        });
        trajectory
    }

    #[test]
    fn series_by_name() {
        let trajectory = trajectory();

        assert_eq!(trajectory.series("I"), Some(vec![0.1, 0.2]));
        assert_eq!(trajectory.series("R"), None);
        assert_eq!(trajectory.times().collect::<Vec<_>>(), vec![0.0, 1.0]);
    }

    #[test]
    fn summaries() {
        let trajectory = trajectory();

        assert!(trajectory.any_clamped());
        assert_eq!(trajectory.len(), 2);
        assert_eq!(
            trajectory.final_state().map(State::into_values),
            Some(vec![0.8, 0.2])
        );
    }
}
