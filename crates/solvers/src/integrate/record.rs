use epiflow_core::{Bound, Observer, Sample, Trajectory};

use super::{Action, Event};

/// Appends samples to a trajectory and reports each one to the observer.
pub(super) struct Recorder<'a, 'm, Obs> {
    bound: &'a Bound<'m>,
    trajectory: Trajectory,
    derivative: Vec<f64>,
    observer: Obs,
}

impl<'a, 'm, Obs> Recorder<'a, 'm, Obs>
where
    Obs: for<'e> Observer<Event<'e>, Action>,
{
    pub(super) fn new(bound: &'a Bound<'m>, capacity: usize, observer: Obs) -> Self {
        let model = bound.model();
        Self {
            bound,
            trajectory: Trajectory::with_capacity(model.compartments().to_vec(), capacity),
            derivative: vec![0.0; model.compartment_count()],
            observer,
        }
    }

    /// Records a sample and returns the observer's action, if any.
    pub(super) fn record(&mut self, time: f64, values: &[f64], clamped: bool) -> Option<Action> {
        self.bound.derivative(values, &mut self.derivative);
        self.trajectory.push(Sample {
            time,
            values: values.to_vec(),
            clamped,
        });

        let step = self.trajectory.len() - 1;
        let sample = self.trajectory.last()?;
        let event = Event {
            step,
            sample,
            derivative: &self.derivative,
        };
        self.observer.observe(&event)
    }

    pub(super) fn into_trajectory(self) -> Trajectory {
        self.trajectory
    }
}
