use std::cell::Cell;

use epiflow_core::Bound;
use nalgebra::DVector;
use ode_solvers::{Dop853, Dopri5, System};

use super::{
    Config,
    stepper::{self, Interrupt, Stepper},
};

/// Which Dormand–Prince pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Pair {
    Dopri5,
    Dop853,
}

/// Adaptive Dormand–Prince integration delegated to `ode_solvers`.
///
/// Each grid interval is solved as its own initial value problem in local
/// time `0..span`; models are autonomous, so shifting time is exact.
pub(super) struct Adaptive<'a, 'm> {
    bound: &'a Bound<'m>,
    config: &'a Config,
    pair: Pair,
    abs_tol: f64,
    rel_tol: f64,
    evaluations: usize,
}

impl<'a, 'm> Adaptive<'a, 'm> {
    pub(super) fn new(
        bound: &'a Bound<'m>,
        config: &'a Config,
        pair: Pair,
        abs_tol: f64,
        rel_tol: f64,
    ) -> Self {
        Self {
            bound,
            config,
            pair,
            abs_tol,
            rel_tol,
            evaluations: 0,
        }
    }
}

/// Adapts a bound model to the `ode_solvers` system interface.
struct FlowSystem<'a, 'm> {
    bound: &'a Bound<'m>,
    divergence_bound: f64,
    diverged_at: &'a Cell<Option<f64>>,
}

impl System<f64, DVector<f64>> for FlowSystem<'_, '_> {
    fn system(&self, _x: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        self.bound.derivative(y.as_slice(), dy.as_mut_slice());
    }

    fn solout(&mut self, x: f64, y: &DVector<f64>, _dy: &DVector<f64>) -> bool {
        if stepper::diverged(y.as_slice(), self.divergence_bound) {
            self.diverged_at.set(Some(x));
            return true;
        }
        false
    }
}

/// Nudges the solver's end past `span` so rounding in the final step
/// cannot skip the dense output placed exactly at `span`.
const END_SLACK: f64 = 1e-10;

impl Stepper for Adaptive<'_, '_> {
    fn advance(&mut self, y: &mut [f64], from: f64, to: f64) -> Result<bool, Interrupt> {
        let span = to - from;
        if span <= 0.0 {
            return Ok(false);
        }

        let diverged_at = Cell::new(None);
        let system = FlowSystem {
            bound: self.bound,
            divergence_bound: self.config.divergence_bound(),
            diverged_at: &diverged_at,
        };
        let y0 = DVector::from_column_slice(y);
        let x_end = span * (1.0 + END_SLACK);

        let (stats, x_out, y_out) = match self.pair {
            Pair::Dopri5 => {
                let mut stepper =
                    Dopri5::new(system, 0.0, x_end, span, y0, self.rel_tol, self.abs_tol);
                let stats = stepper.integrate();
                (stats, stepper.x_out().clone(), stepper.y_out().clone())
            }
            Pair::Dop853 => {
                let mut stepper =
                    Dop853::new(system, 0.0, x_end, span, y0, self.rel_tol, self.abs_tol);
                let stats = stepper.integrate();
                (stats, stepper.x_out().clone(), stepper.y_out().clone())
            }
        };

        if let Some(x) = diverged_at.get() {
            return Err(Interrupt::Diverged { time: from + x });
        }
        let stats = stats.map_err(Interrupt::Adaptive)?;
        self.evaluations += stats.num_eval as usize;

        let end = x_out
            .iter()
            .rposition(|x| *x == span)
            .ok_or(Interrupt::MissedSample { time: to })?;
        y.copy_from_slice(y_out[end].as_slice());

        if stepper::diverged(y, self.config.divergence_bound()) {
            return Err(Interrupt::Diverged { time: to });
        }
        Ok(stepper::clamp(y, to, self.config))
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use epiflow_core::{
        Flow, Model, ParameterSet,
        expr::{comp, param},
    };

    fn decay() -> Model {
        Model::builder()
            .compartments(["A", "B"])
            .parameter("k")
            .flow(Flow::transfer("A", "B", param("k") * comp("A")))
            .build()
            .expect("valid model")
    }

    #[test]
    fn both_pairs_match_exact_decay() {
        let model = decay();
        let bound = model
            .bind(&ParameterSet::from([("k", 0.3)]))
            .expect("valid params");
        let config = Config::default();

        for pair in [Pair::Dopri5, Pair::Dop853] {
            let mut adaptive = Adaptive::new(&bound, &config, pair, 1e-12, 1e-12);
            let mut y = [1.0, 0.0];

            adaptive.advance(&mut y, 5.0, 6.0).expect("no divergence");
            adaptive.advance(&mut y, 6.0, 10.0).expect("no divergence");

            assert_relative_eq!(y[0], (-1.5_f64).exp(), max_relative = 1e-8);
            assert_relative_eq!(y[0] + y[1], 1.0, epsilon = 1e-10);
            assert!(adaptive.evaluations() > 0);
        }
    }

    #[test]
    fn reports_divergence_in_absolute_time() {
        let model = Model::builder()
            .compartment("A")
            .flow(Flow::birth("A", comp("A") * comp("A")))
            .build()
            .expect("valid model");
        let bound = model.bind(&ParameterSet::new()).expect("no params");
        let config = Config::default().with_divergence_bound(1e6).unwrap();
        let mut adaptive = Adaptive::new(&bound, &config, Pair::Dopri5, 1e-8, 1e-8);

        let mut y = [1.0];
        let result = adaptive.advance(&mut y, 10.0, 12.0);

        assert!(matches!(
            result,
            Err(Interrupt::Diverged { time }) if time > 10.9 && time <= 11.0
        ));
    }
}
