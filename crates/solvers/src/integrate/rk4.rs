use epiflow_core::Bound;

use super::{
    Config,
    stepper::{self, Interrupt, Stepper},
};

/// Classic RK4 with substeps sized by relative change.
///
/// Each substep's length is predicted from the derivative at its start so
/// that no compartment moves by more than `max_relative_change` of its own
/// magnitude (or of `relative_floor * N` for nearly empty compartments). If
/// the completed substep still exceeds the bound, it is halved and retried
/// until `min_step` is reached. Compartments already at zero and still
/// draining are clamped rather than allowed to throttle the step.
///
/// Near an equilibrium the relative change is tiny and would allow steps far
/// beyond RK4's stability region, so every substep is also limited by a local
/// stiffness estimate taken from the first two stages. The last reliable
/// estimate is kept once the state has settled.
pub(super) struct Rk4<'a, 'm> {
    bound: &'a Bound<'m>,
    config: &'a Config,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    scratch: Vec<f64>,
    next: Vec<f64>,
    scale: Vec<f64>,
    stiffness: f64,
    evaluations: usize,
}

/// Keeps predicted substeps a little inside the bound so most are accepted.
const SAFETY: f64 = 0.9;

/// Largest `dt * stiffness` accepted; RK4 is stable on the real axis to about 2.78.
const STABILITY: f64 = 2.5;

/// Stage displacements below this fraction of the state are not used to estimate stiffness.
const NOISE: f64 = 1e-9;

impl<'a, 'm> Rk4<'a, 'm> {
    pub(super) fn new(bound: &'a Bound<'m>, config: &'a Config) -> Self {
        let n = bound.model().compartment_count();
        Self {
            bound,
            config,
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            scratch: vec![0.0; n],
            next: vec![0.0; n],
            scale: vec![0.0; n],
            stiffness: 0.0,
            evaluations: 0,
        }
    }

    /// Fills `self.scale` with the magnitude each compartment's change is measured against.
    fn update_scale(&mut self, y: &[f64]) {
        let total: f64 = y.iter().sum();
        let floor = self.config.relative_floor() * total.abs().max(1.0);
        for (scale, value) in self.scale.iter_mut().zip(y) {
            *scale = value.abs().max(floor);
        }
    }

    /// Predicts a substep from `k1`, capped at `remaining`.
    fn predict(&self, y: &[f64], remaining: f64) -> f64 {
        if remaining <= 0.0 {
            return remaining;
        }
        let fastest = self
            .k1
            .iter()
            .zip(&self.scale)
            .zip(y)
            .filter(|((dy, _), y)| !(**y <= 0.0 && **dy < 0.0))
            .map(|((dy, scale), _)| dy.abs() / scale)
            .fold(0.0_f64, f64::max);

        if fastest == 0.0 {
            return remaining;
        }

        let dt = SAFETY * self.config.max_relative_change() / fastest;
        dt.min(self.stable_step())
            .max(self.config.min_step())
            .min(remaining)
    }

    /// Returns the largest substep the last stiffness estimate allows.
    fn stable_step(&self) -> f64 {
        if self.stiffness > 0.0 {
            SAFETY * STABILITY / self.stiffness
        } else {
            f64::INFINITY
        }
    }

    /// Estimates the local Lipschitz constant along `k1` from the first two stages.
    ///
    /// Returns `None` when the stage displacement is too small for the
    /// difference of derivatives to rise above rounding noise.
    fn estimate_stiffness(&self, y: &[f64], dt: f64) -> Option<f64> {
        let moved = 0.5 * dt * self.k1.iter().fold(0.0_f64, |max, k| max.max(k.abs()));
        let size = y.iter().fold(1.0_f64, |max, v| max.max(v.abs()));
        if !(moved > NOISE * size) {
            return None;
        }
        let changed = self
            .k2
            .iter()
            .zip(&self.k1)
            .fold(0.0_f64, |max, (k2, k1)| max.max((k2 - k1).abs()));
        Some(changed / moved)
    }

    /// Writes one RK4 step of length `dt` from `y` into `self.next`, reusing `k1`.
    fn step(&mut self, y: &[f64], dt: f64) {
        let half = 0.5 * dt;

        for ((s, y), k) in self.scratch.iter_mut().zip(y).zip(&self.k1) {
            *s = y + half * k;
        }
        self.bound.derivative(&self.scratch, &mut self.k2);

        for ((s, y), k) in self.scratch.iter_mut().zip(y).zip(&self.k2) {
            *s = y + half * k;
        }
        self.bound.derivative(&self.scratch, &mut self.k3);

        for ((s, y), k) in self.scratch.iter_mut().zip(y).zip(&self.k3) {
            *s = y + dt * k;
        }
        self.bound.derivative(&self.scratch, &mut self.k4);

        self.evaluations += 3;

        for (i, next) in self.next.iter_mut().enumerate() {
            *next = y[i]
                + (dt / 6.0) * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }
    }

    /// Returns the largest change in `self.next` relative to `self.scale`.
    fn relative_change(&self, y: &[f64]) -> f64 {
        self.next
            .iter()
            .zip(y)
            .zip(&self.scale)
            .filter(|((next, y), _)| !(**y <= 0.0 && **next < 0.0))
            .map(|((next, y), scale)| (next - y).abs() / scale)
            .fold(0.0_f64, |max, change| {
                if change.is_nan() { f64::INFINITY } else { max.max(change) }
            })
    }
}

impl Stepper for Rk4<'_, '_> {
    fn advance(&mut self, y: &mut [f64], from: f64, to: f64) -> Result<bool, Interrupt> {
        let mut clamped = false;
        let mut t = from;

        while t < to {
            let remaining = to - t;

            self.bound.derivative(y, &mut self.k1);
            self.evaluations += 1;
            self.update_scale(y);

            let mut dt = self.predict(y, remaining);
            loop {
                self.step(y, dt);
                let change = self.relative_change(y);
                if let Some(stiffness) = self.estimate_stiffness(y, dt) {
                    self.stiffness = stiffness;
                }
                let stable = dt * self.stiffness <= STABILITY;

                if (change <= self.config.max_relative_change() && stable)
                    || dt <= self.config.min_step()
                {
                    break;
                }
                dt = (0.5 * dt)
                    .min(self.stable_step())
                    .max(self.config.min_step());
            }

            if stepper::diverged(&self.next, self.config.divergence_bound()) {
                return Err(Interrupt::Diverged { time: t + dt });
            }

            let next_t = if dt >= remaining { to } else { t + dt };
            if next_t <= t {
                return Err(Interrupt::StepUnderflow { time: t, step: dt });
            }
            t = next_t;
            y.copy_from_slice(&self.next);
            clamped |= stepper::clamp(y, t, self.config);
        }

        Ok(clamped)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}
