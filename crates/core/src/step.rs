/// A trait for types that can be stepped using their derivative.
///
/// Implementing this trait lets integrators advance a state by
/// `derivative * delta` without knowing its layout. `Delta` is usually time,
/// but it can be any independent variable.
pub trait StepIntegrable<Delta> {
    /// The derivative of the type with respect to `Delta`.
    type Derivative: ?Sized;

    /// Returns the value after stepping with a derivative and step size.
    #[must_use]
    fn step(&self, derivative: &Self::Derivative, delta: Delta) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::State;

    #[test]
    fn step_state_vector() {
        let state = State::new(vec![1.0, 2.0, 3.0]);
        let next = state.step(&[0.1, 0.2, -0.3], 10.0);

        assert_eq!(next.values(), &[2.0, 4.0, 0.0]);
    }

    #[test]
    fn zero_delta_is_identity() {
        let state = State::new(vec![0.25, 0.75]);
        assert_eq!(state.step(&[5.0, -5.0], 0.0), state);
    }
}
