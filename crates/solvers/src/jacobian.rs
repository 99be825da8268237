//! Finite-difference Jacobians.

use epiflow_core::Bound;
use nalgebra::DMatrix;

/// Approximates the Jacobian of `f` at `x` by forward differences.
///
/// `fx` must hold `f(x)`. Column `j` perturbs `x[j]` by
/// `rel_step * max(|x[j]|, 1)`.
///
/// # Panics
///
/// Panics if `fx` is shorter than `x`.
pub fn forward_difference<F>(f: &mut F, x: &[f64], fx: &[f64], rel_step: f64) -> DMatrix<f64>
where
    F: FnMut(&[f64], &mut [f64]),
{
    let n = x.len();
    let mut jacobian = DMatrix::zeros(n, n);
    let mut shifted = x.to_vec();
    let mut f_shifted = vec![0.0; n];

    for j in 0..n {
        let h = rel_step * x[j].abs().max(1.0);
        shifted[j] = x[j] + h;
        f(&shifted, &mut f_shifted);
        for i in 0..n {
            jacobian[(i, j)] = (f_shifted[i] - fx[i]) / h;
        }
        shifted[j] = x[j];
    }

    jacobian
}

/// Returns the Jacobian of a bound model's derivative at state `y`.
///
/// # Panics
///
/// Panics if `y` does not match the model's compartment count.
#[must_use]
pub fn of_flows(bound: &Bound<'_>, y: &[f64], rel_step: f64) -> DMatrix<f64> {
    let fy = bound.derivative_vec(y);
    let mut f = |y: &[f64], dy: &mut [f64]| bound.derivative(y, dy);
    forward_difference(&mut f, y, &fy, rel_step)
}
