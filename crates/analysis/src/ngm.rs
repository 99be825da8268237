//! Next-generation matrices for risk-structured transmission.
//!
//! In an `n`-group SIS model linearised about the disease-free state, an
//! infective in group `j` produces on average `K[i][j] = beta_i_j * n_i / gamma`
//! new infections in group `i`. The basic reproduction number is the spectral
//! radius of `K`.

use epiflow_core::ParameterSet;
use nalgebra::DMatrix;

use crate::{
    AnalysisError, Canonical, Quantity, Shape,
    canonical::{group_size, waifw},
};

/// Builds the next-generation matrix of a risk-structured SIS model.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsupportedModelShape`] for other shapes, a
/// parameter error if the set does not match the model, or
/// [`AnalysisError::UndefinedQuantity`] if `gamma` is not positive.
pub fn next_generation_matrix(
    canonical: &Canonical,
    params: &ParameterSet,
) -> Result<DMatrix<f64>, AnalysisError> {
    let Shape::RiskStructuredSis { groups } = canonical.shape() else {
        return Err(AnalysisError::unsupported(canonical.shape(), Quantity::R0));
    };
    canonical.model().bind(params)?;

    let gamma = params.require("gamma")?;
    if gamma <= 0.0 {
        return Err(AnalysisError::undefined(
            Quantity::R0,
            "recovery rate must be positive",
        ));
    }

    let mut k = DMatrix::zeros(groups, groups);
    for i in 0..groups {
        let size = params.require(&group_size(i + 1))?;
        for j in 0..groups {
            k[(i, j)] = params.require(&waifw(i + 1, j + 1))? * size / gamma;
        }
    }
    Ok(k)
}

/// Returns the largest eigenvalue modulus of a square matrix.
///
/// # Panics
///
/// Panics if the matrix is not square.
#[must_use]
pub fn spectral_radius(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    matrix
        .complex_eigenvalues()
        .iter()
        .map(|lambda| lambda.re.hypot(lambda.im))
        .fold(0.0, f64::max)
}

/// Returns R0 of a risk-structured model from its WAIFW matrix.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsupportedModelShape`] for any shape other than
/// [`Shape::RiskStructuredSis`].
pub fn waifw_r0(canonical: &Canonical, params: &ParameterSet) -> Result<f64, AnalysisError> {
    next_generation_matrix(canonical, params).map(|k| spectral_radius(&k))
}
