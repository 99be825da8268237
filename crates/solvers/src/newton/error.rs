use thiserror::Error;

/// Errors that can occur during a Newton solve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("initial guess contains a non-finite value")]
    NonFiniteGuess,

    #[error("non-finite residual at iteration {iter}")]
    NonFiniteResidual { iter: usize },

    #[error("singular Jacobian at iteration {iter}")]
    SingularJacobian { iter: usize },
}
