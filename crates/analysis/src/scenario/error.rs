use thiserror::Error;

/// Errors raised while setting up or launching a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("swept parameter `{name}` is not in the base parameter set")]
    UnknownParameter { name: String },

    #[error("sweep over `{name}` has no values")]
    EmptySweep { name: String },

    #[error("parameter `{name}` is swept more than once")]
    DuplicateSweep { name: String },

    #[error("invalid range for `{name}`: {reason}")]
    InvalidRange { name: String, reason: &'static str },

    #[error("failed to build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
