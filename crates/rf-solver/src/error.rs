//! Error types for solver operations.

use rf_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Raised by a right-hand side for a state it cannot evaluate; the
    /// integrator reduces the step and retries.
    #[error("Retryable failure: {message}")]
    Retryable { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SolverResult<T> = Result<T, SolverError>;
