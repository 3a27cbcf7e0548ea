//! Error types for batch execution.

use rf_reactor::ReactorError;
use rf_solver::SolverError;
use thiserror::Error;

/// Errors that reject a whole batch. Per-cell problems are reported in
/// [`CellStatus`](crate::CellStatus) instead.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Thread pool: {what}")]
    ThreadPool { what: String },

    #[error("Batch worker exited without a result")]
    Disconnected,

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Reactor(#[from] ReactorError),
}

pub type BatchResult<T> = Result<T, BatchError>;
