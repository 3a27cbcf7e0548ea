//! Error types for reactor operations.

use rf_core::CoreError;
use rf_kinetics::KineticsError;
use rf_mech::MechError;
use rf_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical state: {what}")]
    NonPhysical { what: String },

    /// The analysis could not reach a conclusion (no ignition, no burning branch).
    #[error("Analysis failed: {what}")]
    Analysis { what: String },

    #[error(transparent)]
    Mech(#[from] MechError),

    #[error(transparent)]
    Kinetics(#[from] KineticsError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ReactorResult<T> = Result<T, ReactorError>;
