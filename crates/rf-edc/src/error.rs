use rf_batch::BatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdcError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid turbulence state: {what}")]
    Turbulence { what: String },

    #[error(transparent)]
    Batch(#[from] BatchError),
}

pub type EdcResult<T> = Result<T, EdcError>;
