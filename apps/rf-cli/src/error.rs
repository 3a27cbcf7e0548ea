use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Mech(#[from] rf_mech::MechError),

    #[error(transparent)]
    Reactor(#[from] rf_reactor::ReactorError),

    #[error(transparent)]
    Batch(#[from] rf_batch::BatchError),

    #[error(transparent)]
    Edc(#[from] rf_edc::EdcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
