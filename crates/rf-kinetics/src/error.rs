use rf_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KineticsError {
    #[error("Non-physical {what}: {value}")]
    NonPhysical { what: &'static str, value: f64 },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type KineticsResult<T> = Result<T, KineticsError>;
