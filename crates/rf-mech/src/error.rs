//! Mechanism construction errors.
//!
//! All of these are fatal and raised before any integration starts.

use rf_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MechError {
    #[error("Reaction '{reaction}' references unknown species '{species}'")]
    UnknownSpecies { reaction: String, species: String },

    #[error("Species '{species}' contains unknown element '{element}'")]
    UnknownElement { species: String, element: String },

    #[error("Duplicate species '{name}'")]
    DuplicateSpecies { name: String },

    #[error("Invalid species '{species}': {what}")]
    InvalidSpecies { species: String, what: String },

    #[error(
        "Discontinuous thermo for '{species}': {property} is {low} from the low range and {high} from the high range at T_mid"
    )]
    ThermoDiscontinuity {
        species: String,
        property: &'static str,
        low: f64,
        high: f64,
    },

    #[error("Invalid stoichiometry in '{reaction}': {what}")]
    InvalidStoichiometry { reaction: String, what: String },

    #[error("Reaction '{reaction}' does not conserve element {element} (imbalance {imbalance})")]
    UnbalancedReaction {
        reaction: String,
        element: String,
        imbalance: f64,
    },

    #[error("Invalid rate parameters in '{reaction}': {what}")]
    InvalidRate { reaction: String, what: String },

    #[error("Reaction '{reaction}' duplicates reaction #{other} without a duplicate flag")]
    UndeclaredDuplicate { reaction: String, other: usize },

    #[error("Cannot parse equation '{equation}': {what}")]
    Equation { equation: String, what: String },

    #[error("Mechanism format error: {what}")]
    Format { what: String },

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type MechResult<T> = Result<T, MechError>;
