//! Chemical mechanism model for reactflow.
//!
//! Species with two-range NASA7 thermodynamics, reactions with a closed set of
//! rate laws, and an immutable [`Mechanism`] shared by every evaluation.
//! Mechanisms are assembled with [`MechanismBuilder`] or loaded from YAML.

pub mod elements;
pub mod equation;
pub mod error;
pub mod loader;
pub mod mechanism;
pub mod mixture;
pub mod nasa;
pub mod reaction;
pub mod species;
pub mod thermo;

pub use equation::{Collider, ParsedEquation, parse_equation};
pub use error::{MechError, MechResult};
pub use loader::{load_mechanism_file, load_mechanism_str};
pub use mechanism::{Mechanism, MechanismBuilder};
pub use mixture::FractionCorrection;
pub use nasa::{Nasa7, SpeciesThermo};
pub use reaction::{
    Arrhenius, EfficiencyDef, RateDef, RateLaw, Reaction, ReactionDef, StoichTerm,
    ThirdBodyEfficiencies, Troe,
};
pub use species::Species;
pub use thermo::SpeciesThermoTable;
