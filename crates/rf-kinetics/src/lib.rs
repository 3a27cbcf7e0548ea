//! Reaction-rate evaluation for reactflow mechanisms.
//!
//! Forward rate constants (Arrhenius, third-body, Lindemann/Troe falloff),
//! reverse rate constants from equilibrium constants, and per-species molar
//! production rates with the accompanying heat-release rate.

pub mod equilibrium;
pub mod error;
pub mod evaluator;
pub mod rates;

pub use equilibrium::{equilibrium_constant, ln_equilibrium_constant};
pub use error::{KineticsError, KineticsResult};
pub use evaluator::{KineticsEvaluator, RateSnapshot};
pub use rates::{FalloffRate, arrhenius, falloff_rate_constant, third_body_concentration, troe_blending};
