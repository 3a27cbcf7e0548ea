//! rf-reactor: zero-dimensional reactor models.
//!
//! Contains:
//! - state (thermochemical state of a gas mixture)
//! - model (reactor kinds and the ODE system for [Y, T])
//! - sim (advancing a reactor in time, trace recording)
//! - analysis (ignition delay, extinction residence time)

pub mod analysis;
pub mod error;
pub mod model;
pub mod ode;
pub mod sim;
pub mod state;

pub use analysis::{
    ExtinctionOptions, ExtinctionResult, IgnitionCriterion, IgnitionOptions, IgnitionResult,
    extinction_residence_time, ignition_delay,
};
pub use error::{ReactorError, ReactorResult};
pub use model::{ReactorKind, StirredInflow};
pub use ode::ReactorOde;
pub use sim::{Reactor, ReactorOptions, ReactorRecord, ReactorRun, Sample};
pub use state::{FRACTION_TOLERANCE, GasState};
