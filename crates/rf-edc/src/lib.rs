//! rf-edc: Eddy Dissipation Concept turbulence-chemistry closure.
//!
//! Fine structures are advanced as constant-pressure reactors through the
//! batch scheduler; the closure turns their composition change into mean
//! source terms for the flow solver.

pub mod closure;
pub mod error;
pub mod fine_structure;

pub use closure::{EdcCellRate, EdcClosure, EdcReport};
pub use error::{EdcError, EdcResult};
pub use fine_structure::{EdcConstants, FineStructure, TurbulenceState, fine_structure};
