//! rf-core: shared foundation for the reactflow kinetics engine.
//!
//! Contains:
//! - units (uom SI types, constructors, physical constants)
//! - numeric (Real, tolerances, float helpers)
//! - ids (stable compact IDs for species and reactions)
//! - error (shared error types)
//! - timing (opt-in wall-clock instrumentation)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
