//! Stiff time integration for small dense ODE systems.
//!
//! An [`OdeSystem`] is advanced by a variable-step BDF2 method ([`Bdf2`])
//! whose implicit stage is solved by Newton iteration on a dense
//! finite-difference Jacobian with an LU solve.

pub mod bdf;
pub mod context;
pub mod error;
pub mod jacobian;
pub mod newton;
pub mod options;
pub mod system;

pub use bdf::{Bdf2, IntegrationReport, IntegrationStatus};
pub use context::IntegrationStats;
pub use error::{SolverError, SolverResult};
pub use newton::{NewtonConfig, NewtonFailure, NewtonProblem, NewtonResult, newton_solve};
pub use options::{IntegratorOptions, JacobianConfig, JacobianMethod};
pub use system::{OdeSystem, Projection};
