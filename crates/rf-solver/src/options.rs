//! Integrator configuration.

use crate::newton::NewtonConfig;
use crate::error::{SolverError, SolverResult};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JacobianMethod {
    /// One extra right-hand side per column
    #[default]
    Forward,
    /// Two extra right-hand sides per column
    Central,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JacobianConfig {
    pub method: JacobianMethod,
    /// Relative perturbation; column j uses `eps * max(|y_j|, scale_j)`
    pub epsilon: f64,
}

impl Default for JacobianConfig {
    fn default() -> Self {
        Self {
            method: JacobianMethod::Forward,
            epsilon: 1e-7,
        }
    }
}

/// Options for [`Bdf2`](crate::Bdf2).
#[derive(Clone, Debug)]
pub struct IntegratorOptions {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance (systems may override per component)
    pub atol: f64,
    /// First step size (seconds)
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    /// Maximum number of accepted steps (safety limit)
    pub max_steps: usize,
    /// Consecutive failed attempts allowed for a single step
    pub max_retries: usize,
    /// Step multiplier after a Newton failure or inadmissible state
    pub cutback_factor: f64,
    /// Upper bound on step growth between accepted steps
    pub grow_factor: f64,
    /// Lower bound on step reduction after a failed error test
    pub shrink_limit: f64,
    /// Safety factor applied to the error-based step proposal
    pub safety: f64,
    /// Control the local truncation error as well as Newton convergence
    pub error_control: bool,
    pub newton: NewtonConfig,
    pub jacobian: JacobianConfig,
    /// Give up (with the last accepted state) once this instant passes
    pub deadline: Option<Instant>,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-12,
            initial_step: 1e-8,
            min_step: 1e-20,
            max_step: f64::INFINITY,
            max_steps: 500_000,
            max_retries: 15,
            cutback_factor: 0.5,
            grow_factor: 2.0,
            shrink_limit: 0.2,
            safety: 0.9,
            error_control: true,
            newton: NewtonConfig::default(),
            jacobian: JacobianConfig::default(),
            deadline: None,
        }
    }
}

impl IntegratorOptions {
    pub fn validate(&self) -> SolverResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.rtol) {
            return Err(SolverError::InvalidArg {
                what: "rtol must be positive",
            });
        }
        if !(self.atol.is_finite() && self.atol >= 0.0) {
            return Err(SolverError::InvalidArg {
                what: "atol must be non-negative",
            });
        }
        if !positive(self.initial_step) || !(self.max_step > 0.0) {
            return Err(SolverError::InvalidArg {
                what: "step sizes must be positive",
            });
        }
        if !(self.min_step >= 0.0 && self.min_step <= self.initial_step) {
            return Err(SolverError::InvalidArg {
                what: "min_step must lie in [0, initial_step]",
            });
        }
        if self.max_steps == 0 {
            return Err(SolverError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        if !(self.cutback_factor > 0.0 && self.cutback_factor < 1.0) {
            return Err(SolverError::InvalidArg {
                what: "cutback_factor must lie in (0, 1)",
            });
        }
        if !(self.grow_factor >= 1.0 && self.shrink_limit > 0.0 && self.shrink_limit < 1.0) {
            return Err(SolverError::InvalidArg {
                what: "grow_factor >= 1 and shrink_limit in (0, 1) required",
            });
        }
        if !positive(self.jacobian.epsilon) {
            return Err(SolverError::InvalidArg {
                what: "jacobian epsilon must be positive",
            });
        }
        self.newton.validate()
    }
}
