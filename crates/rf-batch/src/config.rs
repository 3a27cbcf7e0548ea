//! Batch configuration.

use crate::error::{BatchError, BatchResult};
use rf_reactor::ReactorKind;
use rf_solver::IntegratorOptions;
use std::time::Duration;

/// Reactor model each cell is integrated with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellReactor {
    /// Pressure held at the value implied by the cell's density and temperature
    #[default]
    ConstantPressure,
    /// Density held at the cell's value
    ConstantVolume,
}

impl CellReactor {
    pub(crate) fn kind(self) -> ReactorKind {
        match self {
            Self::ConstantPressure => ReactorKind::ConstantPressure,
            Self::ConstantVolume => ReactorKind::ConstantVolume,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Cells handed to one worker task
    pub chunk_size: usize,
    /// Dedicated pool size; `None` runs on the global rayon pool
    pub threads: Option<usize>,
    pub reactor: CellReactor,
    pub integrator: IntegratorOptions,
    /// Wall-clock limit for a whole batch
    pub timeout: Option<Duration>,
    /// Most negative input mass fraction that is clamped instead of rejected
    pub negative_fraction_tolerance: f64,
    /// Absolute tolerance on temperature (K)
    pub temperature_atol: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            threads: None,
            reactor: CellReactor::default(),
            integrator: IntegratorOptions {
                rtol: 1e-5,
                ..IntegratorOptions::default()
            },
            timeout: None,
            negative_fraction_tolerance: 1e-6,
            temperature_atol: 1e-6,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> BatchResult<()> {
        if self.chunk_size == 0 {
            return Err(BatchError::InvalidArg {
                what: "chunk_size must be positive",
            });
        }
        if self.threads == Some(0) {
            return Err(BatchError::InvalidArg {
                what: "threads must be positive",
            });
        }
        if !(self.negative_fraction_tolerance.is_finite() && self.negative_fraction_tolerance >= 0.0) {
            return Err(BatchError::InvalidArg {
                what: "negative_fraction_tolerance must be non-negative",
            });
        }
        if !(self.temperature_atol.is_finite() && self.temperature_atol > 0.0) {
            return Err(BatchError::InvalidArg {
                what: "temperature_atol must be positive",
            });
        }
        if self.integrator.deadline.is_some() {
            return Err(BatchError::InvalidArg {
                what: "use BatchConfig::timeout instead of an integrator deadline",
            });
        }
        self.integrator.validate()?;
        Ok(())
    }
}
