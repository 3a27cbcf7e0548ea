//! Mean reaction rates from fine-structure integrations.

use crate::error::{EdcError, EdcResult};
use crate::fine_structure::{EdcConstants, FineStructure, TurbulenceState, fine_structure};
use rf_batch::{BatchConfig, BatchScheduler, CellReactor, CellState, CellStatus};
use rf_mech::{Mechanism, SpeciesThermoTable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Scales reported for cells whose turbulence state was rejected.
const UNRESOLVED: FineStructure = FineStructure {
    xi: 0.0,
    tau: f64::INFINITY,
    kappa: 0.0,
};

/// Closure result for one cell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdcCellRate {
    pub fine_structure: FineStructure,
    /// Mean species source terms, kg/(m^3 s)
    pub species_rates: Vec<f64>,
    /// -Σ h_k R_k at the cell temperature, W/m^3
    pub heat_release_rate: f64,
    /// Fine-structure state after τ*
    pub fine_state: CellState,
    pub status: CellStatus,
}

impl EdcCellRate {
    /// Integration failed or timed out; the sources are zero.
    pub fn is_flagged(&self) -> bool {
        self.status != CellStatus::Converged
    }
}

#[derive(Clone, Debug, Default)]
pub struct EdcReport {
    pub cells: Vec<EdcCellRate>,
    /// Cells whose sources were zeroed after a failed fine-structure integration
    pub flagged: usize,
    pub wall_time: Duration,
}

/// EDC closure over a shared mechanism.
#[derive(Clone)]
pub struct EdcClosure {
    scheduler: BatchScheduler,
    constants: EdcConstants,
}

impl EdcClosure {
    /// Build the closure with its own scheduler. Fine structures are always
    /// integrated at constant pressure, whatever `config.reactor` says.
    pub fn new(mech: Arc<Mechanism>, constants: EdcConstants, config: BatchConfig) -> EdcResult<Self> {
        let config = BatchConfig {
            reactor: CellReactor::ConstantPressure,
            ..config
        };
        Self::with_scheduler(BatchScheduler::new(mech, config)?, constants)
    }

    pub fn with_scheduler(scheduler: BatchScheduler, constants: EdcConstants) -> EdcResult<Self> {
        constants.validate()?;
        if scheduler.config().reactor != CellReactor::ConstantPressure {
            return Err(EdcError::InvalidArg {
                what: "fine structures need a constant-pressure scheduler",
            });
        }
        Ok(Self { scheduler, constants })
    }

    pub fn constants(&self) -> &EdcConstants {
        &self.constants
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Mean source terms for every cell. `turbulence[i]` belongs to `cells[i]`;
    /// an invalid turbulence state flags only its own cell.
    pub fn mean_rates(&self, cells: &[CellState], turbulence: &[TurbulenceState]) -> EdcResult<EdcReport> {
        if cells.len() != turbulence.len() {
            return Err(EdcError::InvalidArg {
                what: "one turbulence state per cell is required",
            });
        }
        let started = Instant::now();
        let structures: Vec<EdcResult<FineStructure>> = turbulence
            .iter()
            .map(|t| fine_structure(t, &self.constants))
            .collect();
        let durations: Vec<f64> = structures
            .iter()
            .map(|fs| match fs {
                Ok(fs) if fs.is_active() => fs.tau,
                _ => 0.0,
            })
            .collect();

        let batch = self.scheduler.advance_for(cells, &durations)?;
        let mech = self.scheduler.mechanism();
        let species = mech.species_count();

        let mut flagged = 0;
        let rates: Vec<EdcCellRate> = cells
            .iter()
            .zip(structures)
            .zip(batch.outcomes)
            .map(|((cell, fs), outcome)| {
                let fs = match fs {
                    Ok(fs) => fs,
                    Err(e) => {
                        flagged += 1;
                        warn!(error = %e, "invalid turbulence state; source zeroed");
                        return EdcCellRate {
                            fine_structure: UNRESOLVED,
                            species_rates: vec![0.0; species],
                            heat_release_rate: 0.0,
                            fine_state: cell.clone(),
                            status: CellStatus::Failed { reason: e.to_string() },
                        };
                    }
                };
                let converged = outcome.is_converged();
                let (species_rates, heat_release_rate) = if converged && fs.is_active() {
                    let r: Vec<f64> = outcome.mean_source.iter().map(|s| fs.kappa * s).collect();
                    let q = heat_release(mech, cell.temperature, &r);
                    (r, q)
                } else {
                    (vec![0.0; species], 0.0)
                };
                if !converged {
                    flagged += 1;
                    warn!(
                        xi = fs.xi,
                        tau = fs.tau,
                        status = ?outcome.status,
                        "fine-structure integration failed; source zeroed"
                    );
                }
                EdcCellRate {
                    fine_structure: fs,
                    species_rates,
                    heat_release_rate,
                    fine_state: outcome.state,
                    status: outcome.status,
                }
            })
            .collect();

        let report = EdcReport {
            cells: rates,
            flagged,
            wall_time: started.elapsed(),
        };
        info!(
            cells = report.cells.len(),
            flagged = report.flagged,
            wall_s = report.wall_time.as_secs_f64(),
            "EDC mean rates"
        );
        Ok(report)
    }
}

/// -Σ h_k(T) R_k with mass-specific enthalpies.
fn heat_release(mech: &Mechanism, temperature: f64, rates: &[f64]) -> f64 {
    let table = SpeciesThermoTable::at(mech, temperature);
    let w = mech.molar_masses();
    -rates
        .iter()
        .enumerate()
        .map(|(k, r)| table.enthalpy_molar(k) / w[k] * r)
        .sum::<f64>()
}
