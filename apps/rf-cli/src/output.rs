//! Serializable summaries for `--json` output.

use rf_batch::BatchReport;
use rf_edc::EdcReport;
use rf_reactor::{ExtinctionResult, GasState, IgnitionResult};
use rf_solver::IntegrationStats;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct IgnitionSummary {
    pub delay_s: f64,
    pub temperature_k: f64,
    pub max_temperature_rate_k_per_s: f64,
    pub final_state: GasState,
    pub stats: IntegrationStats,
}

impl From<IgnitionResult> for IgnitionSummary {
    fn from(r: IgnitionResult) -> Self {
        Self {
            delay_s: r.delay,
            temperature_k: r.temperature,
            max_temperature_rate_k_per_s: r.max_temperature_rate,
            final_state: r.final_state,
            stats: r.stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtinctionSummary {
    pub residence_time_s: f64,
    pub extinguished_at_s: f64,
    pub burning_state: GasState,
    /// (τ, T) pairs in the order computed
    pub history: Vec<(f64, f64)>,
}

impl From<ExtinctionResult> for ExtinctionSummary {
    fn from(r: ExtinctionResult) -> Self {
        Self {
            residence_time_s: r.residence_time,
            extinguished_at_s: r.extinguished_at,
            burning_state: r.burning_state,
            history: r.history,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub cells: usize,
    pub converged: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub wall_time_s: f64,
    pub cells_per_second: f64,
    pub mean_accepted_steps: f64,
}

impl From<&BatchReport> for BatchSummary {
    fn from(r: &BatchReport) -> Self {
        let wall = r.wall_time.as_secs_f64();
        let steps: usize = r.outcomes.iter().map(|o| o.stats.accepted_steps).sum();
        Self {
            cells: r.len(),
            converged: r.converged,
            failed: r.failed,
            timed_out: r.timed_out,
            wall_time_s: wall,
            cells_per_second: if wall > 0.0 { r.len() as f64 / wall } else { 0.0 },
            mean_accepted_steps: if r.is_empty() { 0.0 } else { steps as f64 / r.len() as f64 },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EdcSummary {
    pub xi: f64,
    pub tau_s: f64,
    pub kappa: f64,
    /// Species name and mean source, kg/(m^3 s)
    pub species_rates: Vec<(String, f64)>,
    pub heat_release_rate_w_per_m3: f64,
    pub flagged: bool,
}

impl EdcSummary {
    pub fn from_report(report: &EdcReport, names: &[String]) -> Option<Self> {
        let cell = report.cells.first()?;
        Some(Self {
            xi: cell.fine_structure.xi,
            tau_s: cell.fine_structure.tau,
            kappa: cell.fine_structure.kappa,
            species_rates: names.iter().cloned().zip(cell.species_rates.iter().copied()).collect(),
            heat_release_rate_w_per_m3: cell.heat_release_rate,
            flagged: cell.is_flagged(),
        })
    }
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> crate::error::CliResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}
