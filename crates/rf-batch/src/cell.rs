//! Cell states and per-cell outcomes.

use rf_solver::IntegrationStats;

/// Thermochemical state of one flow-solver cell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellState {
    /// K
    pub temperature: f64,
    /// kg/m^3
    pub density: f64,
    pub mass_fractions: Vec<f64>,
}

impl CellState {
    pub fn new(temperature: f64, density: f64, mass_fractions: Vec<f64>) -> Self {
        Self {
            temperature,
            density,
            mass_fractions,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellStatus {
    Converged,
    /// Rejected input or a failed integration; the state is the last good one
    Failed { reason: String },
    /// The batch timeout passed before the cell finished
    TimedOut,
}

/// Result of integrating one cell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellOutcome {
    /// State at the end of the interval (or the last good state)
    pub state: CellState,
    /// ρ ΔY / Δt over the interval actually integrated, kg/(m^3 s)
    pub mean_source: Vec<f64>,
    /// Net molar production rates at the returned state, mol/(m^3 s)
    pub production_rates: Vec<f64>,
    /// W/m^3
    pub heat_release_rate: f64,
    pub status: CellStatus,
    pub stats: IntegrationStats,
}

impl CellOutcome {
    /// Outcome of a cell that was never integrated.
    pub(crate) fn rejected(cell: &CellState, species: usize, reason: String) -> Self {
        Self::unfinished(cell.clone(), species, reason, IntegrationStats::default())
    }

    /// Failed outcome reporting `state` with zero sources.
    pub(crate) fn unfinished(state: CellState, species: usize, reason: String, stats: IntegrationStats) -> Self {
        Self {
            state,
            mean_source: vec![0.0; species],
            production_rates: vec![0.0; species],
            heat_release_rate: 0.0,
            status: CellStatus::Failed { reason },
            stats,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status == CellStatus::Converged
    }
}
