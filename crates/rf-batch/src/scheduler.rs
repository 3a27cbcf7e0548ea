//! Data-parallel execution of per-cell integrations.
//!
//! A batch is a pure map from input cells to outcomes: cells are split
//! into chunks that rayon workers process independently, each cell with
//! its own reactor workspace over the shared mechanism. Output index `i`
//! always belongs to input cell `i`, and a cell's outcome does not depend
//! on where in the batch it sits.

use crate::cell::{CellOutcome, CellState, CellStatus};
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rf_core::constants::GAS_CONSTANT;
use rf_core::timing::{Timer, integrator_timing};
use rf_core::{ensure_positive, k, pa};
use rf_mech::Mechanism;
use rf_mech::mixture::{mean_molar_mass, normalize_mass_fractions};
use rf_reactor::{FRACTION_TOLERANCE, GasState, ReactorOde, ReactorResult};
use nalgebra::DVector;
use rf_solver::{Bdf2, IntegrationReport, IntegrationStatus};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcomes of one batch, in input order.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<CellOutcome>,
    pub converged: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub wall_time: Duration,
}

impl BatchReport {
    fn from_outcomes(outcomes: Vec<CellOutcome>, wall_time: Duration) -> Self {
        let mut report = Self {
            wall_time,
            ..Self::default()
        };
        for outcome in &outcomes {
            match outcome.status {
                CellStatus::Converged => report.converged += 1,
                CellStatus::Failed { .. } => report.failed += 1,
                CellStatus::TimedOut => report.timed_out += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_converged(&self) -> bool {
        self.converged == self.outcomes.len()
    }

    /// Indices of cells that did not converge.
    pub fn unconverged(&self) -> impl Iterator<Item = usize> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_converged())
            .map(|(i, _)| i)
    }
}

/// Runs batches of cell integrations against one mechanism.
#[derive(Clone)]
pub struct BatchScheduler {
    mech: Arc<Mechanism>,
    config: BatchConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl BatchScheduler {
    pub fn new(mech: Arc<Mechanism>, config: BatchConfig) -> BatchResult<Self> {
        config.validate()?;
        let pool = match config.threads {
            Some(n) => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("rf-batch-{i}"))
                    .build()
                    .map_err(|e| BatchError::ThreadPool { what: e.to_string() })?,
            )),
            None => None,
        };
        Ok(Self { mech, config, pool })
    }

    pub fn mechanism(&self) -> &Arc<Mechanism> {
        &self.mech
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Advance every cell by `dt` seconds.
    pub fn advance(&self, cells: &[CellState], dt: f64) -> BatchResult<BatchReport> {
        check_duration(dt)?;
        self.run(cells, |_| dt)
    }

    /// Advance cell `i` by `durations[i]` seconds.
    pub fn advance_for(&self, cells: &[CellState], durations: &[f64]) -> BatchResult<BatchReport> {
        if durations.len() != cells.len() {
            return Err(BatchError::InvalidArg {
                what: "one duration per cell is required",
            });
        }
        durations.iter().try_for_each(|d| check_duration(*d))?;
        self.run(cells, |i| durations[i])
    }

    /// Start [`advance`](Self::advance) on a background thread so the
    /// caller can overlap other work with the chemistry.
    pub fn submit(&self, cells: Vec<CellState>, dt: f64) -> PendingBatch {
        let (tx, rx) = channel();
        let scheduler = self.clone();
        let handle = thread::spawn(move || {
            // the receiver may already be gone
            let _ = tx.send(scheduler.advance(&cells, dt));
        });
        PendingBatch {
            rx,
            handle: Some(handle),
        }
    }

    /// Integrate a single cell for `duration` seconds. Batches evaluate
    /// every cell through this same path.
    pub fn integrate_cell(&self, cell: &CellState, duration: f64) -> CellOutcome {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        self.integrate_until(cell, duration, deadline)
    }

    fn run<D>(&self, cells: &[CellState], duration: D) -> BatchResult<BatchReport>
    where
        D: Fn(usize) -> f64 + Sync,
    {
        let started = Instant::now();
        let deadline = self.config.timeout.map(|t| started + t);
        let chunk = self.config.chunk_size;

        let work = || {
            cells
                .par_chunks(chunk)
                .enumerate()
                .map(|(c, group)| {
                    group
                        .iter()
                        .enumerate()
                        .map(|(j, cell)| self.integrate_until(cell, duration(c * chunk + j), deadline))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };
        let grouped = match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        };

        let outcomes: Vec<CellOutcome> = grouped.into_iter().flatten().collect();
        let report = BatchReport::from_outcomes(outcomes, started.elapsed());
        info!(
            cells = report.len(),
            converged = report.converged,
            failed = report.failed,
            timed_out = report.timed_out,
            wall_s = report.wall_time.as_secs_f64(),
            "batch advanced"
        );
        Ok(report)
    }

    fn integrate_until(&self, cell: &CellState, duration: f64, deadline: Option<Instant>) -> CellOutcome {
        let timer = Timer::start();
        let species = self.mech.species_count();
        let outcome = match self.prepare(cell) {
            Ok(gas) => self
                .integrate_prepared(cell, &gas, duration, deadline)
                .unwrap_or_else(|e| CellOutcome::rejected(cell, species, e.to_string())),
            Err(reason) => CellOutcome::rejected(cell, species, reason),
        };
        timer.stop_into(&integrator_timing::CELL);

        match &outcome.status {
            CellStatus::Failed { reason } => warn!(
                temperature = cell.temperature,
                density = cell.density,
                %reason,
                "cell failed"
            ),
            CellStatus::TimedOut => debug!(steps = outcome.stats.accepted_steps, "cell timed out"),
            CellStatus::Converged => {}
        }
        outcome
    }

    /// Validate a cell and convert it into a gas state.
    fn prepare(&self, cell: &CellState) -> Result<GasState, String> {
        let species = self.mech.species_count();
        if cell.mass_fractions.len() != species {
            return Err(format!(
                "expected {species} mass fractions, got {}",
                cell.mass_fractions.len()
            ));
        }
        ensure_positive(cell.temperature, "cell temperature").map_err(|e| e.to_string())?;
        ensure_positive(cell.density, "cell density").map_err(|e| e.to_string())?;
        if cell.mass_fractions.iter().any(|v| !v.is_finite()) {
            return Err("non-finite mass fraction".to_string());
        }

        let tol = self.config.negative_fraction_tolerance;
        let lowest = cell.mass_fractions.iter().copied().fold(f64::INFINITY, f64::min);
        if lowest < -tol {
            return Err(format!("mass fraction {lowest:e} below tolerance"));
        }
        let mut y = cell.mass_fractions.clone();
        let correction = normalize_mass_fractions(&mut y).map_err(|e| e.to_string())?;
        if correction.exceeds(tol) {
            return Err(format!(
                "mass fractions off by {:e} (sum {})",
                correction.max_clamp, correction.sum_before
            ));
        }
        if correction.clamped > 0 {
            warn!(
                clamped = correction.clamped,
                max_clamp = correction.max_clamp,
                "clamped small negative mass fractions"
            );
        }

        let pressure = cell.density * GAS_CONSTANT * cell.temperature / mean_molar_mass(self.mech.molar_masses(), &y);
        GasState::from_mass_fractions(&self.mech, k(cell.temperature), pa(pressure), y).map_err(|e| e.to_string())
    }

    fn integrate_prepared(
        &self,
        cell: &CellState,
        gas: &GasState,
        duration: f64,
        deadline: Option<Instant>,
    ) -> ReactorResult<CellOutcome> {
        let mut ode = ReactorOde::new(&self.mech, self.config.reactor.kind(), gas)?.with_tolerances(
            self.config.temperature_atol,
            self.config.negative_fraction_tolerance,
            FRACTION_TOLERANCE,
        );
        let y0 = ode.state_vector(gas);

        let mut options = self.config.integrator.clone();
        options.deadline = deadline;
        let solver = Bdf2::new(options)?;
        let report = solver.integrate(&mut ode, 0.0, y0.clone(), duration)?;
        Ok(finish(&mut ode, cell, &y0, report))
    }
}

/// Outcome of an integrated cell. Post-processing errors keep the last
/// integrated state and mark the cell failed.
fn finish(ode: &mut ReactorOde<'_>, cell: &CellState, y0: &DVector<f64>, report: IntegrationReport) -> CellOutcome {
    let species = ode.species_count();
    let status = match report.status {
        IntegrationStatus::Completed => CellStatus::Converged,
        IntegrationStatus::TimedOut => CellStatus::TimedOut,
        IntegrationStatus::ConvergenceFailure { reason } => CellStatus::Failed { reason },
        IntegrationStatus::Stopped => CellStatus::Failed {
            reason: "integration stopped early".to_string(),
        },
    };
    let mean_source = if report.t > 0.0 {
        (0..species)
            .map(|i| cell.density * (report.y[i] - y0[i]) / report.t)
            .collect()
    } else {
        vec![0.0; species]
    };

    let rates = ode.gas_state(&report.y).and_then(|end| {
        let production_rates = ode.production_rates(&report.y)?.to_vec();
        let heat_release_rate = ode.heat_release_rate(&report.y)?;
        Ok((end, production_rates, heat_release_rate))
    });
    match rates {
        Ok((end, production_rates, heat_release_rate)) => {
            let density = ode.density_at(end.mass_fractions(), end.temperature_k());
            CellOutcome {
                state: CellState::new(end.temperature_k(), density, end.mass_fractions().to_vec()),
                mean_source,
                production_rates,
                heat_release_rate,
                status,
                stats: report.stats,
            }
        }
        Err(e) => {
            let fractions = report.y.as_slice()[..species].to_vec();
            let temperature = report.y[species];
            let density = ode.density_at(&fractions, temperature);
            CellOutcome::unfinished(
                CellState::new(temperature, density, fractions),
                species,
                format!("end state: {e}"),
                report.stats,
            )
        }
    }
}

fn check_duration(dt: f64) -> BatchResult<()> {
    if !(dt.is_finite() && dt >= 0.0) {
        return Err(BatchError::InvalidArg {
            what: "durations must be finite and non-negative",
        });
    }
    Ok(())
}

/// A batch running on a background thread.
pub struct PendingBatch {
    rx: Receiver<BatchResult<BatchReport>>,
    handle: Option<JoinHandle<()>>,
}

impl PendingBatch {
    /// Block until the batch finishes.
    pub fn wait(mut self) -> BatchResult<BatchReport> {
        let result = self.rx.recv().map_err(|_| BatchError::Disconnected)?;
        self.join();
        result
    }

    /// The result if the batch has finished. Yields it once.
    pub fn try_wait(&mut self) -> Option<BatchResult<BatchReport>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BatchError::Disconnected)),
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
