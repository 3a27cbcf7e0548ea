//! Reactor runner and trace recording.

use crate::error::{ReactorError, ReactorResult};
use crate::model::ReactorKind;
use crate::ode::ReactorOde;
use crate::state::{FRACTION_TOLERANCE, GasState};
use rf_mech::Mechanism;
use rf_solver::{Bdf2, IntegrationStats, IntegrationStatus, IntegratorOptions};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

/// Options for reactor runs.
#[derive(Clone, Debug)]
pub struct ReactorOptions {
    pub integrator: IntegratorOptions,
    /// Record every N-th accepted step (decimation)
    pub record_every: usize,
    /// Absolute tolerance on temperature (K)
    pub temperature_atol: f64,
    /// Most negative mass fraction a converged step may produce
    pub negative_tolerance: f64,
}

impl Default for ReactorOptions {
    fn default() -> Self {
        Self {
            integrator: IntegratorOptions::default(),
            record_every: 1,
            temperature_atol: 1e-6,
            negative_tolerance: 1e-8,
        }
    }
}

/// Recorded trajectory.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReactorRecord {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// Temperature (K)
    pub temperature: Vec<f64>,
    /// Pressure (Pa)
    pub pressure: Vec<f64>,
    /// Mass fractions per time point
    pub mass_fractions: Vec<Vec<f64>>,
}

impl ReactorRecord {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    fn push(&mut self, t: f64, temperature: f64, pressure: f64, fractions: &[f64]) {
        self.t.push(t);
        self.temperature.push(temperature);
        self.pressure.push(pressure);
        self.mass_fractions.push(fractions.to_vec());
    }
}

/// Result of [`Reactor::advance`].
#[derive(Clone, Debug)]
pub struct ReactorRun {
    pub record: ReactorRecord,
    /// Time reached
    pub t: f64,
    pub final_state: GasState,
    pub status: IntegrationStatus,
    pub stats: IntegrationStats,
}

impl ReactorRun {
    pub fn is_complete(&self) -> bool {
        self.status == IntegrationStatus::Completed
    }
}

/// One accepted point of a running integration.
#[derive(Clone, Copy, Debug)]
pub struct Sample<'a> {
    pub t: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub mass_fractions: &'a [f64],
}

/// A zero-dimensional reactor with its own clock.
#[derive(Clone, Debug)]
pub struct Reactor {
    mech: Arc<Mechanism>,
    kind: ReactorKind,
    /// Reference state fixing pressure (isobaric) or density (constant volume)
    reference: GasState,
    state: GasState,
    time: f64,
    /// Counters summed over every advance
    stats: IntegrationStats,
}

impl Reactor {
    pub fn new(mech: Arc<Mechanism>, kind: ReactorKind, initial: GasState) -> ReactorResult<Self> {
        // validates the pairing of kind, mechanism and state
        ReactorOde::new(&mech, kind.clone(), &initial)?;
        Ok(Self {
            mech,
            kind,
            reference: initial.clone(),
            state: initial,
            time: 0.0,
            stats: IntegrationStats::default(),
        })
    }

    pub fn mechanism(&self) -> &Arc<Mechanism> {
        &self.mech
    }

    pub fn kind(&self) -> &ReactorKind {
        &self.kind
    }

    /// Current state
    pub fn state(&self) -> &GasState {
        &self.state
    }

    /// Current time (s)
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Solver work over the reactor's whole history.
    pub fn total_stats(&self) -> &IntegrationStats {
        &self.stats
    }

    /// Integrate from the current time to `t_end`.
    pub fn advance(&mut self, t_end: f64, options: &ReactorOptions) -> ReactorResult<ReactorRun> {
        self.advance_observed(t_end, options, |_| ControlFlow::Continue(()))
    }

    /// Like [`advance`](Self::advance), calling `observer` after every
    /// accepted step; `ControlFlow::Break` ends the run early.
    pub fn advance_observed<O>(&mut self, t_end: f64, options: &ReactorOptions, mut observer: O) -> ReactorResult<ReactorRun>
    where
        O: FnMut(&Sample<'_>) -> ControlFlow<()>,
    {
        if options.record_every == 0 {
            return Err(ReactorError::InvalidArg {
                what: "record_every must be positive",
            });
        }
        if !(t_end.is_finite() && t_end >= self.time) {
            return Err(ReactorError::InvalidArg {
                what: "t_end must not precede the reactor time",
            });
        }

        let mech = Arc::clone(&self.mech);
        let mut ode = ReactorOde::new(&mech, self.kind.clone(), &self.reference)?.with_tolerances(
            options.temperature_atol,
            options.negative_tolerance,
            FRACTION_TOLERANCE,
        );
        let n = ode.species_count();
        let y0 = ode.state_vector(&self.state);
        let solver = Bdf2::new(options.integrator.clone())?;

        let mut record = ReactorRecord::default();
        record.push(
            self.time,
            self.state.temperature_k(),
            self.state.pressure_pa(),
            self.state.mass_fractions(),
        );

        let mut step = 0usize;
        let mut last_recorded = 0usize;
        let mut last_point: Option<(f64, Vec<f64>)> = None;
        // `ode` is mutably borrowed by the solver for the whole run
        let pressure_rule = PressureRule::of(&ode);
        let report = solver.integrate_observed(&mut ode, self.time, y0, t_end, |t, y| {
            step += 1;
            let fractions = &y.as_slice()[..n];
            let temperature = y[n];
            let pressure = pressure_rule.pressure(&mech, fractions, temperature);
            if step % options.record_every == 0 {
                record.push(t, temperature, pressure, fractions);
                last_recorded = step;
            } else {
                last_point = Some((t, y.as_slice().to_vec()));
            }
            observer(&Sample {
                t,
                temperature,
                pressure,
                mass_fractions: fractions,
            })
        })?;

        // Always record the final state
        if last_recorded != step {
            if let Some((t, y)) = last_point {
                let pressure = pressure_rule.pressure(&mech, &y[..n], y[n]);
                record.push(t, y[n], pressure, &y[..n]);
            }
        }

        let final_state = ode.gas_state(&report.y)?;
        debug!(
            kind = self.kind.label(),
            t = report.t,
            temperature = final_state.temperature_k(),
            steps = report.stats.accepted_steps,
            status = ?report.status,
            "reactor advanced"
        );

        self.time = report.t;
        self.state = final_state.clone();
        self.stats.absorb(&report.stats);
        Ok(ReactorRun {
            record,
            t: report.t,
            final_state,
            status: report.status,
            stats: report.stats,
        })
    }
}

/// How pressure follows from a state in the recorder.
#[derive(Clone, Copy, Debug)]
enum PressureRule {
    Fixed(f64),
    Density(f64),
}

impl PressureRule {
    fn of(ode: &ReactorOde<'_>) -> Self {
        if ode.kind().is_isobaric() {
            Self::Fixed(ode.reference_pressure())
        } else {
            Self::Density(ode.reference_density())
        }
    }

    fn pressure(self, mech: &Mechanism, y: &[f64], temperature: f64) -> f64 {
        match self {
            Self::Fixed(p) => p,
            Self::Density(rho) => crate::state::pressure_from_density(mech, rho, temperature, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{atm, k};
    use rf_mech::{MechanismBuilder, Nasa7, Species};

    #[test]
    fn reactor_options_defaults() {
        let opts = ReactorOptions::default();
        assert_eq!(opts.record_every, 1);
        assert_eq!(opts.temperature_atol, 1e-6);
        assert_eq!(opts.integrator.atol, 1e-12);
        assert_eq!(opts.integrator.rtol, 1e-6);
    }

    #[test]
    fn repeated_advances_accumulate_solver_work() {
        let mono = Nasa7::single_range(200.0, 6000.0, [2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 4.366]);
        let mut b = MechanismBuilder::new("argon");
        b.add_species(Species::new("AR", [("Ar", 1.0)], mono).unwrap());
        let mech = b.build().unwrap();
        let initial = GasState::from_mass_fractions(&mech, k(600.0), atm(1.0), vec![1.0]).unwrap();
        let mut reactor = Reactor::new(mech, ReactorKind::ConstantPressure, initial).unwrap();

        let options = ReactorOptions::default();
        let first = reactor.advance(1e-4, &options).unwrap();
        let second = reactor.advance(2e-4, &options).unwrap();
        assert!(first.is_complete() && second.is_complete());
        assert_eq!(reactor.time(), 2e-4);
        let total = reactor.total_stats();
        assert_eq!(total.accepted_steps, first.stats.accepted_steps + second.stats.accepted_steps);
        assert_eq!(total.rhs_evaluations, first.stats.rhs_evaluations + second.stats.rhs_evaluations);
        assert!(total.accepted_steps > 0);
    }
}
