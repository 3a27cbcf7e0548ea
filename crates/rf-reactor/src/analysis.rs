//! Derived quantities of 0-D runs: ignition delay and extinction residence time.
//!
//! Both depend only on the mechanism and the thermochemical conditions, so
//! mechanism-reduction tools can call them to compare a reduced mechanism
//! against the full one.

use crate::error::{ReactorError, ReactorResult};
use crate::model::ReactorKind;
use crate::sim::{Reactor, ReactorOptions, Sample};
use crate::state::GasState;
use rf_mech::Mechanism;
use rf_solver::{IntegrationStats, IntegrationStatus};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info};

/// When the mixture counts as ignited.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IgnitionCriterion {
    /// First time T exceeds T0 + ΔT (K), linearly interpolated between steps
    TemperatureRise(f64),
    /// Time of the largest dT/dt
    MaxTemperatureRate,
}

impl Default for IgnitionCriterion {
    fn default() -> Self {
        Self::TemperatureRise(400.0)
    }
}

#[derive(Clone, Debug)]
pub struct IgnitionOptions {
    pub criterion: IgnitionCriterion,
    /// Give up when nothing happens before this time (s)
    pub t_end: f64,
    /// End the integration once the criterion is decided
    pub stop_at_ignition: bool,
    pub reactor: ReactorOptions,
}

impl Default for IgnitionOptions {
    fn default() -> Self {
        Self {
            criterion: IgnitionCriterion::default(),
            t_end: 0.1,
            stop_at_ignition: true,
            reactor: ReactorOptions::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IgnitionResult {
    /// Ignition delay (s)
    pub delay: f64,
    /// Temperature at the step that decided ignition (K)
    pub temperature: f64,
    /// Largest dT/dt seen (K/s)
    pub max_temperature_rate: f64,
    pub final_state: GasState,
    pub stats: IntegrationStats,
}

/// Tracks the ignition criterion over accepted samples.
struct IgnitionTracker {
    criterion: IgnitionCriterion,
    initial_temperature: f64,
    previous: (f64, f64),
    delay: Option<f64>,
    temperature: f64,
    max_rate: f64,
    max_rate_time: f64,
}

impl IgnitionTracker {
    fn new(criterion: IgnitionCriterion, t0: f64, temperature: f64) -> Self {
        Self {
            criterion,
            initial_temperature: temperature,
            previous: (t0, temperature),
            delay: None,
            temperature,
            max_rate: 0.0,
            max_rate_time: t0,
        }
    }

    /// Returns true once the criterion is decided.
    fn observe(&mut self, t: f64, temperature: f64) -> bool {
        let (t_prev, temp_prev) = self.previous;
        self.previous = (t, temperature);
        let dt = t - t_prev;
        if dt <= 0.0 {
            return self.delay.is_some();
        }
        let rate = (temperature - temp_prev) / dt;
        if rate > self.max_rate {
            self.max_rate = rate;
            self.max_rate_time = 0.5 * (t + t_prev);
            if self.criterion == IgnitionCriterion::MaxTemperatureRate {
                self.temperature = temperature;
            }
        }

        match self.criterion {
            IgnitionCriterion::TemperatureRise(rise) => {
                let target = self.initial_temperature + rise;
                if self.delay.is_none() && temperature >= target {
                    let frac = (target - temp_prev) / (temperature - temp_prev);
                    self.delay = Some(t_prev + frac.clamp(0.0, 1.0) * dt);
                    self.temperature = temperature;
                }
                self.delay.is_some()
            }
            IgnitionCriterion::MaxTemperatureRate => {
                // past the peak once the rate has collapsed after a real rise
                let risen = temperature - self.initial_temperature > 100.0;
                if risen && self.max_rate > 0.0 && rate < 1e-2 * self.max_rate {
                    self.delay = Some(self.max_rate_time);
                }
                self.delay.is_some()
            }
        }
    }

    fn finish(&mut self) -> Option<f64> {
        if self.delay.is_none()
            && self.criterion == IgnitionCriterion::MaxTemperatureRate
            && self.previous.1 - self.initial_temperature > 100.0
        {
            self.delay = Some(self.max_rate_time);
        }
        self.delay
    }
}

/// Ignition delay of a closed reactor started from `initial`.
pub fn ignition_delay(
    mech: Arc<Mechanism>,
    kind: ReactorKind,
    initial: GasState,
    options: &IgnitionOptions,
) -> ReactorResult<IgnitionResult> {
    if matches!(kind, ReactorKind::Stirred(_)) {
        return Err(ReactorError::InvalidArg {
            what: "ignition delay needs a closed reactor",
        });
    }
    if let IgnitionCriterion::TemperatureRise(rise) = options.criterion {
        if !(rise.is_finite() && rise > 0.0) {
            return Err(ReactorError::InvalidArg {
                what: "temperature rise must be positive",
            });
        }
    }

    let mut tracker = IgnitionTracker::new(options.criterion, 0.0, initial.temperature_k());
    let mut reactor = Reactor::new(mech, kind, initial)?;
    let stop = options.stop_at_ignition;
    let run = reactor.advance_observed(options.t_end, &options.reactor, |s: &Sample<'_>| {
        if tracker.observe(s.t, s.temperature) && stop {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if let IntegrationStatus::ConvergenceFailure { reason } = &run.status {
        return Err(ReactorError::Analysis {
            what: format!("integration failed before ignition was decided: {reason}"),
        });
    }
    let Some(delay) = tracker.finish() else {
        return Err(ReactorError::Analysis {
            what: format!("no ignition within {:e} s", options.t_end),
        });
    };

    info!(delay, criterion = ?options.criterion, steps = run.stats.accepted_steps, "ignition delay");
    Ok(IgnitionResult {
        delay,
        temperature: tracker.temperature,
        max_temperature_rate: tracker.max_rate,
        final_state: run.final_state,
        stats: run.stats,
    })
}

#[derive(Clone, Debug)]
pub struct ExtinctionOptions {
    /// First residence time tried; must give a burning solution (s)
    pub initial_residence_time: f64,
    /// Temperature of the first burning guess (K)
    pub ignition_temperature: f64,
    /// Integration length in units of τ
    pub residence_times: f64,
    /// τ multiplier of the continuation sweep
    pub reduction_factor: f64,
    /// Burning means T > T_in + this (K)
    pub burning_rise: f64,
    /// Bisection stops when hi / lo < 1 + this
    pub relative_tolerance: f64,
    /// Sweep stops (error) below this τ
    pub min_residence_time: f64,
    pub reactor: ReactorOptions,
}

impl Default for ExtinctionOptions {
    fn default() -> Self {
        let mut reactor = ReactorOptions::default();
        reactor.integrator.rtol = 1e-5;
        reactor.record_every = usize::MAX;
        Self {
            initial_residence_time: 1e-3,
            ignition_temperature: 2200.0,
            residence_times: 20.0,
            reduction_factor: 0.5,
            burning_rise: 200.0,
            relative_tolerance: 0.05,
            min_residence_time: 1e-9,
            reactor,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtinctionResult {
    /// Smallest residence time with a burning solution found (s)
    pub residence_time: f64,
    /// Largest residence time found to extinguish (s)
    pub extinguished_at: f64,
    /// Steady burning state at `residence_time`
    pub burning_state: GasState,
    /// (τ, steady T) of every solution computed, in order
    pub history: Vec<(f64, f64)>,
}

/// Steady stirred-reactor temperature reached from `start` at residence time `tau`.
fn stirred_solution(
    mech: &Arc<Mechanism>,
    feed: &GasState,
    tau: f64,
    start: GasState,
    options: &ExtinctionOptions,
) -> ReactorResult<GasState> {
    let kind = ReactorKind::stirred(tau, feed.temperature_k(), feed.mass_fractions().to_vec());
    let mut reactor = Reactor::new(Arc::clone(mech), kind, start)?;
    let run = reactor.advance(options.residence_times * tau, &options.reactor)?;
    if let IntegrationStatus::ConvergenceFailure { reason } = run.status {
        return Err(ReactorError::Analysis {
            what: format!("stirred reactor at tau = {tau:e} failed: {reason}"),
        });
    }
    Ok(run.final_state)
}

/// Residence time below which a stirred reactor fed with `feed` blows out.
///
/// Starts from a hot guess at `initial_residence_time`, follows the burning
/// branch by geometric reduction of τ (each solution seeds the next), then
/// bisects the bracket between the last burning and first extinguished τ.
pub fn extinction_residence_time(
    mech: Arc<Mechanism>,
    feed: &GasState,
    options: &ExtinctionOptions,
) -> ReactorResult<ExtinctionResult> {
    if !(options.reduction_factor > 0.0 && options.reduction_factor < 1.0) {
        return Err(ReactorError::InvalidArg {
            what: "reduction_factor must lie in (0, 1)",
        });
    }
    if !(options.initial_residence_time > 0.0 && options.residence_times > 0.0) {
        return Err(ReactorError::InvalidArg {
            what: "residence times must be positive",
        });
    }
    let threshold = feed.temperature_k() + options.burning_rise;
    let burning = |s: &GasState| s.temperature_k() > threshold;
    let mut history = Vec::new();

    let hot = GasState::from_raw(
        options.ignition_temperature,
        feed.pressure_pa(),
        feed.mass_fractions().to_vec(),
    )?;
    let mut tau_hi = options.initial_residence_time;
    let mut state_hi = stirred_solution(&mech, feed, tau_hi, hot, options)?;
    history.push((tau_hi, state_hi.temperature_k()));
    if !burning(&state_hi) {
        return Err(ReactorError::Analysis {
            what: format!("no burning solution at tau = {tau_hi:e}"),
        });
    }

    // sweep down the burning branch
    let mut tau_lo = loop {
        let tau = tau_hi * options.reduction_factor;
        if tau < options.min_residence_time {
            return Err(ReactorError::Analysis {
                what: format!("still burning at tau = {tau_hi:e}"),
            });
        }
        let state = stirred_solution(&mech, feed, tau, state_hi.clone(), options)?;
        history.push((tau, state.temperature_k()));
        debug!(tau, temperature = state.temperature_k(), "extinction sweep");
        if burning(&state) {
            tau_hi = tau;
            state_hi = state;
        } else {
            break tau;
        }
    };

    while tau_hi / tau_lo > 1.0 + options.relative_tolerance {
        let tau = (tau_hi * tau_lo).sqrt();
        let state = stirred_solution(&mech, feed, tau, state_hi.clone(), options)?;
        history.push((tau, state.temperature_k()));
        if burning(&state) {
            tau_hi = tau;
            state_hi = state;
        } else {
            tau_lo = tau;
        }
    }

    info!(
        residence_time = tau_hi,
        temperature = state_hi.temperature_k(),
        solutions = history.len(),
        "extinction residence time"
    );
    Ok(ExtinctionResult {
        residence_time: tau_hi,
        extinguished_at: tau_lo,
        burning_state: state_hi,
        history,
    })
}
