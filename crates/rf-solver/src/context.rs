//! Per-integration state: accepted history, tolerances and counters.

use crate::system::OdeSystem;
use nalgebra::DVector;
use std::collections::VecDeque;

/// Work counters for one integration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegrationStats {
    pub accepted_steps: usize,
    /// Attempts discarded for any reason
    pub rejected_steps: usize,
    pub newton_iterations: usize,
    /// Attempts whose Newton iteration did not converge
    pub newton_failures: usize,
    /// Attempts that converged but failed the local error test
    pub error_test_failures: usize,
    pub rhs_evaluations: usize,
    pub jacobian_evaluations: usize,
    /// Accepted states the system had to correct
    pub projections: usize,
    /// Size of the last accepted step
    pub last_step: f64,
}

impl IntegrationStats {
    /// Adds another integration's counters; `last_step` follows the newer run.
    pub fn absorb(&mut self, other: &IntegrationStats) {
        self.accepted_steps += other.accepted_steps;
        self.rejected_steps += other.rejected_steps;
        self.newton_iterations += other.newton_iterations;
        self.newton_failures += other.newton_failures;
        self.error_test_failures += other.error_test_failures;
        self.rhs_evaluations += other.rhs_evaluations;
        self.jacobian_evaluations += other.jacobian_evaluations;
        self.projections += other.projections;
        if other.accepted_steps > 0 {
            self.last_step = other.last_step;
        }
    }
}

/// Most accepted points kept for the predictor.
const HISTORY: usize = 3;

pub(crate) struct IntegrationContext {
    /// Accepted (t, y), newest last
    history: VecDeque<(f64, DVector<f64>)>,
    /// f at the newest accepted point
    pub f: DVector<f64>,
    pub atol: Vec<f64>,
    pub rtol: f64,
    pub scale: Vec<f64>,
    pub stats: IntegrationStats,
}

impl IntegrationContext {
    pub fn new<S: OdeSystem>(system: &S, t0: f64, y0: DVector<f64>, atol: f64, rtol: f64) -> Self {
        let n = y0.len();
        let mut history = VecDeque::with_capacity(HISTORY + 1);
        history.push_back((t0, y0));
        Self {
            history,
            f: DVector::zeros(n),
            atol: (0..n).map(|i| system.absolute_tolerance(i, atol)).collect(),
            rtol,
            scale: (0..n).map(|i| system.perturbation_scale(i)).collect(),
            stats: IntegrationStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// The `back`-th most recent accepted point (0 is the newest).
    pub fn point(&self, back: usize) -> (f64, &DVector<f64>) {
        let (t, y) = &self.history[self.history.len() - 1 - back];
        (*t, y)
    }

    pub fn t(&self) -> f64 {
        self.point(0).0
    }

    pub fn accept(&mut self, t: f64, y: DVector<f64>, f: DVector<f64>) {
        self.history.push_back((t, y));
        if self.history.len() > HISTORY {
            self.history.pop_front();
        }
        self.f = f;
    }

    pub fn into_latest(mut self) -> (f64, DVector<f64>, IntegrationStats) {
        let (t, y) = self
            .history
            .pop_back()
            .unwrap_or_else(|| (0.0, DVector::zeros(0)));
        (t, y, self.stats)
    }
}

/// Weighted RMS norm of `v` with weights `1 / (atol_i + rtol * r_i)`.
pub(crate) fn wrms_norm<R>(v: &DVector<f64>, atol: &[f64], rtol: f64, reference: R) -> f64
where
    R: Fn(usize) -> f64,
{
    let n = v.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = v
        .iter()
        .enumerate()
        .map(|(i, vi)| {
            let w = atol[i] + rtol * reference(i);
            (vi / w).powi(2)
        })
        .sum();
    (sum / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrms_weights_each_component() {
        let v = DVector::from_vec(vec![1e-6, 2e-6]);
        let norm = wrms_norm(&v, &[1e-6, 1e-6], 1.0, |i| [0.0, 1e-6][i]);
        // components scale to 1.0 and 1.0
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn absorb_adds_counters() {
        let mut a = IntegrationStats {
            accepted_steps: 2,
            rhs_evaluations: 10,
            last_step: 1e-3,
            ..Default::default()
        };
        let b = IntegrationStats {
            accepted_steps: 1,
            rhs_evaluations: 5,
            last_step: 2e-3,
            ..Default::default()
        };
        a.absorb(&b);
        assert_eq!(a.accepted_steps, 3);
        assert_eq!(a.rhs_evaluations, 15);
        assert_eq!(a.last_step, 2e-3);
    }
}
