//! Lightweight performance timing utilities.
//!
//! Timers are inert unless enabled with [`enable_timing`] or the
//! `RF_TIMING` environment variable.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static ENV_ENABLED: OnceLock<bool> = OnceLock::new();

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
        || *ENV_ENABLED.get_or_init(|| std::env::var_os("RF_TIMING").is_some())
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    start: Option<Instant>,
}

impl Timer {
    /// Start a timer; a disabled timer never reads the clock.
    pub fn start() -> Self {
        Self {
            start: is_enabled().then(Instant::now),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        self.start.map(|s| s.elapsed().as_secs_f64())
    }

    /// Stop and add the elapsed time to an accumulator.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(elapsed) = self.stop() {
            acc.record(elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
///
/// Safe to share between worker threads.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Integrator hot-path timers.
pub mod integrator_timing {
    use super::AccumulatingTimer;

    /// Finite-difference Jacobian assembly
    pub static JACOBIAN: AccumulatingTimer = AccumulatingTimer::new();
    /// LU factorisation and solve of the Newton iteration matrix
    pub static LINEAR_SOLVE: AccumulatingTimer = AccumulatingTimer::new();
    /// Whole-cell integrations inside a batch
    pub static CELL: AccumulatingTimer = AccumulatingTimer::new();

    pub fn reset_all() {
        JACOBIAN.reset();
        LINEAR_SOLVE.reset();
        CELL.reset();
    }

    /// One line per timer, empty when timing is disabled.
    pub fn summary() -> String {
        if !super::is_enabled() {
            return String::new();
        }
        let mut out = String::new();
        for (label, timer) in [
            ("jacobian", &JACOBIAN),
            ("linear solve", &LINEAR_SOLVE),
            ("cell", &CELL),
        ] {
            out.push_str(&format!(
                "{label}: {:.3}s total, {} calls, {:.3e}s avg\n",
                timer.total_seconds(),
                timer.count(),
                timer.average_seconds()
            ));
        }
        out
    }
}
