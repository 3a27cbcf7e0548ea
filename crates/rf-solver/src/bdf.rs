//! Variable-step BDF2 integrator.
//!
//! The first step is backward Euler. Later steps use the two-step BDF
//! formula for the actual step ratio ω = h / h_prev:
//!
//! ```text
//! y_{n+1} - a y_n + b y_{n-1} = γ h f(t_{n+1}, y_{n+1})
//! a = (1+ω)² / (1+2ω)    b = ω² / (1+2ω)    γ = (1+ω) / (1+2ω)
//! ```
//!
//! Each implicit stage is solved by Newton iteration on `I - γ h J`.
//! Failed attempts (non-convergence, singular matrix, right-hand side
//! errors, inadmissible states) cut the step back and retry. Converged
//! attempts are also checked against the local truncation error estimate.

use crate::context::{IntegrationContext, IntegrationStats, wrms_norm};
use crate::error::{SolverError, SolverResult};
use crate::jacobian::{central_difference_jacobian, finite_difference_jacobian};
use crate::newton::{NewtonProblem, newton_solve};
use crate::options::{IntegratorOptions, JacobianConfig, JacobianMethod};
use crate::system::OdeSystem;
use nalgebra::{DMatrix, DVector};
use rf_core::timing::{Timer, integrator_timing};
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{debug, warn};

/// How an integration ended.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegrationStatus {
    /// Reached the requested end time
    Completed,
    /// The observer asked to stop
    Stopped,
    /// Retries exhausted; the report holds the last accepted state
    ConvergenceFailure { reason: String },
    /// The deadline passed; the report holds the last accepted state
    TimedOut,
}

#[derive(Clone, Debug)]
pub struct IntegrationReport {
    /// Time of the returned state
    pub t: f64,
    pub y: DVector<f64>,
    pub status: IntegrationStatus,
    pub stats: IntegrationStats,
}

impl IntegrationReport {
    pub fn is_complete(&self) -> bool {
        self.status == IntegrationStatus::Completed
    }
}

/// Adaptive BDF2 integrator.
#[derive(Clone, Debug)]
pub struct Bdf2 {
    options: IntegratorOptions,
}

/// Outcome of one step attempt.
enum Attempt {
    Accepted {
        y: DVector<f64>,
        f: DVector<f64>,
        error: f64,
        exponent: f64,
        iterations: usize,
    },
    ErrorTest {
        error: f64,
        exponent: f64,
    },
    Failed {
        reason: String,
    },
}

impl Bdf2 {
    pub fn new(options: IntegratorOptions) -> SolverResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &IntegratorOptions {
        &self.options
    }

    /// Integrate from `(t0, y0)` to `t_end`.
    pub fn integrate<S: OdeSystem>(
        &self,
        system: &mut S,
        t0: f64,
        y0: DVector<f64>,
        t_end: f64,
    ) -> SolverResult<IntegrationReport> {
        self.integrate_observed(system, t0, y0, t_end, |_, _| ControlFlow::Continue(()))
    }

    /// Integrate, calling `observer` after every accepted step.
    ///
    /// Returning `ControlFlow::Break` from the observer ends the run with
    /// [`IntegrationStatus::Stopped`].
    pub fn integrate_observed<S, O>(
        &self,
        system: &mut S,
        t0: f64,
        y0: DVector<f64>,
        t_end: f64,
        mut observer: O,
    ) -> SolverResult<IntegrationReport>
    where
        S: OdeSystem,
        O: FnMut(f64, &DVector<f64>) -> ControlFlow<()>,
    {
        let opts = &self.options;
        if !t0.is_finite() || !t_end.is_finite() {
            return Err(SolverError::InvalidArg {
                what: "integration interval must be finite",
            });
        }
        if t_end < t0 {
            return Err(SolverError::InvalidArg {
                what: "t_end must not precede t0",
            });
        }
        if y0.len() != system.dim() {
            return Err(SolverError::InvalidArg {
                what: "initial state length must match system dimension",
            });
        }
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::InvalidArg {
                what: "initial state must be finite",
            });
        }

        let mut ctx = IntegrationContext::new(&*system, t0, y0, opts.atol, opts.rtol);
        if t_end == t0 {
            return Ok(finish(ctx, IntegrationStatus::Completed));
        }

        let mut f0 = DVector::zeros(system.dim());
        ctx.stats.rhs_evaluations += 1;
        if let Err(e) = system.rhs(t0, ctx.point(0).1, &mut f0) {
            let reason = format!("right-hand side failed at the initial state: {e}");
            return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
        }
        ctx.f = f0;

        let mut h = opts.initial_step.min(opts.max_step).min(t_end - t0);

        loop {
            let t = ctx.t();
            if t >= t_end {
                return Ok(finish(ctx, IntegrationStatus::Completed));
            }
            if ctx.stats.accepted_steps >= opts.max_steps {
                let reason = format!("step limit of {} reached at t = {t:e}", opts.max_steps);
                return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
            }

            let mut retries = 0;
            let (t_new, y, f, h_taken, fac) = loop {
                if opts.deadline.is_some_and(|d| Instant::now() >= d) {
                    debug!(t, "integration deadline passed");
                    return Ok(finish(ctx, IntegrationStatus::TimedOut));
                }

                let remaining = t_end - t;
                let last = h >= remaining;
                if last {
                    h = remaining;
                } else if h > 0.5 * remaining {
                    h = 0.5 * remaining;
                }
                if h < opts.min_step || t + h <= t {
                    let reason = format!("step size {h:e} underflow at t = {t:e}");
                    return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
                }

                match self.attempt(system, &mut ctx, h) {
                    Attempt::Accepted {
                        y,
                        f,
                        error,
                        exponent,
                        iterations,
                    } => {
                        let mut fac = if !opts.error_control || error <= 0.0 {
                            opts.grow_factor
                        } else {
                            opts.safety * error.powf(-exponent)
                        };
                        fac = fac.clamp(opts.shrink_limit, opts.grow_factor);
                        if iterations > opts.newton.target_iterations || retries > 0 {
                            fac = fac.min(1.0);
                        }
                        let t_new = if last { t_end } else { t + h };
                        break (t_new, y, f, h, fac);
                    }
                    Attempt::ErrorTest { error, exponent } => {
                        ctx.stats.rejected_steps += 1;
                        ctx.stats.error_test_failures += 1;
                        let fac = (opts.safety * error.powf(-exponent))
                            .clamp(opts.shrink_limit, opts.safety);
                        h *= fac;
                    }
                    Attempt::Failed { reason } => {
                        ctx.stats.rejected_steps += 1;
                        h *= opts.cutback_factor;
                        if retries >= opts.max_retries {
                            let reason = format!(
                                "{reason} (gave up after {} retries at t = {t:e})",
                                opts.max_retries
                            );
                            return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
                        }
                        debug!(t, h, %reason, "step attempt failed, cutting back");
                    }
                }
                retries += 1;
                if retries > opts.max_retries {
                    let reason = format!("error test failed {retries} times at t = {t:e}");
                    return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
                }
            };

            let (mut y, mut f) = (y, f);
            match system.project(&mut y) {
                Ok(p) => {
                    if p.magnitude > 0.0 {
                        ctx.stats.projections += 1;
                        ctx.stats.rhs_evaluations += 1;
                        if let Err(e) = system.rhs(t_new, &y, &mut f) {
                            let reason = format!("right-hand side failed at the projected state, t = {t_new:e}: {e}");
                            return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
                        }
                    }
                    if p.exceeded_tolerance {
                        warn!(t = t_new, correction = p.magnitude, "large correction applied to accepted state");
                    }
                }
                Err(e) => {
                    let reason = format!("projection failed at t = {t_new:e}: {e}");
                    return Ok(finish(ctx, IntegrationStatus::ConvergenceFailure { reason }));
                }
            }

            ctx.stats.accepted_steps += 1;
            ctx.stats.last_step = h_taken;
            ctx.accept(t_new, y, f);
            h = (h_taken * fac).min(opts.max_step);

            if observer(t_new, ctx.point(0).1).is_break() {
                return Ok(finish(ctx, IntegrationStatus::Stopped));
            }
        }
    }

    fn attempt<S: OdeSystem>(&self, system: &mut S, ctx: &mut IntegrationContext, h: f64) -> Attempt {
        let opts = &self.options;
        let (t_n, y_n) = ctx.point(0);
        let y_n = y_n.clone();
        let t_new = t_n + h;

        // Implicit stage y - base = gamma * h * f(t_new, y) and a predictor.
        let (base, gamma, predictor) = match ctx.len() {
            1 => (y_n.clone(), 1.0, &y_n + &ctx.f * h),
            len => {
                let (t_1, y_1) = ctx.point(1);
                let h1 = t_n - t_1;
                let w = h / h1;
                let a = (1.0 + w).powi(2) / (1.0 + 2.0 * w);
                let b = w * w / (1.0 + 2.0 * w);
                let gamma = (1.0 + w) / (1.0 + 2.0 * w);
                let base = &y_n * a - y_1 * b;
                let predictor = if len >= 3 {
                    let (t_2, y_2) = ctx.point(2);
                    let h2 = t_1 - t_2;
                    let d1 = h + h1;
                    let d2 = h + h1 + h2;
                    let l0 = d1 * d2 / (h1 * (h1 + h2));
                    let l1 = -h * d2 / (h1 * h2);
                    let l2 = h * d1 / ((h1 + h2) * h2);
                    &y_n * l0 + y_1 * l1 + y_2 * l2
                } else {
                    &y_n + (&y_n - y_1) * w
                };
                (base, gamma, predictor)
            }
        };

        let mut stage = StageProblem {
            system: &mut *system,
            t: t_new,
            gamma_h: gamma * h,
            base: &base,
            atol: &ctx.atol,
            rtol: ctx.rtol,
            scale: &ctx.scale,
            jacobian: &opts.jacobian,
            stats: &mut ctx.stats,
            cached: None,
        };

        let result = match newton_solve(&mut stage, predictor.clone(), &opts.newton) {
            Ok(result) => result,
            Err(e) => {
                ctx.stats.newton_failures += 1;
                return Attempt::Failed {
                    reason: format!("stage evaluation failed: {e}"),
                };
            }
        };
        ctx.stats.newton_iterations += result.iterations;
        if !result.converged {
            ctx.stats.newton_failures += 1;
            return Attempt::Failed {
                reason: format!("newton iteration failed: {:?}", result.failure),
            };
        }

        let y = result.x;
        if y.iter().any(|v| !v.is_finite()) || !system.is_admissible(&y) {
            return Attempt::Failed {
                reason: "inadmissible state".to_string(),
            };
        }

        let mut f = DVector::zeros(y.len());
        ctx.stats.rhs_evaluations += 1;
        if let Err(e) = system.rhs(t_new, &y, &mut f) {
            return Attempt::Failed {
                reason: format!("right-hand side failed at the new state: {e}"),
            };
        }

        let iterations = result.iterations;
        if !opts.error_control {
            return Attempt::Accepted {
                y,
                f,
                error: 0.0,
                exponent: 0.5,
                iterations,
            };
        }

        let (estimate, exponent) = if ctx.len() >= 3 {
            let (t_1, _) = ctx.point(1);
            let (t_2, _) = ctx.point(2);
            let d1 = t_new - t_1;
            let d2 = t_new - t_2;
            let c = (4.0 / 3.0) * h * h / (d1 * d2);
            ((&y - &predictor) * c, 1.0 / 3.0)
        } else {
            ((&f - &ctx.f) * (0.5 * h), 0.5)
        };
        let error = wrms_norm(&estimate, &ctx.atol, ctx.rtol, |i| y_n[i].abs().max(y[i].abs()));

        if error > 1.0 {
            Attempt::ErrorTest { error, exponent }
        } else {
            Attempt::Accepted {
                y,
                f,
                error,
                exponent,
                iterations,
            }
        }
    }
}

fn finish(ctx: IntegrationContext, status: IntegrationStatus) -> IntegrationReport {
    let (t, y, stats) = ctx.into_latest();
    IntegrationReport { t, y, status, stats }
}

/// Newton problem for one implicit stage: G(y) = y - base - γh f(t, y).
struct StageProblem<'a, S: OdeSystem> {
    system: &'a mut S,
    t: f64,
    gamma_h: f64,
    base: &'a DVector<f64>,
    atol: &'a [f64],
    rtol: f64,
    scale: &'a [f64],
    jacobian: &'a JacobianConfig,
    stats: &'a mut IntegrationStats,
    /// f at the last residual point
    cached: Option<(DVector<f64>, DVector<f64>)>,
}

impl<S: OdeSystem> StageProblem<'_, S> {
    fn eval(&mut self, y: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let mut f = DVector::zeros(y.len());
        self.stats.rhs_evaluations += 1;
        self.system.rhs(self.t, y, &mut f)?;
        Ok(f)
    }
}

impl<S: OdeSystem> NewtonProblem for StageProblem<'_, S> {
    fn residual(&mut self, y: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let f = self.eval(y)?;
        let g = y - self.base - &f * self.gamma_h;
        self.cached = Some((y.clone(), f));
        Ok(g)
    }

    fn iteration_matrix(&mut self, y: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
        let f_y = match self.cached.take() {
            Some((at, f)) if at == *y => f,
            _ => self.eval(y)?,
        };

        let timer = Timer::start();
        let system = &mut *self.system;
        let stats = &mut *self.stats;
        let t = self.t;
        let rhs = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            let mut out = DVector::zeros(x.len());
            stats.rhs_evaluations += 1;
            system.rhs(t, x, &mut out)?;
            Ok(out)
        };
        let jac = match self.jacobian.method {
            JacobianMethod::Forward => {
                finite_difference_jacobian(y, &f_y, rhs, self.jacobian.epsilon, self.scale)
            }
            JacobianMethod::Central => {
                central_difference_jacobian(y, rhs, self.jacobian.epsilon, self.scale)
            }
        };
        timer.stop_into(&integrator_timing::JACOBIAN);
        let jac = jac?;
        self.stats.jacobian_evaluations += 1;

        let n = y.len();
        Ok(DMatrix::identity(n, n) - jac * self.gamma_h)
    }

    fn update_norm(&self, dx: &DVector<f64>, y: &DVector<f64>) -> f64 {
        wrms_norm(dx, self.atol, self.rtol, |i| y[i].abs())
    }
}
