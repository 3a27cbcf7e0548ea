//! Newton iteration for implicit stages.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use rf_core::timing::{Timer, integrator_timing};

/// Newton solver configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Iterations beyond which the integrator will not grow the step
    pub target_iterations: usize,
    /// Convergence threshold on the weighted update norm
    pub tolerance: f64,
    /// Stop when an update grows by more than this factor over the previous one
    pub divergence_ratio: f64,
    /// Rebuild the iteration matrix every iteration (full Newton). When
    /// false the matrix from the first iteration is reused.
    pub refresh_jacobian: bool,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            target_iterations: 3,
            tolerance: 0.1,
            divergence_ratio: 2.0,
            refresh_jacobian: true,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> SolverResult<()> {
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidArg {
                what: "newton max_iterations must be positive",
            });
        }
        if !(self.tolerance > 0.0 && self.divergence_ratio > 1.0) {
            return Err(SolverError::InvalidArg {
                what: "newton tolerance must be positive and divergence_ratio > 1",
            });
        }
        Ok(())
    }
}

/// Why an iteration stopped without converging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewtonFailure {
    MaxIterations,
    Diverged,
    SingularMatrix,
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Final iterate
    pub x: DVector<f64>,
    /// Weighted norm of the last update
    pub update_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Converged flag
    pub converged: bool,
    pub failure: Option<NewtonFailure>,
}

/// A nonlinear system G(x) = 0 with its iteration matrix dG/dx.
pub trait NewtonProblem {
    fn residual(&mut self, x: &DVector<f64>) -> SolverResult<DVector<f64>>;

    fn iteration_matrix(&mut self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>>;

    /// Norm used for the convergence test; `x` is the updated iterate.
    fn update_norm(&self, dx: &DVector<f64>, _x: &DVector<f64>) -> f64 {
        dx.amax()
    }
}

fn stopped(x: DVector<f64>, update_norm: f64, iterations: usize, why: NewtonFailure) -> NewtonResult {
    NewtonResult {
        x,
        update_norm,
        iterations,
        converged: false,
        failure: Some(why),
    }
}

/// Newton iteration from `x0`.
///
/// Non-convergence is reported in the result; errors raised by the problem
/// itself are propagated.
pub fn newton_solve<P: NewtonProblem>(
    problem: &mut P,
    x0: DVector<f64>,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult> {
    let mut x = x0;
    let mut lu = None;
    let mut previous: Option<f64> = None;
    let mut norm = f64::INFINITY;

    for iter in 1..=config.max_iterations {
        let r = problem.residual(&x)?;

        if lu.is_none() || config.refresh_jacobian {
            let m = problem.iteration_matrix(&x)?;
            let timer = Timer::start();
            lu = Some(m.lu());
            timer.stop_into(&integrator_timing::LINEAR_SOLVE);
        }
        let Some(factor) = lu.as_ref() else {
            return Ok(stopped(x, norm, iter, NewtonFailure::SingularMatrix));
        };

        let timer = Timer::start();
        let solved = factor.solve(&(-r));
        timer.stop_into(&integrator_timing::LINEAR_SOLVE);

        let dx = match solved {
            Some(dx) if dx.iter().all(|v| v.is_finite()) => dx,
            _ => return Ok(stopped(x, norm, iter, NewtonFailure::SingularMatrix)),
        };

        x += &dx;
        norm = problem.update_norm(&dx, &x);

        if norm <= config.tolerance {
            return Ok(NewtonResult {
                x,
                update_norm: norm,
                iterations: iter,
                converged: true,
                failure: None,
            });
        }
        if let Some(prev) = previous {
            if norm > config.divergence_ratio * prev {
                return Ok(stopped(x, norm, iter, NewtonFailure::Diverged));
            }
        }
        previous = Some(norm);
    }

    Ok(stopped(x, norm, config.max_iterations, NewtonFailure::MaxIterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        matrix_builds: usize,
    }

    impl NewtonProblem for Quadratic {
        fn residual(&mut self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        }

        fn iteration_matrix(&mut self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
            self.matrix_builds += 1;
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        }
    }

    #[test]
    fn simple_quadratic() {
        // Solve x^2 - 4 = 0, x > 0
        let mut problem = Quadratic { matrix_builds: 0 };
        let config = NewtonConfig {
            max_iterations: 20,
            tolerance: 1e-10,
            ..NewtonConfig::default()
        };
        let result = newton_solve(&mut problem, DVector::from_element(1, 3.0), &config).unwrap();

        assert!(result.converged);
        assert!((result.x[0] - 2.0).abs() < 1e-9);
        assert_eq!(problem.matrix_builds, result.iterations);
    }

    #[test]
    fn modified_newton_reuses_matrix() {
        let mut problem = Quadratic { matrix_builds: 0 };
        let config = NewtonConfig {
            max_iterations: 50,
            tolerance: 1e-10,
            refresh_jacobian: false,
            ..NewtonConfig::default()
        };
        let result = newton_solve(&mut problem, DVector::from_element(1, 2.5), &config).unwrap();

        assert!(result.converged);
        assert!((result.x[0] - 2.0).abs() < 1e-9);
        assert_eq!(problem.matrix_builds, 1);
    }

    #[test]
    fn iteration_limit_is_reported() {
        let mut problem = Quadratic { matrix_builds: 0 };
        let config = NewtonConfig {
            max_iterations: 2,
            tolerance: 1e-14,
            ..NewtonConfig::default()
        };
        let result = newton_solve(&mut problem, DVector::from_element(1, 100.0), &config).unwrap();

        assert!(!result.converged);
        assert_eq!(result.failure, Some(NewtonFailure::MaxIterations));
    }

    struct Singular;

    impl NewtonProblem for Singular {
        fn residual(&mut self, _x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(2, 1.0))
        }

        fn iteration_matrix(&mut self, _x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::zeros(2, 2))
        }
    }

    #[test]
    fn singular_matrix_is_reported() {
        let result = newton_solve(&mut Singular, DVector::zeros(2), &NewtonConfig::default()).unwrap();
        assert_eq!(result.failure, Some(NewtonFailure::SingularMatrix));
    }
}
