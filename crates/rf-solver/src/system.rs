//! The ODE system seen by the integrator.

use crate::error::SolverResult;
use nalgebra::DVector;

/// Result of [`OdeSystem::project`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Projection {
    /// Largest change applied to any component
    pub magnitude: f64,
    /// The correction was larger than the system tolerates silently
    pub exceeded_tolerance: bool,
}

/// dy/dt = f(t, y) with a fixed state dimension.
///
/// Implementations own their scratch buffers, hence `&mut self`.
pub trait OdeSystem {
    fn dim(&self) -> usize;

    fn rhs(&mut self, t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> SolverResult<()>;

    /// Absolute tolerance for component `i`.
    fn absolute_tolerance(&self, _i: usize, base: f64) -> f64 {
        base
    }

    /// Lower bound on the magnitude used to scale Jacobian perturbations.
    fn perturbation_scale(&self, _i: usize) -> f64 {
        1.0
    }

    /// Whether a converged implicit stage may be accepted.
    fn is_admissible(&self, y: &DVector<f64>) -> bool {
        y.iter().all(|v| v.is_finite())
    }

    /// Called on every accepted state.
    fn project(&mut self, _y: &mut DVector<f64>) -> SolverResult<Projection> {
        Ok(Projection::default())
    }
}
