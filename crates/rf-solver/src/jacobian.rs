//! Finite difference Jacobian computation.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};

/// Perturbation for component `x` with magnitude floor `scale`.
///
/// The returned step is exactly representable as `(x + dx) - x`.
fn perturbation(x: f64, epsilon: f64, scale: f64) -> f64 {
    let dx = epsilon * x.abs().max(scale);
    (x + dx) - x
}

fn check_scales(x: &DVector<f64>, scale: &[f64]) -> SolverResult<()> {
    if scale.len() != x.len() {
        return Err(SolverError::InvalidArg {
            what: "perturbation scale length must match state length",
        });
    }
    Ok(())
}

/// Compute Jacobian using forward finite differences.
///
/// `f_x` is f evaluated at `x`. Column j perturbs x[j] by
/// `epsilon * max(|x[j]|, scale[j])`.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
    scale: &[f64],
) -> SolverResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    check_scales(x, scale)?;
    let n = x.len();
    let m = f_x.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut x_perturbed = x.clone();

    for j in 0..n {
        let dx = perturbation(x[j], epsilon, scale[j]);
        x_perturbed[j] = x[j] + dx;
        let f_perturbed = f(&x_perturbed)?;
        x_perturbed[j] = x[j];

        for i in 0..m {
            jac[(i, j)] = (f_perturbed[i] - f_x[i]) / dx;
        }
    }

    Ok(jac)
}

/// Compute Jacobian using central finite differences (more accurate but 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
    scale: &[f64],
) -> SolverResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    check_scales(x, scale)?;
    let n = x.len();
    let mut jac: Option<DMatrix<f64>> = None;
    let mut x_perturbed = x.clone();

    for j in 0..n {
        let dx = perturbation(x[j], epsilon, scale[j]);

        x_perturbed[j] = x[j] + dx;
        let f_plus = f(&x_perturbed)?;
        x_perturbed[j] = x[j] - dx;
        let f_minus = f(&x_perturbed)?;
        x_perturbed[j] = x[j];

        let jac = jac.get_or_insert_with(|| DMatrix::zeros(f_plus.len(), n));
        for i in 0..f_plus.len() {
            jac[(i, j)] = (f_plus[i] - f_minus[i]) / (2.0 * dx);
        }
    }

    Ok(jac.unwrap_or_else(|| DMatrix::zeros(0, 0)))
}
