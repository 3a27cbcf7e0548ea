//! Integration test: stiff benchmark problems through the BDF2 integrator.

use approx::assert_relative_eq;
use nalgebra::DVector;
use rf_solver::{
    Bdf2, IntegratorOptions, JacobianConfig, JacobianMethod, NewtonConfig, OdeSystem, SolverResult,
};

/// Robertson's three-species autocatalytic reaction.
struct Robertson;

impl OdeSystem for Robertson {
    fn dim(&self) -> usize {
        3
    }

    fn rhs(&mut self, _t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> SolverResult<()> {
        let r1 = 0.04 * y[0];
        let r2 = 1e4 * y[1] * y[2];
        let r3 = 3e7 * y[1] * y[1];
        ydot[0] = -r1 + r2;
        ydot[1] = r1 - r2 - r3;
        ydot[2] = r3;
        Ok(())
    }

    fn absolute_tolerance(&self, i: usize, base: f64) -> f64 {
        if i == 1 { base * 1e-4 } else { base }
    }
}

fn options() -> IntegratorOptions {
    IntegratorOptions {
        rtol: 1e-6,
        atol: 1e-8,
        initial_step: 1e-6,
        ..IntegratorOptions::default()
    }
}

fn run(opts: IntegratorOptions) -> rf_solver::IntegrationReport {
    let solver = Bdf2::new(opts).unwrap();
    solver
        .integrate(&mut Robertson, 0.0, DVector::from_vec(vec![1.0, 0.0, 0.0]), 40.0)
        .unwrap()
}

#[test]
fn robertson_reference_solution() {
    let report = run(options());

    assert!(report.is_complete(), "{:?}", report.status);
    assert_eq!(report.t, 40.0);
    assert_relative_eq!(report.y[0], 0.715_827_068_7, max_relative = 1e-3);
    assert_relative_eq!(report.y[1], 9.185_534_764e-6, max_relative = 2e-2);
    assert_relative_eq!(report.y[2], 0.284_163_745_7, max_relative = 3e-3);

    // linear invariant y1 + y2 + y3 = 1
    let total: f64 = report.y.iter().sum();
    assert!((total - 1.0).abs() < 1e-8, "sum = {total}");

    // a stiff problem at this accuracy needs far fewer steps than t / h_explicit
    assert!(report.stats.accepted_steps < 20_000, "{:?}", report.stats);
    assert!(report.stats.last_step > 1e-3);
}

#[test]
fn modified_newton_and_central_jacobian_agree() {
    let reference = run(options());
    let modified = run(IntegratorOptions {
        newton: NewtonConfig {
            refresh_jacobian: false,
            ..NewtonConfig::default()
        },
        jacobian: JacobianConfig {
            method: JacobianMethod::Central,
            epsilon: 1e-6,
        },
        ..options()
    });

    assert!(modified.is_complete(), "{:?}", modified.status);
    assert_relative_eq!(modified.y[0], reference.y[0], max_relative = 1e-3);
    assert_relative_eq!(modified.y[2], reference.y[2], max_relative = 3e-3);
    assert!(modified.stats.jacobian_evaluations > 0);
}

#[test]
fn tighter_tolerance_reduces_error() {
    let loose = run(IntegratorOptions {
        rtol: 1e-4,
        ..options()
    });
    let tight = run(options());
    let exact = 0.715_827_068_7;

    assert!(loose.is_complete() && tight.is_complete());
    assert!((tight.y[0] - exact).abs() < (loose.y[0] - exact).abs() + 1e-7);
    assert!(tight.stats.accepted_steps > loose.stats.accepted_steps);
}
