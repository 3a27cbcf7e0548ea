//! Integration test: EDC mean rates in the slow- and fast-mixing limits.

use rf_batch::{BatchConfig, CellState, CellStatus};
use rf_core::{atm, k};
use rf_edc::{EdcClosure, EdcConstants, TurbulenceState};
use rf_kinetics::KineticsEvaluator;
use rf_mech::{Mechanism, load_mechanism_str};
use rf_reactor::{GasState, Reactor, ReactorKind, ReactorOptions};
use std::ops::ControlFlow;
use std::sync::Arc;

const H2_AIR: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/h2_air.yaml"));
const NU: f64 = 1.5e-5;

fn mech() -> Arc<Mechanism> {
    load_mechanism_str(H2_AIR).unwrap()
}

/// Stoichiometric H2/air caught mid-ignition, once T passes 1100 K.
fn igniting_cell(mech: &Arc<Mechanism>) -> CellState {
    let initial = GasState::from_composition(mech, k(1000.0), atm(1.0), "H2:2, O2:1, N2:3.76").unwrap();
    let mut reactor = Reactor::new(Arc::clone(mech), ReactorKind::ConstantVolume, initial).unwrap();
    reactor
        .advance_observed(3e-4, &ReactorOptions::default(), |s| {
            if s.temperature > 1100.0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    let state = reactor.state();
    assert!(state.temperature_k() > 1100.0);
    CellState::new(state.temperature_k(), state.density(mech), state.mass_fractions().to_vec())
}

fn closure(mech: &Arc<Mechanism>) -> EdcClosure {
    let mut config = BatchConfig::default();
    config.integrator.rtol = 1e-7;
    EdcClosure::new(Arc::clone(mech), EdcConstants::default(), config).unwrap()
}

/// ω̇_k W_k at the cell state, kg/(m^3 s).
fn reactor_rates(mech: &Mechanism, cell: &CellState) -> (Vec<f64>, f64) {
    let w = mech.molar_masses();
    let conc: Vec<f64> = (0..mech.species_count())
        .map(|i| cell.density * cell.mass_fractions[i] / w[i])
        .collect();
    let mut evaluator = KineticsEvaluator::new(mech);
    let rates = evaluator.evaluate(cell.temperature, &conc).unwrap();
    let mass: Vec<f64> = rates.net.iter().zip(w).map(|(r, w)| r * w).collect();
    (mass, rates.heat_release_rate)
}

#[test]
fn fast_mixing_recovers_the_reactor_rate() {
    let mech = mech();
    let cell = igniting_cell(&mech);
    let report = closure(&mech)
        .mean_rates(&[cell.clone()], &[TurbulenceState::new(1.0, 2.5e10, NU)])
        .unwrap();
    let rate = &report.cells[0];
    assert_eq!(rate.status, CellStatus::Converged);
    assert_eq!(rate.fine_structure.kappa, 1.0);
    assert!(rate.fine_structure.tau < 1.1e-8);

    let (reference, heat) = reactor_rates(&mech, &cell);
    for name in ["H2", "O2", "H2O"] {
        let i = mech.species_id(name).unwrap().index();
        let rel = (rate.species_rates[i] - reference[i]).abs() / reference[i].abs();
        assert!(rel < 0.05, "{name}: edc {} vs reactor {}", rate.species_rates[i], reference[i]);
    }
    assert!(heat > 0.0);
    assert!((rate.heat_release_rate - heat).abs() < 0.1 * heat);
}

#[test]
fn slow_mixing_suppresses_the_rate() {
    let mech = mech();
    let cell = igniting_cell(&mech);
    let (reference, _) = reactor_rates(&mech, &cell);
    let scale = reference.iter().map(|r| r.abs()).fold(0.0, f64::max);

    let report = closure(&mech)
        .mean_rates(
            &[cell.clone(), cell.clone()],
            &[TurbulenceState::new(1.0, 1e-8, NU), TurbulenceState::new(1.0, 0.0, NU)],
        )
        .unwrap();
    assert_eq!(report.flagged, 0);

    let slow = &report.cells[0];
    assert!(slow.fine_structure.kappa < 1e-10);
    assert!(slow.species_rates.iter().all(|r| r.abs() < 1e-9 * scale));

    let still = &report.cells[1];
    assert!(still.species_rates.iter().all(|r| *r == 0.0));
    assert_eq!(still.heat_release_rate, 0.0);
}

#[test]
fn rate_grows_with_dissipation_below_saturation() {
    let mech = mech();
    let cell = igniting_cell(&mech);
    // τ* outlasts the burn, so the rate scales with κ / τ*
    let eps = [1.0, 10.0, 100.0];
    let turbulence: Vec<TurbulenceState> = eps.iter().map(|e| TurbulenceState::new(1.0, *e, NU)).collect();
    let report = closure(&mech).mean_rates(&vec![cell; eps.len()], &turbulence).unwrap();
    let h2 = mech.species_id("H2").unwrap().index();
    assert!(report.cells.iter().all(|c| c.fine_structure.kappa < 1.0));
    let consumption: Vec<f64> = report.cells.iter().map(|c| -c.species_rates[h2]).collect();
    assert!(consumption[0] > 0.0);
    assert!(consumption.windows(2).all(|w| w[1] > w[0]), "{consumption:?}");
}

#[test]
fn failed_fine_structures_are_flagged_and_zeroed() {
    let mech = mech();
    let mut bad = igniting_cell(&mech);
    bad.mass_fractions[0] = -0.5;
    let report = closure(&mech)
        .mean_rates(&[bad], &[TurbulenceState::new(1.0, 1e4, NU)])
        .unwrap();
    assert_eq!(report.flagged, 1);
    assert!(report.cells[0].is_flagged());
    assert!(report.cells[0].species_rates.iter().all(|r| *r == 0.0));
}

#[test]
fn invalid_turbulence_flags_only_its_cell() {
    let mech = mech();
    let cell = igniting_cell(&mech);
    let closure = closure(&mech);
    let turbulence = [
        TurbulenceState::new(1.0, 10.0, NU),
        TurbulenceState::new(0.0, 10.0, NU),
        TurbulenceState::new(1.0, 10.0, NU),
    ];
    let report = closure.mean_rates(&vec![cell.clone(); 3], &turbulence).unwrap();
    assert_eq!(report.flagged, 1);

    let bad = &report.cells[1];
    assert!(matches!(bad.status, CellStatus::Failed { .. }));
    assert!(bad.species_rates.iter().all(|r| *r == 0.0));
    assert_eq!(bad.heat_release_rate, 0.0);
    assert_eq!(bad.fine_state, cell);

    let alone = closure.mean_rates(&[cell], &turbulence[..1]).unwrap();
    for good in [&report.cells[0], &report.cells[2]] {
        assert_eq!(good.status, CellStatus::Converged);
        assert_eq!(good.species_rates, alone.cells[0].species_rates);
        assert!(good.heat_release_rate > 0.0);
    }
}

#[test]
fn mismatched_inputs_are_rejected() {
    let mech = mech();
    let cell = igniting_cell(&mech);
    let closure = closure(&mech);
    assert!(closure.mean_rates(&[cell.clone()], &[]).is_err());
    assert!(closure
        .mean_rates(&[cell], &[TurbulenceState::new(1.0, 1.0, NU); 2])
        .is_err());
}
