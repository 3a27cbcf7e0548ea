//! Integration test: a single reversible reaction with a closed-form solution.

use approx::assert_relative_eq;
use rf_core::{atm, k};
use rf_mech::{Arrhenius, Mechanism, MechanismBuilder, Nasa7, RateDef, ReactionDef, Species};
use rf_reactor::{GasState, Reactor, ReactorKind, ReactorOptions};
use std::sync::Arc;

const KF: f64 = 1e3;

/// A <=> B with equal enthalpy and s_B - s_A = R ln 3, so Kc = 3.
fn isomers() -> Arc<Mechanism> {
    let a = Nasa7::single_range(200.0, 6000.0, [3.5, 0.0, 0.0, 0.0, 0.0, -1000.0, 4.0]);
    let b = Nasa7::single_range(200.0, 6000.0, [3.5, 0.0, 0.0, 0.0, 0.0, -1000.0, 4.0 + 3f64.ln()]);
    let mut builder = MechanismBuilder::new("isomers");
    builder.add_species(Species::new("A", [("N", 2.0)], a).unwrap());
    builder.add_species(Species::new("B", [("N", 2.0)], b).unwrap());
    builder.add_reaction(
        ReactionDef::from_equation("A <=> B", RateDef::Arrhenius(Arrhenius::new(KF, 0.0, 0.0))).unwrap(),
    );
    builder.build().unwrap()
}

fn exact_ya(t: f64) -> f64 {
    let kc = 3.0;
    let y_eq = 1.0 / (1.0 + kc);
    y_eq + (1.0 - y_eq) * (-(KF + KF / kc) * t).exp()
}

#[test]
fn relaxation_matches_closed_form() {
    let mech = isomers();
    for kind in [ReactorKind::ConstantPressure, ReactorKind::ConstantVolume] {
        let initial = GasState::from_mass_fractions(&mech, k(800.0), atm(1.0), vec![1.0, 0.0]).unwrap();
        let mut reactor = Reactor::new(Arc::clone(&mech), kind, initial).unwrap();
        let opts = ReactorOptions::default();

        for t in [2e-4, 1e-3, 5e-3] {
            let run = reactor.advance(t, &opts).unwrap();
            let ya = run.final_state.mass_fractions()[0];
            assert_relative_eq!(ya, exact_ya(t), max_relative = 1e-4);
            // thermoneutral: temperature does not move
            assert_relative_eq!(run.final_state.temperature_k(), 800.0, max_relative = 1e-12);
        }

        // long-time limit is the equilibrium ratio
        let run = reactor.advance(0.1, &opts).unwrap();
        let y = run.final_state.mass_fractions();
        assert_relative_eq!(y[1] / y[0], 3.0, max_relative = 1e-5);
    }
}
