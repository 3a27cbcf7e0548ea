//! Integration test: blow-out of a hydrogen/air perfectly stirred reactor.

use rf_core::{atm, k};
use rf_mech::{Mechanism, load_mechanism_str};
use rf_reactor::{ExtinctionOptions, GasState, Reactor, ReactorKind, extinction_residence_time};
use std::sync::Arc;

const H2_AIR: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/h2_air.yaml"));

fn steady_temperature(mech: &Arc<Mechanism>, feed: &GasState, tau: f64, start: GasState) -> f64 {
    let kind = ReactorKind::stirred(tau, feed.temperature_k(), feed.mass_fractions().to_vec());
    let mut reactor = Reactor::new(Arc::clone(mech), kind, start).unwrap();
    let opts = ExtinctionOptions::default().reactor;
    let run = reactor.advance(20.0 * tau, &opts).unwrap();
    assert!(run.is_complete(), "{:?}", run.status);
    run.final_state.temperature_k()
}

#[test]
fn stirred_reactor_extinction_brackets_burning_and_blown_out() {
    let mech = load_mechanism_str(H2_AIR).unwrap();
    let feed = GasState::from_composition(&mech, k(300.0), atm(1.0), "H2:2, O2:1, N2:3.76").unwrap();

    let result = extinction_residence_time(Arc::clone(&mech), &feed, &ExtinctionOptions::default()).unwrap();
    let tau = result.residence_time;

    assert!(tau > 1e-6 && tau < 1e-4, "extinction residence time {tau:e}");
    assert!(result.extinguished_at < tau);
    assert!(tau / result.extinguished_at <= 1.0 + 0.05 + 1e-12);
    assert!(result.burning_state.temperature_k() > 500.0);
    assert!(result.history.len() >= 3);

    let burning = steady_temperature(&mech, &feed, 2.0 * tau, result.burning_state.clone());
    assert!(burning > 500.0, "T at 2 tau = {burning}");
    let blown_out = steady_temperature(&mech, &feed, 0.5 * tau, result.burning_state.clone());
    assert!(blown_out < 500.0, "T at tau / 2 = {blown_out}");
}

#[test]
fn long_residence_time_burns_near_adiabatic_temperature() {
    let mech = load_mechanism_str(H2_AIR).unwrap();
    let feed = GasState::from_composition(&mech, k(300.0), atm(1.0), "H2:2, O2:1, N2:3.76").unwrap();
    let hot = GasState::from_mass_fractions(&mech, k(2200.0), atm(1.0), feed.mass_fractions().to_vec()).unwrap();

    let t = steady_temperature(&mech, &feed, 1e-3, hot);
    assert!(t > 2000.0 && t < 2500.0, "T = {t}");
}
