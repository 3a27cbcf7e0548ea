//! Concentration-based equilibrium constants.

use rf_core::constants::{GAS_CONSTANT, ONE_ATM_PA};
use rf_mech::Reaction;

/// ln Kc = -dG/RT + dn ln(p0 / RT), with `g_rt` indexed by species and
/// p0 = 1 atm.
pub fn ln_equilibrium_constant(reaction: &Reaction, g_rt: &[f64], t: f64) -> f64 {
    let dg: f64 = reaction
        .products()
        .iter()
        .map(|p| p.coefficient * g_rt[p.species.index()])
        .sum::<f64>()
        - reaction
            .reactants()
            .iter()
            .map(|r| r.coefficient * g_rt[r.species.index()])
            .sum::<f64>();
    -dg + reaction.delta_moles() * (ONE_ATM_PA / (GAS_CONSTANT * t)).ln()
}

pub fn equilibrium_constant(reaction: &Reaction, g_rt: &[f64], t: f64) -> f64 {
    ln_equilibrium_constant(reaction, g_rt, t).exp()
}
