//! Production rates for a whole mechanism at one thermochemical state.

use crate::equilibrium::ln_equilibrium_constant;
use crate::error::{KineticsError, KineticsResult};
use crate::rates::{arrhenius_with, falloff_with, third_body_concentration};
use rf_core::constants::GAS_CONSTANT;
use rf_core::ensure_len;
use rf_mech::{Mechanism, RateLaw, SpeciesThermoTable, StoichTerm};
use tracing::debug;

/// Bound on |ln Kc| so reverse constants stay finite.
const LN_KC_LIMIT: f64 = 600.0;

/// Reusable per-thread workspace for rate evaluation.
///
/// Borrows the shared mechanism; owns every buffer it writes, so one
/// evaluator per integration never contends with another.
#[derive(Clone, Debug)]
pub struct KineticsEvaluator<'m> {
    mech: &'m Mechanism,
    thermo: SpeciesThermoTable,
    conc: Vec<f64>,
    kf: Vec<f64>,
    kr: Vec<f64>,
    qf: Vec<f64>,
    qr: Vec<f64>,
    net: Vec<f64>,
    creation: Vec<f64>,
    destruction: Vec<f64>,
    heat_release_rate: f64,
}

/// View of the most recent evaluation.
#[derive(Clone, Copy, Debug)]
pub struct RateSnapshot<'a> {
    /// Net molar production rate per species, mol/(m^3 s)
    pub net: &'a [f64],
    pub creation: &'a [f64],
    pub destruction: &'a [f64],
    /// Forward and reverse progress rates per reaction, mol/(m^3 s)
    pub forward_progress: &'a [f64],
    pub reverse_progress: &'a [f64],
    pub forward_constants: &'a [f64],
    pub reverse_constants: &'a [f64],
    /// -sum(wdot_k h_k), W/m^3
    pub heat_release_rate: f64,
}

impl RateSnapshot<'_> {
    /// Net progress rate of reaction `i`.
    pub fn net_progress(&self, i: usize) -> f64 {
        self.forward_progress[i] - self.reverse_progress[i]
    }
}

impl<'m> KineticsEvaluator<'m> {
    pub fn new(mech: &'m Mechanism) -> Self {
        let n_sp = mech.species_count();
        let n_rx = mech.reaction_count();
        Self {
            mech,
            thermo: SpeciesThermoTable::default(),
            conc: vec![0.0; n_sp],
            kf: vec![0.0; n_rx],
            kr: vec![0.0; n_rx],
            qf: vec![0.0; n_rx],
            qr: vec![0.0; n_rx],
            net: vec![0.0; n_sp],
            creation: vec![0.0; n_sp],
            destruction: vec![0.0; n_sp],
            heat_release_rate: 0.0,
        }
    }

    pub fn mechanism(&self) -> &'m Mechanism {
        self.mech
    }

    /// Species properties at the temperature of the last evaluation.
    pub fn thermo(&self) -> &SpeciesThermoTable {
        &self.thermo
    }

    /// Evaluate every reaction at temperature `t` (K) and molar
    /// concentrations `conc` (mol/m^3). Negative concentrations are treated
    /// as zero.
    pub fn evaluate(&mut self, t: f64, conc: &[f64]) -> KineticsResult<RateSnapshot<'_>> {
        if !(t.is_finite() && t > 0.0) {
            return Err(KineticsError::NonPhysical {
                what: "temperature",
                value: t,
            });
        }
        ensure_len(conc.len(), self.mech.species_count(), "concentrations")?;
        for (dst, &c) in self.conc.iter_mut().zip(conc) {
            if !c.is_finite() {
                return Err(KineticsError::NonPhysical {
                    what: "concentration",
                    value: c,
                });
            }
            *dst = c.max(0.0);
        }

        self.thermo.fill(self.mech, t);
        self.rate_constants(t);
        self.progress_rates();
        self.accumulate(t);
        Ok(self.snapshot())
    }

    /// Result of the most recent [`evaluate`](Self::evaluate).
    pub fn snapshot(&self) -> RateSnapshot<'_> {
        RateSnapshot {
            net: &self.net,
            creation: &self.creation,
            destruction: &self.destruction,
            forward_progress: &self.qf,
            reverse_progress: &self.qr,
            forward_constants: &self.kf,
            reverse_constants: &self.kr,
            heat_release_rate: self.heat_release_rate,
        }
    }

    /// (sum W_k wdot_k, sum W_k |wdot_k|) for the last evaluation, kg/(m^3 s).
    ///
    /// The first entry vanishes up to rounding for element-balanced
    /// mechanisms; the second gives its scale.
    pub fn mass_production_residual(&self) -> (f64, f64) {
        self.net
            .iter()
            .zip(self.mech.molar_masses())
            .fold((0.0, 0.0), |(sum, scale), (w_dot, w)| {
                (sum + w * w_dot, scale + (w * w_dot).abs())
            })
    }

    fn rate_constants(&mut self, t: f64) {
        let ln_t = t.ln();
        let inv_rt = 1.0 / (GAS_CONSTANT * t);
        for (i, rxn) in self.mech.reactions().iter().enumerate() {
            let kf = match rxn.rate() {
                RateLaw::Arrhenius(k) => arrhenius_with(k, ln_t, inv_rt),
                RateLaw::ThirdBody { rate, efficiencies } => {
                    arrhenius_with(rate, ln_t, inv_rt)
                        * third_body_concentration(efficiencies, &self.conc)
                }
                RateLaw::Falloff {
                    high,
                    low,
                    troe,
                    efficiencies,
                } => {
                    let m = third_body_concentration(efficiencies, &self.conc);
                    falloff_with(high, low, troe.as_ref(), t, ln_t, inv_rt, m).k
                }
            };
            self.kf[i] = kf;
            self.kr[i] = if rxn.is_reversible() {
                let raw = ln_equilibrium_constant(rxn, &self.thermo.g_rt, t);
                let ln_kc = raw.clamp(-LN_KC_LIMIT, LN_KC_LIMIT);
                if ln_kc != raw {
                    debug!(reaction = i, t, ln_kc = raw, "equilibrium constant clamped");
                }
                kf * (-ln_kc).exp()
            } else {
                0.0
            };
        }
    }

    fn progress_rates(&mut self) {
        for (i, rxn) in self.mech.reactions().iter().enumerate() {
            self.qf[i] = self.kf[i] * concentration_product(rxn.reactants(), &self.conc);
            self.qr[i] = if self.kr[i] != 0.0 {
                self.kr[i] * concentration_product(rxn.products(), &self.conc)
            } else {
                0.0
            };
        }
    }

    fn accumulate(&mut self, t: f64) {
        self.net.fill(0.0);
        self.creation.fill(0.0);
        self.destruction.fill(0.0);
        for (i, rxn) in self.mech.reactions().iter().enumerate() {
            let (qf, qr) = (self.qf[i], self.qr[i]);
            let q = qf - qr;
            for term in rxn.reactants() {
                let k = term.species.index();
                self.net[k] -= term.coefficient * q;
                self.destruction[k] += term.coefficient * qf;
                self.creation[k] += term.coefficient * qr;
            }
            for term in rxn.products() {
                let k = term.species.index();
                self.net[k] += term.coefficient * q;
                self.creation[k] += term.coefficient * qf;
                self.destruction[k] += term.coefficient * qr;
            }
        }
        let rt = GAS_CONSTANT * t;
        self.heat_release_rate = -self
            .net
            .iter()
            .zip(&self.thermo.h_rt)
            .map(|(w, h)| w * h * rt)
            .sum::<f64>();
    }
}

#[inline]
fn concentration_product(side: &[StoichTerm], conc: &[f64]) -> f64 {
    side.iter().fold(1.0, |acc, term| {
        let c = conc[term.species.index()];
        let nu = term.coefficient;
        acc * if nu == 1.0 {
            c
        } else if nu == 2.0 {
            c * c
        } else {
            c.powf(nu)
        }
    })
}
