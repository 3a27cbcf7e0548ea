//! Rate-constant expressions.

use rf_core::constants::GAS_CONSTANT;
use rf_mech::{Arrhenius, ThirdBodyEfficiencies, Troe};

/// k = A T^b exp(-Ea / RT)
#[inline]
pub fn arrhenius(k: &Arrhenius, t: f64) -> f64 {
    arrhenius_with(k, t.ln(), 1.0 / (GAS_CONSTANT * t))
}

/// Arrhenius with `ln T` and `1/(R T)` precomputed.
#[inline]
pub(crate) fn arrhenius_with(k: &Arrhenius, ln_t: f64, inv_rt: f64) -> f64 {
    if k.b == 0.0 && k.ea == 0.0 {
        return k.a;
    }
    k.a * (k.b * ln_t - k.ea * inv_rt).exp()
}

/// Effective collision-partner concentration [M] = sum(eff_i [X_i]).
#[inline]
pub fn third_body_concentration(eff: &ThirdBodyEfficiencies, conc: &[f64]) -> f64 {
    eff.as_slice().iter().zip(conc).map(|(e, c)| e * c).sum()
}

/// Troe broadening factor F(T, Pr); all logarithms are base 10.
pub fn troe_blending(troe: &Troe, t: f64, pr: f64) -> f64 {
    let mut f_cent = (1.0 - troe.a) * (-t / troe.t3).exp() + troe.a * (-t / troe.t1).exp();
    if let Some(t2) = troe.t2 {
        f_cent += (-t2 / t).exp();
    }
    let log_fcent = f_cent.max(f64::MIN_POSITIVE).log10();
    let log_pr = pr.max(f64::MIN_POSITIVE).log10();
    let c = -0.4 - 0.67 * log_fcent;
    let n = 0.75 - 1.27 * log_fcent;
    let x = log_pr + c;
    let f1 = x / (n - 0.14 * x);
    10f64.powf(log_fcent / (1.0 + f1 * f1))
}

/// Falloff rate constant with its intermediate quantities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FalloffRate {
    pub k: f64,
    pub k0: f64,
    pub k_inf: f64,
    pub reduced_pressure: f64,
    pub blending: f64,
}

/// k = k_inf Pr/(1+Pr) F with Pr = k0 [M] / k_inf; F = 1 without Troe data.
pub fn falloff_rate_constant(
    high: &Arrhenius,
    low: &Arrhenius,
    troe: Option<&Troe>,
    t: f64,
    m: f64,
) -> FalloffRate {
    falloff_with(high, low, troe, t, t.ln(), 1.0 / (GAS_CONSTANT * t), m)
}

pub(crate) fn falloff_with(
    high: &Arrhenius,
    low: &Arrhenius,
    troe: Option<&Troe>,
    t: f64,
    ln_t: f64,
    inv_rt: f64,
    m: f64,
) -> FalloffRate {
    let k_inf = arrhenius_with(high, ln_t, inv_rt);
    let k0 = arrhenius_with(low, ln_t, inv_rt);
    if k_inf <= 0.0 {
        // k is bounded by k_inf
        return FalloffRate {
            k: 0.0,
            k0,
            k_inf,
            reduced_pressure: f64::INFINITY,
            blending: 1.0,
        };
    }
    let pr = k0 * m.max(0.0) / k_inf;
    let blending = troe.map_or(1.0, |tr| troe_blending(tr, t, pr));
    FalloffRate {
        k: k_inf * (pr / (1.0 + pr)) * blending,
        k0,
        k_inf,
        reduced_pressure: pr,
        blending,
    }
}
