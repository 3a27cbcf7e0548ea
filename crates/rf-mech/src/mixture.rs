//! Ideal-gas mixture rules and composition bookkeeping.

use crate::error::{MechError, MechResult};
use crate::mechanism::Mechanism;
use rf_core::constants::GAS_CONSTANT;
use rf_core::{CoreError, CoreResult};

/// Mean molar mass from mass fractions, kg/mol.
pub fn mean_molar_mass(molar_masses: &[f64], y: &[f64]) -> f64 {
    1.0 / y
        .iter()
        .zip(molar_masses)
        .map(|(y, w)| y / w)
        .sum::<f64>()
}

/// Mean molar mass from mole fractions, kg/mol.
pub fn mean_molar_mass_from_moles(molar_masses: &[f64], x: &[f64]) -> f64 {
    x.iter().zip(molar_masses).map(|(x, w)| x * w).sum()
}

pub fn mole_to_mass_fractions(molar_masses: &[f64], x: &[f64]) -> Vec<f64> {
    let wbar = mean_molar_mass_from_moles(molar_masses, x);
    x.iter().zip(molar_masses).map(|(x, w)| x * w / wbar).collect()
}

pub fn mass_to_mole_fractions(molar_masses: &[f64], y: &[f64]) -> Vec<f64> {
    let wbar = mean_molar_mass(molar_masses, y);
    y.iter().zip(molar_masses).map(|(y, w)| y * wbar / w).collect()
}

/// rho = p W / (R T)
#[inline]
pub fn ideal_gas_density(p: f64, t: f64, mean_molar_mass: f64) -> f64 {
    p * mean_molar_mass / (GAS_CONSTANT * t)
}

/// Molar concentrations C_k = rho Y_k / W_k, mol/m^3.
pub fn concentrations_into(rho: f64, molar_masses: &[f64], y: &[f64], out: &mut [f64]) {
    for ((c, y), w) in out.iter_mut().zip(y).zip(molar_masses) {
        *c = rho * y / w;
    }
}

/// What [`normalize_mass_fractions`] had to change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FractionCorrection {
    /// Entries moved into [0, 1]
    pub clamped: usize,
    /// Largest distance an entry was moved by clamping
    pub max_clamp: f64,
    /// Sum before renormalisation
    pub sum_before: f64,
}

impl FractionCorrection {
    /// True when clamping or renormalisation exceeded `tol`.
    pub fn exceeds(&self, tol: f64) -> bool {
        self.max_clamp > tol || (self.sum_before - 1.0).abs() > tol
    }
}

/// Clamp every entry into [0, 1] and rescale so they sum to 1.
pub fn normalize_mass_fractions(y: &mut [f64]) -> CoreResult<FractionCorrection> {
    let mut corr = FractionCorrection::default();
    for v in y.iter_mut() {
        if !v.is_finite() {
            return Err(CoreError::NonFinite {
                what: "mass fraction",
                value: *v,
            });
        }
        let clamped = v.clamp(0.0, 1.0);
        if clamped != *v {
            corr.clamped += 1;
            corr.max_clamp = corr.max_clamp.max((clamped - *v).abs());
            *v = clamped;
        }
    }
    let sum: f64 = y.iter().sum();
    corr.sum_before = sum;
    if sum <= 0.0 {
        return Err(CoreError::InvalidArg {
            what: "mass fractions sum to zero",
        });
    }
    if sum != 1.0 {
        y.iter_mut().for_each(|v| *v /= sum);
    }
    Ok(corr)
}

/// Parse `"H2:2, O2:1, N2:3.76"` into a normalised per-species vector.
pub fn parse_composition(mech: &Mechanism, text: &str) -> MechResult<Vec<f64>> {
    let mut out = vec![0.0; mech.species_count()];
    for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = item.split_once(':').ok_or_else(|| MechError::Format {
            what: format!("composition entry '{item}' is not NAME:VALUE"),
        })?;
        let id = mech.require_species(name.trim())?;
        let value: f64 = value.trim().parse().map_err(|_| MechError::Format {
            what: format!("composition value in '{item}' is not a number"),
        })?;
        if !(value.is_finite() && value >= 0.0) {
            return Err(MechError::Format {
                what: format!("composition value in '{item}' must be non-negative"),
            });
        }
        out[id.index()] += value;
    }
    let total: f64 = out.iter().sum();
    if total <= 0.0 {
        return Err(MechError::Format {
            what: format!("composition '{text}' is empty"),
        });
    }
    out.iter_mut().for_each(|v| *v /= total);
    Ok(out)
}
