//! Species and mixture thermodynamic properties.
//!
//! Pure functions of (mechanism, T[, p], Y). Hot paths fill a
//! [`SpeciesThermoTable`] once per temperature and reuse it.

use crate::mechanism::Mechanism;
use crate::nasa::SpeciesThermo;
use rf_core::SpeciesId;
use rf_core::constants::{GAS_CONSTANT, ONE_ATM_PA};

/// Dimensionless properties of every species at one temperature.
#[derive(Clone, Debug, Default)]
pub struct SpeciesThermoTable {
    temperature: f64,
    pub cp_r: Vec<f64>,
    pub h_rt: Vec<f64>,
    pub s_r: Vec<f64>,
    pub g_rt: Vec<f64>,
}

impl SpeciesThermoTable {
    pub fn at(mech: &Mechanism, t: f64) -> Self {
        let mut table = Self::default();
        table.fill(mech, t);
        table
    }

    pub fn fill(&mut self, mech: &Mechanism, t: f64) {
        let n = mech.species_count();
        self.temperature = t;
        self.cp_r.resize(n, 0.0);
        self.h_rt.resize(n, 0.0);
        self.s_r.resize(n, 0.0);
        self.g_rt.resize(n, 0.0);
        for (k, sp) in mech.species().iter().enumerate() {
            let th = sp.thermo().evaluate(t);
            self.cp_r[k] = th.cp_r;
            self.h_rt[k] = th.h_rt;
            self.s_r[k] = th.s_r;
            self.g_rt[k] = th.g_rt();
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// J/(kg K)
    pub fn cp_mass(&self, molar_masses: &[f64], y: &[f64]) -> f64 {
        GAS_CONSTANT * weighted(&self.cp_r, molar_masses, y)
    }

    /// J/(kg K)
    pub fn cv_mass(&self, molar_masses: &[f64], y: &[f64]) -> f64 {
        GAS_CONSTANT
            * self
                .cp_r
                .iter()
                .zip(molar_masses)
                .zip(y)
                .map(|((cp, w), y)| y * (cp - 1.0) / w)
                .sum::<f64>()
    }

    /// J/kg
    pub fn enthalpy_mass(&self, molar_masses: &[f64], y: &[f64]) -> f64 {
        GAS_CONSTANT * self.temperature * weighted(&self.h_rt, molar_masses, y)
    }

    /// Molar enthalpy of species k, J/mol.
    #[inline]
    pub fn enthalpy_molar(&self, k: usize) -> f64 {
        self.h_rt[k] * GAS_CONSTANT * self.temperature
    }

    /// Molar internal energy of species k, J/mol.
    #[inline]
    pub fn internal_energy_molar(&self, k: usize) -> f64 {
        (self.h_rt[k] - 1.0) * GAS_CONSTANT * self.temperature
    }
}

fn weighted(values: &[f64], molar_masses: &[f64], y: &[f64]) -> f64 {
    values
        .iter()
        .zip(molar_masses)
        .zip(y)
        .map(|((v, w), y)| y * v / w)
        .sum()
}

pub fn species_thermo(mech: &Mechanism, id: SpeciesId, t: f64) -> SpeciesThermo {
    mech.species_by_id(id).thermo().evaluate(t)
}

/// J/(kg K)
pub fn species_cp_mass(mech: &Mechanism, id: SpeciesId, t: f64) -> f64 {
    let sp = mech.species_by_id(id);
    sp.thermo().cp_r(t) * GAS_CONSTANT / sp.molar_mass()
}

/// J/mol
pub fn species_enthalpy_molar(mech: &Mechanism, id: SpeciesId, t: f64) -> f64 {
    species_thermo(mech, id, t).h_rt * GAS_CONSTANT * t
}

/// J/kg
pub fn species_enthalpy_mass(mech: &Mechanism, id: SpeciesId, t: f64) -> f64 {
    species_enthalpy_molar(mech, id, t) / mech.species_by_id(id).molar_mass()
}

/// Standard-state molar entropy, J/(mol K).
pub fn species_entropy_molar(mech: &Mechanism, id: SpeciesId, t: f64) -> f64 {
    species_thermo(mech, id, t).s_r * GAS_CONSTANT
}

/// Standard-state molar Gibbs energy, J/mol.
pub fn species_gibbs_molar(mech: &Mechanism, id: SpeciesId, t: f64) -> f64 {
    species_thermo(mech, id, t).g_rt() * GAS_CONSTANT * t
}

pub fn mixture_cp_mass(mech: &Mechanism, t: f64, y: &[f64]) -> f64 {
    SpeciesThermoTable::at(mech, t).cp_mass(mech.molar_masses(), y)
}

pub fn mixture_cv_mass(mech: &Mechanism, t: f64, y: &[f64]) -> f64 {
    SpeciesThermoTable::at(mech, t).cv_mass(mech.molar_masses(), y)
}

pub fn mixture_enthalpy_mass(mech: &Mechanism, t: f64, y: &[f64]) -> f64 {
    SpeciesThermoTable::at(mech, t).enthalpy_mass(mech.molar_masses(), y)
}

/// u = h - R T / W_mean, J/kg
pub fn mixture_internal_energy_mass(mech: &Mechanism, t: f64, y: &[f64]) -> f64 {
    let w = mech.molar_masses();
    let moles_per_kg: f64 = y.iter().zip(w).map(|(y, w)| y / w).sum();
    mixture_enthalpy_mass(mech, t, y) - GAS_CONSTANT * t * moles_per_kg
}

/// Ideal-mixture entropy at pressure `p`, J/(kg K).
pub fn mixture_entropy_mass(mech: &Mechanism, t: f64, p: f64, y: &[f64]) -> f64 {
    let w = mech.molar_masses();
    let moles_per_kg: f64 = y.iter().zip(w).map(|(y, w)| y / w).sum();
    let ln_p = (p / ONE_ATM_PA).ln();
    mech.species()
        .iter()
        .zip(y)
        .zip(w)
        .filter(|((_, y), _)| **y > 0.0)
        .map(|((sp, y), w)| {
            let n = y / w;
            let x = n / moles_per_kg;
            n * GAS_CONSTANT * (sp.thermo().s_r(t) - x.ln() - ln_p)
        })
        .sum()
}
