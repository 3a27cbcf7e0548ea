//! Species: composition, molar mass and NASA7 thermodynamics.

use crate::elements;
use crate::error::{MechError, MechResult};
use crate::nasa::Nasa7;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    name: String,
    composition: BTreeMap<String, f64>,
    molar_mass: f64,
    thermo: Nasa7,
}

impl Species {
    /// Build a species; the molar mass is computed from the composition.
    ///
    /// Element symbols are canonicalised ("AR" and "Ar" are the same element).
    pub fn new<I, S>(name: impl Into<String>, composition: I, thermo: Nasa7) -> MechResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MechError::InvalidSpecies {
                species: name,
                what: "empty name".to_string(),
            });
        }

        let mut comp = BTreeMap::new();
        for (el, n) in composition {
            let el = el.as_ref();
            let symbol =
                elements::canonical_symbol(el).ok_or_else(|| MechError::UnknownElement {
                    species: name.clone(),
                    element: el.to_string(),
                })?;
            if !n.is_finite() || n < 0.0 {
                return Err(MechError::InvalidSpecies {
                    species: name,
                    what: format!("element count for {symbol} must be non-negative, got {n}"),
                });
            }
            if n > 0.0 {
                *comp.entry(symbol.to_string()).or_insert(0.0) += n;
            }
        }
        if comp.is_empty() {
            return Err(MechError::InvalidSpecies {
                species: name,
                what: "composition is empty".to_string(),
            });
        }

        if !thermo.is_finite() {
            return Err(MechError::InvalidSpecies {
                species: name,
                what: "non-finite NASA7 data".to_string(),
            });
        }
        if !(thermo.t_low > 0.0 && thermo.t_low < thermo.t_mid && thermo.t_mid <= thermo.t_high) {
            return Err(MechError::InvalidSpecies {
                species: name,
                what: format!(
                    "temperature ranges must satisfy 0 < T_low < T_mid <= T_high, got {} / {} / {}",
                    thermo.t_low, thermo.t_mid, thermo.t_high
                ),
            });
        }

        let molar_mass =
            elements::molar_mass(&comp).map_err(|element| MechError::UnknownElement {
                species: name.clone(),
                element,
            })?;

        Ok(Self {
            name,
            composition: comp,
            molar_mass,
            thermo,
        })
    }

    /// Override the computed molar mass (kg/mol).
    pub fn with_molar_mass(mut self, molar_mass: f64) -> MechResult<Self> {
        if !(molar_mass.is_finite() && molar_mass > 0.0) {
            return Err(MechError::InvalidSpecies {
                species: self.name,
                what: format!("molar mass must be positive, got {molar_mass}"),
            });
        }
        self.molar_mass = molar_mass;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn composition(&self) -> &BTreeMap<String, f64> {
        &self.composition
    }

    /// Atoms of `element` per molecule (0 when absent).
    pub fn element_count(&self, element: &str) -> f64 {
        self.composition.get(element).copied().unwrap_or(0.0)
    }

    /// kg/mol
    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    pub fn thermo(&self) -> &Nasa7 {
        &self.thermo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> Nasa7 {
        Nasa7::single_range(200.0, 3000.0, [2.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn molar_mass_from_composition() {
        let oh = Species::new("OH", [("O", 1.0), ("H", 1.0)], flat()).unwrap();
        assert!((oh.molar_mass() - 17.007e-3).abs() < 1e-12);
        assert_eq!(oh.element_count("H"), 1.0);
        assert_eq!(oh.element_count("N"), 0.0);
    }

    #[test]
    fn element_symbols_are_canonicalised() {
        let ar = Species::new("AR", [("AR", 1.0)], flat()).unwrap();
        assert_eq!(ar.element_count("Ar"), 1.0);
    }

    #[test]
    fn rejects_unknown_element_and_bad_ranges() {
        assert!(matches!(
            Species::new("X", [("Qq", 1.0)], flat()),
            Err(MechError::UnknownElement { .. })
        ));

        let mut bad = flat();
        bad.t_low = 4000.0;
        assert!(matches!(
            Species::new("H", [("H", 1.0)], bad),
            Err(MechError::InvalidSpecies { .. })
        ));
    }

    #[test]
    fn override_molar_mass_must_be_positive() {
        let h = Species::new("H", [("H", 1.0)], flat()).unwrap();
        assert!(h.clone().with_molar_mass(0.0).is_err());
        assert_eq!(h.with_molar_mass(1e-3).unwrap().molar_mass(), 1e-3);
    }
}
