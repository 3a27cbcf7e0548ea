//! Thermochemical state of an ideal-gas mixture.

use crate::error::{ReactorError, ReactorResult};
use rf_core::constants::GAS_CONSTANT;
use rf_core::{Pressure, Temperature, pa};
use rf_mech::mixture::{
    concentrations_into, ideal_gas_density, mass_to_mole_fractions, mean_molar_mass,
    mole_to_mass_fractions, normalize_mass_fractions, parse_composition,
};
use rf_mech::{Mechanism, SpeciesThermoTable};
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

/// Allowed deviation of mass fractions from [0, 1] and from summing to 1.
pub const FRACTION_TOLERANCE: f64 = 1e-6;

/// Temperature, pressure and mass fractions of one gas parcel.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasState {
    temperature: f64,
    pressure: f64,
    mass_fractions: Vec<f64>,
}

impl GasState {
    /// State from mass fractions. Entries may deviate from [0, 1] and the
    /// sum from 1 by at most [`FRACTION_TOLERANCE`]; they are then clamped
    /// and renormalised.
    pub fn from_mass_fractions(
        mech: &Mechanism,
        temperature: Temperature,
        pressure: Pressure,
        mass_fractions: Vec<f64>,
    ) -> ReactorResult<Self> {
        let mut y = mass_fractions;
        check_species_len(mech, &y)?;
        let sum: f64 = y.iter().sum();
        if !sum.is_finite() || (sum - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(ReactorError::NonPhysical {
                what: format!("mass fractions sum to {sum}"),
            });
        }
        let correction = normalize_mass_fractions(&mut y)?;
        if correction.max_clamp > FRACTION_TOLERANCE {
            return Err(ReactorError::NonPhysical {
                what: format!("mass fraction outside [0, 1] by {:e}", correction.max_clamp),
            });
        }
        Self::from_raw(
            temperature.get::<kelvin>(),
            pressure.get::<pascal>(),
            y,
        )
    }

    /// State from (possibly unnormalised, non-negative) mole fractions.
    pub fn from_mole_fractions(
        mech: &Mechanism,
        temperature: Temperature,
        pressure: Pressure,
        mole_fractions: &[f64],
    ) -> ReactorResult<Self> {
        check_species_len(mech, mole_fractions)?;
        if mole_fractions.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(ReactorError::NonPhysical {
                what: "mole fractions must be finite and non-negative".to_string(),
            });
        }
        let total: f64 = mole_fractions.iter().sum();
        if total <= 0.0 {
            return Err(ReactorError::NonPhysical {
                what: "mole fractions sum to zero".to_string(),
            });
        }
        let x: Vec<f64> = mole_fractions.iter().map(|v| v / total).collect();
        let mut y = mole_to_mass_fractions(mech.molar_masses(), &x);
        normalize_mass_fractions(&mut y)?;
        Self::from_raw(
            temperature.get::<kelvin>(),
            pressure.get::<pascal>(),
            y,
        )
    }

    /// State from a mole-basis composition string such as `"H2:2, O2:1, N2:3.76"`.
    pub fn from_composition(
        mech: &Mechanism,
        temperature: Temperature,
        pressure: Pressure,
        composition: &str,
    ) -> ReactorResult<Self> {
        let x = parse_composition(mech, composition)?;
        Self::from_mole_fractions(mech, temperature, pressure, &x)
    }

    /// Kelvin / pascal constructor for already-normalised fractions.
    pub(crate) fn from_raw(temperature: f64, pressure: f64, mass_fractions: Vec<f64>) -> ReactorResult<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ReactorError::NonPhysical {
                what: format!("temperature {temperature} K"),
            });
        }
        if !(pressure.is_finite() && pressure > 0.0) {
            return Err(ReactorError::NonPhysical {
                what: format!("pressure {pressure} Pa"),
            });
        }
        Ok(Self {
            temperature,
            pressure,
            mass_fractions,
        })
    }

    pub fn temperature(&self) -> Temperature {
        rf_core::k(self.temperature)
    }

    pub fn pressure(&self) -> Pressure {
        pa(self.pressure)
    }

    /// Temperature in K.
    pub fn temperature_k(&self) -> f64 {
        self.temperature
    }

    /// Pressure in Pa.
    pub fn pressure_pa(&self) -> f64 {
        self.pressure
    }

    pub fn mass_fractions(&self) -> &[f64] {
        &self.mass_fractions
    }

    /// kg/mol
    pub fn mean_molar_mass(&self, mech: &Mechanism) -> f64 {
        mean_molar_mass(mech.molar_masses(), &self.mass_fractions)
    }

    /// kg/m^3
    pub fn density(&self, mech: &Mechanism) -> f64 {
        ideal_gas_density(self.pressure, self.temperature, self.mean_molar_mass(mech))
    }

    pub fn mole_fractions(&self, mech: &Mechanism) -> Vec<f64> {
        mass_to_mole_fractions(mech.molar_masses(), &self.mass_fractions)
    }

    /// mol/m^3
    pub fn concentrations(&self, mech: &Mechanism) -> Vec<f64> {
        let mut out = vec![0.0; self.mass_fractions.len()];
        concentrations_into(self.density(mech), mech.molar_masses(), &self.mass_fractions, &mut out);
        out
    }

    /// J/kg
    pub fn enthalpy_mass(&self, mech: &Mechanism) -> f64 {
        SpeciesThermoTable::at(mech, self.temperature).enthalpy_mass(mech.molar_masses(), &self.mass_fractions)
    }

    /// Mass fraction of the named species (0 when absent from the mechanism).
    pub fn mass_fraction(&self, mech: &Mechanism, name: &str) -> f64 {
        mech.species_id(name)
            .map_or(0.0, |id| self.mass_fractions[id.index()])
    }
}

/// Pressure of a mixture at fixed density, Pa.
pub(crate) fn pressure_from_density(mech: &Mechanism, density: f64, temperature: f64, y: &[f64]) -> f64 {
    density * GAS_CONSTANT * temperature / mean_molar_mass(mech.molar_masses(), y)
}

fn check_species_len(mech: &Mechanism, values: &[f64]) -> ReactorResult<()> {
    if values.len() != mech.species_count() {
        return Err(ReactorError::InvalidArg {
            what: "composition length must equal the species count",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{atm, k};
    use rf_mech::{MechanismBuilder, Nasa7, Species};
    use std::sync::Arc;

    fn argon_oxygen() -> Arc<Mechanism> {
        let mono = Nasa7::single_range(200.0, 6000.0, [2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 4.366]);
        let mut b = MechanismBuilder::new("ar-o2");
        b.add_species(Species::new("AR", [("Ar", 1.0)], mono.clone()).unwrap());
        b.add_species(Species::new("O2", [("O", 2.0)], mono).unwrap());
        b.build().unwrap()
    }

    #[test]
    fn mole_fractions_round_trip_through_mass_basis() {
        let mech = argon_oxygen();
        let s = GasState::from_mole_fractions(&mech, k(300.0), atm(1.0), &[1.0, 1.0]).unwrap();
        let x = s.mole_fractions(&mech);
        assert!((x[0] - 0.5).abs() < 1e-12);
        let y = s.mass_fractions();
        assert!((y.iter().sum::<f64>() - 1.0).abs() < 1e-14);
        assert!(y[0] > y[1]);
    }

    #[test]
    fn density_follows_ideal_gas_law() {
        let mech = argon_oxygen();
        let s = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![1.0, 0.0]).unwrap();
        let expected = 101_325.0 * mech.molar_masses()[0] / (GAS_CONSTANT * 300.0);
        assert!((s.density(&mech) - expected).abs() < 1e-12 * expected);
        let p = pressure_from_density(&mech, s.density(&mech), 300.0, s.mass_fractions());
        assert!((p - 101_325.0).abs() < 1e-8);
    }

    #[test]
    fn rejects_fractions_outside_tolerance() {
        let mech = argon_oxygen();
        assert!(GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![0.9, 0.2]).is_err());
        assert!(GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![1.2, -0.2]).is_err());
        assert!(GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![1.0]).is_err());
        assert!(GasState::from_mass_fractions(&mech, k(-1.0), atm(1.0), vec![1.0, 0.0]).is_err());

        // a tiny negative is clamped
        let s = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![1.0 + 1e-9, -1e-9]).unwrap();
        assert_eq!(s.mass_fractions()[1], 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mole_input_always_yields_normalised_mass_fractions(
                x_ar in 0.0f64..10.0,
                x_o2 in 1e-6f64..10.0,
            ) {
                let mech = argon_oxygen();
                let s = GasState::from_mole_fractions(&mech, k(500.0), atm(2.0), &[x_ar, x_o2]).unwrap();
                let y = s.mass_fractions();
                prop_assert!(y.iter().all(|v| (0.0..=1.0).contains(v)));
                prop_assert!((y.iter().sum::<f64>() - 1.0).abs() < 1e-14);
                let x = s.mole_fractions(&mech);
                prop_assert!((x[1] - x_o2 / (x_ar + x_o2)).abs() < 1e-12);
            }
        }
    }
}
