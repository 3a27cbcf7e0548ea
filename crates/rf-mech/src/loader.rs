//! YAML mechanism loader.
//!
//! Accepts a Cantera-style subset:
//!
//! ```yaml
//! units: {length: cm, quantity: mol, activation-energy: cal/mol}
//! species:
//! - name: H2
//!   composition: {H: 2}
//!   thermo:
//!     model: NASA7
//!     temperature-ranges: [200.0, 1000.0, 3500.0]
//!     data: [[...7 coefficients...], [...7 coefficients...]]
//! reactions:
//! - equation: 2 OH (+M) <=> H2O2 (+M)
//!   type: falloff
//!   low-P-rate-constant: {A: 2.3e+18, b: -0.9, Ea: -1700.0}
//!   high-P-rate-constant: {A: 7.4e+13, b: -0.37, Ea: 0.0}
//!   Troe: {A: 0.7346, T3: 94.0, T1: 1756.0, T2: 5182.0}
//!   efficiencies: {H2: 2.0, H2O: 6.0, AR: 0.7}
//! ```
//!
//! Rate parameters are converted to SI (m, mol, J/mol) on load. Without a
//! `units` block the defaults are m, kmol and J/kmol.

use crate::equation::{Collider, parse_equation};
use crate::error::{MechError, MechResult};
use crate::mechanism::{Mechanism, MechanismBuilder};
use crate::nasa::Nasa7;
use crate::reaction::{Arrhenius, EfficiencyDef, RateDef, ReactionDef, Troe};
use crate::species::Species;
use rf_core::constants::{AVOGADRO, CALORIE_J, GAS_CONSTANT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct MechanismFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    units: UnitsEntry,
    species: Vec<SpeciesEntry>,
    #[serde(default)]
    reactions: Vec<ReactionEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UnitsEntry {
    length: Option<String>,
    quantity: Option<String>,
    activation_energy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeciesEntry {
    name: String,
    composition: BTreeMap<String, f64>,
    thermo: ThermoEntry,
    #[serde(default, rename = "molar-mass")]
    molar_mass: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ThermoEntry {
    model: String,
    #[serde(rename = "temperature-ranges")]
    temperature_ranges: Vec<f64>,
    data: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    #[serde(rename = "A")]
    a: f64,
    #[serde(default)]
    b: f64,
    #[serde(default, rename = "Ea")]
    ea: f64,
}

#[derive(Debug, Deserialize)]
struct TroeEntry {
    #[serde(rename = "A")]
    a: f64,
    #[serde(rename = "T3")]
    t3: f64,
    #[serde(rename = "T1")]
    t1: f64,
    #[serde(default, rename = "T2")]
    t2: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReactionEntry {
    equation: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    rate_constant: Option<RateEntry>,
    #[serde(rename = "low-P-rate-constant")]
    low_p_rate_constant: Option<RateEntry>,
    #[serde(rename = "high-P-rate-constant")]
    high_p_rate_constant: Option<RateEntry>,
    #[serde(rename = "Troe")]
    troe: Option<TroeEntry>,
    #[serde(default)]
    efficiencies: BTreeMap<String, f64>,
    default_efficiency: Option<f64>,
    #[serde(default)]
    duplicate: bool,
}

/// Conversion factors from the file's units to SI.
#[derive(Clone, Copy, Debug)]
struct UnitSystem {
    /// m per length unit
    length: f64,
    /// mol per quantity unit
    quantity: f64,
    /// J/mol per activation-energy unit
    energy: f64,
}

impl UnitSystem {
    fn from_entry(units: &UnitsEntry) -> MechResult<Self> {
        let length = match units.length.as_deref().unwrap_or("m") {
            "m" => 1.0,
            "cm" => 1e-2,
            "mm" => 1e-3,
            other => return Err(unsupported("length", other)),
        };
        let quantity = match units.quantity.as_deref().unwrap_or("kmol") {
            "mol" => 1.0,
            "kmol" => 1e3,
            "molec" => 1.0 / AVOGADRO,
            other => return Err(unsupported("quantity", other)),
        };
        let energy = match units.activation_energy.as_deref().unwrap_or("J/kmol") {
            "J/mol" => 1.0,
            "kJ/mol" => 1e3,
            "J/kmol" => 1e-3,
            "kJ/kmol" => 1.0,
            "cal/mol" => CALORIE_J,
            "kcal/mol" => 1e3 * CALORIE_J,
            "K" => GAS_CONSTANT,
            "eV" => 96_485.332_12,
            other => return Err(unsupported("activation-energy", other)),
        };
        Ok(Self {
            length,
            quantity,
            energy,
        })
    }

    /// Rate constant of the given overall order to SI.
    fn arrhenius(&self, rate: &RateEntry, order: f64) -> Arrhenius {
        let concentration = self.quantity / self.length.powi(3);
        Arrhenius::new(
            rate.a * concentration.powf(1.0 - order),
            rate.b,
            rate.ea * self.energy,
        )
    }
}

fn unsupported(kind: &str, unit: &str) -> MechError {
    MechError::Format {
        what: format!("unsupported {kind} unit '{unit}'"),
    }
}

pub fn load_mechanism_file(path: impl AsRef<Path>) -> MechResult<Arc<Mechanism>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| MechError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mechanism".to_string());
    load_with_name(&text, fallback)
}

pub fn load_mechanism_str(text: &str) -> MechResult<Arc<Mechanism>> {
    load_with_name(text, "mechanism".to_string())
}

fn load_with_name(text: &str, fallback_name: String) -> MechResult<Arc<Mechanism>> {
    let file: MechanismFile = serde_yaml::from_str(text)?;
    let units = UnitSystem::from_entry(&file.units)?;

    let mut builder = MechanismBuilder::new(file.name.unwrap_or(fallback_name));
    for entry in file.species {
        builder.add_species(species_from_entry(entry)?);
    }
    for entry in file.reactions {
        builder.add_reaction(reaction_from_entry(entry, &units)?);
    }
    builder.build()
}

fn species_from_entry(entry: SpeciesEntry) -> MechResult<Species> {
    let format_err = |what: String| MechError::InvalidSpecies {
        species: entry.name.clone(),
        what,
    };
    if !entry.thermo.model.eq_ignore_ascii_case("NASA7") {
        return Err(format_err(format!(
            "unsupported thermo model '{}'",
            entry.thermo.model
        )));
    }
    let coeffs = |row: &Vec<f64>| -> MechResult<[f64; 7]> {
        <[f64; 7]>::try_from(row.as_slice())
            .map_err(|_| format_err(format!("NASA7 row has {} coefficients", row.len())))
    };
    let thermo = match (
        entry.thermo.temperature_ranges.as_slice(),
        entry.thermo.data.as_slice(),
    ) {
        ([t_low, t_mid, t_high], [low, high]) => {
            Nasa7::new(*t_low, *t_mid, *t_high, coeffs(low)?, coeffs(high)?)
        }
        ([t_low, t_high], [only]) => Nasa7::single_range(*t_low, *t_high, coeffs(only)?),
        (ranges, data) => {
            return Err(format_err(format!(
                "{} temperature bounds with {} coefficient sets",
                ranges.len(),
                data.len()
            )));
        }
    };

    let species = Species::new(entry.name.clone(), entry.composition, thermo)?;
    match entry.molar_mass {
        Some(w) => species.with_molar_mass(w),
        None => Ok(species),
    }
}

fn reaction_from_entry(entry: ReactionEntry, units: &UnitSystem) -> MechResult<ReactionDef> {
    let eq = entry.equation.as_str();
    let format_err = |what: &str| MechError::Format {
        what: format!("reaction '{eq}': {what}"),
    };

    let parsed = parse_equation(eq)?;
    let order: f64 = parsed.reactants.iter().map(|(_, nu)| nu).sum();

    let declared = entry.kind.as_deref().unwrap_or(match parsed.collider {
        Collider::None => "elementary",
        Collider::ThirdBody => "three-body",
        Collider::Falloff(_) => "falloff",
    });

    let efficiencies = EfficiencyDef {
        default: entry.default_efficiency.unwrap_or(1.0),
        overrides: entry.efficiencies.into_iter().collect(),
    };

    let rate = match declared {
        "elementary" => {
            let k = entry
                .rate_constant
                .as_ref()
                .ok_or_else(|| format_err("missing rate-constant"))?;
            RateDef::Arrhenius(units.arrhenius(k, order))
        }
        "three-body" => {
            let k = entry
                .rate_constant
                .as_ref()
                .ok_or_else(|| format_err("missing rate-constant"))?;
            RateDef::ThirdBody {
                rate: units.arrhenius(k, order + 1.0),
                efficiencies,
            }
        }
        "falloff" | "Lindemann" | "Troe" => {
            let high = entry
                .high_p_rate_constant
                .as_ref()
                .ok_or_else(|| format_err("missing high-P-rate-constant"))?;
            let low = entry
                .low_p_rate_constant
                .as_ref()
                .ok_or_else(|| format_err("missing low-P-rate-constant"))?;
            RateDef::Falloff {
                high: units.arrhenius(high, order),
                low: units.arrhenius(low, order + 1.0),
                troe: entry.troe.as_ref().map(|t| Troe {
                    a: t.a,
                    t3: t.t3,
                    t1: t.t1,
                    t2: t.t2,
                }),
                efficiencies,
            }
        }
        other => return Err(format_err(&format!("unsupported reaction type '{other}'"))),
    };

    Ok(ReactionDef::from_equation(eq, rate)?.duplicate(entry.duplicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::RateLaw;
    use approx::assert_relative_eq;

    const TINY: &str = r#"
name: tiny
units: {length: cm, quantity: mol, activation-energy: cal/mol}
species:
- name: H
  composition: {H: 1}
  thermo:
    model: NASA7
    temperature-ranges: [200.0, 3500.0]
    data:
    - [2.5, 0.0, 0.0, 0.0, 0.0, 25473.66, -0.446682853]
- name: H2
  composition: {H: 2}
  thermo:
    model: NASA7
    temperature-ranges: [200.0, 3500.0]
    data:
    - [3.5, 0.0, 0.0, 0.0, 0.0, -1000.0, 1.0]
reactions:
- equation: 2 H + M <=> H2 + M
  type: three-body
  rate-constant: {A: 1.0e+18, b: -1.0, Ea: 0.0}
  efficiencies: {H2: 0.0}
- equation: H2 => 2 H
  rate-constant: {A: 4.0e+14, b: 0.0, Ea: 1.0e+5}
"#;

    #[test]
    fn converts_rate_units_to_si() {
        let mech = load_mechanism_str(TINY).unwrap();
        assert_eq!(mech.name(), "tiny");
        assert_eq!(mech.reaction_count(), 2);

        match mech.reactions()[0].rate() {
            RateLaw::ThirdBody { rate, efficiencies } => {
                // third order: (cm^3/mol)^2 -> (m^3/mol)^2
                assert_relative_eq!(rate.a, 1.0e18 * 1e-12, max_relative = 1e-12);
                assert_eq!(efficiencies.as_slice(), &[1.0, 0.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
        match mech.reactions()[1].rate() {
            RateLaw::Arrhenius(k) => {
                assert_relative_eq!(k.a, 4.0e14, max_relative = 1e-12);
                assert_relative_eq!(k.ea, 1.0e5 * CALORIE_J, max_relative = 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!mech.reactions()[1].is_reversible());
    }

    #[test]
    fn default_units_are_kmol_based() {
        let units = UnitSystem::from_entry(&UnitsEntry::default()).unwrap();
        let k = units.arrhenius(
            &RateEntry {
                a: 1.0e10,
                b: 0.0,
                ea: 4.184e7,
            },
            2.0,
        );
        assert_relative_eq!(k.a, 1.0e7, max_relative = 1e-12);
        assert_relative_eq!(k.ea, 4.184e4, max_relative = 1e-12);
    }

    #[test]
    fn rejects_bad_units_and_models() {
        let text = TINY.replace("length: cm", "length: furlong");
        assert!(matches!(
            load_mechanism_str(&text),
            Err(MechError::Format { .. })
        ));

        let text = TINY.replacen("model: NASA7", "model: Shomate", 1);
        assert!(matches!(
            load_mechanism_str(&text),
            Err(MechError::InvalidSpecies { .. })
        ));
    }

    #[test]
    fn missing_rate_constant_is_a_format_error() {
        let text = TINY.replace("  rate-constant: {A: 4.0e+14, b: 0.0, Ea: 1.0e+5}\n", "");
        assert!(matches!(
            load_mechanism_str(&text),
            Err(MechError::Format { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        assert!(matches!(
            load_mechanism_str("species: [ {name: H"),
            Err(MechError::Yaml(_))
        ));
    }
}
