//! Element table used for molar masses and element-balance checks.

use std::collections::BTreeMap;

/// (symbol, atomic weight in kg/mol)
const ATOMIC_WEIGHTS: &[(&str, f64)] = &[
    ("H", 1.008e-3),
    ("He", 4.002_602e-3),
    ("C", 12.011e-3),
    ("N", 14.007e-3),
    ("O", 15.999e-3),
    ("F", 18.998_403e-3),
    ("Ne", 20.1797e-3),
    ("S", 32.06e-3),
    ("Cl", 35.45e-3),
    ("Ar", 39.95e-3),
    ("Kr", 83.798e-3),
    ("Xe", 131.293e-3),
];

/// Canonical symbol for an element name, case-insensitive ("AR" -> "Ar").
pub fn canonical_symbol(symbol: &str) -> Option<&'static str> {
    ATOMIC_WEIGHTS
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(s, _)| *s)
}

/// Atomic weight in kg/mol.
pub fn atomic_weight(symbol: &str) -> Option<f64> {
    ATOMIC_WEIGHTS
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, w)| *w)
}

/// Molar mass of a composition, or the first unknown element.
pub fn molar_mass(composition: &BTreeMap<String, f64>) -> Result<f64, String> {
    composition.iter().try_fold(0.0, |acc, (el, n)| {
        atomic_weight(el)
            .map(|w| acc + w * n)
            .ok_or_else(|| el.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(canonical_symbol("AR"), Some("Ar"));
        assert_eq!(atomic_weight("o"), Some(15.999e-3));
        assert_eq!(atomic_weight("Zz"), None);
    }

    #[test]
    fn water_molar_mass() {
        let comp = BTreeMap::from([("H".to_string(), 2.0), ("O".to_string(), 1.0)]);
        let w = molar_mass(&comp).unwrap();
        assert!((w - 18.015e-3).abs() < 1e-9);
    }

    #[test]
    fn unknown_element_is_reported() {
        let comp = BTreeMap::from([("Q".to_string(), 1.0)]);
        assert_eq!(molar_mass(&comp).unwrap_err(), "Q");
    }
}
