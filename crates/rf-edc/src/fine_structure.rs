//! Fine-structure scales from the local turbulence state.
//!
//! ```text
//! ξ* = Cξ (ν ε / k²)^a      τ* = Cτ (ν / ε)^b      κ = ξ*² / (1 - ξ*³)
//! ```
//!
//! κ is the factor between the fine-structure composition change rate
//! ρ (Y* - Y) / τ* and the mean cell rate. It is clamped to [0, 1] and is
//! exactly 1 once ξ* reaches 1.

use crate::error::{EdcError, EdcResult};

/// Local turbulence fields of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurbulenceState {
    /// Turbulence kinetic energy (m^2/s^2)
    pub k: f64,
    /// Dissipation rate (m^2/s^3)
    pub epsilon: f64,
    /// Kinematic viscosity (m^2/s)
    pub nu: f64,
}

impl TurbulenceState {
    pub fn new(k: f64, epsilon: f64, nu: f64) -> Self {
        Self { k, epsilon, nu }
    }

    fn validate(&self) -> EdcResult<()> {
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(EdcError::Turbulence {
                what: format!("k = {}", self.k),
            });
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(EdcError::Turbulence {
                what: format!("epsilon = {}", self.epsilon),
            });
        }
        if !(self.nu.is_finite() && self.nu > 0.0) {
            return Err(EdcError::Turbulence {
                what: format!("nu = {}", self.nu),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdcConstants {
    pub c_xi: f64,
    pub c_tau: f64,
    pub xi_exponent: f64,
    pub tau_exponent: f64,
}

impl Default for EdcConstants {
    fn default() -> Self {
        Self {
            c_xi: 2.1377,
            c_tau: 0.4082,
            xi_exponent: 0.5,
            tau_exponent: 0.5,
        }
    }
}

impl EdcConstants {
    pub fn validate(&self) -> EdcResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(positive(self.c_xi) && positive(self.c_tau)) {
            return Err(EdcError::InvalidArg {
                what: "EDC constants must be positive",
            });
        }
        if !(positive(self.xi_exponent) && positive(self.tau_exponent)) {
            return Err(EdcError::InvalidArg {
                what: "EDC exponents must be positive",
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FineStructure {
    /// Fine-structure length fraction ξ*
    pub xi: f64,
    /// Residence time τ* (s); infinite when ε = 0
    pub tau: f64,
    /// Rate factor κ in [0, 1]
    pub kappa: f64,
}

impl FineStructure {
    /// Whether the cell needs a fine-structure integration at all.
    pub fn is_active(&self) -> bool {
        self.kappa > 0.0 && self.tau.is_finite()
    }
}

pub fn fine_structure(turbulence: &TurbulenceState, constants: &EdcConstants) -> EdcResult<FineStructure> {
    turbulence.validate()?;
    let TurbulenceState { k, epsilon, nu } = *turbulence;

    let xi = constants.c_xi * (nu * epsilon / (k * k)).powf(constants.xi_exponent);
    let tau = if epsilon > 0.0 {
        constants.c_tau * (nu / epsilon).powf(constants.tau_exponent)
    } else {
        f64::INFINITY
    };
    let kappa = if xi >= 1.0 {
        1.0
    } else {
        (xi * xi / (1.0 - xi.powi(3))).clamp(0.0, 1.0)
    };
    Ok(FineStructure { xi, tau, kappa })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scales_follow_the_closure_formulas() {
        let c = EdcConstants::default();
        let turb = TurbulenceState::new(1.0, 1.0, 1.5e-5);
        let fs = fine_structure(&turb, &c).unwrap();
        assert_relative_eq!(fs.xi, 2.1377 * (1.5e-5f64).sqrt(), max_relative = 1e-12);
        assert_relative_eq!(fs.tau, 0.4082 * (1.5e-5f64).sqrt(), max_relative = 1e-12);
        assert_relative_eq!(fs.kappa, fs.xi * fs.xi / (1.0 - fs.xi.powi(3)));
        assert!(fs.is_active());
    }

    #[test]
    fn kappa_saturates_at_one() {
        let c = EdcConstants::default();
        let fs = fine_structure(&TurbulenceState::new(1.0, 2.5e10, 1.5e-5), &c).unwrap();
        assert!(fs.xi > 1.0);
        assert_eq!(fs.kappa, 1.0);
        assert_relative_eq!(fs.tau, 1.0e-8, max_relative = 1e-3);

        // just below ξ* = 1 the raw ratio exceeds 1 and is clamped
        let eps = (0.95 / c.c_xi).powi(2) / 1.5e-5;
        let fs = fine_structure(&TurbulenceState::new(1.0, eps, 1.5e-5), &c).unwrap();
        assert!(fs.xi < 1.0);
        assert_eq!(fs.kappa, 1.0);
    }

    #[test]
    fn quiescent_cell_is_inactive() {
        let fs = fine_structure(&TurbulenceState::new(1.0, 0.0, 1.5e-5), &EdcConstants::default()).unwrap();
        assert_eq!(fs.xi, 0.0);
        assert_eq!(fs.kappa, 0.0);
        assert!(fs.tau.is_infinite());
        assert!(!fs.is_active());
    }

    #[test]
    fn rejects_invalid_turbulence() {
        let c = EdcConstants::default();
        for turb in [
            TurbulenceState::new(0.0, 1.0, 1e-5),
            TurbulenceState::new(1.0, -1.0, 1e-5),
            TurbulenceState::new(1.0, 1.0, 0.0),
            TurbulenceState::new(f64::NAN, 1.0, 1e-5),
        ] {
            assert!(fine_structure(&turb, &c).is_err(), "{turb:?}");
        }
        let bad = EdcConstants {
            c_tau: 0.0,
            ..EdcConstants::default()
        };
        assert!(bad.validate().is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn kappa_is_bounded_and_grows_with_dissipation(
                log_eps in -8.0f64..12.0,
                factor in 1.0f64..100.0,
                k in 1e-3f64..1e2,
            ) {
                let c = EdcConstants::default();
                let eps = 10f64.powf(log_eps);
                let lo = fine_structure(&TurbulenceState::new(k, eps, 1.5e-5), &c).unwrap();
                let hi = fine_structure(&TurbulenceState::new(k, eps * factor, 1.5e-5), &c).unwrap();
                prop_assert!((0.0..=1.0).contains(&lo.kappa));
                prop_assert!(hi.kappa >= lo.kappa);
                prop_assert!(hi.tau <= lo.tau);
            }
        }
    }
}
