//! Reactions and their rate laws.
//!
//! [`ReactionDef`] names species by string and is what loaders and callers
//! produce; [`Reaction`] is the validated, index-resolved form stored in a
//! [`Mechanism`](crate::Mechanism).

use crate::equation::{Collider, parse_equation};
use crate::error::{MechError, MechResult};
use rf_core::SpeciesId;

/// Modified Arrhenius parameters in SI units: `k = a * T^b * exp(-ea / (R T))`.
///
/// `a` is in (m^3/mol)^(order-1)/s, `ea` in J/mol.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrhenius {
    pub a: f64,
    pub b: f64,
    pub ea: f64,
}

impl Arrhenius {
    pub const fn new(a: f64, b: f64, ea: f64) -> Self {
        Self { a, b, ea }
    }

    fn check(&self, label: &str) -> Result<(), String> {
        if !(self.a.is_finite() && self.b.is_finite() && self.ea.is_finite()) {
            return Err(format!("{label} has non-finite parameters"));
        }
        if self.a < 0.0 {
            return Err(format!("{label} pre-exponential factor is negative"));
        }
        Ok(())
    }
}

/// Troe falloff blending parameters; the `t2` term is optional.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Troe {
    pub a: f64,
    pub t3: f64,
    pub t1: f64,
    pub t2: Option<f64>,
}

impl Troe {
    fn check(&self) -> Result<(), String> {
        let finite = [self.a, self.t3, self.t1, self.t2.unwrap_or(0.0)]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err("Troe parameters must be finite".to_string());
        }
        if self.t3 < 0.0 || self.t1 < 0.0 {
            return Err("Troe T3 and T1 must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Collision efficiencies resolved to one entry per species.
#[derive(Clone, Debug, PartialEq)]
pub struct ThirdBodyEfficiencies {
    default: f64,
    per_species: Vec<f64>,
}

impl ThirdBodyEfficiencies {
    pub fn default_efficiency(&self) -> f64 {
        self.default
    }

    #[inline]
    pub fn efficiency(&self, id: SpeciesId) -> f64 {
        self.per_species[id.index()]
    }

    /// Dense efficiency vector indexed like the mechanism's species.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.per_species
    }
}

/// Closed set of supported rate laws.
#[derive(Clone, Debug, PartialEq)]
pub enum RateLaw {
    Arrhenius(Arrhenius),
    ThirdBody {
        rate: Arrhenius,
        efficiencies: ThirdBodyEfficiencies,
    },
    /// Lindemann falloff when `troe` is `None`.
    Falloff {
        high: Arrhenius,
        low: Arrhenius,
        troe: Option<Troe>,
        efficiencies: ThirdBodyEfficiencies,
    },
}

impl RateLaw {
    pub fn efficiencies(&self) -> Option<&ThirdBodyEfficiencies> {
        match self {
            RateLaw::Arrhenius(_) => None,
            RateLaw::ThirdBody { efficiencies, .. } | RateLaw::Falloff { efficiencies, .. } => {
                Some(efficiencies)
            }
        }
    }

    fn kind(&self) -> u8 {
        match self {
            RateLaw::Arrhenius(_) => 0,
            RateLaw::ThirdBody { .. } => 1,
            RateLaw::Falloff { .. } => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoichTerm {
    pub species: SpeciesId,
    pub coefficient: f64,
}

/// A validated reaction.
#[derive(Clone, Debug, PartialEq)]
pub struct Reaction {
    pub(crate) equation: String,
    pub(crate) reactants: Vec<StoichTerm>,
    pub(crate) products: Vec<StoichTerm>,
    pub(crate) reversible: bool,
    pub(crate) duplicate: bool,
    pub(crate) rate: RateLaw,
}

impl Reaction {
    pub fn equation(&self) -> &str {
        &self.equation
    }

    pub fn reactants(&self) -> &[StoichTerm] {
        &self.reactants
    }

    pub fn products(&self) -> &[StoichTerm] {
        &self.products
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    pub fn rate(&self) -> &RateLaw {
        &self.rate
    }

    /// Net stoichiometric coefficient (products minus reactants) of a species.
    pub fn net_coefficient(&self, id: SpeciesId) -> f64 {
        let sum = |side: &[StoichTerm]| {
            side.iter()
                .filter(|t| t.species == id)
                .map(|t| t.coefficient)
                .sum::<f64>()
        };
        sum(&self.products) - sum(&self.reactants)
    }

    /// Change in gas-phase moles, excluding any third body.
    pub fn delta_moles(&self) -> f64 {
        self.products.iter().map(|t| t.coefficient).sum::<f64>()
            - self.reactants.iter().map(|t| t.coefficient).sum::<f64>()
    }

    /// Sum of reactant coefficients, collision partners excluded.
    pub fn reaction_order(&self) -> f64 {
        self.reactants.iter().map(|t| t.coefficient).sum()
    }

    /// Stoichiometric signature used to detect accidental duplicates.
    pub(crate) fn signature(&self) -> (u8, Vec<(usize, u64)>, Vec<(usize, u64)>) {
        let sig = |side: &[StoichTerm]| {
            let mut v: Vec<(usize, u64)> = side
                .iter()
                .map(|t| (t.species.index(), t.coefficient.to_bits()))
                .collect();
            v.sort_unstable();
            v
        };
        (self.rate.kind(), sig(&self.reactants), sig(&self.products))
    }
}

/// Collision efficiencies by species name.
#[derive(Clone, Debug, PartialEq)]
pub struct EfficiencyDef {
    pub default: f64,
    pub overrides: Vec<(String, f64)>,
}

impl Default for EfficiencyDef {
    fn default() -> Self {
        Self {
            default: 1.0,
            overrides: Vec::new(),
        }
    }
}

impl EfficiencyDef {
    /// Only `species` acts as collision partner.
    pub fn single(species: impl Into<String>) -> Self {
        Self {
            default: 0.0,
            overrides: vec![(species.into(), 1.0)],
        }
    }

    pub(crate) fn resolve(
        &self,
        reaction: &str,
        n_species: usize,
        lookup: impl Fn(&str) -> Option<SpeciesId>,
    ) -> MechResult<ThirdBodyEfficiencies> {
        if !(self.default.is_finite() && self.default >= 0.0) {
            return Err(MechError::InvalidRate {
                reaction: reaction.to_string(),
                what: format!("default efficiency must be non-negative, got {}", self.default),
            });
        }
        let mut per_species = vec![self.default; n_species];
        for (name, eff) in &self.overrides {
            let id = lookup(name).ok_or_else(|| MechError::UnknownSpecies {
                reaction: reaction.to_string(),
                species: name.clone(),
            })?;
            if !(eff.is_finite() && *eff >= 0.0) {
                return Err(MechError::InvalidRate {
                    reaction: reaction.to_string(),
                    what: format!("efficiency of {name} must be non-negative, got {eff}"),
                });
            }
            per_species[id.index()] = *eff;
        }
        Ok(ThirdBodyEfficiencies {
            default: self.default,
            per_species,
        })
    }
}

/// Rate law with efficiencies still keyed by species name.
#[derive(Clone, Debug, PartialEq)]
pub enum RateDef {
    Arrhenius(Arrhenius),
    ThirdBody {
        rate: Arrhenius,
        efficiencies: EfficiencyDef,
    },
    Falloff {
        high: Arrhenius,
        low: Arrhenius,
        troe: Option<Troe>,
        efficiencies: EfficiencyDef,
    },
}

impl RateDef {
    pub(crate) fn check(&self) -> Result<(), String> {
        match self {
            RateDef::Arrhenius(k) => k.check("rate constant"),
            RateDef::ThirdBody { rate, .. } => rate.check("rate constant"),
            RateDef::Falloff {
                high, low, troe, ..
            } => {
                high.check("high-pressure limit")?;
                low.check("low-pressure limit")?;
                if high.a == 0.0 {
                    return Err("high-pressure pre-exponential factor must be positive".to_string());
                }
                troe.as_ref().map_or(Ok(()), Troe::check)
            }
        }
    }
}

/// Reaction description prior to validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionDef {
    pub equation: String,
    pub reactants: Vec<(String, f64)>,
    pub products: Vec<(String, f64)>,
    pub reversible: bool,
    pub duplicate: bool,
    pub rate: RateDef,
}

impl ReactionDef {
    /// Explicit reactant/product lists; the equation string is synthesised.
    pub fn new(
        reactants: Vec<(String, f64)>,
        products: Vec<(String, f64)>,
        reversible: bool,
        rate: RateDef,
    ) -> Self {
        let arrow = if reversible { "<=>" } else { "=>" };
        let marker = match &rate {
            RateDef::Arrhenius(_) => "",
            RateDef::ThirdBody { .. } => " + M",
            RateDef::Falloff { .. } => " (+M)",
        };
        let equation = format!(
            "{}{marker} {arrow} {}{marker}",
            format_side(&reactants),
            format_side(&products)
        );
        Self {
            equation,
            reactants,
            products,
            reversible,
            duplicate: false,
            rate,
        }
    }

    /// Parse `equation` and check that its collider marker agrees with `rate`.
    ///
    /// A falloff equation with an explicit collider such as `(+AR)` overrides
    /// the efficiencies so that only that species collides.
    pub fn from_equation(equation: &str, rate: RateDef) -> MechResult<Self> {
        let parsed = parse_equation(equation)?;
        let mismatch = |what: &str| MechError::Equation {
            equation: equation.to_string(),
            what: what.to_string(),
        };
        let rate = match (parsed.collider, rate) {
            (Collider::None, r @ RateDef::Arrhenius(_)) => r,
            (Collider::ThirdBody, r @ RateDef::ThirdBody { .. }) => r,
            (Collider::Falloff(None), r @ RateDef::Falloff { .. }) => r,
            (
                Collider::Falloff(Some(species)),
                RateDef::Falloff {
                    high, low, troe, ..
                },
            ) => RateDef::Falloff {
                high,
                low,
                troe,
                efficiencies: EfficiencyDef::single(species),
            },
            (Collider::None, _) => return Err(mismatch("rate law needs a collider marker")),
            (Collider::ThirdBody, _) => return Err(mismatch("'+ M' requires a three-body rate")),
            (Collider::Falloff(_), _) => return Err(mismatch("'(+M)' requires a falloff rate")),
        };
        Ok(Self {
            equation: equation.trim().to_string(),
            reactants: parsed.reactants,
            products: parsed.products,
            reversible: parsed.reversible,
            duplicate: false,
            rate,
        })
    }

    pub fn duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = duplicate;
        self
    }
}

fn format_side(side: &[(String, f64)]) -> String {
    side.iter()
        .map(|(name, nu)| {
            if *nu == 1.0 {
                name.clone()
            } else {
                format!("{nu} {name}")
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k() -> Arrhenius {
        Arrhenius::new(1e6, 0.0, 1e4)
    }

    #[test]
    fn synthesised_equation_shows_marker() {
        let def = ReactionDef::new(
            vec![("H".into(), 2.0)],
            vec![("H2".into(), 1.0)],
            true,
            RateDef::ThirdBody {
                rate: k(),
                efficiencies: EfficiencyDef::default(),
            },
        );
        assert_eq!(def.equation, "2 H + M <=> H2 + M");
    }

    #[test]
    fn explicit_falloff_collider_sets_efficiencies() {
        let def = ReactionDef::from_equation(
            "H + O2 (+AR) <=> HO2 (+AR)",
            RateDef::Falloff {
                high: k(),
                low: k(),
                troe: None,
                efficiencies: EfficiencyDef::default(),
            },
        )
        .unwrap();
        match def.rate {
            RateDef::Falloff { efficiencies, .. } => {
                assert_eq!(efficiencies.default, 0.0);
                assert_eq!(efficiencies.overrides, vec![("AR".to_string(), 1.0)]);
            }
            other => panic!("unexpected rate {other:?}"),
        }
    }

    #[test]
    fn marker_and_rate_must_agree() {
        let err = ReactionDef::from_equation("H + O2 <=> HO2", RateDef::Falloff {
            high: k(),
            low: k(),
            troe: None,
            efficiencies: EfficiencyDef::default(),
        })
        .unwrap_err();
        assert!(matches!(err, MechError::Equation { .. }));

        assert!(
            ReactionDef::from_equation("2 O + M <=> O2 + M", RateDef::Arrhenius(k())).is_err()
        );
    }

    #[test]
    fn rate_checks() {
        assert!(RateDef::Arrhenius(Arrhenius::new(-1.0, 0.0, 0.0)).check().is_err());
        assert!(RateDef::Arrhenius(Arrhenius::new(1.0, f64::NAN, 0.0)).check().is_err());
        let bad_troe = RateDef::Falloff {
            high: k(),
            low: k(),
            troe: Some(Troe {
                a: 0.5,
                t3: -1.0,
                t1: 100.0,
                t2: None,
            }),
            efficiencies: EfficiencyDef::default(),
        };
        assert!(bad_troe.check().is_err());
    }
}
