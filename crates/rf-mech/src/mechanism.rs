//! Immutable mechanism and its validating builder.

use crate::error::{MechError, MechResult};
use crate::reaction::{RateDef, RateLaw, Reaction, ReactionDef, StoichTerm};
use crate::species::Species;
use rf_core::{ReactionId, SpeciesId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Species and reactions, read-only after construction.
///
/// Shared across threads behind an `Arc`; nothing mutates it after
/// [`MechanismBuilder::build`].
#[derive(Debug)]
pub struct Mechanism {
    name: String,
    species: Vec<Species>,
    reactions: Vec<Reaction>,
    index: HashMap<String, SpeciesId>,
    molar_masses: Vec<f64>,
    elements: Vec<String>,
}

impl Mechanism {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_by_id(&self, id: SpeciesId) -> &Species {
        &self.species[id.index()]
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn reaction(&self, id: ReactionId) -> &Reaction {
        &self.reactions[id.index()]
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.index.get(name).copied()
    }

    /// Like [`species_id`](Self::species_id) but fails with a mechanism error.
    pub fn require_species(&self, name: &str) -> MechResult<SpeciesId> {
        self.species_id(name)
            .ok_or_else(|| MechError::UnknownSpecies {
                reaction: String::from("<lookup>"),
                species: name.to_string(),
            })
    }

    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(Species::name)
    }

    /// kg/mol, indexed like [`species`](Self::species).
    pub fn molar_masses(&self) -> &[f64] {
        &self.molar_masses
    }

    /// Elements present in any species, sorted.
    pub fn element_names(&self) -> &[String] {
        &self.elements
    }
}

/// Collects species and reaction definitions and validates them as a whole.
#[derive(Debug)]
pub struct MechanismBuilder {
    name: String,
    species: Vec<Species>,
    reactions: Vec<ReactionDef>,
    continuity_tolerance: f64,
    element_balance_tolerance: f64,
}

impl MechanismBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            species: Vec::new(),
            reactions: Vec::new(),
            continuity_tolerance: 1e-4,
            element_balance_tolerance: 1e-6,
        }
    }

    /// Allowed gap between the two NASA7 ranges at T_mid, relative to
    /// `max(1, |value|)`.
    pub fn continuity_tolerance(mut self, tol: f64) -> Self {
        self.continuity_tolerance = tol;
        self
    }

    pub fn element_balance_tolerance(mut self, tol: f64) -> Self {
        self.element_balance_tolerance = tol;
        self
    }

    pub fn add_species(&mut self, species: Species) -> SpeciesId {
        self.species.push(species);
        SpeciesId::from_index(self.species.len() - 1)
    }

    pub fn add_reaction(&mut self, reaction: ReactionDef) -> ReactionId {
        self.reactions.push(reaction);
        ReactionId::from_index(self.reactions.len() - 1)
    }

    pub fn build(self) -> MechResult<Arc<Mechanism>> {
        if self.species.is_empty() {
            return Err(MechError::Format {
                what: "mechanism has no species".to_string(),
            });
        }

        let mut index = HashMap::with_capacity(self.species.len());
        for (i, sp) in self.species.iter().enumerate() {
            if index
                .insert(sp.name().to_string(), SpeciesId::from_index(i))
                .is_some()
            {
                return Err(MechError::DuplicateSpecies {
                    name: sp.name().to_string(),
                });
            }
            check_continuity(sp, self.continuity_tolerance)?;
        }

        let lookup = |name: &str| index.get(name).copied();
        let mut reactions = Vec::with_capacity(self.reactions.len());
        for def in self.reactions {
            let reaction = resolve_reaction(def, self.species.len(), &lookup)?;
            check_element_balance(&reaction, &self.species, self.element_balance_tolerance)?;
            reactions.push(reaction);
        }
        check_duplicates(&reactions)?;

        let elements: BTreeSet<String> = self
            .species
            .iter()
            .flat_map(|s| s.composition().keys().cloned())
            .collect();
        let molar_masses = self.species.iter().map(Species::molar_mass).collect();

        tracing::debug!(
            mechanism = %self.name,
            species = self.species.len(),
            reactions = reactions.len(),
            "mechanism built"
        );

        Ok(Arc::new(Mechanism {
            name: self.name,
            species: self.species,
            reactions,
            index,
            molar_masses,
            elements: elements.into_iter().collect(),
        }))
    }
}

fn check_continuity(sp: &Species, tol: f64) -> MechResult<()> {
    let (lo, hi) = sp.thermo().at_midpoint();
    for (property, a, b) in [
        ("cp/R", lo.cp_r, hi.cp_r),
        ("h/RT", lo.h_rt, hi.h_rt),
        ("s/R", lo.s_r, hi.s_r),
    ] {
        if (a - b).abs() > tol * a.abs().max(b.abs()).max(1.0) {
            return Err(MechError::ThermoDiscontinuity {
                species: sp.name().to_string(),
                property,
                low: a,
                high: b,
            });
        }
    }
    Ok(())
}

fn resolve_side(
    equation: &str,
    side: &[(String, f64)],
    lookup: &impl Fn(&str) -> Option<SpeciesId>,
) -> MechResult<Vec<StoichTerm>> {
    let mut terms: Vec<StoichTerm> = Vec::with_capacity(side.len());
    for (name, nu) in side {
        let species = lookup(name).ok_or_else(|| MechError::UnknownSpecies {
            reaction: equation.to_string(),
            species: name.clone(),
        })?;
        if !nu.is_finite() || *nu < 0.0 {
            return Err(MechError::InvalidStoichiometry {
                reaction: equation.to_string(),
                what: format!("coefficient of {name} must be non-negative, got {nu}"),
            });
        }
        if *nu == 0.0 {
            continue;
        }
        match terms.iter_mut().find(|t| t.species == species) {
            Some(t) => t.coefficient += nu,
            None => terms.push(StoichTerm {
                species,
                coefficient: *nu,
            }),
        }
    }
    Ok(terms)
}

fn resolve_reaction(
    def: ReactionDef,
    n_species: usize,
    lookup: &impl Fn(&str) -> Option<SpeciesId>,
) -> MechResult<Reaction> {
    let eq = def.equation.as_str();
    let reactants = resolve_side(eq, &def.reactants, lookup)?;
    let products = resolve_side(eq, &def.products, lookup)?;
    if reactants.is_empty() || products.is_empty() {
        return Err(MechError::InvalidStoichiometry {
            reaction: eq.to_string(),
            what: "each side needs at least one species".to_string(),
        });
    }

    def.rate.check().map_err(|what| MechError::InvalidRate {
        reaction: eq.to_string(),
        what,
    })?;
    let rate = match def.rate {
        RateDef::Arrhenius(k) => RateLaw::Arrhenius(k),
        RateDef::ThirdBody { rate, efficiencies } => RateLaw::ThirdBody {
            rate,
            efficiencies: efficiencies.resolve(eq, n_species, lookup)?,
        },
        RateDef::Falloff {
            high,
            low,
            troe,
            efficiencies,
        } => RateLaw::Falloff {
            high,
            low,
            troe,
            efficiencies: efficiencies.resolve(eq, n_species, lookup)?,
        },
    };

    let reaction = Reaction {
        equation: def.equation,
        reactants,
        products,
        reversible: def.reversible,
        duplicate: def.duplicate,
        rate,
    };

    let all_zero = (0..n_species)
        .map(SpeciesId::from_index)
        .all(|id| reaction.net_coefficient(id) == 0.0);
    if all_zero {
        return Err(MechError::InvalidStoichiometry {
            reaction: reaction.equation,
            what: "net stoichiometry is zero".to_string(),
        });
    }
    Ok(reaction)
}

fn check_element_balance(reaction: &Reaction, species: &[Species], tol: f64) -> MechResult<()> {
    let mut balance: HashMap<&str, f64> = HashMap::new();
    for (side, sign) in [(reaction.reactants(), -1.0), (reaction.products(), 1.0)] {
        for term in side {
            for (el, n) in species[term.species.index()].composition() {
                *balance.entry(el.as_str()).or_insert(0.0) += sign * n * term.coefficient;
            }
        }
    }
    let mut elements: Vec<_> = balance.into_iter().collect();
    elements.sort_by(|a, b| a.0.cmp(b.0));
    match elements.into_iter().find(|(_, d)| d.abs() > tol) {
        Some((element, imbalance)) => Err(MechError::UnbalancedReaction {
            reaction: reaction.equation().to_string(),
            element: element.to_string(),
            imbalance,
        }),
        None => Ok(()),
    }
}

fn check_duplicates(reactions: &[Reaction]) -> MechResult<()> {
    let mut seen: HashMap<_, usize> = HashMap::new();
    for (i, r) in reactions.iter().enumerate() {
        if let Some(&other) = seen.get(&r.signature()) {
            if !(r.is_duplicate() && reactions[other].is_duplicate()) {
                return Err(MechError::UndeclaredDuplicate {
                    reaction: r.equation().to_string(),
                    other,
                });
            }
        } else {
            seen.insert(r.signature(), i);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nasa::Nasa7;
    use crate::reaction::{Arrhenius, EfficiencyDef};

    fn flat(h: f64) -> Nasa7 {
        Nasa7::new(
            200.0,
            1000.0,
            3000.0,
            [3.5, 0.0, 0.0, 0.0, 0.0, h, 1.0],
            [3.5, 0.0, 0.0, 0.0, 0.0, h, 1.0],
        )
    }

    fn h2_system() -> MechanismBuilder {
        let mut b = MechanismBuilder::new("toy");
        b.add_species(Species::new("H", [("H", 1.0)], flat(2.5e4)).unwrap());
        b.add_species(Species::new("H2", [("H", 2.0)], flat(0.0)).unwrap());
        b.add_species(Species::new("AR", [("Ar", 1.0)], flat(0.0)).unwrap());
        b
    }

    fn rate() -> Arrhenius {
        Arrhenius::new(1e6, 0.0, 0.0)
    }

    #[test]
    fn builds_and_resolves_indices() {
        let mut b = h2_system();
        b.add_reaction(
            ReactionDef::from_equation(
                "2 H + M <=> H2 + M",
                RateDef::ThirdBody {
                    rate: rate(),
                    efficiencies: EfficiencyDef {
                        default: 1.0,
                        overrides: vec![("AR".to_string(), 0.5)],
                    },
                },
            )
            .unwrap(),
        );
        let mech = b.build().unwrap();
        assert_eq!(mech.species_count(), 3);
        assert_eq!(mech.reaction_count(), 1);
        assert_eq!(mech.element_names(), &["Ar".to_string(), "H".to_string()]);

        let h = mech.species_id("H").unwrap();
        let ar = mech.species_id("AR").unwrap();
        let r = &mech.reactions()[0];
        assert_eq!(r.net_coefficient(h), -2.0);
        assert_eq!(r.delta_moles(), -1.0);
        let eff = r.rate().efficiencies().unwrap();
        assert_eq!(eff.efficiency(ar), 0.5);
        assert_eq!(eff.efficiency(h), 1.0);
    }

    #[test]
    fn unknown_species_in_reaction_or_efficiency() {
        let mut b = h2_system();
        b.add_reaction(
            ReactionDef::from_equation("H + O <=> OH", RateDef::Arrhenius(rate())).unwrap(),
        );
        assert!(matches!(
            b.build(),
            Err(MechError::UnknownSpecies { species, .. }) if species == "O"
        ));

        let mut b = h2_system();
        b.add_reaction(
            ReactionDef::from_equation(
                "2 H + M <=> H2 + M",
                RateDef::ThirdBody {
                    rate: rate(),
                    efficiencies: EfficiencyDef {
                        default: 1.0,
                        overrides: vec![("N2".to_string(), 0.4)],
                    },
                },
            )
            .unwrap(),
        );
        assert!(matches!(b.build(), Err(MechError::UnknownSpecies { .. })));
    }

    #[test]
    fn duplicate_species_rejected() {
        let mut b = h2_system();
        b.add_species(Species::new("H", [("H", 1.0)], flat(0.0)).unwrap());
        assert!(matches!(b.build(), Err(MechError::DuplicateSpecies { .. })));
    }

    #[test]
    fn discontinuous_thermo_rejected() {
        let mut b = MechanismBuilder::new("bad");
        let mut thermo = flat(0.0);
        thermo.high[0] = 3.6;
        b.add_species(Species::new("H", [("H", 1.0)], thermo).unwrap());
        assert!(matches!(
            b.build(),
            Err(MechError::ThermoDiscontinuity { property: "cp/R", .. })
        ));
    }

    #[test]
    fn stoichiometry_checks() {
        let mut b = h2_system();
        b.add_reaction(ReactionDef::new(
            vec![("H2".into(), 1.0)],
            vec![("H2".into(), 1.0)],
            true,
            RateDef::Arrhenius(rate()),
        ));
        assert!(matches!(b.build(), Err(MechError::InvalidStoichiometry { .. })));

        let mut b = h2_system();
        b.add_reaction(ReactionDef::new(
            vec![("H".into(), -1.0)],
            vec![("H2".into(), 1.0)],
            true,
            RateDef::Arrhenius(rate()),
        ));
        assert!(matches!(b.build(), Err(MechError::InvalidStoichiometry { .. })));
    }

    #[test]
    fn unbalanced_reaction_rejected() {
        let mut b = h2_system();
        b.add_reaction(
            ReactionDef::from_equation("H <=> H2", RateDef::Arrhenius(rate())).unwrap(),
        );
        assert!(matches!(
            b.build(),
            Err(MechError::UnbalancedReaction { element, .. }) if element == "H"
        ));
    }

    #[test]
    fn duplicates_need_flags() {
        let def = || ReactionDef::from_equation("2 H <=> H2", RateDef::Arrhenius(rate())).unwrap();

        let mut b = h2_system();
        b.add_reaction(def());
        b.add_reaction(def());
        assert!(matches!(
            b.build(),
            Err(MechError::UndeclaredDuplicate { other: 0, .. })
        ));

        let mut b = h2_system();
        b.add_reaction(def().duplicate(true));
        b.add_reaction(def().duplicate(true));
        assert_eq!(b.build().unwrap().reaction_count(), 2);
    }

    #[test]
    fn mechanism_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mechanism>();
    }
}
