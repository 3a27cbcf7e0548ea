//! Balance equations of the reactor kinds as an [`OdeSystem`].

use crate::error::{ReactorError, ReactorResult};
use crate::model::{ReactorKind, StirredInflow};
use crate::state::{FRACTION_TOLERANCE, GasState, pressure_from_density};
use nalgebra::DVector;
use rf_kinetics::KineticsEvaluator;
use rf_mech::mixture::{concentrations_into, ideal_gas_density, mean_molar_mass, normalize_mass_fractions};
use rf_mech::{Mechanism, SpeciesThermoTable};
use rf_solver::{OdeSystem, Projection, SolverError, SolverResult};

/// Perturbation floor for mass-fraction columns of the Jacobian.
const SPECIES_PERTURBATION_SCALE: f64 = 1e-6;

/// ODE right-hand side for `[Y_0 .. Y_{K-1}, T]`.
///
/// Owns its kinetics workspace; one instance per integration.
#[derive(Clone, Debug)]
pub struct ReactorOde<'m> {
    mech: &'m Mechanism,
    kind: ReactorKind,
    /// Fixed pressure of isobaric kinds (Pa)
    pressure: f64,
    /// Fixed density of the constant-volume kind (kg/m^3)
    density: f64,
    kinetics: KineticsEvaluator<'m>,
    conc: Vec<f64>,
    /// Species enthalpies at the inflow temperature (J/kg); stirred only
    feed_enthalpy: Vec<f64>,
    temperature_atol: f64,
    negative_tolerance: f64,
    projection_tolerance: f64,
}

impl<'m> ReactorOde<'m> {
    pub fn new(mech: &'m Mechanism, kind: ReactorKind, initial: &GasState) -> ReactorResult<Self> {
        let n = mech.species_count();
        if initial.mass_fractions().len() != n {
            return Err(ReactorError::InvalidArg {
                what: "initial state does not match the mechanism",
            });
        }
        let mut kind = kind;
        let mut feed_enthalpy = Vec::new();
        if let ReactorKind::Stirred(inflow) = &mut kind {
            validate_inflow(inflow, n)?;
            let table = SpeciesThermoTable::at(mech, inflow.temperature);
            feed_enthalpy = (0..n)
                .map(|k| table.enthalpy_molar(k) / mech.molar_masses()[k])
                .collect();
        }

        Ok(Self {
            mech,
            kind,
            pressure: initial.pressure_pa(),
            density: initial.density(mech),
            kinetics: KineticsEvaluator::new(mech),
            conc: vec![0.0; n],
            feed_enthalpy,
            temperature_atol: 1e-6,
            negative_tolerance: 1e-8,
            projection_tolerance: FRACTION_TOLERANCE,
        })
    }

    /// Absolute tolerance on T, admissible negative mass fraction during a
    /// step, and the projection size above which a warning is logged.
    pub fn with_tolerances(mut self, temperature_atol: f64, negative_tolerance: f64, projection_tolerance: f64) -> Self {
        self.temperature_atol = temperature_atol;
        self.negative_tolerance = negative_tolerance;
        self.projection_tolerance = projection_tolerance;
        self
    }

    pub fn mechanism(&self) -> &'m Mechanism {
        self.mech
    }

    pub fn kind(&self) -> &ReactorKind {
        &self.kind
    }

    pub fn species_count(&self) -> usize {
        self.mech.species_count()
    }

    pub(crate) fn reference_pressure(&self) -> f64 {
        self.pressure
    }

    pub(crate) fn reference_density(&self) -> f64 {
        self.density
    }

    /// State vector `[Y.., T]` of a gas state.
    pub fn state_vector(&self, state: &GasState) -> DVector<f64> {
        let n = self.species_count();
        DVector::from_fn(n + 1, |i, _| {
            if i < n {
                state.mass_fractions()[i]
            } else {
                state.temperature_k()
            }
        })
    }

    /// Density at mass fractions `y` and temperature `t`, kg/m^3.
    pub fn density_at(&self, y: &[f64], t: f64) -> f64 {
        if self.kind.is_isobaric() {
            ideal_gas_density(self.pressure, t, mean_molar_mass(self.mech.molar_masses(), y))
        } else {
            self.density
        }
    }

    /// Pressure at mass fractions `y` and temperature `t`, Pa.
    pub fn pressure_at(&self, y: &[f64], t: f64) -> f64 {
        if self.kind.is_isobaric() {
            self.pressure
        } else {
            pressure_from_density(self.mech, self.density, t, y)
        }
    }

    /// Convert a state vector back into a [`GasState`].
    pub fn gas_state(&self, y: &DVector<f64>) -> ReactorResult<GasState> {
        let n = self.species_count();
        let temperature = y[n];
        let fractions = y.as_slice()[..n].to_vec();
        let pressure = self.pressure_at(&fractions, temperature);
        GasState::from_raw(temperature, pressure, fractions)
    }

    /// Net molar production rates at state `y`, mol/(m^3 s).
    pub fn production_rates(&mut self, y: &DVector<f64>) -> ReactorResult<&[f64]> {
        self.evaluate(y.as_slice())?;
        Ok(self.kinetics.snapshot().net)
    }

    /// Chemical heat-release rate at state `y`, W/m^3.
    pub fn heat_release_rate(&mut self, y: &DVector<f64>) -> ReactorResult<f64> {
        self.evaluate(y.as_slice())?;
        Ok(self.kinetics.snapshot().heat_release_rate)
    }

    /// Evaluate kinetics at `[Y.., T]`; returns the density used.
    fn evaluate(&mut self, y: &[f64]) -> ReactorResult<f64> {
        let n = self.species_count();
        if y.len() != n + 1 {
            return Err(ReactorError::InvalidArg {
                what: "state vector length must be species count + 1",
            });
        }
        let temperature = y[n];
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ReactorError::NonPhysical {
                what: format!("temperature {temperature} K"),
            });
        }
        let fractions = &y[..n];
        let rho = self.density_at(fractions, temperature);
        if !(rho.is_finite() && rho > 0.0) {
            return Err(ReactorError::NonPhysical {
                what: format!("density {rho} kg/m^3"),
            });
        }
        concentrations_into(rho, self.mech.molar_masses(), fractions, &mut self.conc);
        self.kinetics.evaluate(temperature, &self.conc)?;
        Ok(rho)
    }
}

fn validate_inflow(inflow: &mut StirredInflow, species: usize) -> ReactorResult<()> {
    if !(inflow.residence_time.is_finite() && inflow.residence_time > 0.0) {
        return Err(ReactorError::InvalidArg {
            what: "residence time must be positive",
        });
    }
    if !(inflow.temperature.is_finite() && inflow.temperature > 0.0) {
        return Err(ReactorError::InvalidArg {
            what: "inflow temperature must be positive",
        });
    }
    if inflow.mass_fractions.len() != species {
        return Err(ReactorError::InvalidArg {
            what: "inflow composition length must equal the species count",
        });
    }
    let correction = normalize_mass_fractions(&mut inflow.mass_fractions)?;
    if correction.exceeds(FRACTION_TOLERANCE) {
        return Err(ReactorError::NonPhysical {
            what: format!(
                "inflow mass fractions off by {:e} (sum {})",
                correction.max_clamp, correction.sum_before
            ),
        });
    }
    Ok(())
}

impl OdeSystem for ReactorOde<'_> {
    fn dim(&self) -> usize {
        self.species_count() + 1
    }

    fn rhs(&mut self, _t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> SolverResult<()> {
        let rho = self.evaluate(y.as_slice()).map_err(|e| SolverError::Retryable {
            message: e.to_string(),
        })?;

        let n = self.species_count();
        let w = self.mech.molar_masses();
        let fractions = &y.as_slice()[..n];
        let temperature = y[n];
        let rates = self.kinetics.snapshot();
        let thermo = self.kinetics.thermo();

        for k in 0..n {
            ydot[k] = rates.net[k] * w[k] / rho;
        }

        // sum_k h_k wdot_k (W/m^3) with molar h_k or u_k
        let dt = match &self.kind {
            ReactorKind::ConstantPressure => {
                let q: f64 = (0..n).map(|k| thermo.enthalpy_molar(k) * rates.net[k]).sum();
                -q / (rho * thermo.cp_mass(w, fractions))
            }
            ReactorKind::ConstantVolume => {
                let q: f64 = (0..n).map(|k| thermo.internal_energy_molar(k) * rates.net[k]).sum();
                -q / (rho * thermo.cv_mass(w, fractions))
            }
            ReactorKind::Stirred(inflow) => {
                let tau = inflow.residence_time;
                let mut feed = 0.0;
                let mut chem = 0.0;
                for k in 0..n {
                    ydot[k] += (inflow.mass_fractions[k] - fractions[k]) / tau;
                    let h_k = thermo.enthalpy_molar(k) / w[k];
                    feed += inflow.mass_fractions[k] * (self.feed_enthalpy[k] - h_k);
                    chem += thermo.enthalpy_molar(k) * rates.net[k];
                }
                (feed / tau - chem / rho) / thermo.cp_mass(w, fractions)
            }
        };
        ydot[n] = dt;

        if !ydot.iter().all(|v| v.is_finite()) {
            return Err(SolverError::Retryable {
                message: format!("non-finite derivative at T = {temperature} K"),
            });
        }
        Ok(())
    }

    fn absolute_tolerance(&self, i: usize, base: f64) -> f64 {
        if i == self.species_count() {
            self.temperature_atol
        } else {
            base
        }
    }

    fn perturbation_scale(&self, i: usize) -> f64 {
        if i == self.species_count() {
            1.0
        } else {
            SPECIES_PERTURBATION_SCALE
        }
    }

    fn is_admissible(&self, y: &DVector<f64>) -> bool {
        let n = self.species_count();
        y[n].is_finite()
            && y[n] > 0.0
            && y.as_slice()[..n]
                .iter()
                .all(|v| v.is_finite() && *v >= -self.negative_tolerance)
    }

    fn project(&mut self, y: &mut DVector<f64>) -> SolverResult<Projection> {
        let n = self.species_count();
        let correction = normalize_mass_fractions(&mut y.as_mut_slice()[..n])?;
        Ok(Projection {
            magnitude: correction.max_clamp.max((correction.sum_before - 1.0).abs()),
            exceeded_tolerance: correction.exceeds(self.projection_tolerance),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{atm, k};
    use rf_mech::{Arrhenius, MechanismBuilder, Nasa7, RateDef, ReactionDef, Species};
    use std::sync::Arc;

    /// A <=> B with B lower in enthalpy.
    fn isomer_pair() -> Arc<Mechanism> {
        let a = Nasa7::single_range(200.0, 6000.0, [3.5, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0]);
        let b = Nasa7::single_range(200.0, 6000.0, [3.5, 0.0, 0.0, 0.0, 0.0, -5000.0, 3.0]);
        let mut builder = MechanismBuilder::new("isomers");
        builder.add_species(Species::new("A", [("N", 2.0)], a).unwrap());
        builder.add_species(Species::new("B", [("N", 2.0)], b).unwrap());
        builder.add_reaction(
            ReactionDef::from_equation("A <=> B", RateDef::Arrhenius(Arrhenius::new(1e3, 0.0, 0.0))).unwrap(),
        );
        builder.build().unwrap()
    }

    #[test]
    fn species_derivatives_conserve_mass() {
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(1000.0), atm(1.0), vec![1.0, 0.0]).unwrap();
        for kind in [ReactorKind::ConstantPressure, ReactorKind::ConstantVolume] {
            let mut ode = ReactorOde::new(&mech, kind, &state).unwrap();
            let y = ode.state_vector(&state);
            let mut ydot = DVector::zeros(3);
            ode.rhs(0.0, &y, &mut ydot).unwrap();
            assert!(ydot[0] < 0.0);
            assert!((ydot[0] + ydot[1]).abs() < 1e-12 * ydot[0].abs());
            // exothermic A -> B heats the mixture
            assert!(ydot[2] > 0.0);
        }
    }

    #[test]
    fn constant_volume_heats_faster_than_constant_pressure() {
        // cv < cp, same heat release per unit mass
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(1000.0), atm(1.0), vec![1.0, 0.0]).unwrap();
        let mut rates = Vec::new();
        for kind in [ReactorKind::ConstantPressure, ReactorKind::ConstantVolume] {
            let mut ode = ReactorOde::new(&mech, kind, &state).unwrap();
            let y = ode.state_vector(&state);
            let mut ydot = DVector::zeros(3);
            ode.rhs(0.0, &y, &mut ydot).unwrap();
            rates.push(ydot[2]);
        }
        let ratio = rates[1] / rates[0];
        // cp/R = 3.5, cv/R = 2.5, u - h offset by RT
        assert!(ratio > 1.3 && ratio < 1.5, "ratio = {ratio}");
    }

    #[test]
    fn stirred_reactor_relaxes_to_feed_without_chemistry() {
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![0.0, 1.0]).unwrap();
        let kind = ReactorKind::stirred(1e-3, 400.0, vec![0.0, 1.0]);
        let mut ode = ReactorOde::new(&mech, kind, &state).unwrap();
        let y = ode.state_vector(&state);
        let mut ydot = DVector::zeros(3);
        ode.rhs(0.0, &y, &mut ydot).unwrap();
        // B -> A is negligible at 300 K; enthalpy inflow with equal cp gives (T_in - T)/tau
        assert!((ydot[2] - 1e5).abs() < 1e-6 * 1e5 + 1.0, "dT/dt = {}", ydot[2]);
    }

    #[test]
    fn rejects_bad_inflow() {
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![0.0, 1.0]).unwrap();
        assert!(ReactorOde::new(&mech, ReactorKind::stirred(0.0, 300.0, vec![0.0, 1.0]), &state).is_err());
        assert!(ReactorOde::new(&mech, ReactorKind::stirred(1.0, 300.0, vec![0.5, 0.6]), &state).is_err());
        assert!(ReactorOde::new(&mech, ReactorKind::stirred(1.0, 300.0, vec![1.0]), &state).is_err());
    }

    #[test]
    fn projection_clamps_and_renormalises() {
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![0.0, 1.0]).unwrap();
        let mut ode = ReactorOde::new(&mech, ReactorKind::ConstantPressure, &state).unwrap();
        let mut y = DVector::from_vec(vec![-1e-9, 1.0 + 2e-9, 300.0]);
        assert!(ode.is_admissible(&y));
        let p = ode.project(&mut y).unwrap();
        assert_eq!(y[0], 0.0);
        assert!((y[1] - 1.0).abs() < 1e-15);
        assert!(!p.exceeded_tolerance);
        assert!(!ode.is_admissible(&DVector::from_vec(vec![-1e-3, 1.0, 300.0])));
        assert!(!ode.is_admissible(&DVector::from_vec(vec![0.0, 1.0, -1.0])));
    }

    #[test]
    fn non_physical_temperature_is_retryable() {
        let mech = isomer_pair();
        let state = GasState::from_mass_fractions(&mech, k(300.0), atm(1.0), vec![0.5, 0.5]).unwrap();
        let mut ode = ReactorOde::new(&mech, ReactorKind::ConstantPressure, &state).unwrap();
        let y = DVector::from_vec(vec![0.5, 0.5, -10.0]);
        let mut ydot = DVector::zeros(3);
        assert!(matches!(ode.rhs(0.0, &y, &mut ydot), Err(SolverError::Retryable { .. })));
    }
}
