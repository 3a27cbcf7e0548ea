// rf-core/src/units.rs

use uom::si::f64::{Pressure as UomPressure, ThermodynamicTemperature as UomThermodynamicTemperature};

// Public canonical unit types (SI, f64)
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn atm(v: f64) -> Pressure {
    pa(v * constants::ONE_ATM_PA)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

pub mod constants {
    /// Universal gas constant, J/(mol K).
    pub const GAS_CONSTANT: f64 = 8.314_462_618;
    /// Standard-state pressure for equilibrium constants, Pa.
    pub const ONE_ATM_PA: f64 = 101_325.0;
    /// Thermochemical calorie, J.
    pub const CALORIE_J: f64 = 4.184;
    /// Avogadro constant, 1/mol.
    pub const AVOGADRO: f64 = 6.022_140_76e23;
}
