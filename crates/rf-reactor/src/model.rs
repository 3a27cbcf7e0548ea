//! Reactor kinds.

/// Feed stream of a perfectly stirred reactor.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StirredInflow {
    /// Mean residence time τ (s)
    pub residence_time: f64,
    /// Inflow temperature (K)
    pub temperature: f64,
    /// Inflow mass fractions
    pub mass_fractions: Vec<f64>,
}

/// Which balance equations govern the reactor.
///
/// All kinds share the state layout `[Y_0 .. Y_{K-1}, T]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReactorKind {
    /// Closed, adiabatic, isobaric
    ConstantPressure,
    /// Closed, adiabatic, fixed density
    ConstantVolume,
    /// Adiabatic, isobaric, continuously fed and drained
    Stirred(StirredInflow),
}

impl ReactorKind {
    pub fn stirred(residence_time: f64, temperature: f64, mass_fractions: Vec<f64>) -> Self {
        Self::Stirred(StirredInflow {
            residence_time,
            temperature,
            mass_fractions,
        })
    }

    pub fn is_isobaric(&self) -> bool {
        !matches!(self, Self::ConstantVolume)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ConstantPressure => "constant-pressure",
            Self::ConstantVolume => "constant-volume",
            Self::Stirred(_) => "stirred",
        }
    }
}
