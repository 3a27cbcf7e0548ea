use crate::CoreError;

/// Floating point type used throughout the engine.
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and strictly greater than zero.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::NonPositive { what, value: v })
    }
}

pub fn ensure_len(len: usize, expected: usize, what: &'static str) -> Result<(), CoreError> {
    if len == expected {
        Ok(())
    } else {
        Err(CoreError::LengthMismatch {
            what,
            expected,
            got: len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(ensure_positive(1e-30, "tau").is_ok());
        assert!(matches!(
            ensure_positive(0.0, "tau"),
            Err(CoreError::NonPositive { what: "tau", .. })
        ));
        assert!(ensure_positive(-1.0, "tau").is_err());
        assert!(matches!(
            ensure_positive(Real::INFINITY, "tau"),
            Err(CoreError::NonFinite { .. })
        ));
    }

    #[test]
    fn ensure_len_reports_both_sizes() {
        let err = ensure_len(3, 4, "mass fractions").unwrap_err();
        assert_eq!(
            err,
            CoreError::LengthMismatch {
                what: "mass fractions",
                expected: 4,
                got: 3
            }
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn nearly_equal_is_symmetric(a in -1e6f64..1e6, b in -1e6f64..1e6) {
                let tol = Tolerances::default();
                prop_assert_eq!(nearly_equal(a, b, tol), nearly_equal(b, a, tol));
            }
        }
    }
}
