//! Two-range NASA 7-coefficient polynomials.

/// Dimensionless standard-state properties of one species at one temperature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeciesThermo {
    /// cp / R
    pub cp_r: f64,
    /// h / (R T)
    pub h_rt: f64,
    /// s / R
    pub s_r: f64,
}

impl SpeciesThermo {
    /// g / (R T) = h/RT - s/R
    #[inline]
    pub fn g_rt(&self) -> f64 {
        self.h_rt - self.s_r
    }
}

/// NASA7 record: `low` applies on `[t_low, t_mid)`, `high` on `[t_mid, t_high]`.
///
/// Outside the declared bounds the nearest range is extrapolated.
#[derive(Clone, Debug, PartialEq)]
pub struct Nasa7 {
    pub t_low: f64,
    pub t_mid: f64,
    pub t_high: f64,
    pub low: [f64; 7],
    pub high: [f64; 7],
}

impl Nasa7 {
    pub fn new(t_low: f64, t_mid: f64, t_high: f64, low: [f64; 7], high: [f64; 7]) -> Self {
        Self {
            t_low,
            t_mid,
            t_high,
            low,
            high,
        }
    }

    /// Single-range record (both ranges share the coefficients).
    pub fn single_range(t_low: f64, t_high: f64, coeffs: [f64; 7]) -> Self {
        Self::new(t_low, t_high, t_high, coeffs, coeffs)
    }

    #[inline]
    pub fn coefficients(&self, t: f64) -> &[f64; 7] {
        if t < self.t_mid { &self.low } else { &self.high }
    }

    #[inline]
    pub fn evaluate(&self, t: f64) -> SpeciesThermo {
        evaluate_range(self.coefficients(t), t)
    }

    pub fn cp_r(&self, t: f64) -> f64 {
        self.evaluate(t).cp_r
    }

    pub fn h_rt(&self, t: f64) -> f64 {
        self.evaluate(t).h_rt
    }

    pub fn s_r(&self, t: f64) -> f64 {
        self.evaluate(t).s_r
    }

    pub fn g_rt(&self, t: f64) -> f64 {
        self.evaluate(t).g_rt()
    }

    /// Both ranges evaluated at `t_mid`: (low, high).
    pub fn at_midpoint(&self) -> (SpeciesThermo, SpeciesThermo) {
        (
            evaluate_range(&self.low, self.t_mid),
            evaluate_range(&self.high, self.t_mid),
        )
    }

    pub fn is_finite(&self) -> bool {
        [self.t_low, self.t_mid, self.t_high]
            .iter()
            .chain(self.low.iter())
            .chain(self.high.iter())
            .all(|v| v.is_finite())
    }
}

#[inline]
fn evaluate_range(a: &[f64; 7], t: f64) -> SpeciesThermo {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    SpeciesThermo {
        cp_r: a[0] + a[1] * t + a[2] * t2 + a[3] * t3 + a[4] * t4,
        h_rt: a[0]
            + a[1] * t / 2.0
            + a[2] * t2 / 3.0
            + a[3] * t3 / 4.0
            + a[4] * t4 / 5.0
            + a[5] / t,
        s_r: a[0] * t.ln() + a[1] * t + a[2] * t2 / 2.0 + a[3] * t3 / 3.0 + a[4] * t4 / 4.0 + a[6],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn argon() -> Nasa7 {
        let c = [2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 4.366];
        Nasa7::new(300.0, 1000.0, 5000.0, c, c)
    }

    #[test]
    fn monatomic_cp_is_constant() {
        let ar = argon();
        for t in [300.0, 999.0, 1000.0, 3000.0] {
            assert_relative_eq!(ar.cp_r(t), 2.5);
        }
    }

    #[test]
    fn enthalpy_matches_closed_form() {
        let ar = argon();
        let t = 1500.0;
        assert_relative_eq!(ar.h_rt(t), 2.5 - 745.375 / t, epsilon = 1e-14);
        assert_relative_eq!(ar.s_r(t), 2.5 * t.ln() + 4.366, epsilon = 1e-14);
        assert_relative_eq!(ar.g_rt(t), ar.h_rt(t) - ar.s_r(t), epsilon = 1e-14);
    }

    #[test]
    fn range_selection_uses_t_mid() {
        let mut rec = argon();
        rec.high[0] = 3.0;
        assert_eq!(rec.coefficients(999.9)[0], 2.5);
        assert_eq!(rec.coefficients(1000.0)[0], 3.0);
        // extrapolation below t_low uses the low range
        assert_eq!(rec.coefficients(100.0)[0], 2.5);
    }

    #[test]
    fn single_range_has_no_gap() {
        let rec = Nasa7::single_range(200.0, 3000.0, [3.5, 1e-4, 0.0, 0.0, 0.0, -1000.0, 3.0]);
        let (lo, hi) = rec.at_midpoint();
        assert_eq!(lo, hi);
        assert!(rec.is_finite());
    }
}
