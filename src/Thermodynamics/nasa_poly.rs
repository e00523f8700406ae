//! # NASA-7 reference thermodynamics
//!
//! Two-range NASA-7 polynomial evaluators producing the dimensionless
//! reference-state vectors cp0/R, h0/RT, s0/R (and derived g0/RT) at a given
//! temperature. The phase keeps these in a cache keyed on exact T equality,
//! so the evaluators themselves are stateless.

use serde::{Deserialize, Serialize};

use crate::error::ChemEngineError;

/// One species' NASA-7 polynomial: a low and a high temperature range with
/// seven coefficients each, switching at `t_mid`.
///
/// cp0/R = a1 + a2*T + a3*T^2 + a4*T^3 + a5*T^4
/// h0/RT = a1 + a2*T/2 + a3*T^2/3 + a4*T^3/4 + a5*T^4/5 + a6/T
/// s0/R  = a1*ln(T) + a2*T + a3*T^2/2 + a4*T^3/3 + a5*T^4/4 + a7
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NasaPoly7 {
    pub t_low: f64,
    pub t_mid: f64,
    pub t_high: f64,
    pub low: [f64; 7],
    pub high: [f64; 7],
}

impl NasaPoly7 {
    /// Polynomial with a single coefficient set valid over the whole range.
    pub fn single_range(t_low: f64, t_high: f64, coeffs: [f64; 7]) -> Self {
        Self {
            t_low,
            t_mid: t_high,
            t_high,
            low: coeffs,
            high: coeffs,
        }
    }

    fn coeffs_at(&self, t: f64) -> &[f64; 7] {
        if t < self.t_mid { &self.low } else { &self.high }
    }

    /// Evaluate (cp0/R, h0/RT, s0/R) at temperature `t`.
    pub fn eval(&self, t: f64) -> (f64, f64, f64) {
        let c = self.coeffs_at(t);
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;
        let cp_r = c[0] + c[1] * t + c[2] * t2 + c[3] * t3 + c[4] * t4;
        let h_rt = c[0]
            + c[1] * t / 2.0
            + c[2] * t2 / 3.0
            + c[3] * t3 / 4.0
            + c[4] * t4 / 5.0
            + c[5] / t;
        let s_r = c[0] * t.ln()
            + c[1] * t
            + c[2] * t2 / 2.0
            + c[3] * t3 / 3.0
            + c[4] * t4 / 4.0
            + c[6];
        (cp_r, h_rt, s_r)
    }
}

/// Species metadata as supplied by the host: name, molecular weight
/// (kg/kmol) and the NASA-7 reference polynomial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub name: String,
    /// Molecular weight, kg/kmol.
    pub molar_weight: f64,
    pub thermo: NasaPoly7,
}

impl SpeciesRecord {
    pub fn new(name: &str, molar_weight: f64, thermo: NasaPoly7) -> Self {
        Self {
            name: name.to_string(),
            molar_weight,
            thermo,
        }
    }
}

/// Species-indexed NASA-7 table. Fills the per-species reference vectors in
/// one pass; the caller owns the buffers and the T-keyed cache.
#[derive(Debug, Clone)]
pub struct SpeciesThermoTable {
    polys: Vec<NasaPoly7>,
}

impl SpeciesThermoTable {
    pub fn new(polys: Vec<NasaPoly7>) -> Self {
        Self { polys }
    }

    pub fn n_species(&self) -> usize {
        self.polys.len()
    }

    /// Fill cp0/R, h0/RT, s0/R for every species at temperature `t`.
    pub fn update(
        &self,
        t: f64,
        cp0_r: &mut [f64],
        h0_rt: &mut [f64],
        s0_r: &mut [f64],
    ) -> Result<(), ChemEngineError> {
        if t <= 0.0 || !t.is_finite() {
            return Err(ChemEngineError::InvalidState(format!(
                "temperature {t} out of range for reference thermo"
            )));
        }
        for (k, poly) in self.polys.iter().enumerate() {
            let (cp, h, s) = poly.eval(t);
            cp0_r[k] = cp;
            h0_rt[k] = h;
            s0_r[k] = s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nasa7_matches_hand_formula() {
        let poly = NasaPoly7::single_range(
            200.0,
            3500.0,
            [3.33727920e+00, -4.94024731e-05, 4.99456778e-07, -1.79566394e-10, 2.00255376e-14,
             -9.50158922e+02, -3.20502331e+00],
        );
        let t = 1500.0;
        let (cp_r, h_rt, s_r) = poly.eval(t);
        let c = &poly.high;
        let cp_expected = c[0] + c[1] * t + c[2] * t * t + c[3] * t.powi(3) + c[4] * t.powi(4);
        let h_expected = c[0]
            + c[1] * t / 2.0
            + c[2] * t * t / 3.0
            + c[3] * t.powi(3) / 4.0
            + c[4] * t.powi(4) / 5.0
            + c[5] / t;
        let s_expected = c[0] * t.ln()
            + c[1] * t
            + c[2] * t * t / 2.0
            + c[3] * t.powi(3) / 3.0
            + c[4] * t.powi(4) / 4.0
            + c[6];
        assert_relative_eq!(cp_r, cp_expected, max_relative = 1e-14);
        assert_relative_eq!(h_rt, h_expected, max_relative = 1e-14);
        assert_relative_eq!(s_r, s_expected, max_relative = 1e-14);
    }

    #[test]
    fn range_switch_at_t_mid() {
        let mut poly = NasaPoly7::single_range(300.0, 3000.0, [2.5, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        poly.t_mid = 1000.0;
        poly.high = [3.5, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        assert_relative_eq!(poly.eval(999.0).0, 2.5);
        assert_relative_eq!(poly.eval(1000.0).0, 3.5);
    }

    #[test]
    fn table_rejects_bad_temperature() {
        let table = SpeciesThermoTable::new(vec![NasaPoly7::single_range(
            300.0,
            3000.0,
            [3.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )]);
        let mut a = [0.0];
        let mut b = [0.0];
        let mut c = [0.0];
        assert!(table.update(-1.0, &mut a, &mut b, &mut c).is_err());
    }
}
