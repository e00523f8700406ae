//! Critical-point data and Peng-Robinson mixing rules.
//!
//! Per-species critical properties come from a built-in table keyed by
//! species name (the host may override any entry), and the pairwise mixing
//! arrays plus the PR coefficient tables a_ij, b_i, c_ij are derived once per
//! species set. Composition-dependent quantities (Bm, Am, ...) live in the
//! phase, not here.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::GAS_CONSTANT;

/// Critical-point record of one species.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CriticalProps {
    /// Critical temperature, K.
    pub tc: f64,
    /// Critical pressure, Pa.
    pub pc: f64,
    /// Critical molar volume, m3/kmol.
    pub vc: f64,
    /// Acentric factor.
    pub omega: f64,
    /// Lennard-Jones diameter, Angstrom.
    pub sigma: f64,
    /// Dipole moment, Debye.
    pub dipole: f64,
}

impl CriticalProps {
    pub fn compressibility(&self) -> f64 {
        self.pc * self.vc / (GAS_CONSTANT * self.tc)
    }
}

/// Built-in critical properties. The OH and O entries share one record, as
/// do H2O2 and HO2 — known placeholders carried over from the source data.
pub fn builtin_critical_props(name: &str) -> Option<CriticalProps> {
    let (tc, pc, vc, omega, sigma, dipole) = match name {
        "H2" => (33.0, 1.284e6, 64.28e-3, -0.216, 0.0, 0.0),
        "O2" => (154.58, 5.0430e6, 73.37e-3, 0.0222, 0.0, 0.0),
        "H2O" => (647.10, 22.064e6, 55.95e-3, 0.3443, 0.0, 1.855),
        "O" | "OH" => (105.28, 7.088e6, 41.21e-3, 0.0, 0.0, 0.0),
        "H" => (190.82, 31.013e6, 17.07e-3, 0.0, 0.0, 0.0),
        "H2O2" | "HO2" => (141.34, 4.786e6, 81.93e-3, 0.0, 0.0, 0.0),
        "N2" => (126.19, 3.3958e6, 89.41e-3, 0.0372, 0.0, 0.0),
        _ => return None,
    };
    Some(CriticalProps {
        tc,
        pc,
        vc,
        omega,
        sigma,
        dipole,
    })
}

/// Binary interaction parameters k_ij, keyed by species-pair names.
/// Diagonal entries are always 0; unlisted off-diagonal pairs use the
/// default (0.1).
#[derive(Debug, Clone)]
pub struct BinaryInteraction {
    pub default_off_diagonal: f64,
    overrides: HashMap<(String, String), f64>,
}

impl Default for BinaryInteraction {
    fn default() -> Self {
        Self {
            default_off_diagonal: 0.1,
            overrides: HashMap::new(),
        }
    }
}

impl BinaryInteraction {
    pub fn set_pair(&mut self, a: &str, b: &str, kij: f64) {
        let key = Self::key(a, b);
        self.overrides.insert(key, kij);
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn get(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 0.0;
        }
        *self
            .overrides
            .get(&Self::key(a, b))
            .unwrap_or(&self.default_off_diagonal)
    }
}

/// Species-indexed critical data plus the pairwise PR arrays.
/// Pair arrays are dense of length n*n, addressed as k*n + l.
#[derive(Debug, Clone)]
pub struct CriticalStore {
    pub n: usize,
    pub tc: Vec<f64>,
    pub pc: Vec<f64>,
    pub vc: Vec<f64>,
    pub zc: Vec<f64>,
    pub rhoc: Vec<f64>,
    pub omega: Vec<f64>,
    pub sigma: Vec<f64>,
    pub dipole: Vec<f64>,
    pub tc_ij: Vec<f64>,
    pub pc_ij: Vec<f64>,
    pub vc_ij: Vec<f64>,
    pub zc_ij: Vec<f64>,
    pub omega_ij: Vec<f64>,
    /// PR attraction coefficient per pair: 0.457236 (R Tc_ij)^2 / Pc_ij.
    pub cst_a: Vec<f64>,
    /// PR covolume per species: 0.077796 R Tc_i / Pc_i.
    pub cst_b: Vec<f64>,
    /// PR alpha-slope per pair: 0.37464 + 1.54226 w - 0.26992 w^2.
    pub cst_c: Vec<f64>,
}

impl CriticalStore {
    /// Resolve critical properties for `names` (built-in table, then
    /// `overrides`) and derive all pairwise arrays. Species without data are
    /// warned about and keep zeroed entries; they are only usable while the
    /// real-fluid branch is off.
    pub fn build(
        names: &[String],
        weights: &[f64],
        overrides: &HashMap<String, CriticalProps>,
        kij: &BinaryInteraction,
    ) -> Self {
        let n = names.len();
        let mut store = Self {
            n,
            tc: vec![0.0; n],
            pc: vec![0.0; n],
            vc: vec![0.0; n],
            zc: vec![0.0; n],
            rhoc: vec![0.0; n],
            omega: vec![0.0; n],
            sigma: vec![0.0; n],
            dipole: vec![0.0; n],
            tc_ij: vec![0.0; n * n],
            pc_ij: vec![0.0; n * n],
            vc_ij: vec![0.0; n * n],
            zc_ij: vec![0.0; n * n],
            omega_ij: vec![0.0; n * n],
            cst_a: vec![0.0; n * n],
            cst_b: vec![0.0; n],
            cst_c: vec![0.0; n * n],
        };
        for (k, name) in names.iter().enumerate() {
            let props = overrides
                .get(name)
                .copied()
                .or_else(|| builtin_critical_props(name));
            match props {
                Some(p) => {
                    store.tc[k] = p.tc;
                    store.pc[k] = p.pc;
                    store.vc[k] = p.vc;
                    store.zc[k] = p.compressibility();
                    store.rhoc[k] = weights[k] / p.vc;
                    store.omega[k] = p.omega;
                    store.sigma[k] = p.sigma;
                    store.dipole[k] = p.dipole;
                }
                None => {
                    warn!("no critical properties found for species '{name}'");
                }
            }
        }
        for k in 0..n {
            for l in 0..n {
                let apos = k * n + l;
                let tmp_k = kij.get(&names[k], &names[l]);
                store.tc_ij[apos] = (store.tc[l] * store.tc[k]).sqrt() * (1.0 - tmp_k);
                store.vc_ij[apos] =
                    (store.vc[l].cbrt() + store.vc[k].cbrt()).powi(3) / 8.0;
                store.zc_ij[apos] = 0.5 * (store.zc[l] + store.zc[k]);
                store.pc_ij[apos] =
                    store.zc_ij[apos] * GAS_CONSTANT * store.tc_ij[apos] / store.vc_ij[apos];
                store.omega_ij[apos] = 0.5 * (store.omega[l] + store.omega[k]);
            }
        }
        for k in 0..n {
            store.cst_b[k] = 0.077796 * GAS_CONSTANT * store.tc[k] / store.pc[k];
            for l in 0..n {
                let apos = k * n + l;
                store.cst_a[apos] =
                    0.457236 * (GAS_CONSTANT * store.tc_ij[apos]).powi(2) / store.pc_ij[apos];
                store.cst_c[apos] = 0.37464 + 1.54226 * store.omega_ij[apos]
                    - 0.26992 * store.omega_ij[apos].powi(2);
            }
        }
        store
    }

    #[inline]
    pub fn pair(&self, k: usize, l: usize) -> usize {
        k * self.n + l
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mixing_rules_pure_species() {
        let names = vec!["H2".to_string()];
        let store = CriticalStore::build(
            &names,
            &[2.016],
            &HashMap::new(),
            &BinaryInteraction::default(),
        );
        // diagonal pair: k_ij = 0, so Tc_ii = Tc_i and the coefficients
        // collapse to the pure-species PR values
        assert_relative_eq!(store.tc_ij[0], 33.0, max_relative = 1e-12);
        assert_relative_eq!(store.vc_ij[0], 64.28e-3, max_relative = 1e-12);
        let a_expected = 0.457236 * (GAS_CONSTANT * 33.0_f64).powi(2) / store.pc_ij[0];
        assert_relative_eq!(store.cst_a[0], a_expected, max_relative = 1e-12);
        let b_expected = 0.077796 * GAS_CONSTANT * 33.0 / 1.284e6;
        assert_relative_eq!(store.cst_b[0], b_expected, max_relative = 1e-12);
        let c_expected = 0.37464 + 1.54226 * (-0.216) - 0.26992 * 0.216_f64.powi(2);
        assert_relative_eq!(store.cst_c[0], c_expected, max_relative = 1e-12);
    }

    #[test]
    fn off_diagonal_uses_default_kij() {
        let names = vec!["H2".to_string(), "O2".to_string()];
        let store = CriticalStore::build(
            &names,
            &[2.016, 31.998],
            &HashMap::new(),
            &BinaryInteraction::default(),
        );
        let apos = store.pair(0, 1);
        let tc_expected = (33.0_f64 * 154.58).sqrt() * 0.9;
        assert_relative_eq!(store.tc_ij[apos], tc_expected, max_relative = 1e-12);
        // symmetric
        assert_relative_eq!(store.tc_ij[store.pair(1, 0)], store.tc_ij[apos]);
    }

    #[test]
    fn kij_override_by_pair_name() {
        let mut kij = BinaryInteraction::default();
        kij.set_pair("O2", "H2", 0.05);
        assert_relative_eq!(kij.get("H2", "O2"), 0.05);
        assert_relative_eq!(kij.get("O2", "H2"), 0.05);
        assert_relative_eq!(kij.get("H2", "H2"), 0.0);
        assert_relative_eq!(kij.get("H2", "N2"), 0.1);
    }
}
