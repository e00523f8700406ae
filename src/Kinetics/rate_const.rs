//! # Rate-coefficient library
//!
//! Temperature-dependent rate evaluators and their per-reaction managers.
//! Each manager follows one update contract: given T, ln T (and the current
//! pressure variable for the P-dependent kinds, set separately through
//! `update_c`) it writes k into a dense per-reaction value vector at the
//! indices the rates were installed at. Managers support `install`,
//! `replace` (index-preserving) and mask-based `reduced` for the
//! reaction-set editor.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::ChemEngineError;
use crate::GAS_CONSTANT;

/// Modified Arrhenius rate k = A * T^b * exp(-E/(R*T)), with E in J/kmol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Arrhenius {
    pub a: f64,
    pub b: f64,
    pub e: f64,
}

impl Arrhenius {
    pub fn new(a: f64, b: f64, e: f64) -> Self {
        Self { a, b, e }
    }

    /// ln k at the given ln T and 1/T.
    #[inline]
    pub fn update_log(&self, log_t: f64, recip_t: f64) -> f64 {
        self.a.ln() + self.b * log_t - self.e / GAS_CONSTANT * recip_t
    }

    pub fn value(&self, t: f64) -> f64 {
        self.update_log(t.ln(), 1.0 / t).exp()
    }
}

/// Plain Arrhenius rates installed at per-reaction indices.
#[derive(Debug, Clone, Default)]
pub struct RateCoeffMgr {
    entries: Vec<(usize, Arrhenius)>,
}

impl RateCoeffMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_reactions(&self) -> usize {
        self.entries.len()
    }

    pub fn install(&mut self, rxn: usize, rate: Arrhenius) {
        self.entries.push((rxn, rate));
    }

    pub fn replace(&mut self, rxn: usize, rate: Arrhenius) -> Result<(), ChemEngineError> {
        for entry in &mut self.entries {
            if entry.0 == rxn {
                entry.1 = rate;
                return Ok(());
            }
        }
        Err(ChemEngineError::InvalidKind {
            equation: format!("reaction index {rxn}"),
            details: "no Arrhenius rate installed at this index".to_string(),
        })
    }

    pub fn update(&self, t: f64, log_t: f64, values: &mut [f64]) {
        let recip_t = 1.0 / t;
        for (rxn, rate) in &self.entries {
            values[*rxn] = rate.update_log(log_t, recip_t).exp();
        }
    }

    /// Entries surviving the activation mask, re-indexed through `id_map`.
    pub fn reduced(&self, active: &[bool], id_map: &[usize]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(rxn, _)| active[*rxn])
                .map(|&(rxn, rate)| (id_map[rxn], rate))
                .collect(),
        }
    }
}

/// One (pressure, Arrhenius) point of a PLOG parameterization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlogPoint {
    /// Pressure, Pa.
    pub pressure: f64,
    pub rate: Arrhenius,
}

#[derive(Debug, Clone)]
struct PlogEntry {
    rxn: usize,
    /// distinct ln(P) nodes, ascending
    lnp: Vec<f64>,
    /// rates at each node; duplicate-pressure rates sum
    groups: Vec<Vec<Arrhenius>>,
    // current pressure interval, set by update_c
    ilow1: usize,
    ilow2: usize,
    frac: f64,
}

impl PlogEntry {
    fn build(rxn: usize, points: &[PlogPoint]) -> Result<Self, ChemEngineError> {
        if points.is_empty() {
            return Err(ChemEngineError::InvalidKind {
                equation: format!("reaction index {rxn}"),
                details: "PLOG parameterization has no pressure points".to_string(),
            });
        }
        let mut sorted: Vec<PlogPoint> = points.to_vec();
        sorted.sort_by(|x, y| x.pressure.partial_cmp(&y.pressure).unwrap_or(std::cmp::Ordering::Equal));
        let mut lnp: Vec<f64> = Vec::new();
        let mut groups: Vec<Vec<Arrhenius>> = Vec::new();
        for point in sorted {
            if !(point.pressure > 0.0) || !point.pressure.is_finite() {
                return Err(ChemEngineError::InvalidKind {
                    equation: format!("reaction index {rxn}"),
                    details: format!("PLOG pressure {} is not positive", point.pressure),
                });
            }
            let node = point.pressure.ln();
            match (lnp.last(), groups.last_mut()) {
                (Some(&last), Some(group)) if last == node => group.push(point.rate),
                _ => {
                    lnp.push(node);
                    groups.push(vec![point.rate]);
                }
            }
        }
        Ok(Self {
            rxn,
            lnp,
            groups,
            ilow1: 0,
            ilow2: 0,
            frac: 0.0,
        })
    }

    fn set_pressure(&mut self, ln_p: f64) {
        let n = self.lnp.len();
        if ln_p <= self.lnp[0] || n == 1 {
            self.ilow1 = 0;
            self.ilow2 = 0;
            self.frac = 0.0;
        } else if ln_p >= self.lnp[n - 1] {
            self.ilow1 = n - 1;
            self.ilow2 = n - 1;
            self.frac = 0.0;
        } else {
            let hi = self.lnp.partition_point(|&node| node <= ln_p);
            self.ilow1 = hi - 1;
            self.ilow2 = hi;
            self.frac = (ln_p - self.lnp[self.ilow1]) / (self.lnp[self.ilow2] - self.lnp[self.ilow1]);
        }
    }

    fn ln_rate_at(&self, node: usize, log_t: f64, recip_t: f64) -> f64 {
        let k: f64 = self.groups[node]
            .iter()
            .map(|rate| rate.update_log(log_t, recip_t).exp())
            .sum();
        k.ln()
    }

    fn value(&self, log_t: f64, recip_t: f64) -> f64 {
        let lnk1 = self.ln_rate_at(self.ilow1, log_t, recip_t);
        if self.ilow1 == self.ilow2 {
            return lnk1.exp();
        }
        let lnk2 = self.ln_rate_at(self.ilow2, log_t, recip_t);
        (lnk1 + self.frac * (lnk2 - lnk1)).exp()
    }
}

/// PLOG rates: pressure-logarithm interpolation between Arrhenius tables.
#[derive(Debug, Clone, Default)]
pub struct PlogRateMgr {
    entries: Vec<PlogEntry>,
}

impl PlogRateMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_reactions(&self) -> usize {
        self.entries.len()
    }

    pub fn install(&mut self, rxn: usize, points: &[PlogPoint]) -> Result<(), ChemEngineError> {
        self.entries.push(PlogEntry::build(rxn, points)?);
        Ok(())
    }

    pub fn replace(&mut self, rxn: usize, points: &[PlogPoint]) -> Result<(), ChemEngineError> {
        for entry in &mut self.entries {
            if entry.rxn == rxn {
                *entry = PlogEntry::build(rxn, points)?;
                return Ok(());
            }
        }
        Err(ChemEngineError::InvalidKind {
            equation: format!("reaction index {rxn}"),
            details: "no PLOG rate installed at this index".to_string(),
        })
    }

    /// Select the bracketing pressure interval; P enters only here.
    pub fn update_c(&mut self, ln_p: f64) {
        for entry in &mut self.entries {
            entry.set_pressure(ln_p);
        }
    }

    pub fn update(&self, t: f64, log_t: f64, values: &mut [f64]) {
        let recip_t = 1.0 / t;
        for entry in &self.entries {
            values[entry.rxn] = entry.value(log_t, recip_t);
        }
    }

    pub fn reduced(&self, active: &[bool], id_map: &[usize]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| active[entry.rxn])
                .map(|entry| {
                    let mut e = entry.clone();
                    e.rxn = id_map[entry.rxn];
                    e
                })
                .collect(),
        }
    }
}

/// Bivariate Chebyshev rate table: log10 k expanded over reduced inverse
/// temperature and reduced log10 pressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChebyshevData {
    pub t_min: f64,
    pub t_max: f64,
    /// Pressure limits, Pa.
    pub p_min: f64,
    pub p_max: f64,
    /// Coefficient rows over temperature, columns over pressure.
    pub coeffs: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
struct ChebyshevEntry {
    rxn: usize,
    t_min: f64,
    t_max: f64,
    log10_p_min: f64,
    log10_p_max: f64,
    coeffs: DMatrix<f64>,
    /// per-temperature-row dot products with the pressure polynomials,
    /// refreshed by update_c
    dotprod: Vec<f64>,
}

/// Chebyshev polynomial values T_0..T_{n-1} at x.
fn chebyshev_values(x: f64, n: usize) -> Vec<f64> {
    let mut values = vec![0.0; n];
    if n > 0 {
        values[0] = 1.0;
    }
    if n > 1 {
        values[1] = x;
    }
    for m in 2..n {
        values[m] = 2.0 * x * values[m - 1] - values[m - 2];
    }
    values
}

impl ChebyshevEntry {
    fn build(rxn: usize, data: &ChebyshevData) -> Result<Self, ChemEngineError> {
        let nt = data.coeffs.len();
        if nt == 0 || data.coeffs[0].is_empty() {
            return Err(ChemEngineError::InvalidKind {
                equation: format!("reaction index {rxn}"),
                details: "Chebyshev coefficient table is empty".to_string(),
            });
        }
        let np = data.coeffs[0].len();
        if data.coeffs.iter().any(|row| row.len() != np) {
            return Err(ChemEngineError::InvalidKind {
                equation: format!("reaction index {rxn}"),
                details: "Chebyshev coefficient rows have unequal lengths".to_string(),
            });
        }
        let coeffs = DMatrix::from_fn(nt, np, |i, j| data.coeffs[i][j]);
        Ok(Self {
            rxn,
            t_min: data.t_min,
            t_max: data.t_max,
            log10_p_min: data.p_min.log10(),
            log10_p_max: data.p_max.log10(),
            coeffs,
            dotprod: vec![0.0; nt],
        })
    }

    fn set_pressure(&mut self, log10_p: f64) {
        let pbar = (2.0 * log10_p - self.log10_p_min - self.log10_p_max)
            / (self.log10_p_max - self.log10_p_min);
        let cheb_p = chebyshev_values(pbar, self.coeffs.ncols());
        for i in 0..self.coeffs.nrows() {
            self.dotprod[i] = (0..self.coeffs.ncols())
                .map(|j| self.coeffs[(i, j)] * cheb_p[j])
                .sum();
        }
    }

    fn value(&self, t: f64) -> f64 {
        let tbar = (2.0 / t - 1.0 / self.t_min - 1.0 / self.t_max)
            / (1.0 / self.t_max - 1.0 / self.t_min);
        let cheb_t = chebyshev_values(tbar, self.coeffs.nrows());
        let log10_k: f64 = cheb_t.iter().zip(&self.dotprod).map(|(&c, &d)| c * d).sum();
        10.0_f64.powf(log10_k)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChebyshevRateMgr {
    entries: Vec<ChebyshevEntry>,
}

impl ChebyshevRateMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_reactions(&self) -> usize {
        self.entries.len()
    }

    pub fn install(&mut self, rxn: usize, data: &ChebyshevData) -> Result<(), ChemEngineError> {
        self.entries.push(ChebyshevEntry::build(rxn, data)?);
        Ok(())
    }

    pub fn replace(&mut self, rxn: usize, data: &ChebyshevData) -> Result<(), ChemEngineError> {
        for entry in &mut self.entries {
            if entry.rxn == rxn {
                *entry = ChebyshevEntry::build(rxn, data)?;
                return Ok(());
            }
        }
        Err(ChemEngineError::InvalidKind {
            equation: format!("reaction index {rxn}"),
            details: "no Chebyshev rate installed at this index".to_string(),
        })
    }

    pub fn update_c(&mut self, log10_p: f64) {
        for entry in &mut self.entries {
            entry.set_pressure(log10_p);
        }
    }

    pub fn update(&self, t: f64, _log_t: f64, values: &mut [f64]) {
        for entry in &self.entries {
            values[entry.rxn] = entry.value(t);
        }
    }

    pub fn reduced(&self, active: &[bool], id_map: &[usize]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| active[entry.rxn])
                .map(|entry| {
                    let mut e = entry.clone();
                    e.rxn = id_map[entry.rxn];
                    e
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn arrhenius_matches_closed_form() {
        let rate = Arrhenius::new(2.16e8, 1.51, 3430.0 * 4184.0);
        let t: f64 = 1500.0;
        let expected = 2.16e8 * t.powf(1.51) * (-3430.0 * 4184.0 / (GAS_CONSTANT * t)).exp();
        assert_relative_eq!(rate.value(t), expected, max_relative = 1e-12);
    }

    #[test]
    fn rate_mgr_writes_installed_indices() {
        let mut mgr = RateCoeffMgr::new();
        mgr.install(0, Arrhenius::new(1.0e3, 0.0, 0.0));
        mgr.install(2, Arrhenius::new(5.0e2, 0.0, 0.0));
        let mut values = vec![0.0; 3];
        mgr.update(1000.0, 1000.0_f64.ln(), &mut values);
        assert_relative_eq!(values[0], 1.0e3, max_relative = 1e-12);
        assert_relative_eq!(values[1], 0.0);
        assert_relative_eq!(values[2], 5.0e2, max_relative = 1e-12);
    }

    #[test]
    fn plog_interpolates_in_log_space() {
        let mut mgr = PlogRateMgr::new();
        let points = [
            PlogPoint {
                pressure: 1.0e4,
                rate: Arrhenius::new(1.0e3, 0.0, 0.0),
            },
            PlogPoint {
                pressure: 1.0e6,
                rate: Arrhenius::new(1.0e5, 0.0, 0.0),
            },
        ];
        mgr.install(0, &points).unwrap();
        let mut values = vec![0.0];
        let t = 1000.0;

        // geometric midpoint in P: ln k is the arithmetic mean of ln k1, ln k2
        mgr.update_c(1.0e5_f64.ln());
        mgr.update(t, t.ln(), &mut values);
        assert_relative_eq!(values[0], 1.0e4, max_relative = 1e-10);

        // below the table: clamp to the lowest node
        mgr.update_c(1.0_f64.ln());
        mgr.update(t, t.ln(), &mut values);
        assert_relative_eq!(values[0], 1.0e3, max_relative = 1e-12);

        // above the table: clamp to the highest node
        mgr.update_c(1.0e9_f64.ln());
        mgr.update(t, t.ln(), &mut values);
        assert_relative_eq!(values[0], 1.0e5, max_relative = 1e-12);
    }

    #[test]
    fn chebyshev_constant_table() {
        // a single coefficient means log10 k is constant over (T, P)
        let data = ChebyshevData {
            t_min: 300.0,
            t_max: 2000.0,
            p_min: 1.0e3,
            p_max: 1.0e7,
            coeffs: vec![vec![4.0]],
        };
        let mut mgr = ChebyshevRateMgr::new();
        mgr.install(0, &data).unwrap();
        let mut values = vec![0.0];
        mgr.update_c(5.0);
        mgr.update(1000.0, 1000.0_f64.ln(), &mut values);
        assert_relative_eq!(values[0], 1.0e4, max_relative = 1e-12);
    }

    #[test]
    fn chebyshev_linear_in_tbar() {
        // two temperature rows: log10 k = c0 + c1 * Tbar; at T = Tmin the
        // reduced coordinate is -1, at T = Tmax it is +1
        let data = ChebyshevData {
            t_min: 500.0,
            t_max: 1500.0,
            p_min: 1.0e3,
            p_max: 1.0e7,
            coeffs: vec![vec![2.0], vec![1.0]],
        };
        let mut mgr = ChebyshevRateMgr::new();
        mgr.install(0, &data).unwrap();
        let mut values = vec![0.0];
        mgr.update_c(4.0);
        mgr.update(500.0, 500.0_f64.ln(), &mut values);
        assert_relative_eq!(values[0], 10.0, max_relative = 1e-10);
        mgr.update(1500.0, 1500.0_f64.ln(), &mut values);
        assert_relative_eq!(values[0], 1000.0, max_relative = 1e-10);
    }
}
