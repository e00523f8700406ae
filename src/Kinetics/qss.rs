//! # Quasi-steady-state species elimination
//!
//! Concentrations of designated short-lived species are solved algebraically
//! by balancing their production and destruction, then folded back into the
//! rate-of-progress vectors.
//!
//! Reactions touching a QSS species s are classified at install time into
//! destruction contributors D(s), production from non-QSS sources P0(s), and
//! production from another QSS species t, P(t->s). With all QSS
//! concentrations set to one before the stoichiometric multiply, the rates
//! are per unit QSS concentration and the balance becomes linear:
//!
//!   A[s][s] =  sum of ropf over D_f(s)  + ropr over D_r(s)
//!   A[s][t] = -sum of ropf over P_f(t->s) + ropr over P_r(t->s)
//!   b[s]    =  sum of ropf over P0_f(s) + ropr over P0_r(s)
//!
//! The structural pattern is analyzed once on first use; the numeric values
//! are refilled and factorized on every call.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use nalgebra::{DMatrix, DVector};

use crate::error::ChemEngineError;

#[derive(Debug, Clone)]
struct OffDiagEntry {
    /// destination species, local index (matrix row)
    row: usize,
    /// source species, local index (matrix column)
    col: usize,
    /// forward reactions consuming `col` and producing `row`
    fwd: Vec<usize>,
    /// reversible reactions whose reverse direction consumes `col` and
    /// produces `row`
    rev: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct QssResolver {
    /// global species indices of the QSS subset
    species: Vec<usize>,
    index_of: HashMap<usize, usize>,

    // destruction contributors per local species
    rodf: Vec<Vec<usize>>,
    rodr: Vec<Vec<usize>>,
    // production from non-QSS sources per local species
    ropf_noqss: Vec<Vec<usize>>,
    ropr_noqss: Vec<Vec<usize>>,
    // production pairs keyed (source, destination), consumed by init
    pair_f: BTreeMap<(usize, usize), Vec<usize>>,
    pair_r: BTreeMap<(usize, usize), Vec<usize>>,

    initialized: bool,
    offdiag: Vec<OffDiagEntry>,
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl QssResolver {
    pub fn new(species: Vec<usize>) -> Self {
        let nq = species.len();
        let index_of = species
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();
        Self {
            species,
            index_of,
            rodf: vec![Vec::new(); nq],
            rodr: vec![Vec::new(); nq],
            ropf_noqss: vec![Vec::new(); nq],
            ropr_noqss: vec![Vec::new(); nq],
            pair_f: BTreeMap::new(),
            pair_r: BTreeMap::new(),
            initialized: false,
            offdiag: Vec::new(),
            a: DMatrix::zeros(nq, nq),
            b: DVector::zeros(nq),
        }
    }

    pub fn species(&self) -> &[usize] {
        &self.species
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    /// Record reaction `rxn` in the QSS bookkeeping. `reactants` and
    /// `products` are global species indices.
    pub fn install(
        &mut self,
        rxn: usize,
        reactants: &[usize],
        products: &[usize],
        reversible: bool,
        equation: &str,
    ) {
        let qss_rts: Vec<usize> = reactants
            .iter()
            .filter_map(|k| self.index_of.get(k).copied())
            .collect();
        let qss_pds: Vec<usize> = products
            .iter()
            .filter_map(|k| self.index_of.get(k).copied())
            .collect();

        if qss_rts.is_empty() && qss_pds.is_empty() {
            return;
        }
        if qss_rts.len() > 1 || qss_pds.len() > 1 {
            warn!(
                "QSS assumption violated: more than one QSS species on one \
                 side of reaction '{equation}'"
            );
        }

        for &rt in &qss_rts {
            self.rodf[rt].push(rxn);
        }
        if reversible {
            for &pd in &qss_pds {
                self.rodr[pd].push(rxn);
            }
        }
        if qss_rts.is_empty() {
            for &pd in &qss_pds {
                self.ropf_noqss[pd].push(rxn);
            }
        }
        if qss_pds.is_empty() && reversible {
            for &rt in &qss_rts {
                self.ropr_noqss[rt].push(rxn);
            }
        }
        if !qss_rts.is_empty() && !qss_pds.is_empty() {
            for &rt in &qss_rts {
                for &pd in &qss_pds {
                    self.pair_f.entry((rt, pd)).or_default().push(rxn);
                    if reversible {
                        self.pair_r.entry((pd, rt)).or_default().push(rxn);
                    }
                }
            }
        }
        self.initialized = false;
    }

    /// Analyze the structural pattern: one off-diagonal entry per (source,
    /// destination) pair with a non-empty production list.
    fn init_pattern(&mut self) {
        if self.initialized {
            return;
        }
        let mut keys: Vec<(usize, usize)> = self.pair_f.keys().copied().collect();
        for key in self.pair_r.keys() {
            if !self.pair_f.contains_key(key) {
                keys.push(*key);
            }
        }
        keys.sort_unstable();
        self.offdiag = keys
            .into_iter()
            .map(|(src, dst)| OffDiagEntry {
                row: dst,
                col: src,
                fwd: self.pair_f.get(&(src, dst)).cloned().unwrap_or_default(),
                rev: self.pair_r.get(&(src, dst)).cloned().unwrap_or_default(),
            })
            .collect();
        self.initialized = true;
    }

    /// Assemble and solve the QSS linear system from the unit-concentration
    /// rate vectors. The pattern is reused; the numeric factorization is
    /// redone every call.
    pub fn calc_conc(
        &mut self,
        ropf: &[f64],
        ropr: &[f64],
    ) -> Result<DVector<f64>, ChemEngineError> {
        self.init_pattern();
        let nq = self.n_species();
        self.a.fill(0.0);
        self.b.fill(0.0);

        for s in 0..nq {
            let mut rod = 0.0;
            for &r in &self.rodf[s] {
                rod += ropf[r];
            }
            for &r in &self.rodr[s] {
                rod += ropr[r];
            }
            self.a[(s, s)] = rod;

            let mut rop0 = 0.0;
            for &r in &self.ropf_noqss[s] {
                rop0 += ropf[r];
            }
            for &r in &self.ropr_noqss[s] {
                rop0 += ropr[r];
            }
            self.b[s] = rop0;
        }
        for entry in &self.offdiag {
            let mut rop = 0.0;
            for &r in &entry.fwd {
                rop += ropf[r];
            }
            for &r in &entry.rev {
                rop += ropr[r];
            }
            self.a[(entry.row, entry.col)] = -rop;
        }

        let conc = self.a.clone().lu().solve(&self.b).ok_or_else(|| {
            ChemEngineError::AssumptionViolated(
                "QSS balance system is singular".to_string(),
            )
        })?;
        for (local, value) in conc.iter().enumerate() {
            if !value.is_finite() {
                return Err(ChemEngineError::NonFinite {
                    context: "QSS concentration solve",
                    what: "conc_qss",
                    index: local,
                });
            }
        }
        Ok(conc)
    }

    /// Rescale the destruction contributors of each QSS species by its
    /// solved concentration.
    pub fn rescale_rop(&self, conc: &DVector<f64>, ropf: &mut [f64], ropr: &mut [f64]) {
        for s in 0..self.n_species() {
            for &r in &self.rodf[s] {
                ropf[r] *= conc[s];
            }
            for &r in &self.rodr[s] {
                ropr[r] *= conc[s];
            }
        }
    }
}
