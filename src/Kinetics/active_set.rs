//! Adaptive reaction activator: decides, per state, which reactions are
//! dynamically negligible against species and temperature error budgets so
//! the reaction-set editor can skip them.
//!
//! The decision is a greedy in-order scan: a reaction is deactivated when
//! adding its temperature contribution and every one of its species
//! contributions to the running error budgets keeps them all within one.
//! This is a deliberate O(Nr * sparsity) heuristic, not a global optimum.

use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::ChemEngineError;
use crate::Kinetics::gas_kinetics::GasKinetics;

#[derive(Debug, Default)]
pub struct ReactionActivator {
    n_species: usize,
    n_rxns: usize,
    /// signed molar stoichiometry (products - reactants), species x reaction
    stoich_mol: Option<CscMatrix<f64>>,
    /// structural values of `stoich_mol`, kept pristine for refills
    base_values: Vec<f64>,
    /// scratch: column-scaled stoichiometry, then species error increments
    work_values: Vec<f64>,
    dtvec: Vec<f64>,
    u_scaled: Vec<f64>,
    y_scale: Vec<f64>,
    dy_err: Vec<f64>,
    iactive: Vec<bool>,
}

impl ReactionActivator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[bool] {
        &self.iactive
    }

    /// Rebuild the signed stoichiometry pattern from the engine. Called
    /// automatically when the mechanism dimensions change.
    pub fn update_stoich_matrix(&mut self, kin: &GasKinetics) {
        let ns = kin.thermo().n_species();
        let nr = kin.n_reactions();
        let mut coo = CooMatrix::new(ns, nr);
        kin.rev_product_stoich
            .for_each_entry(|rxn, spec, coeff| coo.push(spec, rxn, coeff));
        kin.irrev_product_stoich
            .for_each_entry(|rxn, spec, coeff| coo.push(spec, rxn, coeff));
        kin.reactant_stoich
            .for_each_entry(|rxn, spec, coeff| coo.push(spec, rxn, -coeff));
        let csc = CscMatrix::from(&coo);

        self.n_species = ns;
        self.n_rxns = nr;
        self.base_values = csc.values().to_vec();
        self.work_values = vec![0.0; self.base_values.len()];
        self.stoich_mol = Some(csc);
        self.dtvec = vec![0.0; nr];
        self.u_scaled = vec![0.0; ns];
        self.y_scale = vec![0.0; ns];
        self.dy_err = vec![0.0; ns];
        self.iactive = vec![true; nr];
    }

    /// Recompute the activation mask for the engine's current state under
    /// the given relative/absolute error tolerances.
    pub fn update_active(
        &mut self,
        kin: &mut GasKinetics,
        rel_tol: f64,
        abs_tol: f64,
    ) -> Result<&[bool], ChemEngineError> {
        if self.stoich_mol.is_none()
            || self.n_species != kin.thermo().n_species()
            || self.n_rxns != kin.n_reactions()
        {
            self.update_stoich_matrix(kin);
        }

        kin.update_rop()?;
        let thermo = kin.thermo();
        let t = thermo.temperature();
        let rho = thermo.density();
        let cv = thermo.cv_mass()?;

        // scaled (negative) partial molar internal energies: converting
        // species production to a temperature-change fraction of budget
        thermo.partial_molar_int_energies(&mut self.u_scaled)?;
        let t_denom = -(rho * cv * (rel_tol * t + abs_tol));
        for u in self.u_scaled.iter_mut() {
            *u /= t_denom;
        }

        // per-species mass-fraction budget scale
        let y = thermo.mass_fractions();
        let weights = thermo.molecular_weights();
        for i in 0..self.n_species {
            self.y_scale[i] = weights[i] / (rho * (rel_tol * y[i] + abs_tol));
        }

        let csc = self
            .stoich_mol
            .as_ref()
            .ok_or_else(|| ChemEngineError::NotReady("activator has no stoichiometry".to_string()))?;
        let col_offsets = csc.col_offsets();
        let row_indices = csc.row_indices();
        let q = &kin.ropnet;

        // W = Sigma * diag(q), then dTVec = W^T * u_scaled
        for j in 0..self.n_rxns {
            let mut dt = 0.0;
            for idx in col_offsets[j]..col_offsets[j + 1] {
                let w = self.base_values[idx] * q[j];
                self.work_values[idx] = w;
                dt += w * self.u_scaled[row_indices[idx]];
            }
            self.dtvec[j] = dt;
        }
        // dYMat = diag(y_scale) * W, reusing the same storage
        for j in 0..self.n_rxns {
            for idx in col_offsets[j]..col_offsets[j + 1] {
                self.work_values[idx] *= self.y_scale[row_indices[idx]];
            }
        }

        // greedy in-order pruning against accumulated budgets
        self.iactive.iter_mut().for_each(|a| *a = true);
        self.dy_err.iter_mut().for_each(|e| *e = 0.0);
        let mut dt_err = 0.0;
        for j in 0..self.n_rxns {
            if (dt_err + self.dtvec[j]).abs() > 1.0 {
                continue; // temperature budget would overflow; stays active
            }
            let mut must_stay = false;
            for idx in col_offsets[j]..col_offsets[j + 1] {
                if (self.dy_err[row_indices[idx]] + self.work_values[idx]).abs() > 1.0 {
                    must_stay = true;
                    break;
                }
            }
            if !must_stay {
                self.iactive[j] = false;
                dt_err += self.dtvec[j];
                for idx in col_offsets[j]..col_offsets[j + 1] {
                    self.dy_err[row_indices[idx]] += self.work_values[idx];
                }
            }
        }
        Ok(&self.iactive)
    }
}
