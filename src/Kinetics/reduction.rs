//! Reaction-set editor: derive a reduced kinetics snapshot from a boolean
//! activation mask, re-indexing every subcomponent consistently.

use std::collections::HashMap;

use crate::error::ChemEngineError;
use crate::Kinetics::gas_kinetics::GasKinetics;
use crate::Kinetics::qss::QssResolver;

/// Forward index map by prefix sum: id_map[i] = number of active reactions
/// before i, which is the new index of reaction i when it is active.
pub(crate) fn prefix_sum_map(active: &[bool]) -> Vec<usize> {
    let mut id_map = vec![0; active.len()];
    for i in 1..active.len() {
        id_map[i] = id_map[i - 1] + usize::from(active[i - 1]);
    }
    id_map
}

impl<'a> GasKinetics<'a> {
    /// Build a consistent snapshot containing only the active reactions.
    /// The snapshot shares the thermo borrow non-owningly and value-copies
    /// all other reaction state; all of its caches start invalid.
    pub fn reduce_from(&self, active: &[bool]) -> Result<GasKinetics<'a>, ChemEngineError> {
        if active.len() != self.n_reactions() {
            return Err(ChemEngineError::InvalidState(format!(
                "activation mask length {} does not match {} reactions",
                active.len(),
                self.n_reactions()
            )));
        }
        let id_list: Vec<usize> = (0..active.len()).filter(|&i| active[i]).collect();
        let id_map = prefix_sum_map(active);
        let n_active = id_list.len();

        let mut out = GasKinetics::new(self.thermo);
        out.skip_undeclared_third_bodies = self.skip_undeclared_third_bodies;
        out.rel_density_qss = self.rel_density_qss;

        // reaction records and per-reaction dense vectors, gathered
        out.reactions = id_list.iter().map(|&i| self.reactions[i].clone()).collect();
        out.dn = id_list.iter().map(|&i| self.dn[i]).collect();
        out.perturb = id_list.iter().map(|&i| self.perturb[i]).collect();
        out.rfn = vec![0.0; n_active];
        out.rkcn = vec![0.0; n_active];
        out.ropf = vec![0.0; n_active];
        out.ropr = vec![0.0; n_active];
        out.ropnet = vec![0.0; n_active];

        // reversible/irreversible partition, filtered and remapped
        out.revindex = self
            .revindex
            .iter()
            .filter(|&&i| active[i])
            .map(|&i| id_map[i])
            .collect();
        out.irrev = self
            .irrev
            .iter()
            .filter(|&&i| active[i])
            .map(|&i| id_map[i])
            .collect();

        // stoichiometry slices: dropping inactive columns renumbers in place
        out.reactant_stoich = self.reactant_stoich.reduced(active);
        out.rev_product_stoich = self.rev_product_stoich.reduced(active);
        out.irrev_product_stoich = self.irrev_product_stoich.reduced(active);

        // rate managers at global indices
        out.rates = self.rates.reduced(active, &id_map);
        out.plog_rates = self.plog_rates.reduced(active, &id_map);
        out.cheb_rates = self.cheb_rates.reduced(active, &id_map);

        // three-body subsystem
        out.tb_concm = self.tb_concm.reduced(active, &id_map);
        out.concm_3b_values = vec![0.0; out.tb_concm.work_size()];

        // falloff subsystem through its local indexing
        let active_fall: Vec<bool> = self.fallindx.iter().map(|&i| active[i]).collect();
        let fall_id_map = prefix_sum_map(&active_fall);
        out.fallindx = self
            .fallindx
            .iter()
            .filter(|&&i| active[i])
            .map(|&i| id_map[i])
            .collect();
        out.rfallindx = out
            .fallindx
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect::<HashMap<_, _>>();
        let n_active_fall = out.fallindx.len();
        out.rfn_low = vec![0.0; n_active_fall];
        out.rfn_high = vec![0.0; n_active_fall];
        out.falloff_low_rates = self.falloff_low_rates.reduced(&active_fall, &fall_id_map);
        out.falloff_high_rates = self.falloff_high_rates.reduced(&active_fall, &fall_id_map);
        out.falloff_concm = self.falloff_concm.reduced(&active_fall, &fall_id_map);
        out.concm_falloff_values = vec![0.0; out.falloff_concm.work_size()];
        out.falloffn = self.falloffn.reduced(&active_fall);
        out.falloff_work = vec![0.0; out.falloffn.work_size()];
        out.falloff_pr = vec![0.0; n_active_fall];

        // QSS bookkeeping, rebuilt from the surviving reactions
        if let Some(qss) = &self.qss {
            let mut resolver = QssResolver::new(qss.species().to_vec());
            for (new_i, r) in out.reactions.iter().enumerate() {
                let (react_species, _) = out.resolve_side(&r.reactants, &r.equation)?;
                let (prod_species, _) = out.resolve_side(&r.products, &r.equation)?;
                resolver.install(new_i, &react_species, &prod_species, r.reversible, &r.equation);
            }
            out.qss = Some(resolver);
        }

        // fresh sentinels already mark every cache stale
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sum_counts_active_predecessors() {
        let active = [true, false, true, true, false];
        assert_eq!(prefix_sum_map(&active), vec![0, 1, 1, 2, 3]);
    }
}
