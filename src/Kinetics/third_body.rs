//! Efficiency-weighted third-body concentrations, "[M]".

/// One reaction's enhanced third-body calculator: the default efficiency
/// times the total concentration plus the sparse (efficiency - default)
/// corrections.
#[derive(Debug, Clone)]
struct ThirdBodyCalc {
    /// index into the owning value array (global reaction index for 3-body
    /// reactions, falloff-local index for falloff reactions)
    rxn: usize,
    /// (species, efficiency - default) pairs
    delta_eff: Vec<(usize, f64)>,
    default_efficiency: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ThirdBodyMgr {
    calcs: Vec<ThirdBodyCalc>,
}

impl ThirdBodyMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_reactions(&self) -> usize {
        self.calcs.len()
    }

    /// Size of the enhanced-[M] value vector this manager fills.
    pub fn work_size(&self) -> usize {
        self.calcs.len()
    }

    pub fn install(&mut self, rxn: usize, efficiencies: &[(usize, f64)], default_efficiency: f64) {
        let delta_eff = efficiencies
            .iter()
            .map(|&(k, eff)| (k, eff - default_efficiency))
            .collect();
        self.calcs.push(ThirdBodyCalc {
            rxn,
            delta_eff,
            default_efficiency,
        });
    }

    pub fn replace(&mut self, rxn: usize, efficiencies: &[(usize, f64)], default_efficiency: f64) {
        if let Some(calc) = self.calcs.iter_mut().find(|c| c.rxn == rxn) {
            calc.delta_eff = efficiencies
                .iter()
                .map(|&(k, eff)| (k, eff - default_efficiency))
                .collect();
            calc.default_efficiency = default_efficiency;
        }
    }

    /// Fill the enhanced third-body concentration per managed reaction:
    /// [M]_j = default * ctot + sum_k (eff_k - default) * c_k.
    pub fn update(&self, conc: &[f64], ctot: f64, values: &mut [f64]) {
        for (j, calc) in self.calcs.iter().enumerate() {
            let mut m = calc.default_efficiency * ctot;
            for &(k, delta) in &calc.delta_eff {
                m += delta * conc[k];
            }
            values[j] = m;
        }
    }

    /// Multiply the managed entries of `rates` by their enhanced [M].
    pub fn multiply(&self, rates: &mut [f64], values: &[f64]) {
        for (j, calc) in self.calcs.iter().enumerate() {
            rates[calc.rxn] *= values[j];
        }
    }

    /// Subset surviving the activation mask (indexed by `rxn`), re-indexed
    /// through `id_map`.
    pub fn reduced(&self, active: &[bool], id_map: &[usize]) -> Self {
        Self {
            calcs: self
                .calcs
                .iter()
                .filter(|calc| active[calc.rxn])
                .map(|calc| ThirdBodyCalc {
                    rxn: id_map[calc.rxn],
                    delta_eff: calc.delta_eff.clone(),
                    default_efficiency: calc.default_efficiency,
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
    fn enhanced_m_weights_overrides() {
        // efficiencies {0: 2.5, 1: 12.0}, default 1.0
        let mut mgr = ThirdBodyMgr::new();
        mgr.install(0, &[(0, 2.5), (1, 12.0)], 1.0);
        let conc = [0.4, 0.1, 0.5];
        let ctot: f64 = conc.iter().sum();
        let mut values = vec![0.0; mgr.work_size()];
        mgr.update(&conc, ctot, &mut values);
        let expected = 2.5 * 0.4 + 12.0 * 0.1 + 1.0 * 0.5;
        assert_relative_eq!(values[0], expected, max_relative = 1e-12);

        let mut rates = vec![2.0];
        mgr.multiply(&mut rates, &values);
        assert_relative_eq!(rates[0], 2.0 * expected, max_relative = 1e-12);
    }
}
