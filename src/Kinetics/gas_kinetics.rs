//! # Homogeneous gas-phase kinetics engine
//!
//! ## Aim
//! `GasKinetics` orchestrates the rate library, third-body manager and
//! stoichiometry slices into forward/reverse/net rates of progress with
//! equilibrium-constant consistency. It supports elementary, three-body,
//! falloff, chemically-activated, PLOG and Chebyshev reactions, optional
//! QSS species elimination, per-reaction perturbation multipliers and
//! mask-driven reduced snapshots.
//!
//! ## Caching
//! Rates are split into a T-dependent cache and a concentration/pressure
//! cache, guarded by stored (T, P) sentinels. Reaction-set mutation
//! invalidates everything by perturbing the sentinels, so the next update
//! recomputes unconditionally; no staleness exceptions are thrown.
//!
//! The updateROP pipeline order is fixed: k_f -> [M] -> falloff ->
//! perturbation -> (ropf, ropr = ropf/Kc) -> reactant concentration
//! products -> reversible-product concentration products -> net. Every
//! intermediate is checked finite.

use std::collections::HashMap;

use log::debug;
use prettytable::{row, Table};

use crate::error::ChemEngineError;
use crate::Kinetics::falloff::FalloffMgr;
use crate::Kinetics::qss::QssResolver;
use crate::Kinetics::rate_const::{ChebyshevRateMgr, PlogRateMgr, RateCoeffMgr};
use crate::Kinetics::reaction_data::{ReactionData, ReactionKinetics, ReactionType};
use crate::Kinetics::stoichiometry::StoichManager;
use crate::Kinetics::third_body::ThirdBodyMgr;
use crate::Thermodynamics::blend_phase::BlendPhase;
use crate::{BIG_NUMBER, GAS_CONSTANT, SMALL_NUMBER};

/// Default scale factor on the total density for the QSS sub-state.
pub const DEFAULT_REL_DENSITY_QSS: f64 = 1.0e-12;

pub struct GasKinetics<'a> {
    pub(crate) thermo: &'a BlendPhase,
    pub(crate) reactions: Vec<ReactionData>,
    pub(crate) n_species: usize,

    // dense per-reaction vectors
    pub(crate) rfn: Vec<f64>,
    pub(crate) rkcn: Vec<f64>,
    pub(crate) ropf: Vec<f64>,
    pub(crate) ropr: Vec<f64>,
    pub(crate) ropnet: Vec<f64>,
    pub(crate) perturb: Vec<f64>,
    pub(crate) dn: Vec<f64>,

    // reversible/irreversible partition of [0, Nr)
    pub(crate) revindex: Vec<usize>,
    pub(crate) irrev: Vec<usize>,

    // stoichiometry slices
    pub(crate) reactant_stoich: StoichManager,
    pub(crate) rev_product_stoich: StoichManager,
    pub(crate) irrev_product_stoich: StoichManager,

    // rate managers
    pub(crate) rates: RateCoeffMgr,
    pub(crate) plog_rates: PlogRateMgr,
    pub(crate) cheb_rates: ChebyshevRateMgr,

    // three-body subsystem
    pub(crate) tb_concm: ThirdBodyMgr,
    pub(crate) concm_3b_values: Vec<f64>,

    // falloff subsystem, local indexing
    pub(crate) falloff_low_rates: RateCoeffMgr,
    pub(crate) falloff_high_rates: RateCoeffMgr,
    pub(crate) rfn_low: Vec<f64>,
    pub(crate) rfn_high: Vec<f64>,
    pub(crate) fallindx: Vec<usize>,
    pub(crate) rfallindx: HashMap<usize, usize>,
    pub(crate) falloff_concm: ThirdBodyMgr,
    pub(crate) concm_falloff_values: Vec<f64>,
    pub(crate) falloffn: FalloffMgr,
    pub(crate) falloff_work: Vec<f64>,
    pub(crate) falloff_pr: Vec<f64>,

    // scratch
    pub(crate) conc: Vec<f64>,
    pub(crate) grt: Vec<f64>,

    // cache sentinels
    pub(crate) m_temp: f64,
    pub(crate) m_pres: f64,
    pub(crate) log_stand_conc: f64,
    pub(crate) rop_ok: bool,

    pub skip_undeclared_third_bodies: bool,
    /// Scale factor applied to the total density for the QSS sub-state.
    pub rel_density_qss: f64,
    pub(crate) qss: Option<QssResolver>,
}

impl<'a> GasKinetics<'a> {
    pub fn new(thermo: &'a BlendPhase) -> Self {
        let n = thermo.n_species();
        Self {
            thermo,
            reactions: Vec::new(),
            n_species: n,
            rfn: Vec::new(),
            rkcn: Vec::new(),
            ropf: Vec::new(),
            ropr: Vec::new(),
            ropnet: Vec::new(),
            perturb: Vec::new(),
            dn: Vec::new(),
            revindex: Vec::new(),
            irrev: Vec::new(),
            reactant_stoich: StoichManager::new(n),
            rev_product_stoich: StoichManager::new(n),
            irrev_product_stoich: StoichManager::new(n),
            rates: RateCoeffMgr::new(),
            plog_rates: PlogRateMgr::new(),
            cheb_rates: ChebyshevRateMgr::new(),
            tb_concm: ThirdBodyMgr::new(),
            concm_3b_values: Vec::new(),
            falloff_low_rates: RateCoeffMgr::new(),
            falloff_high_rates: RateCoeffMgr::new(),
            rfn_low: Vec::new(),
            rfn_high: Vec::new(),
            fallindx: Vec::new(),
            rfallindx: HashMap::new(),
            falloff_concm: ThirdBodyMgr::new(),
            concm_falloff_values: Vec::new(),
            falloffn: FalloffMgr::new(),
            falloff_work: Vec::new(),
            falloff_pr: Vec::new(),
            conc: vec![0.0; n],
            grt: vec![0.0; n],
            m_temp: 0.0,
            m_pres: 0.0,
            log_stand_conc: 0.0,
            rop_ok: false,
            skip_undeclared_third_bodies: false,
            rel_density_qss: DEFAULT_REL_DENSITY_QSS,
            qss: None,
        }
    }

    pub fn thermo(&self) -> &'a BlendPhase {
        self.thermo
    }

    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn reaction(&self, i: usize) -> &ReactionData {
        &self.reactions[i]
    }

    pub fn reaction_type(&self, i: usize) -> ReactionType {
        self.reactions[i].reaction_type
    }

    /// Declare the quasi-steady-state species subset. Must happen before
    /// any reaction is installed, so the per-reaction QSS bookkeeping sees
    /// the whole mechanism.
    pub fn declare_qss_species(&mut self, names: &[&str]) -> Result<(), ChemEngineError> {
        if !self.reactions.is_empty() {
            return Err(ChemEngineError::Unsupported(
                "QSS species must be declared before reactions are added".to_string(),
            ));
        }
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let k = self.thermo.species_index(name).ok_or_else(|| {
                ChemEngineError::UndeclaredSpecies {
                    species: name.to_string(),
                    equation: "<QSS declaration>".to_string(),
                }
            })?;
            indices.push(k);
        }
        self.qss = Some(QssResolver::new(indices));
        Ok(())
    }

    pub fn qss_species(&self) -> &[usize] {
        self.qss.as_ref().map(|q| q.species()).unwrap_or(&[])
    }

    //////////////////// REACTION INSTALLATION ////////////////////

    pub(crate) fn resolve_side(
        &self,
        side: &HashMap<String, f64>,
        equation: &str,
    ) -> Result<(Vec<usize>, Vec<f64>), ChemEngineError> {
        let mut species = Vec::with_capacity(side.len());
        let mut nu = Vec::with_capacity(side.len());
        // deterministic installation order regardless of map iteration
        let mut entries: Vec<(&String, &f64)> = side.iter().collect();
        entries.sort_by(|x, y| x.0.cmp(y.0));
        for (name, &coeff) in entries {
            let k = self.thermo.species_index(name).ok_or_else(|| {
                ChemEngineError::UndeclaredSpecies {
                    species: name.clone(),
                    equation: equation.to_string(),
                }
            })?;
            species.push(k);
            nu.push(coeff);
        }
        Ok((species, nu))
    }

    fn resolve_efficiencies(
        &self,
        efficiencies: &HashMap<String, f64>,
        equation: &str,
    ) -> Result<Vec<(usize, f64)>, ChemEngineError> {
        let mut out = Vec::with_capacity(efficiencies.len());
        let mut entries: Vec<(&String, &f64)> = efficiencies.iter().collect();
        entries.sort_by(|x, y| x.0.cmp(y.0));
        for (name, &eff) in entries {
            match self.thermo.species_index(name) {
                Some(k) => out.push((k, eff)),
                None if self.skip_undeclared_third_bodies => {
                    debug!("skipping third-body efficiency for undeclared species '{name}'");
                }
                None => {
                    return Err(ChemEngineError::UndeclaredSpecies {
                        species: name.clone(),
                        equation: equation.to_string(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Install a reaction. Dispatches on the record tag; an inconsistent
    /// tag/payload pair fails with `InvalidKind` before anything grows.
    pub fn add_reaction(&mut self, r: ReactionData) -> Result<(), ChemEngineError> {
        r.validate()?;
        let (react_species, react_nu) = self.resolve_side(&r.reactants, &r.equation)?;
        let (prod_species, prod_nu) = self.resolve_side(&r.products, &r.equation)?;

        let i = self.reactions.len();
        self.reactant_stoich.add_reaction(&react_species, &react_nu);
        if r.reversible {
            self.rev_product_stoich.add_reaction(&prod_species, &prod_nu);
            self.irrev_product_stoich.add_reaction(&[], &[]);
            self.revindex.push(i);
        } else {
            self.rev_product_stoich.add_reaction(&[], &[]);
            self.irrev_product_stoich.add_reaction(&prod_species, &prod_nu);
            self.irrev.push(i);
        }
        self.dn.push(r.delta_n());
        self.rfn.push(0.0);
        self.rkcn.push(0.0);
        self.ropf.push(0.0);
        self.ropr.push(0.0);
        self.ropnet.push(0.0);
        self.perturb.push(1.0);

        match (&r.reaction_type, &r.data) {
            (ReactionType::Elementary, ReactionKinetics::Elementary(data)) => {
                self.rates.install(i, data.rate);
            }
            (ReactionType::ThreeBody, ReactionKinetics::ThreeBody(data)) => {
                self.rates.install(i, data.rate);
                let eff = self.resolve_efficiencies(&data.efficiencies, &r.equation)?;
                self.tb_concm.install(i, &eff, data.default_efficiency);
                self.concm_3b_values.resize(self.tb_concm.work_size(), 0.0);
            }
            (
                ReactionType::Falloff | ReactionType::ChemicallyActivated,
                ReactionKinetics::Falloff(data),
            ) => {
                let nfall = self.falloff_high_rates.n_reactions();
                self.falloff_high_rates.install(nfall, data.high_rate);
                self.falloff_low_rates.install(nfall, data.low_rate);
                self.rfn_high.push(0.0);
                self.rfn_low.push(0.0);
                self.fallindx.push(i);
                self.rfallindx.insert(i, nfall);
                let eff = self.resolve_efficiencies(&data.efficiencies, &r.equation)?;
                self.falloff_concm.install(nfall, &eff, data.default_efficiency);
                self.concm_falloff_values
                    .resize(self.falloff_concm.work_size(), 0.0);
                self.falloffn.install(
                    data.blend,
                    r.reaction_type == ReactionType::ChemicallyActivated,
                );
                self.falloff_work.resize(self.falloffn.work_size(), 0.0);
                self.falloff_pr.resize(self.fallindx.len(), 0.0);
            }
            (ReactionType::Plog, ReactionKinetics::Plog(data)) => {
                self.plog_rates.install(i, &data.rates)?;
            }
            (ReactionType::Chebyshev, ReactionKinetics::Chebyshev(data)) => {
                self.cheb_rates.install(i, data)?;
            }
            _ => unreachable!("validated above"),
        }

        if let Some(qss) = self.qss.as_mut() {
            qss.install(i, &react_species, &prod_species, r.reversible, &r.equation);
        }

        self.reactions.push(r);
        self.invalidate_cache();
        Ok(())
    }

    /// Replace reaction `i` in place, preserving indices. The new record
    /// must carry the same kind and the same stoichiometry.
    pub fn modify_reaction(&mut self, i: usize, r: ReactionData) -> Result<(), ChemEngineError> {
        r.validate()?;
        let old = &self.reactions[i];
        if r.reaction_type != old.reaction_type {
            return Err(ChemEngineError::InvalidKind {
                equation: r.equation.clone(),
                details: format!(
                    "cannot change reaction kind from {:?} to {:?} in place",
                    old.reaction_type, r.reaction_type
                ),
            });
        }
        if r.reactants != old.reactants || r.products != old.products || r.reversible != old.reversible
        {
            return Err(ChemEngineError::Unsupported(format!(
                "modify_reaction may not change the stoichiometry of '{}'",
                old.equation
            )));
        }

        match (&r.reaction_type, &r.data) {
            (ReactionType::Elementary, ReactionKinetics::Elementary(data)) => {
                self.rates.replace(i, data.rate)?;
            }
            (ReactionType::ThreeBody, ReactionKinetics::ThreeBody(data)) => {
                self.rates.replace(i, data.rate)?;
                let eff = self.resolve_efficiencies(&data.efficiencies, &r.equation)?;
                self.tb_concm.replace(i, &eff, data.default_efficiency);
            }
            (
                ReactionType::Falloff | ReactionType::ChemicallyActivated,
                ReactionKinetics::Falloff(data),
            ) => {
                let ifall = *self.rfallindx.get(&i).ok_or_else(|| {
                    ChemEngineError::InvalidKind {
                        equation: r.equation.clone(),
                        details: "reaction is not registered as falloff".to_string(),
                    }
                })?;
                self.falloff_high_rates.replace(ifall, data.high_rate)?;
                self.falloff_low_rates.replace(ifall, data.low_rate)?;
                self.falloffn.replace(ifall, data.blend);
                self.falloff_work.resize(self.falloffn.work_size(), 0.0);
                let eff = self.resolve_efficiencies(&data.efficiencies, &r.equation)?;
                self.falloff_concm.replace(ifall, &eff, data.default_efficiency);
            }
            (ReactionType::Plog, ReactionKinetics::Plog(data)) => {
                self.plog_rates.replace(i, &data.rates)?;
            }
            (ReactionType::Chebyshev, ReactionKinetics::Chebyshev(data)) => {
                self.cheb_rates.replace(i, data)?;
            }
            _ => unreachable!("validated above"),
        }

        self.reactions[i] = r;
        self.invalidate_cache();
        Ok(())
    }

    /// Invalidate all cached rate data by perturbing the stored (T, P)
    /// sentinels; the next update recomputes unconditionally.
    pub fn invalidate_cache(&mut self) {
        self.m_temp += 0.317;
        self.m_pres += 0.1597;
        self.rop_ok = false;
    }

    //////////////////// PERTURBATION MULTIPLIERS ////////////////////

    pub fn set_multiplier(&mut self, i: usize, factor: f64) {
        self.perturb[i] = factor;
        self.rop_ok = false;
    }

    pub fn multiplier(&self, i: usize) -> f64 {
        self.perturb[i]
    }

    //////////////////// RATE CACHES ////////////////////

    /// Refresh everything that depends on temperature only, plus the
    /// P-dependent PLOG/Chebyshev rates when the pressure moved.
    pub fn update_rates_t(&mut self) -> Result<(), ChemEngineError> {
        let t = self.thermo.temperature();
        let p = self.thermo.pressure();
        if !(t > 0.0) {
            return Err(ChemEngineError::NotReady(
                "thermo state has no positive temperature".to_string(),
            ));
        }
        self.log_stand_conc = self.thermo.standard_concentration().ln();
        let log_t = t.ln();

        if t != self.m_temp {
            if !self.rfn.is_empty() {
                self.rates.update(t, log_t, &mut self.rfn);
            }
            if !self.rfn_low.is_empty() {
                self.falloff_low_rates.update(t, log_t, &mut self.rfn_low);
                self.falloff_high_rates.update(t, log_t, &mut self.rfn_high);
            }
            if !self.falloff_work.is_empty() {
                self.falloffn.update_temp(t, &mut self.falloff_work);
            }
            self.update_kc()?;
            self.rop_ok = false;
        }

        if t != self.m_temp || p != self.m_pres {
            if self.plog_rates.n_reactions() > 0 {
                self.plog_rates.update(t, log_t, &mut self.rfn);
                self.rop_ok = false;
            }
            if self.cheb_rates.n_reactions() > 0 {
                self.cheb_rates.update(t, log_t, &mut self.rfn);
                self.rop_ok = false;
            }
        }
        self.m_pres = p;
        self.m_temp = t;
        Ok(())
    }

    /// Refresh everything that depends on composition (and set the pressure
    /// variable of the P-dependent rate kinds).
    pub fn update_rates_c(&mut self) {
        self.thermo.concentrations(&mut self.conc);
        let ctot = self.thermo.molar_density();

        if !self.concm_3b_values.is_empty() {
            self.tb_concm
                .update(&self.conc, ctot, &mut self.concm_3b_values);
        }
        if !self.concm_falloff_values.is_empty() {
            self.falloff_concm
                .update(&self.conc, ctot, &mut self.concm_falloff_values);
        }
        if self.plog_rates.n_reactions() > 0 {
            self.plog_rates.update_c(self.thermo.pressure().ln());
        }
        if self.cheb_rates.n_reactions() > 0 {
            self.cheb_rates.update_c(self.thermo.pressure().log10());
        }
        self.rop_ok = false;
    }

    /// Reciprocal equilibrium constants for reversible reactions (zero for
    /// irreversible ones), from standard chemical potentials.
    fn update_kc(&mut self) -> Result<(), ChemEngineError> {
        self.thermo.standard_chem_potentials(&mut self.grt)?;
        self.rkcn.iter_mut().for_each(|v| *v = 0.0);

        // Delta G0 over the reversible slice
        self.rev_product_stoich
            .increment_reactions(&self.grt, &mut self.rkcn);
        self.reactant_stoich
            .decrement_reactions(&self.grt, &mut self.rkcn);

        let rrt = 1.0 / (GAS_CONSTANT * self.thermo.temperature());
        for &irxn in &self.revindex {
            self.rkcn[irxn] = (self.rkcn[irxn] * rrt - self.dn[irxn] * self.log_stand_conc)
                .exp()
                .min(BIG_NUMBER);
        }
        for &irxn in &self.irrev {
            self.rkcn[irxn] = 0.0;
        }
        Ok(())
    }

    /// Equilibrium constants Kc[i] = exp(-dG0_i/RT + dn_i * ln c_std) in
    /// concentration units, for every reaction.
    pub fn get_equilibrium_constants(&mut self, kc: &mut [f64]) -> Result<(), ChemEngineError> {
        self.update_rates_t()?;
        self.thermo.standard_chem_potentials(&mut self.grt)?;
        self.rkcn.iter_mut().for_each(|v| *v = 0.0);

        // Delta G0 over all reactions
        self.rev_product_stoich
            .increment_reactions(&self.grt, &mut self.rkcn);
        self.irrev_product_stoich
            .increment_reactions(&self.grt, &mut self.rkcn);
        self.reactant_stoich
            .decrement_reactions(&self.grt, &mut self.rkcn);

        let rrt = 1.0 / (GAS_CONSTANT * self.thermo.temperature());
        for i in 0..self.n_reactions() {
            kc[i] = (-self.rkcn[i] * rrt + self.dn[i] * self.log_stand_conc).exp();
        }

        // rkcn was clobbered; force the T cache stale so it is rebuilt
        // before the next use
        self.m_temp = 0.0;
        Ok(())
    }

    //////////////////// FALLOFF PROCESSING ////////////////////

    fn process_falloff_reactions(&mut self) -> Result<(), ChemEngineError> {
        let nfall = self.rfn_low.len();
        for i in 0..nfall {
            self.falloff_pr[i] = self.rfn_low[i] / (self.rfn_high[i] + SMALL_NUMBER);
        }
        self.falloff_concm
            .multiply(&mut self.falloff_pr, &self.concm_falloff_values);
        for i in 0..nfall {
            if !self.falloff_pr[i].is_finite() {
                return Err(ChemEngineError::NonFinite {
                    context: "falloff processing",
                    what: "pr",
                    index: i,
                });
            }
        }

        self.falloffn
            .pr_to_falloff(&mut self.falloff_pr[..nfall], &self.falloff_work);

        for i in 0..nfall {
            let factor = if self.reaction_type(self.fallindx[i]) == ReactionType::ChemicallyActivated
            {
                self.rfn_low[i]
            } else {
                self.rfn_high[i]
            };
            self.falloff_pr[i] *= factor;
        }

        // scatter into the global forward vector
        for i in 0..nfall {
            self.ropf[self.fallindx[i]] = self.falloff_pr[i];
        }
        Ok(())
    }

    //////////////////// RATES OF PROGRESS ////////////////////

    /// Recompute forward/reverse/net rates of progress if any cache is
    /// stale. Pipeline order is fixed; every intermediate is checked
    /// finite.
    pub fn update_rop(&mut self) -> Result<(), ChemEngineError> {
        self.update_rates_c();
        self.update_rates_t()?;
        if self.rop_ok {
            return Ok(());
        }

        self.ropf.copy_from_slice(&self.rfn);

        if !self.concm_3b_values.is_empty() {
            self.tb_concm.multiply(&mut self.ropf, &self.concm_3b_values);
        }
        if self.falloff_high_rates.n_reactions() > 0 {
            self.process_falloff_reactions()?;
        }

        for (rate, factor) in self.ropf.iter_mut().zip(&self.perturb) {
            *rate *= factor;
        }

        self.ropr.copy_from_slice(&self.ropf);
        for (rate, rkc) in self.ropr.iter_mut().zip(&self.rkcn) {
            *rate *= rkc;
        }

        // rates of QSS-touching reactions are evaluated per unit QSS
        // concentration; the closure rescales them afterwards
        if let Some(qss) = &self.qss {
            for &k in qss.species() {
                self.conc[k] = 1.0;
            }
        }

        self.reactant_stoich.multiply(&self.conc, &mut self.ropf);
        self.rev_product_stoich.multiply(&self.conc, &mut self.ropr);

        if let Some(qss) = self.qss.as_mut() {
            let c_qss = qss.calc_conc(&self.ropf, &self.ropr)?;
            qss.rescale_rop(&c_qss, &mut self.ropf, &mut self.ropr);
            for (local, &k) in qss.species().iter().enumerate() {
                self.conc[k] = c_qss[local];
            }
        }

        for j in 0..self.n_reactions() {
            self.ropnet[j] = self.ropf[j] - self.ropr[j];
        }

        for (what, vector) in [
            ("rfn", &self.rfn),
            ("ropf", &self.ropf),
            ("ropr", &self.ropr),
        ] {
            for (i, value) in vector.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ChemEngineError::NonFinite {
                        context: "updateROP",
                        what,
                        index: i,
                    });
                }
            }
        }
        self.rop_ok = true;
        Ok(())
    }

    /// Effective forward rate constants: k_f with enhanced [M], falloff
    /// blending and perturbation applied.
    pub fn get_fwd_rate_constants(&mut self, kfwd: &mut [f64]) -> Result<(), ChemEngineError> {
        self.update_rates_c();
        self.update_rates_t()?;

        self.ropf.copy_from_slice(&self.rfn);
        if !self.concm_3b_values.is_empty() {
            self.tb_concm.multiply(&mut self.ropf, &self.concm_3b_values);
        }
        if self.falloff_high_rates.n_reactions() > 0 {
            self.process_falloff_reactions()?;
        }
        for (rate, factor) in self.ropf.iter_mut().zip(&self.perturb) {
            *rate *= factor;
        }
        kfwd[..self.n_reactions()].copy_from_slice(&self.ropf);
        Ok(())
    }

    pub fn fwd_rates_of_progress(&mut self) -> Result<&[f64], ChemEngineError> {
        self.update_rop()?;
        Ok(&self.ropf)
    }

    pub fn rev_rates_of_progress(&mut self) -> Result<&[f64], ChemEngineError> {
        self.update_rop()?;
        Ok(&self.ropr)
    }

    pub fn net_rates_of_progress(&mut self) -> Result<&[f64], ChemEngineError> {
        self.update_rop()?;
        Ok(&self.ropnet)
    }

    /// Net molar production rate per species, kmol/(m3*s).
    pub fn net_production_rates(&mut self, wdot: &mut [f64]) -> Result<(), ChemEngineError> {
        self.update_rop()?;
        wdot[..self.n_species].iter_mut().for_each(|w| *w = 0.0);
        self.rev_product_stoich
            .increment_species(&self.ropnet, wdot);
        self.irrev_product_stoich
            .increment_species(&self.ropnet, wdot);
        self.reactant_stoich.decrement_species(&self.ropnet, wdot);
        Ok(())
    }

    //////////////////// DELTA PROPERTIES ////////////////////

    fn reaction_delta(&self, prop: &[f64], delta: &mut [f64]) {
        delta[..self.n_reactions()].iter_mut().for_each(|d| *d = 0.0);
        self.rev_product_stoich.increment_reactions(prop, delta);
        self.irrev_product_stoich.increment_reactions(prop, delta);
        self.reactant_stoich.decrement_reactions(prop, delta);
    }

    /// Delta Gibbs of reaction from actual chemical potentials, J/kmol.
    pub fn get_delta_gibbs(&mut self, delta_g: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.chem_potentials(&mut self.grt)?;
        self.reaction_delta(&self.grt, delta_g);
        Ok(())
    }

    /// Delta enthalpy of reaction from partial molar enthalpies, J/kmol.
    pub fn get_delta_enthalpy(&mut self, delta_h: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.partial_molar_enthalpies(&mut self.grt)?;
        self.reaction_delta(&self.grt, delta_h);
        Ok(())
    }

    /// Delta entropy of reaction from partial molar entropies, J/(kmol*K).
    pub fn get_delta_entropy(&mut self, delta_s: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.partial_molar_entropies(&mut self.grt)?;
        self.reaction_delta(&self.grt, delta_s);
        Ok(())
    }

    /// Standard-state delta Gibbs, J/kmol.
    pub fn get_delta_ss_gibbs(&mut self, delta_g: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.standard_chem_potentials(&mut self.grt)?;
        self.reaction_delta(&self.grt, delta_g);
        Ok(())
    }

    /// Standard-state delta enthalpy, J/kmol.
    pub fn get_delta_ss_enthalpy(&mut self, delta_h: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.get_enthalpy_rt(&mut self.grt)?;
        let rt = GAS_CONSTANT * self.thermo.temperature();
        for g in self.grt.iter_mut() {
            *g *= rt;
        }
        self.reaction_delta(&self.grt, delta_h);
        Ok(())
    }

    /// Standard-state delta entropy, J/(kmol*K).
    pub fn get_delta_ss_entropy(&mut self, delta_s: &mut [f64]) -> Result<(), ChemEngineError> {
        self.thermo.get_entropy_r(&mut self.grt)?;
        for g in self.grt.iter_mut() {
            *g *= GAS_CONSTANT;
        }
        self.reaction_delta(&self.grt, delta_s);
        Ok(())
    }

    //////////////////// DIAGNOSTICS ////////////////////

    /// Mass defect of reaction `i`: sum of nu*W over products minus
    /// reactants. Zero for a well-formed reaction.
    pub fn reaction_mass_imbalance(&self, i: usize) -> f64 {
        let weights = self.thermo.molecular_weights();
        let r = &self.reactions[i];
        let side_mass = |side: &HashMap<String, f64>| -> f64 {
            side.iter()
                .map(|(name, nu)| {
                    self.thermo
                        .species_index(name)
                        .map(|k| nu * weights[k])
                        .unwrap_or(0.0)
                })
                .sum()
        };
        side_mass(&r.products) - side_mass(&r.reactants)
    }

    /// Print a mechanism summary table.
    pub fn print_mechanism_report(&self) {
        let mut table = Table::new();
        table.add_row(row!["#", "equation", "kind", "reversible", "dn"]);
        for (i, r) in self.reactions.iter().enumerate() {
            table.add_row(row![
                i,
                r.equation,
                format!("{:?}", r.reaction_type),
                r.reversible,
                format!("{:+.1}", self.dn[i])
            ]);
        }
        table.printstd();
    }
}
