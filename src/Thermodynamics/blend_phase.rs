//! # Blended ideal-gas / Peng-Robinson phase
//!
//! ## Aim
//! `BlendPhase` is the thermodynamic state object of the engine. It evaluates
//! mixture properties by blending an ideal-gas model with a Peng-Robinson
//! departure function through a blend factor beta in [0,1] (0 = ideal gas,
//! 1 = full PR), together with the temperature and composition derivatives
//! the kinetics Jacobians need.
//!
//! ## Main data structures and logic
//! - `BlendPhase`: species metadata, NASA-7 table, critical store, blend
//!   factor and reference pressure; all mutable numeric state sits behind a
//!   `RefCell` so property getters take `&self` and the kinetics engine can
//!   hold a plain borrow of the phase.
//! - Two-level cache: the ideal reference vectors (cp0/R, h0/RT, s0/R) are
//!   keyed on exact T equality; the real-fluid layer (Am, Bm, K1 and their
//!   derivatives) is keyed on (Y componentwise, T, rho). A composition
//!   change refreshes constants and thermodynamics, a (T, rho) change with
//!   unchanged composition refreshes only the thermodynamics.
//! - Cubic root selection for Z keeps the three branches explicit: Cardano
//!   single root, degenerate double root (warned), trigonometric three-root
//!   form picking the smallest non-negative root with a largest-root
//!   fallback.
//!
//! ## Usage
//! ```rust, ignore
//! let phase = BlendPhase::new(species, 101325.0, 1.0)?;
//! phase.set_state_trY(60.0, 20.0, &y)?;
//! phase.set_pressure(5.0e6)?;
//! let h = phase.enthalpy_mole()?;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

use log::warn;

use crate::error::ChemEngineError;
use crate::Thermodynamics::critical_props::{BinaryInteraction, CriticalProps, CriticalStore};
use crate::Thermodynamics::nasa_poly::{SpeciesRecord, SpeciesThermoTable};
use crate::{GAS_CONSTANT, SMALL_NUMBER};

/// Which branch the last cubic EOS solve took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubicBranch {
    NotSolved,
    SingleReal,
    DoubleRoot,
    ThreeReal,
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
struct PhaseCache {
    temp: f64,
    rho: f64,
    y: Vec<f64>,
    x: Vec<f64>,
    mean_w: f64,
    /// Ideal-density snapshot behind `pressure()`.
    rho_ideal: f64,

    // ideal reference cache, keyed on exact T
    t_therm: f64,
    cp0_r: Vec<f64>,
    h0_rt: Vec<f64>,
    s0_r: Vec<f64>,
    g0_rt: Vec<f64>,

    // real-fluid cache keys
    y_real: Vec<f64>,
    t_real: f64,
    rho_real: f64,

    // real-fluid mixture quantities
    Bm: f64,
    Am: f64,
    dAmdT: f64,
    d2AmdT2: f64,
    K1: f64,
    dPdT: f64,
    dPdV: f64,
    dAmdN: Vec<f64>,
    d2AmdTdN: Vec<f64>,
    dPdN: Vec<f64>,
    dVdN: Vec<f64>,
    dK1dN: Vec<f64>,

    last_cubic: CubicBranch,
    // scratch for the equilibrium-state setter
    pp: Vec<f64>,
}

/// Thermodynamic phase blending ideal-gas and Peng-Robinson behavior.
pub struct BlendPhase {
    names: Vec<String>,
    index: HashMap<String, usize>,
    weights: Vec<f64>,
    thermo_table: SpeciesThermoTable,
    crit: CriticalStore,
    p0: f64,
    blend_factor: f64,
    cell: RefCell<PhaseCache>,
}

impl BlendPhase {
    pub fn new(
        species: Vec<SpeciesRecord>,
        p0: f64,
        blend_factor: f64,
    ) -> Result<Self, ChemEngineError> {
        Self::with_options(
            species,
            p0,
            blend_factor,
            BinaryInteraction::default(),
            HashMap::new(),
        )
    }

    pub fn with_options(
        species: Vec<SpeciesRecord>,
        p0: f64,
        blend_factor: f64,
        kij: BinaryInteraction,
        crit_overrides: HashMap<String, CriticalProps>,
    ) -> Result<Self, ChemEngineError> {
        if species.is_empty() {
            return Err(ChemEngineError::NotReady(
                "phase requires at least one species".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&blend_factor) {
            return Err(ChemEngineError::InvalidState(format!(
                "blend factor {blend_factor} outside [0, 1]"
            )));
        }
        if p0 <= 0.0 {
            return Err(ChemEngineError::InvalidState(format!(
                "reference pressure {p0} must be positive"
            )));
        }
        let n = species.len();
        let names: Vec<String> = species.iter().map(|s| s.name.clone()).collect();
        let weights: Vec<f64> = species.iter().map(|s| s.molar_weight).collect();
        for s in &species {
            if s.molar_weight <= 0.0 {
                return Err(ChemEngineError::InvalidState(format!(
                    "species '{}' has non-positive molecular weight",
                    s.name
                )));
            }
        }
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(k, name)| (name.clone(), k))
            .collect();
        let crit = CriticalStore::build(&names, &weights, &crit_overrides, &kij);
        let thermo_table =
            SpeciesThermoTable::new(species.into_iter().map(|s| s.thermo).collect());

        // default state: pure first species at 300 K and p0
        let mut y = vec![0.0; n];
        y[0] = 1.0;
        let mut x = vec![0.0; n];
        x[0] = 1.0;
        let mean_w = weights[0];
        let temp = 300.0;
        let rho = p0 * mean_w / (GAS_CONSTANT * temp);
        let cache = PhaseCache {
            temp,
            rho,
            y,
            x,
            mean_w,
            rho_ideal: rho,
            t_therm: -1.0,
            cp0_r: vec![0.0; n],
            h0_rt: vec![0.0; n],
            s0_r: vec![0.0; n],
            g0_rt: vec![0.0; n],
            y_real: Vec::new(),
            t_real: -1.0,
            rho_real: -1.0,
            Bm: 0.0,
            Am: 0.0,
            dAmdT: 0.0,
            d2AmdT2: 0.0,
            K1: 0.0,
            dPdT: 0.0,
            dPdV: 0.0,
            dAmdN: vec![0.0; n],
            d2AmdTdN: vec![0.0; n],
            dPdN: vec![0.0; n],
            dVdN: vec![0.0; n],
            dK1dN: vec![0.0; n],
            last_cubic: CubicBranch::NotSolved,
            pp: vec![0.0; n],
        };
        Ok(Self {
            names,
            index,
            weights,
            thermo_table,
            crit,
            p0,
            blend_factor,
            cell: RefCell::new(cache),
        })
    }

    ///////////////////////////// SPECIES METADATA /////////////////////////////

    pub fn n_species(&self) -> usize {
        self.names.len()
    }

    pub fn species_names(&self) -> &[String] {
        &self.names
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn molecular_weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn blend_factor(&self) -> f64 {
        self.blend_factor
    }

    pub fn ref_pressure(&self) -> f64 {
        self.p0
    }

    ///////////////////////////// STATE SETTERS /////////////////////////////

    /// Set temperature [K], density [kg/m3] and mass fractions in one call.
    #[allow(non_snake_case)]
    pub fn set_state_trY(&self, t: f64, rho: f64, y: &[f64]) -> Result<(), ChemEngineError> {
        self.set_mass_fractions(y)?;
        self.set_temperature(t)?;
        self.set_density(rho)
    }

    /// Set temperature [K], pressure [Pa] and mass fractions; the density
    /// comes out of the blended EOS.
    #[allow(non_snake_case)]
    pub fn set_state_tpY(&self, t: f64, p: f64, y: &[f64]) -> Result<(), ChemEngineError> {
        self.set_mass_fractions(y)?;
        self.set_temperature(t)?;
        self.set_pressure(p)
    }

    /// Set pressure [Pa] and mole fractions.
    #[allow(non_snake_case)]
    pub fn set_state_PX(&self, p: f64, x: &[f64]) -> Result<(), ChemEngineError> {
        self.set_mole_fractions(x)?;
        self.set_pressure(p)
    }

    pub fn set_temperature(&self, t: f64) -> Result<(), ChemEngineError> {
        if !(t > 0.0) || !t.is_finite() {
            return Err(ChemEngineError::InvalidState(format!(
                "temperature {t} must be positive and finite"
            )));
        }
        self.cell.borrow_mut().temp = t;
        Ok(())
    }

    /// Set the mass density directly. The ideal-density snapshot is reset to
    /// the same value so `pressure()` stays defined for this path too.
    pub fn set_density(&self, rho: f64) -> Result<(), ChemEngineError> {
        if !(rho > 0.0) || !rho.is_finite() {
            return Err(ChemEngineError::InvalidState(format!(
                "density {rho} must be positive and finite"
            )));
        }
        let mut cache = self.cell.borrow_mut();
        cache.rho = rho;
        cache.rho_ideal = rho;
        Ok(())
    }

    pub fn set_mass_fractions(&self, y: &[f64]) -> Result<(), ChemEngineError> {
        let n = self.n_species();
        if y.len() != n {
            return Err(ChemEngineError::InvalidState(format!(
                "expected {n} mass fractions, got {}",
                y.len()
            )));
        }
        let mut sum = 0.0;
        for (k, &yk) in y.iter().enumerate() {
            if !(yk >= 0.0) || !yk.is_finite() {
                return Err(ChemEngineError::InvalidState(format!(
                    "mass fraction of '{}' is {yk}",
                    self.names[k]
                )));
            }
            sum += yk;
        }
        if sum <= 0.0 {
            return Err(ChemEngineError::InvalidState(
                "mass fractions sum to zero".to_string(),
            ));
        }
        let mut cache = self.cell.borrow_mut();
        let mut inv_w = 0.0;
        for k in 0..n {
            cache.y[k] = y[k] / sum;
            inv_w += cache.y[k] / self.weights[k];
        }
        cache.mean_w = 1.0 / inv_w;
        for k in 0..n {
            cache.x[k] = cache.y[k] * cache.mean_w / self.weights[k];
        }
        Ok(())
    }

    pub fn set_mole_fractions(&self, x: &[f64]) -> Result<(), ChemEngineError> {
        let n = self.n_species();
        if x.len() != n {
            return Err(ChemEngineError::InvalidState(format!(
                "expected {n} mole fractions, got {}",
                x.len()
            )));
        }
        let mut sum = 0.0;
        for (k, &xk) in x.iter().enumerate() {
            if !(xk >= 0.0) || !xk.is_finite() {
                return Err(ChemEngineError::InvalidState(format!(
                    "mole fraction of '{}' is {xk}",
                    self.names[k]
                )));
            }
            sum += xk;
        }
        if sum <= 0.0 {
            return Err(ChemEngineError::InvalidState(
                "mole fractions sum to zero".to_string(),
            ));
        }
        let mut cache = self.cell.borrow_mut();
        let mut mean_w = 0.0;
        for k in 0..n {
            cache.x[k] = x[k] / sum;
            mean_w += cache.x[k] * self.weights[k];
        }
        cache.mean_w = mean_w;
        for k in 0..n {
            cache.y[k] = cache.x[k] * self.weights[k] / mean_w;
        }
        Ok(())
    }

    /// Solve for the density at pressure `p` and the current (T, Y): ideal
    /// density and PR density are blended with the blend factor, and the
    /// ideal piece is retained for `pressure()`.
    pub fn set_pressure(&self, p: f64) -> Result<(), ChemEngineError> {
        if !(p > 0.0) || !p.is_finite() {
            return Err(ChemEngineError::InvalidState(format!(
                "pressure {p} must be positive and finite"
            )));
        }
        let mut cache = self.cell.borrow_mut();
        let t = cache.temp;
        let rho_i = p * cache.mean_w / (GAS_CONSTANT * t);
        if self.blend_factor == 0.0 {
            cache.rho = rho_i;
            cache.rho_ideal = rho_i;
            return Ok(());
        }
        self.update_real_fluid(&mut cache)?;
        let v_pr = self.volume_from_pt(&mut cache, p, t)?;
        let rho_pr = cache.mean_w / v_pr;
        cache.rho = (1.0 - self.blend_factor) * rho_i + self.blend_factor * rho_pr;
        cache.rho_ideal = rho_i;
        Ok(())
    }

    ///////////////////////////// STATE GETTERS /////////////////////////////

    pub fn temperature(&self) -> f64 {
        self.cell.borrow().temp
    }

    pub fn density(&self) -> f64 {
        self.cell.borrow().rho
    }

    /// Pressure from the stored ideal-density snapshot: p = R*T*rho_I/W.
    pub fn pressure(&self) -> f64 {
        let cache = self.cell.borrow();
        GAS_CONSTANT * cache.rho_ideal / cache.mean_w * cache.temp
    }

    pub fn mean_molecular_weight(&self) -> f64 {
        self.cell.borrow().mean_w
    }

    /// Molar density, kmol/m3.
    pub fn molar_density(&self) -> f64 {
        let cache = self.cell.borrow();
        cache.rho / cache.mean_w
    }

    /// Molar volume, m3/kmol.
    pub fn molar_volume(&self) -> f64 {
        let cache = self.cell.borrow();
        cache.mean_w / cache.rho
    }

    pub fn mass_fractions(&self) -> Vec<f64> {
        self.cell.borrow().y.clone()
    }

    pub fn mole_fractions(&self) -> Vec<f64> {
        self.cell.borrow().x.clone()
    }

    pub fn mole_fraction(&self, k: usize) -> f64 {
        self.cell.borrow().x[k]
    }

    /// Molar concentrations c_i = rho*Y_i/W_i, kmol/m3.
    pub fn concentrations(&self, out: &mut [f64]) {
        let cache = self.cell.borrow();
        for k in 0..self.n_species() {
            out[k] = cache.rho * cache.y[k] / self.weights[k];
        }
    }

    /// Standard concentration p/(R*T), kmol/m3.
    pub fn standard_concentration(&self) -> f64 {
        let cache = self.cell.borrow();
        cache.rho_ideal / cache.mean_w
    }

    pub fn last_cubic_branch(&self) -> CubicBranch {
        self.cell.borrow().last_cubic
    }

    /// Probe the last cubic EOS solve. The degenerate double-root branch is
    /// informational: the solve already returned a valid root, but callers
    /// that care can detect it here.
    pub fn cubic_solve_status(&self) -> Result<(), ChemEngineError> {
        match self.cell.borrow().last_cubic {
            CubicBranch::DoubleRoot => Err(ChemEngineError::CubicSolveDegenerate),
            _ => Ok(()),
        }
    }

    ////////////////////// MOLAR MIXTURE PROPERTIES //////////////////////

    /// Molar enthalpy, J/kmol. Ideal part plus beta-weighted PR departure.
    pub fn enthalpy_mole(&self) -> Result<f64, ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let t = cache.temp;
        let h0 = GAS_CONSTANT * t * Self::mean_x(&cache.x, &cache.h0_rt);
        if self.blend_factor == 0.0 {
            return Ok(h0);
        }
        self.update_real_fluid(&mut cache)?;
        let p = Self::pressure_of(&cache);
        let v = cache.mean_w / cache.rho;
        let departure =
            -GAS_CONSTANT * t + cache.K1 * (cache.Am - t * cache.dAmdT) + p * v;
        Ok(h0 + self.blend_factor * departure)
    }

    /// Molar entropy, J/(kmol*K). Still the ideal-gas value.
    pub fn entropy_mole(&self) -> Result<f64, ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let p = Self::pressure_of(&cache);
        let sum_xlogx: f64 = cache
            .x
            .iter()
            .map(|&x| if x > 0.0 { x * x.ln() } else { 0.0 })
            .sum();
        Ok(GAS_CONSTANT
            * (Self::mean_x(&cache.x, &cache.s0_r) - sum_xlogx - (p / self.p0).ln()))
    }

    /// Molar heat capacity at constant pressure, J/(kmol*K).
    pub fn cp_mole(&self) -> Result<f64, ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let cp0 = GAS_CONSTANT * Self::mean_x(&cache.x, &cache.cp0_r);
        if self.blend_factor == 0.0 {
            return Ok(cp0);
        }
        self.update_real_fluid(&mut cache)?;
        let t = cache.temp;
        let departure = -GAS_CONSTANT - cache.K1 * t * cache.d2AmdT2
            - t * cache.dPdT.powi(2) / cache.dPdV;
        Ok(cp0 + self.blend_factor * departure)
    }

    /// Molar heat capacity at constant volume, J/(kmol*K).
    pub fn cv_mole(&self) -> Result<f64, ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let cv0 = GAS_CONSTANT * Self::mean_x(&cache.x, &cache.cp0_r) - GAS_CONSTANT;
        if self.blend_factor == 0.0 {
            return Ok(cv0);
        }
        self.update_real_fluid(&mut cache)?;
        let departure = -cache.temp * cache.d2AmdT2 * cache.K1;
        Ok(cv0 + self.blend_factor * departure)
    }

    /// Molar internal energy, J/kmol.
    pub fn int_energy_mole(&self) -> Result<f64, ChemEngineError> {
        let h = self.enthalpy_mole()?;
        Ok(h - self.pressure() * self.molar_volume())
    }

    /// Mass-based cv, J/(kg*K).
    pub fn cv_mass(&self) -> Result<f64, ChemEngineError> {
        Ok(self.cv_mole()? / self.mean_molecular_weight())
    }

    ////////////////////// PARTIAL MOLAR PROPERTIES //////////////////////

    /// Partial molar enthalpies, J/kmol.
    pub fn partial_molar_enthalpies(&self, hbar: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let t = cache.temp;
        let rt = GAS_CONSTANT * t;
        if self.blend_factor == 0.0 {
            for k in 0..self.n_species() {
                hbar[k] = rt * cache.h0_rt[k];
            }
            return Ok(());
        }
        self.update_real_fluid(&mut cache)?;
        let p = Self::pressure_of(&cache);
        let tmp = cache.Am - t * cache.dAmdT;
        for k in 0..self.n_species() {
            let hbar0 = rt * cache.h0_rt[k];
            hbar[k] = hbar0
                + self.blend_factor
                    * (-rt
                        + cache.dK1dN[k] * tmp
                        + cache.K1 * (cache.dAmdN[k] - t * cache.d2AmdTdN[k])
                        + p * cache.dVdN[k]);
        }
        Ok(())
    }

    /// Partial molar entropies, J/(kmol*K) (ideal-gas form).
    pub fn partial_molar_entropies(&self, sbar: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let logp = (Self::pressure_of(&cache) / self.p0).ln();
        for k in 0..self.n_species() {
            let xx = cache.x[k].max(SMALL_NUMBER);
            sbar[k] = GAS_CONSTANT * (cache.s0_r[k] - logp - xx.ln());
        }
        Ok(())
    }

    /// Partial molar internal energies, J/kmol.
    pub fn partial_molar_int_energies(&self, ubar: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let rt = GAS_CONSTANT * cache.temp;
        for k in 0..self.n_species() {
            ubar[k] = rt * (cache.h0_rt[k] - 1.0);
        }
        Ok(())
    }

    /// Partial molar heat capacities, J/(kmol*K).
    pub fn partial_molar_cp(&self, cpbar: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        for k in 0..self.n_species() {
            cpbar[k] = GAS_CONSTANT * cache.cp0_r[k];
        }
        Ok(())
    }

    /// Partial molar volumes, m3/kmol.
    pub fn partial_molar_volumes(&self, vbar: &mut [f64]) -> Result<(), ChemEngineError> {
        let cache = self.cell.borrow();
        let vol = cache.mean_w / cache.rho;
        for v in vbar.iter_mut().take(self.n_species()) {
            *v = vol;
        }
        Ok(())
    }

    ////////////////////// CHEMICAL POTENTIALS //////////////////////

    /// Standard-state chemical potentials mu0_k = RT*(g0/RT + ln(p/p0)).
    pub fn standard_chem_potentials(&self, mu0: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let rt = GAS_CONSTANT * cache.temp;
        let tmp = (Self::pressure_of(&cache) / self.p0).ln() * rt;
        for k in 0..self.n_species() {
            mu0[k] = cache.g0_rt[k] * rt + tmp;
        }
        Ok(())
    }

    /// Actual chemical potentials mu_k = mu0_k + RT*ln(X_k).
    pub fn chem_potentials(&self, mu: &mut [f64]) -> Result<(), ChemEngineError> {
        self.standard_chem_potentials(mu)?;
        let cache = self.cell.borrow();
        let rt = GAS_CONSTANT * cache.temp;
        for k in 0..self.n_species() {
            let xx = cache.x[k].max(SMALL_NUMBER);
            mu[k] += rt * xx.ln();
        }
        Ok(())
    }

    ////////////////////// STANDARD-STATE SPECIES PROPERTIES //////////////////////

    pub fn get_enthalpy_rt(&self, hrt: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        hrt[..self.n_species()].copy_from_slice(&cache.h0_rt);
        Ok(())
    }

    pub fn get_entropy_r(&self, sr: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let tmp = (Self::pressure_of(&cache) / self.p0).ln();
        for k in 0..self.n_species() {
            sr[k] = cache.s0_r[k] - tmp;
        }
        Ok(())
    }

    pub fn get_gibbs_rt(&self, grt: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        let tmp = (Self::pressure_of(&cache) / self.p0).ln();
        for k in 0..self.n_species() {
            grt[k] = cache.g0_rt[k] + tmp;
        }
        Ok(())
    }

    pub fn get_pure_gibbs(&self, gpure: &mut [f64]) -> Result<(), ChemEngineError> {
        self.get_gibbs_rt(gpure)?;
        let rt = GAS_CONSTANT * self.temperature();
        for g in gpure.iter_mut().take(self.n_species()) {
            *g *= rt;
        }
        Ok(())
    }

    pub fn get_int_energy_rt(&self, urt: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        for k in 0..self.n_species() {
            urt[k] = cache.h0_rt[k] - 1.0;
        }
        Ok(())
    }

    pub fn get_cp_r(&self, cpr: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        cpr[..self.n_species()].copy_from_slice(&cache.cp0_r);
        Ok(())
    }

    pub fn get_standard_volumes(&self, vol: &mut [f64]) -> Result<(), ChemEngineError> {
        let cache = self.cell.borrow();
        let tmp = cache.mean_w / cache.rho;
        for v in vol.iter_mut().take(self.n_species()) {
            *v = tmp;
        }
        Ok(())
    }

    ////////////////////// REFERENCE-STATE (p0) PROPERTIES //////////////////////

    pub fn get_enthalpy_rt_ref(&self, hrt: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        hrt[..self.n_species()].copy_from_slice(&cache.h0_rt);
        Ok(())
    }

    pub fn get_gibbs_rt_ref(&self, grt: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        grt[..self.n_species()].copy_from_slice(&cache.g0_rt);
        Ok(())
    }

    pub fn get_gibbs_ref(&self, g: &mut [f64]) -> Result<(), ChemEngineError> {
        self.get_gibbs_rt_ref(g)?;
        let rt = GAS_CONSTANT * self.temperature();
        for gk in g.iter_mut().take(self.n_species()) {
            *gk *= rt;
        }
        Ok(())
    }

    pub fn get_entropy_r_ref(&self, er: &mut [f64]) -> Result<(), ChemEngineError> {
        let mut cache = self.cell.borrow_mut();
        self.update_ideal(&mut cache)?;
        er[..self.n_species()].copy_from_slice(&cache.s0_r);
        Ok(())
    }

    pub fn get_int_energy_rt_ref(&self, urt: &mut [f64]) -> Result<(), ChemEngineError> {
        self.get_int_energy_rt(urt)
    }

    pub fn get_cp_r_ref(&self, cpr: &mut [f64]) -> Result<(), ChemEngineError> {
        self.get_cp_r(cpr)
    }

    pub fn get_standard_volumes_ref(&self, vol: &mut [f64]) -> Result<(), ChemEngineError> {
        let tmp = GAS_CONSTANT * self.temperature() / self.p0;
        for v in vol.iter_mut().take(self.n_species()) {
            *v = tmp;
        }
        Ok(())
    }

    ////////////////////// EQUILIBRIUM-STATE SETTER //////////////////////

    /// Set the state to correspond to the given dimensionless chemical
    /// potentials mu/RT. Exponents below -600 zero the partial pressure;
    /// above +300 the blow-up is capped through a squared argument.
    pub fn set_to_equil_state(&self, mu_rt: &[f64]) -> Result<(), ChemEngineError> {
        let n = self.n_species();
        let mut pres = 0.0;
        {
            let mut cache = self.cell.borrow_mut();
            self.update_ideal(&mut cache)?;
            for k in 0..n {
                let tmp = -cache.g0_rt[k] + mu_rt[k];
                cache.pp[k] = if tmp < -600.0 {
                    0.0
                } else if tmp > 300.0 {
                    let tmp2 = tmp / 300.0;
                    self.p0 * f64::exp(300.0) * tmp2 * tmp2
                } else {
                    self.p0 * tmp.exp()
                };
                pres += cache.pp[k];
            }
        }
        let pp = self.cell.borrow().pp.clone();
        self.set_state_PX(pres, &pp)
    }

    ////////////////////// CRITICAL-PROPERTY QUERIES //////////////////////

    pub fn crit_temperature(&self) -> f64 {
        let cache = self.cell.borrow();
        Self::mean_x(&cache.x, &self.crit.tc)
    }

    pub fn crit_pressure(&self) -> f64 {
        let cache = self.cell.borrow();
        Self::mean_x(&cache.x, &self.crit.pc)
    }

    pub fn crit_volume(&self) -> f64 {
        let cache = self.cell.borrow();
        Self::mean_x(&cache.x, &self.crit.vc)
    }

    pub fn crit_compressibility(&self) -> f64 {
        let cache = self.cell.borrow();
        Self::mean_x(&cache.x, &self.crit.zc)
    }

    pub fn acentric_factors(&self, om: &mut [f64]) {
        om[..self.n_species()].copy_from_slice(&self.crit.omega);
    }

    pub fn dipole_moments(&self, di: &mut [f64]) {
        di[..self.n_species()].copy_from_slice(&self.crit.dipole);
    }

    ////////////////////// DEPRECATED STATMECH QUERIES //////////////////////

    /// Translational heat capacity, J/(kmol*K).
    pub fn cv_trans(&self) -> f64 {
        1.5 * GAS_CONSTANT
    }

    /// Translational-rotational heat capacity. Only defined for a
    /// statistical-mechanics species parameterization; NASA-7 tables do not
    /// carry it.
    pub fn cv_tr(&self, _atomicity: f64) -> Result<f64, ChemEngineError> {
        Err(ChemEngineError::Unsupported(
            "cv_tr requires a statistical-mechanics parameterization".to_string(),
        ))
    }

    pub fn cv_rot(&self, _atomicity: f64) -> Result<f64, ChemEngineError> {
        Err(ChemEngineError::Unsupported(
            "cv_rot requires a statistical-mechanics parameterization".to_string(),
        ))
    }

    pub fn cv_vib(&self, _k: usize, _t: f64) -> Result<f64, ChemEngineError> {
        Err(ChemEngineError::Unsupported(
            "cv_vib requires a statistical-mechanics parameterization".to_string(),
        ))
    }

    ////////////////////// INTERNAL: CACHES //////////////////////

    fn mean_x(x: &[f64], v: &[f64]) -> f64 {
        x.iter().zip(v).map(|(&xi, &vi)| xi * vi).sum()
    }

    fn pressure_of(cache: &PhaseCache) -> f64 {
        GAS_CONSTANT * cache.rho_ideal / cache.mean_w * cache.temp
    }

    fn update_ideal(&self, cache: &mut PhaseCache) -> Result<(), ChemEngineError> {
        let tnow = cache.temp;
        if cache.t_therm != tnow {
            let PhaseCache {
                cp0_r, h0_rt, s0_r, ..
            } = &mut *cache;
            self.thermo_table.update(tnow, cp0_r, h0_rt, s0_r)?;
            for k in 0..self.n_species() {
                cache.g0_rt[k] = cache.h0_rt[k] - cache.s0_r[k];
            }
            cache.t_therm = tnow;
        }
        Ok(())
    }

    fn update_real_fluid(&self, cache: &mut PhaseCache) -> Result<(), ChemEngineError> {
        let tnow = cache.temp;
        let rhonow = cache.rho;
        if cache.y_real != cache.y {
            self.set_real_fluid_constants(cache);
            self.set_real_fluid_thermo(cache)?;
            cache.y_real = cache.y.clone();
            cache.t_real = tnow;
            cache.rho_real = rhonow;
        } else if cache.t_real != tnow || cache.rho_real != rhonow {
            self.set_real_fluid_thermo(cache)?;
            cache.t_real = tnow;
            cache.rho_real = rhonow;
        }
        Ok(())
    }

    /// Composition-dependent constants. The pairwise arrays are fixed at
    /// construction; only the mixture covolume depends on X.
    fn set_real_fluid_constants(&self, cache: &mut PhaseCache) {
        let n = self.n_species();
        let mut bm = 0.0;
        for k in 0..n {
            bm += cache.x[k] * self.crit.cst_b[k];
        }
        cache.Bm = bm;
    }

    /// Temperature- and volume-dependent mixture quantities and their
    /// composition partials.
    #[allow(non_snake_case)]
    fn set_real_fluid_thermo(&self, cache: &mut PhaseCache) -> Result<(), ChemEngineError> {
        let n = self.n_species();
        let t = cache.temp;
        let v = cache.mean_w / cache.rho;
        let Bm = cache.Bm;
        let temp2 = v * v + 2.0 * Bm * v - Bm * Bm;

        let mut Am = 0.0;
        let mut dAmdT = 0.0;
        let mut d2AmdT2 = 0.0;
        for k in 0..n {
            cache.dAmdN[k] = 0.0;
            cache.d2AmdTdN[k] = 0.0;
            for l in 0..n {
                let apos = self.crit.pair(k, l);
                let xx = cache.x[l] * cache.x[k];
                let sqrt_tr = (t / self.crit.tc_ij[apos]).sqrt();
                let c = self.crit.cst_c[apos];
                let a_ij = self.crit.cst_a[apos] * (1.0 + c * (1.0 - sqrt_tr)).powi(2);
                let g = c * sqrt_tr / (1.0 + c * (1.0 - sqrt_tr));
                let d = c * (1.0 + c) * self.crit.tc_ij[apos] / self.crit.pc_ij[apos]
                    * (self.crit.tc_ij[apos] / t).sqrt();

                Am += xx * a_ij;
                dAmdT -= xx * a_ij * g;
                d2AmdT2 += xx * d;

                cache.dAmdN[k] += cache.x[l] * a_ij;
                cache.d2AmdTdN[k] += cache.x[l] * a_ij * g;
            }
            cache.dAmdN[k] *= 2.0;
            cache.d2AmdTdN[k] *= -2.0 / t;
        }
        dAmdT /= t;
        d2AmdT2 *= 0.457236 * GAS_CONSTANT.powi(2) / (2.0 * t);

        for k in 0..n {
            let b_k = self.crit.cst_b[k];
            cache.dPdN[k] = GAS_CONSTANT * t / (v - Bm)
                + GAS_CONSTANT * t * b_k / (v - Bm).powi(2)
                - cache.dAmdN[k] / temp2
                + 2.0 * Am * b_k * (v - Bm) / temp2.powi(2);
        }

        let dPdT = GAS_CONSTANT / (v - Bm) - dAmdT / (v * v + 2.0 * v * Bm - Bm * Bm);
        let arg = GAS_CONSTANT
            * t
            * (v + Bm)
            * (v / (v - Bm) + Bm / (v + Bm)).powi(2);
        let dPdV = -GAS_CONSTANT * t / (v - Bm).powi(2) * (1.0 - 2.0 * Am / arg);
        let K1 = 1.0 / (8.0_f64.sqrt() * Bm)
            * ((v + (1.0 - 2.0_f64.sqrt()) * Bm) / (v + (1.0 + 2.0_f64.sqrt()) * Bm)).ln();

        cache.Am = Am;
        cache.dAmdT = dAmdT;
        cache.d2AmdT2 = d2AmdT2;
        cache.dPdT = dPdT;
        cache.dPdV = dPdV;
        cache.K1 = K1;

        for k in 0..n {
            cache.dVdN[k] = -cache.dPdN[k] / dPdV;
            cache.dK1dN[k] =
                1.0 / temp2 * cache.dVdN[k] - self.crit.cst_b[k] / Bm * (K1 + v / temp2);
        }

        for (what, value) in [("Am", Am), ("K1", K1), ("dPdV", dPdV)] {
            if !value.is_finite() {
                return Err(ChemEngineError::NonFinite {
                    context: "real-fluid EOS update",
                    what,
                    index: 0,
                });
            }
        }
        Ok(())
    }

    ////////////////////// INTERNAL: CUBIC EOS SOLVE //////////////////////

    /// Molar volume from (p, T) by solving the PR cubic for Z.
    fn volume_from_pt(
        &self,
        cache: &mut PhaseCache,
        p_in: f64,
        t_in: f64,
    ) -> Result<f64, ChemEngineError> {
        let rt = GAS_CONSTANT * t_in;
        let amat = cache.Am * p_in / (rt * rt);
        let bmat = cache.Bm * p_in / rt;

        let coef_v0 = bmat.powi(3) + bmat.powi(2) - amat * bmat;
        let coef_v1 = -3.0 * bmat.powi(2) - 2.0 * bmat + amat;
        let coef_v2 = bmat - 1.0;
        let (z, branch) = cubic_root(coef_v0, coef_v1, coef_v2);
        cache.last_cubic = branch;
        if !z.is_finite() {
            return Err(ChemEngineError::NonFinite {
                context: "cubic EOS solve",
                what: "Z",
                index: 0,
            });
        }
        Ok(rt * z / p_in)
    }
}

/// Root of z^3 + a2*z^2 + a1*z + a0 with the three-branch selection rule:
/// unique real root via Cardano when the discriminant is positive, warned
/// double root when it is within eps of zero, otherwise the trigonometric
/// three-root form picking the smallest non-negative root (largest root if
/// all are negative).
pub(crate) fn cubic_root(a0: f64, a1: f64, a2: f64) -> (f64, CubicBranch) {
    const EPS: f64 = 1.0e-12;

    let p = (3.0 * a1 - a2 * a2) / 3.0;
    let q = a0 + 2.0 * a2.powi(3) / 27.0 - a2 * a1 / 3.0;
    let det = (p / 3.0).powi(3) + (q / 2.0).powi(2);

    if det > 0.0 {
        let u = (-q / 2.0 + det.sqrt()).cbrt();
        let v = (-q / 2.0 - det.sqrt()).cbrt();
        (-a2 / 3.0 + u + v, CubicBranch::SingleReal)
    } else if det.abs() <= EPS {
        warn!("cubic EOS solve: degenerate double root");
        let u = (-q / 2.0).cbrt();
        (-a2 / 3.0 + 2.0 * u, CubicBranch::DoubleRoot)
    } else {
        let arg = (-q / (2.0 * (p.abs() / 3.0).powi(3).sqrt())).clamp(-1.0, 1.0);
        let phi = arg.acos();
        let m = 2.0 * (p.abs() / 3.0).sqrt();
        let z1 = -a2 / 3.0 + m * (phi / 3.0).cos();
        let z2 = -a2 / 3.0 - m * ((phi - std::f64::consts::PI) / 3.0).cos();
        let z3 = -a2 / 3.0 - m * ((phi + std::f64::consts::PI) / 3.0).cos();
        let mut roots = [z1, z2, z3];
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        // smallest non-negative root; largest root when all are negative
        let z = roots
            .iter()
            .copied()
            .find(|&c| c >= 0.0)
            .unwrap_or(roots[2]);
        (z, CubicBranch::ThreeReal)
    }
}
