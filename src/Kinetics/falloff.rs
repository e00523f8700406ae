//! Falloff blending functions and their per-reaction manager.
//!
//! A falloff (or chemically-activated) reaction blends its low- and
//! high-pressure Arrhenius limits through a function F of the reduced
//! pressure. Each function kind splits its work into a temperature-only
//! part written into a shared work buffer (`update_temp`) and the
//! per-reduced-pressure part (`f`).

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::SMALL_NUMBER;

#[enum_dispatch]
pub trait FalloffFunction {
    /// Number of slots this function needs in the shared work buffer.
    fn work_size(&self) -> usize;
    /// Refresh the temperature-only part into `work`.
    fn update_temp(&self, t: f64, work: &mut [f64]);
    /// Blending factor F at reduced pressure `pr`.
    fn f(&self, pr: f64, work: &[f64]) -> f64;
}

/// Lindemann form: no blending correction, F = 1.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Lindemann;

impl FalloffFunction for Lindemann {
    fn work_size(&self) -> usize {
        0
    }

    fn update_temp(&self, _t: f64, _work: &mut [f64]) {}

    fn f(&self, _pr: f64, _work: &[f64]) -> f64 {
        1.0
    }
}

/// Troe form, 3- or 4-parameter (t2 = 0 disables the last term).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Troe {
    pub a: f64,
    pub t3: f64,
    pub t1: f64,
    #[serde(default)]
    pub t2: f64,
}

impl FalloffFunction for Troe {
    fn work_size(&self) -> usize {
        1
    }

    fn update_temp(&self, t: f64, work: &mut [f64]) {
        let mut fcent = (1.0 - self.a) * (-t / self.t3).exp() + self.a * (-t / self.t1).exp();
        if self.t2 != 0.0 {
            fcent += (-self.t2 / t).exp();
        }
        work[0] = fcent.max(SMALL_NUMBER).log10();
    }

    fn f(&self, pr: f64, work: &[f64]) -> f64 {
        let log_fcent = work[0];
        let lpr = pr.max(SMALL_NUMBER).log10();
        let cc = -0.4 - 0.67 * log_fcent;
        let nn = 0.75 - 1.27 * log_fcent;
        let f1 = (lpr + cc) / (nn - 0.14 * (lpr + cc));
        10.0_f64.powf(log_fcent / (1.0 + f1 * f1))
    }
}

/// SRI form, 3- or 5-parameter (d = 1, e = 0 for the 3-parameter variant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sri {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    #[serde(default = "sri_default_d")]
    pub d: f64,
    #[serde(default)]
    pub e: f64,
}

fn sri_default_d() -> f64 {
    1.0
}

impl FalloffFunction for Sri {
    fn work_size(&self) -> usize {
        2
    }

    fn update_temp(&self, t: f64, work: &mut [f64]) {
        let mut base = self.a * (-self.b / t).exp();
        if self.c != 0.0 {
            base += (-t / self.c).exp();
        }
        work[0] = base;
        work[1] = self.d * t.powf(self.e);
    }

    fn f(&self, pr: f64, work: &[f64]) -> f64 {
        let lpr = pr.max(SMALL_NUMBER).log10();
        let xx = 1.0 / (1.0 + lpr * lpr);
        work[0].powf(xx) * work[1]
    }
}

/// The closed set of falloff blending functions.
#[enum_dispatch(FalloffFunction)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FalloffBlend {
    Lindemann(Lindemann),
    Troe(Troe),
    Sri(Sri),
}

/// Per-reaction falloff functions in falloff-local indexing, sharing one
/// pre-allocated work buffer.
#[derive(Debug, Clone, Default)]
pub struct FalloffMgr {
    funcs: Vec<FalloffBlend>,
    /// work-buffer offset per local reaction
    offsets: Vec<usize>,
    /// chemically-activated reactions divide out the (1 + pr) differently
    chem_activated: Vec<bool>,
    total_work: usize,
}

impl FalloffMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_reactions(&self) -> usize {
        self.funcs.len()
    }

    pub fn work_size(&self) -> usize {
        self.total_work
    }

    pub fn install(&mut self, blend: FalloffBlend, chem_activated: bool) {
        self.offsets.push(self.total_work);
        self.total_work += blend.work_size();
        self.funcs.push(blend);
        self.chem_activated.push(chem_activated);
    }

    pub fn replace(&mut self, local: usize, blend: FalloffBlend) {
        // offsets stay valid only if the work size is unchanged; rebuild
        // otherwise
        if blend.work_size() == self.funcs[local].work_size() {
            self.funcs[local] = blend;
            return;
        }
        self.funcs[local] = blend;
        self.total_work = 0;
        for (i, func) in self.funcs.iter().enumerate() {
            self.offsets[i] = self.total_work;
            self.total_work += func.work_size();
        }
    }

    pub fn update_temp(&self, t: f64, work: &mut [f64]) {
        for (i, func) in self.funcs.iter().enumerate() {
            let offset = self.offsets[i];
            func.update_temp(t, &mut work[offset..offset + func.work_size()]);
        }
    }

    /// In place, map the reduced pressures to effective blending values:
    /// F*pr/(1+pr) for falloff reactions, F/(1+pr) for chemically-activated
    /// ones.
    pub fn pr_to_falloff(&self, values: &mut [f64], work: &[f64]) {
        for (i, func) in self.funcs.iter().enumerate() {
            let offset = self.offsets[i];
            let pr = values[i];
            let f = func.f(pr, &work[offset..offset + func.work_size()]);
            values[i] = if self.chem_activated[i] {
                f / (1.0 + pr)
            } else {
                f * pr / (1.0 + pr)
            };
        }
    }

    /// Subset surviving the falloff-local activation mask, in order.
    pub fn reduced(&self, active_local: &[bool]) -> Self {
        let mut out = Self::new();
        for (i, func) in self.funcs.iter().enumerate() {
            if active_local[i] {
                out.install(*func, self.chem_activated[i]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lindemann_is_unity() {
        let f = Lindemann;
        assert_relative_eq!(f.f(0.3, &[]), 1.0);
    }

    #[test]
    fn troe_matches_hand_formula() {
        let troe = Troe {
            a: 0.7346,
            t3: 94.0,
            t1: 1756.0,
            t2: 5182.0,
        };
        let t = 1200.0;
        let mut work = [0.0];
        troe.update_temp(t, &mut work);
        let fcent = (1.0 - 0.7346) * (-t / 94.0_f64).exp()
            + 0.7346 * (-t / 1756.0_f64).exp()
            + (-5182.0 / t).exp();
        assert_relative_eq!(work[0], fcent.log10(), max_relative = 1e-12);

        let pr: f64 = 2.5;
        let lfc = fcent.log10();
        let cc = -0.4 - 0.67 * lfc;
        let nn = 0.75 - 1.27 * lfc;
        let f1 = (pr.log10() + cc) / (nn - 0.14 * (pr.log10() + cc));
        let expected = 10.0_f64.powf(lfc / (1.0 + f1 * f1));
        assert_relative_eq!(troe.f(pr, &work), expected, max_relative = 1e-12);
        // the blend stays within (0, 1]
        assert!(troe.f(pr, &work) <= 1.0 && troe.f(pr, &work) > 0.0);
    }

    #[test]
    fn mgr_applies_pr_over_one_plus_pr() {
        let mut mgr = FalloffMgr::new();
        mgr.install(FalloffBlend::Lindemann(Lindemann), false);
        mgr.install(FalloffBlend::Lindemann(Lindemann), true);
        let work = vec![0.0; mgr.work_size()];
        let mut values = vec![3.0, 3.0];
        mgr.pr_to_falloff(&mut values, &work);
        assert_relative_eq!(values[0], 3.0 / 4.0, max_relative = 1e-12);
        assert_relative_eq!(values[1], 1.0 / 4.0, max_relative = 1e-12);
    }
}
