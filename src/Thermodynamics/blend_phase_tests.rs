/////////////////////////////////////////////////////////////////////////////
// TESTS: blended EOS phase
/////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Thermodynamics::blend_phase::{cubic_root, BlendPhase, CubicBranch};
    use crate::Thermodynamics::nasa_poly::{NasaPoly7, SpeciesRecord};
    use crate::GAS_CONSTANT;
    use approx::assert_relative_eq;

    /// Constant-cp synthetic NASA-7 set: cp0/R = a1, h0/RT = a1 + a6/T,
    /// s0/R = a1*ln(T) + a7. Hand verification stays trivial.
    fn const_cp_poly(cp_r: f64, a6: f64, a7: f64) -> NasaPoly7 {
        NasaPoly7::single_range(20.0, 5000.0, [cp_r, 0.0, 0.0, 0.0, 0.0, a6, a7])
    }

    fn h2_o2_n2() -> Vec<SpeciesRecord> {
        vec![
            SpeciesRecord::new("H2", 2.016, const_cp_poly(3.5, -950.0, -3.2)),
            SpeciesRecord::new("O2", 31.998, const_cp_poly(3.7, -1200.0, 3.7)),
            SpeciesRecord::new("N2", 28.014, const_cp_poly(3.6, -1050.0, 2.8)),
        ]
    }

    #[test]
    fn ideal_pressure_from_state() {
        // p follows the defining relation p = R*T*rho/W_mean
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        let y = [0.2, 0.1, 0.7];
        phase.set_state_trY(1000.0, 1.0, &y).unwrap();
        let inv_w: f64 = y[0] / 2.016 + y[1] / 31.998 + y[2] / 28.014;
        let p_expected = GAS_CONSTANT * 1000.0 * 1.0 * inv_w;
        assert_relative_eq!(phase.pressure(), p_expected, max_relative = 1e-12);
        assert_relative_eq!(phase.mean_molecular_weight(), 1.0 / inv_w, max_relative = 1e-12);
    }

    #[test]
    fn pressure_round_trip_ideal() {
        // setPressure followed by pressure() returns p; the ideal
        // density snapshot satisfies p = R*T*rho_I/W exactly
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        phase.set_mass_fractions(&[0.2, 0.1, 0.7]).unwrap();
        phase.set_temperature(1000.0).unwrap();
        for p in [1.0e4, 2.828e5, 5.0e6] {
            phase.set_pressure(p).unwrap();
            assert_relative_eq!(phase.pressure(), p, max_relative = 1e-10);
            let rho_i = phase.density();
            assert_relative_eq!(
                p,
                GAS_CONSTANT * 1000.0 * rho_i / phase.mean_molecular_weight(),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn ideal_limit_properties() {
        // beta = 0 reproduces the ideal-gas reference values
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        phase.set_state_trY(800.0, 0.5, &[0.2, 0.1, 0.7]).unwrap();
        let x = phase.mole_fractions();
        let t = 800.0;
        let cp_r = [3.5, 3.7, 3.6];
        let a6 = [-950.0, -1200.0, -1050.0];
        let h_expected: f64 = GAS_CONSTANT
            * t
            * x.iter()
                .enumerate()
                .map(|(k, &xk)| xk * (cp_r[k] + a6[k] / t))
                .sum::<f64>();
        let cp_expected: f64 =
            GAS_CONSTANT * x.iter().enumerate().map(|(k, &xk)| xk * cp_r[k]).sum::<f64>();
        assert_relative_eq!(phase.enthalpy_mole().unwrap(), h_expected, max_relative = 1e-13);
        assert_relative_eq!(phase.cp_mole().unwrap(), cp_expected, max_relative = 1e-13);
        assert_relative_eq!(
            phase.cv_mole().unwrap(),
            cp_expected - GAS_CONSTANT,
            max_relative = 1e-13
        );
    }

    #[test]
    fn enthalpy_affine_in_blend_factor() {
        // molar enthalpy is affine in beta
        let mut h = [0.0; 3];
        for (i, beta) in [0.0, 0.5, 1.0].into_iter().enumerate() {
            let phase = BlendPhase::new(h2_o2_n2(), 101325.0, beta).unwrap();
            phase.set_state_trY(300.0, 10.0, &[0.1, 0.5, 0.4]).unwrap();
            h[i] = phase.enthalpy_mole().unwrap();
        }
        assert_relative_eq!(h[1], 0.5 * (h[0] + h[2]), max_relative = 1e-12);
        // the departure itself must be visible
        assert!((h[2] - h[0]).abs() > 0.0);
    }

    #[test]
    fn cryogenic_h2_departs_from_ideal() {
        // pure H2 at 60 K and 5 MPa, full PR: the cubic picks the
        // smallest non-negative Z and the density departs > 10% from ideal
        let species = vec![SpeciesRecord::new(
            "H2",
            2.016,
            const_cp_poly(3.5, -950.0, -3.2),
        )];
        let phase = BlendPhase::new(species, 101325.0, 1.0).unwrap();
        phase.set_mass_fractions(&[1.0]).unwrap();
        phase.set_temperature(60.0).unwrap();
        phase.set_density(20.0).unwrap();
        phase.set_pressure(5.0e6).unwrap();
        let rho_ideal = 5.0e6 * 2.016 / (GAS_CONSTANT * 60.0);
        let rho = phase.density();
        assert!(
            (rho - rho_ideal).abs() / rho_ideal > 0.10,
            "PR density {rho} too close to ideal {rho_ideal}"
        );
        // liquid-like branch would be denser still; Z stays physical
        let z = 5.0e6 * 2.016 / (rho * GAS_CONSTANT * 60.0);
        assert!(z > 0.3 && z < 1.0, "Z = {z}");
        assert_ne!(phase.last_cubic_branch(), CubicBranch::NotSolved);
        assert!(phase.cubic_solve_status().is_ok());
    }

    #[test]
    fn entropy_and_chem_potentials() {
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        phase.set_state_trY(500.0, 0.3, &[0.3, 0.3, 0.4]).unwrap();
        let x = phase.mole_fractions();
        let p = phase.pressure();
        let t: f64 = 500.0;
        let s_r: Vec<f64> = [(3.5, -3.2), (3.7, 3.7), (3.6, 2.8)]
            .iter()
            .map(|&(cp, a7)| cp * t.ln() + a7)
            .collect();
        let sum_xlogx: f64 = x.iter().map(|&xi| xi * xi.ln()).sum();
        let s_expected = GAS_CONSTANT
            * (x.iter().zip(&s_r).map(|(&xi, &si)| xi * si).sum::<f64>()
                - sum_xlogx
                - (p / 101325.0).ln());
        assert_relative_eq!(phase.entropy_mole().unwrap(), s_expected, max_relative = 1e-12);

        // mu = mu0 + RT ln X
        let n = 3;
        let mut mu = vec![0.0; n];
        let mut mu0 = vec![0.0; n];
        phase.chem_potentials(&mut mu).unwrap();
        phase.standard_chem_potentials(&mut mu0).unwrap();
        for k in 0..n {
            assert_relative_eq!(
                mu[k] - mu0[k],
                GAS_CONSTANT * t * x[k].ln(),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn partial_molar_enthalpy_closes_ideal_mixture() {
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        phase.set_state_trY(700.0, 0.8, &[0.1, 0.6, 0.3]).unwrap();
        let mut hbar = vec![0.0; 3];
        phase.partial_molar_enthalpies(&mut hbar).unwrap();
        let x = phase.mole_fractions();
        let h_mix: f64 = x.iter().zip(&hbar).map(|(&xi, &hi)| xi * hi).sum();
        assert_relative_eq!(h_mix, phase.enthalpy_mole().unwrap(), max_relative = 1e-12);
    }

    #[test]
    fn equil_state_setter_uniform() {
        // mu/RT equal to the current g0/RT puts every partial pressure at p0
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        phase.set_state_trY(600.0, 0.5, &[0.2, 0.4, 0.4]).unwrap();
        let mut grt = vec![0.0; 3];
        phase.get_gibbs_rt_ref(&mut grt).unwrap();
        phase.set_to_equil_state(&grt).unwrap();
        let x = phase.mole_fractions();
        for &xk in &x {
            assert_relative_eq!(xk, 1.0 / 3.0, max_relative = 1e-12);
        }
        assert_relative_eq!(phase.pressure(), 3.0 * 101325.0, max_relative = 1e-10);
    }

    #[test]
    fn statmech_queries_unsupported() {
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        assert_relative_eq!(phase.cv_trans(), 1.5 * GAS_CONSTANT);
        assert!(phase.cv_tr(3.0).is_err());
        assert!(phase.cv_rot(3.0).is_err());
        assert!(phase.cv_vib(0, 300.0).is_err());
    }

    ///////////////////////// cubic solver branches /////////////////////////

    #[test]
    fn cubic_single_real_root() {
        // (z - 2)(z^2 + z + 1) = z^3 - z^2 - z - 2
        let (z, branch) = cubic_root(-2.0, -1.0, -1.0);
        assert_eq!(branch, CubicBranch::SingleReal);
        assert_relative_eq!(z, 2.0, max_relative = 1e-12);
    }

    #[test]
    fn cubic_three_real_picks_smallest_non_negative() {
        // (z - 1)(z - 2)(z - 3) = z^3 - 6z^2 + 11z - 6
        let (z, branch) = cubic_root(-6.0, 11.0, -6.0);
        assert_eq!(branch, CubicBranch::ThreeReal);
        assert_relative_eq!(z, 1.0, max_relative = 1e-10);
    }

    #[test]
    fn cubic_all_negative_picks_largest() {
        // (z + 1)(z + 2)(z + 3) = z^3 + 6z^2 + 11z + 6
        let (z, branch) = cubic_root(6.0, 11.0, 6.0);
        assert_eq!(branch, CubicBranch::ThreeReal);
        assert_relative_eq!(z, -1.0, max_relative = 1e-10);
    }

    #[test]
    fn cubic_degenerate_triple_root() {
        // (z - 1)^3 = z^3 - 3z^2 + 3z - 1, discriminant exactly zero
        let (z, branch) = cubic_root(-1.0, 3.0, -3.0);
        assert_eq!(branch, CubicBranch::DoubleRoot);
        assert_relative_eq!(z, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn invalid_state_inputs_rejected() {
        let phase = BlendPhase::new(h2_o2_n2(), 101325.0, 0.0).unwrap();
        assert!(phase.set_temperature(-5.0).is_err());
        assert!(phase.set_density(0.0).is_err());
        assert!(phase.set_mass_fractions(&[0.5, -0.1, 0.6]).is_err());
        assert!(phase.set_mass_fractions(&[0.0, 0.0, 0.0]).is_err());
        assert!(phase.set_pressure(f64::NAN).is_err());
    }
}
