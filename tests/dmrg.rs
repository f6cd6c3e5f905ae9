//! End-to-end checks of warmup and sweeps against exact results.

use approx::assert_abs_diff_eq;
use sz_dmrg::{
    DMRGError,
    eigen::{ Eigensolver, FullDiag, Lanczos },
    model::{ Coupling, Model, SiteModel },
    sector::Sector,
    sparse::SpMat,
    step::Dmrg,
    store::Side,
    sweep::{ FiniteConfig, Phase, SweepSpec },
};

/// Lowest energy of the open chain by diagonalizing the full Hamiltonian.
fn exact_ground_energy(model: &Model, n: usize) -> f64 {
    let site = &model.site;
    let d = site.dim();
    let bond
        = model.coupling.two_site(site.sz(), site.sp(), site.sz(), site.sp())
        .unwrap();
    let dim = d.pow(n as u32);
    let mut h: SpMat<f64> = SpMat::zeros(dim, dim);
    for i in 0..n - 1 {
        let term
            = SpMat::eye(d.pow(i as u32))
            .kron(&bond)
            .kron(&SpMat::eye(d.pow((n - i - 2) as u32)));
        h = h.add(&term).unwrap();
    }
    for i in 0..n {
        let term
            = SpMat::eye(d.pow(i as u32))
            .kron(site.h1())
            .kron(&SpMat::eye(d.pow((n - i - 1) as u32)));
        h = h.add(&term).unwrap();
    }
    FullDiag.lowest(&h, None).unwrap().value
}

fn heisenberg() -> Dmrg<Lanczos> {
    Dmrg::new(Model::heisenberg(), Lanczos::default())
}

#[test]
fn small_chain_is_exact() {
    let dmrg = heisenberg();
    let exact = exact_ground_energy(&dmrg.model, 8);
    assert_abs_diff_eq!(exact, -3.3749325986878906, epsilon = 1e-10);
    let config = FiniteConfig::new(8, 16, [32], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    assert_abs_diff_eq!(output.energy, exact, epsilon = 1e-9);
    for rec in output.history.iter() {
        assert!(rec.truncation_error < 1e-12);
    }
}

#[test]
fn heisenberg_twenty_sites() {
    // open spin-1/2 chain, L = 20
    const EXACT: f64 = -8.682473334398967;
    // energy per site recorded for this configuration
    const BASELINE_PER_SITE: f64 = -0.434123665588838;
    let dmrg = heisenberg();
    let config = FiniteConfig::new(20, 20, [30], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    assert_abs_diff_eq!(output.energy / 20.0, BASELINE_PER_SITE, epsilon = 1e-8);
    assert_abs_diff_eq!(output.energy, EXACT, epsilon = 1e-6);
    // truncation only ever raises the energy
    assert!(output.energy > EXACT - 1e-9);
    assert_eq!(output.sweep_energies.len(), 1);
    let warmup_final
        = output.history.iter()
        .filter(|rec| rec.phase == Phase::Warmup)
        .last()
        .unwrap();
    assert_eq!(warmup_final.chain_length, 20);
    assert!(output.energy <= warmup_final.energy + 1e-9);
}

#[test]
fn xx_chain_free_fermions() {
    // Jz = 0 maps to free fermions with hopping J/2: ε_k = cos(πk/(L + 1))
    let n = 10;
    let exact: f64
        = (1..=n)
        .map(|k| (std::f64::consts::PI * k as f64 / (n as f64 + 1.0)).cos())
        .filter(|e| *e < 0.0)
        .sum();
    let dmrg = Dmrg::new(Model::xxz(0.0), Lanczos::default());
    let config = FiniteConfig::new(n, 32, [64], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    assert_abs_diff_eq!(output.energy, exact, epsilon = 1e-8);
}

#[test]
fn spin_one_chain() {
    let site = SiteModel::spin(2, 0.0).unwrap();
    let model = Model::new(site, Coupling::default());
    let exact = exact_ground_energy(&model, 6);
    let dmrg = Dmrg::new(model, Lanczos::default());
    let config = FiniteConfig::new(6, 100, [100], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    assert_abs_diff_eq!(output.energy, exact, epsilon = 1e-9);
}

#[test]
fn warmup_approaches_thermodynamic_limit() {
    // 1/4 - ln 2
    let e_inf = 0.25 - std::f64::consts::LN_2;
    let dmrg = heisenberg();
    let ms = [4, 8, 16];
    let per_site: Vec<Vec<f64>>
        = ms.iter()
        .map(|m| {
            let history = dmrg.infinite_system(60, *m, Sector::ZERO).unwrap();
            assert_eq!(history.len(), 29);
            [20, 40, 60].into_iter()
                .map(|len| {
                    history.iter()
                        .find(|rec| rec.chain_length == len)
                        .unwrap()
                        .energy_per_site()
                })
                .collect()
        })
        .collect();
    for (m, row) in ms.iter().zip(per_site.iter()) {
        // boundaries keep an open chain above the bulk value, and their share
        // shrinks as the chain grows
        assert!(row.iter().all(|e| *e > e_inf), "m = {m}: {row:?}");
        assert!(row.windows(2).all(|w| w[1] < w[0]), "m = {m}: {row:?}");
    }
    for k in 0..3 {
        let by_m: Vec<f64> = per_site.iter().map(|row| row[k]).collect();
        assert!(by_m.windows(2).all(|w| w[1] <= w[0]), "{by_m:?}");
    }
    let e_fine = per_site[2][2];
    assert!(e_fine - e_inf < 0.005);
}

#[test]
fn predictions_are_good_guesses() {
    let dmrg = heisenberg();
    let config
        = FiniteConfig::new(12, 10, [SweepSpec::new(20).with_passes(2)], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    assert_eq!(output.sweep_energies.len(), 2);
    assert!(output.sweep_energies[1] <= output.sweep_energies[0] + 1e-7);
    let second: Vec<_>
        = output.history.iter()
        .filter(|rec| rec.phase == Phase::Sweep(1))
        .collect();
    // 2 (L - 4) steps per sweep
    assert_eq!(second.len(), 16);
    for rec in second.into_iter() {
        let overlap = rec.overlap.unwrap();
        assert!(overlap > 0.9, "overlap {overlap} at {:?}", rec);
    }
}

#[test]
fn stored_data_is_consistent() {
    let dmrg = heisenberg();
    let config = FiniteConfig::new(10, 8, [12], Sector::ZERO);
    let output = dmrg.finite_system(&config).unwrap();
    for side in [Side::Left, Side::Right] {
        for len in 1..=8 {
            let block = output.blocks.require(side, len).unwrap();
            assert!(block.is_valid());
            assert_eq!(block.length, len);
        }
        for len in 2..=8 {
            let trans = output.transforms.require(side, len).unwrap();
            // columns are orthonormal
            let gram = trans.adjoint().matmul(trans).unwrap().to_dense();
            for ((i, j), g) in gram.indexed_iter() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(*g, expected, epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn nonzero_target() {
    let dmrg = heisenberg();
    let config = FiniteConfig::new(8, 32, [32], Sector::from_twice(2));
    let output = dmrg.finite_system(&config).unwrap();
    let ground = exact_ground_energy(&dmrg.model, 8);
    // the triplet lies above the singlet
    assert!(output.energy > ground + 1e-3);
    assert!(output.history.iter()
        .filter(|rec| matches!(rec.phase, Phase::Sweep(_)))
        .all(|rec| rec.target == Sector::from_twice(2)));
}

#[test]
fn bad_configurations() {
    let dmrg = heisenberg();
    let unreachable = FiniteConfig::new(8, 8, [8], Sector::from_twice(1));
    assert!(matches!(
        dmrg.finite_system(&unreachable),
        Err(DMRGError::InvalidSector(_)),
    ));
    let odd = FiniteConfig::new(11, 8, [8], Sector::ZERO);
    assert!(matches!(
        dmrg.finite_system(&odd),
        Err(DMRGError::InvalidChainLength { length: 11, .. }),
    ));
    let block = dmrg.model.initial_block();
    assert!(matches!(
        dmrg.single_step(&block, &block, 4, Sector::from_twice(-6), None),
        Err(DMRGError::IncompatibleSector { .. }),
    ));
}
