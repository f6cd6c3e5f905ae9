//! Finite-system DMRG for the open spin-1/2 XXZ chain.
//!
//! Progress is reported through `log`; run with `RUST_LOG=debug` to see every
//! step.

use sz_dmrg::{
    DMRGResult,
    eigen::Lanczos,
    model::{ Coupling, Model, SiteModel },
    sector::Sector,
    step::Dmrg,
    sweep::{ FiniteConfig, SweepSpec },
};

fn main() -> DMRGResult<()> {
    const L: usize = 20; // chain length
    const J: f64 = 1.0; // XY exchange
    const JZ: f64 = 1.0; // ZZ exchange
    const M_WARMUP: usize = 20; // states kept during warmup
    const M_SWEEPS: &[usize] = &[30]; // states kept in each sweep
    const TARGET_SZ: f64 = 0.0; // total Sz

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let model = Model::new(SiteModel::spin_half(), Coupling::new(J, JZ));
    let dmrg = Dmrg::new(model, Lanczos::default());
    let config = FiniteConfig::new(
        L,
        M_WARMUP,
        M_SWEEPS.iter().copied().map(SweepSpec::new),
        Sector::from_sz(TARGET_SZ)?,
    );
    let output = dmrg.finite_system(&config)?;

    println!("L = {L}, Sz = {}", config.target);
    for (k, (spec, e)) in config.schedule.iter().zip(&output.sweep_energies).enumerate() {
        println!("sweep {k:>3} (m = {:>4}): E = {e:.12}", spec.m);
    }
    println!("E   = {:.12}", output.energy);
    println!("E/L = {:.12}", output.energy / L as f64);
    Ok(())
}
