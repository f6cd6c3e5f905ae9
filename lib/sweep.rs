//! Infinite-system warmup and finite-system sweeps.
//!
//! The warmup grows a chain of length *L* from two single sites by repeatedly
//! enlarging a block and using its reflection as the environment, storing each
//! new block for both ends of the chain. Finite-system sweeps then start from
//! the configuration where both blocks have length *L*/2 and move the two free
//! sites back and forth across the chain, each time rebuilding the system block
//! from the current ground state and pulling the environment out of storage:
//!
//! ```text
//! ======**----   <- first step of a sweep
//! =======**---
//! ========**--
//! ---------**=   <- the environment would be a single site: swap roles
//! --------**==
//! ...
//! --**========
//! =**---------   <- swap again
//! ==**--------
//! ...
//! =====**-----   <- back in the middle: one full sweep
//! ```
//!
//! Between steps, the previous ground state is transformed into the new
//! superblock basis (see [`predict`][crate::predict]) to give the eigensolver a
//! good starting point.

use log::{ debug, info };
use ndarray as nd;
use crate::{
    DMRGError,
    DMRGResult,
    block::Block,
    eigen::Eigensolver,
    model::Model,
    predict::{ predict_guess, swap_roles },
    sector::Sector,
    sparse::SpMat,
    step::{ Dmrg, StepResult },
    store::{ BlockStore, Side, TransformStore },
};

/// Render the chain for a step, with `=` for system sites, `*` for the two
/// free sites, and `-` for environment sites. The picture is mirrored when the
/// system is on the right.
///
/// ```
/// use sz_dmrg::{ store::Side, sweep::graphic };
///
/// assert_eq!(graphic(3, 2, Side::Left), "===**--");
/// assert_eq!(graphic(3, 2, Side::Right), "--**===");
/// ```
pub fn graphic(sys_length: usize, env_length: usize, sys_side: Side) -> String {
    let g = format!("{}**{}", "=".repeat(sys_length), "-".repeat(env_length));
    match sys_side {
        Side::Left => g,
        Side::Right => g.chars().rev().collect(),
    }
}

/// One entry of a sweep schedule: keep `m` states for `passes` full sweeps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SweepSpec {
    pub m: usize,
    pub passes: usize,
}

impl SweepSpec {
    /// A single sweep keeping `m` states.
    pub fn new(m: usize) -> Self { Self { m, passes: 1 } }

    /// Set the number of sweeps performed at this `m`.
    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }
}

impl From<usize> for SweepSpec {
    fn from(m: usize) -> Self { Self::new(m) }
}

/// Settings for a finite-system calculation.
#[derive(Clone, Debug, PartialEq)]
pub struct FiniteConfig {
    /// Total number of sites; must be even and at least 6.
    pub chain_length: usize,
    /// States kept during the infinite-system warmup.
    pub m_warmup: usize,
    /// Sweep schedule, performed in order.
    pub schedule: Vec<SweepSpec>,
    /// Total *S*<sub>*z*</sub> of the ground state sought.
    pub target: Sector,
}

/// Smallest chain that can be grown by the warmup.
pub const MIN_WARMUP_LENGTH: usize = 4;

/// Smallest chain that can be swept: the environment must be able to shrink
/// to a single site while the system still has room to grow.
pub const MIN_SWEEP_LENGTH: usize = 6;

fn check_length(chain_length: usize, min: usize) -> DMRGResult<()> {
    if chain_length % 2 != 0 || chain_length < min {
        Err(DMRGError::InvalidChainLength { length: chain_length, min })
    } else {
        Ok(())
    }
}

fn check_target(model: &Model, chain_length: usize, target: Sector)
    -> DMRGResult<()>
{
    // 2 Sz ranges over -2SL, -2SL + 2, ..., 2SL
    let max = i64::from(model.site.two_s()) * chain_length as i64;
    let t = i64::from(target.twice());
    if t.abs() > max || (max - t) % 2 != 0 {
        return Err(DMRGError::InvalidSector(format!(
            "Sz = {target} cannot be reached by {chain_length} sites of spin {}/2",
            model.site.two_s(),
        )));
    }
    Ok(())
}

impl FiniteConfig {
    pub fn new<I, S>(
        chain_length: usize,
        m_warmup: usize,
        schedule: I,
        target: Sector,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SweepSpec>,
    {
        Self {
            chain_length,
            m_warmup,
            schedule: schedule.into_iter().map(|s| s.into()).collect(),
            target,
        }
    }

    /// Check that the configuration describes a calculation that can be
    /// carried out for `model`.
    pub fn validate(&self, model: &Model) -> DMRGResult<()> {
        check_length(self.chain_length, MIN_SWEEP_LENGTH)?;
        if self.m_warmup == 0 { return Err(DMRGError::ZeroTruncation); }
        if let Some((k, spec))
            = self.schedule.iter().enumerate()
            .find(|(_, spec)| spec.m == 0 || spec.passes == 0)
        {
            return Err(DMRGError::InvalidSchedule(format!(
                "entry {k} asks for m = {}, passes = {}", spec.m, spec.passes)));
        }
        check_target(model, self.chain_length, self.target)
    }
}

/// Part of the calculation a step belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Infinite-system growth.
    Warmup,
    /// The `k`-th finite-system sweep, counting from zero.
    Sweep(usize),
}

/// Summary of a single DMRG step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub phase: Phase,
    pub sys_side: Side,
    /// Length of the new system block.
    pub sys_length: usize,
    /// Length of the (unenlarged) environment block.
    pub env_length: usize,
    /// Superblock length.
    pub chain_length: usize,
    /// Target sector of the step.
    pub target: Sector,
    /// Truncation bound.
    pub m: usize,
    /// Number of states actually kept.
    pub kept: usize,
    pub energy: f64,
    pub truncation_error: f64,
    pub overlap: Option<f64>,
}

impl StepRecord {
    fn new(
        phase: Phase,
        sys_side: Side,
        env_length: usize,
        target: Sector,
        m: usize,
        result: &StepResult,
    ) -> Self
    {
        let sys_length = result.block.length;
        Self {
            phase,
            sys_side,
            sys_length,
            env_length,
            chain_length: sys_length + env_length + 1,
            target,
            m,
            kept: result.block.basis_size,
            energy: result.energy,
            truncation_error: result.truncation_error,
            overlap: result.overlap,
        }
    }

    /// Ground state energy per site of the superblock.
    pub fn energy_per_site(&self) -> f64 {
        self.energy / self.chain_length as f64
    }
}

/// Output of the infinite-system warmup.
#[derive(Clone, Debug)]
pub struct Warmup {
    /// Every block produced, stored under both sides.
    pub blocks: BlockStore,
    /// Ground state of the final superblock.
    pub psi0: nd::Array1<f64>,
    /// Ground state energy of the final superblock.
    pub energy: f64,
    pub history: Vec<StepRecord>,
}

/// Output of a finite-system calculation.
#[derive(Clone, Debug)]
pub struct FiniteOutput {
    /// Ground state energy after the last step.
    pub energy: f64,
    /// Ground state energy at the end of each sweep.
    pub sweep_energies: Vec<f64>,
    /// Final superblock ground state, in the basis of the final step.
    pub psi0: nd::Array1<f64>,
    pub blocks: BlockStore,
    pub transforms: TransformStore,
    pub history: Vec<StepRecord>,
}

impl<E> Dmrg<E>
where E: Eigensolver
{
    // grow a block symmetrically until it spans half the chain, passing each
    // new block to `keep`
    fn grow<F>(
        &self,
        chain_length: usize,
        m: usize,
        target: Sector,
        mut keep: F,
    ) -> DMRGResult<(nd::Array1<f64>, f64, Vec<StepRecord>)>
    where F: FnMut(&Block)
    {
        let mut block = self.model.initial_block();
        keep(&block);
        let mut psi0: nd::Array1<f64> = nd::Array1::zeros(0);
        let mut energy: f64 = 0.0;
        let mut history: Vec<StepRecord> = Vec::new();
        while 2 * block.length < chain_length {
            let current_length = 2 * block.length + 2;
            let current_target
                = Sector::from_twice(
                    2 * ((target.twice() / 2) * current_length as i32)
                        .div_euclid(chain_length as i32)
                );
            debug!("{}", graphic(block.length, block.length, Side::Left));
            let res
                = self.single_step(&block, &block, m, current_target, None)?;
            let record
                = StepRecord::new(
                    Phase::Warmup, Side::Left, block.length, current_target, m,
                    &res,
                );
            info!(
                "L = {:>4}: E/L = {:.12}, truncation error = {:.3e}",
                current_length, record.energy_per_site(), record.truncation_error,
            );
            history.push(record);
            block = res.block;
            keep(&block);
            psi0 = res.psi0;
            energy = res.energy;
        }
        Ok((psi0, energy, history))
    }

    /// Run the infinite-system algorithm up to a chain of `chain_length`
    /// sites, keeping `m` states, storing each block for both sides of the
    /// chain.
    ///
    /// The target sector is scaled down with the superblock length: a
    /// superblock of *L'* sites is solved in the sector
    /// ⌊trunc(*S*<sub>*z*</sub>) *L'* / *L*⌋.
    pub fn warmup(&self, chain_length: usize, m: usize, target: Sector)
        -> DMRGResult<Warmup>
    {
        check_length(chain_length, MIN_WARMUP_LENGTH)?;
        check_target(&self.model, chain_length, target)?;
        if m == 0 { return Err(DMRGError::ZeroTruncation); }
        let mut blocks = BlockStore::new();
        let (psi0, energy, history)
            = self.grow(chain_length, m, target, |block| {
                blocks.insert(Side::Left, block.length, block.clone());
                blocks.insert(Side::Right, block.length, block.clone());
            })?;
        Ok(Warmup { blocks, psi0, energy, history })
    }

    /// Run only the infinite-system algorithm, returning the summary of each
    /// step.
    ///
    /// Useful for watching the energy per site converge toward its
    /// thermodynamic limit.
    pub fn infinite_system(&self, chain_length: usize, m: usize, target: Sector)
        -> DMRGResult<Vec<StepRecord>>
    {
        check_length(chain_length, MIN_WARMUP_LENGTH)?;
        check_target(&self.model, chain_length, target)?;
        if m == 0 { return Err(DMRGError::ZeroTruncation); }
        let (_, _, history) = self.grow(chain_length, m, target, |_| { })?;
        Ok(history)
    }

    /// Run the finite-system algorithm: an infinite-system warmup followed by
    /// the sweeps described by `config.schedule`.
    pub fn finite_system(&self, config: &FiniteConfig)
        -> DMRGResult<FiniteOutput>
    {
        config.validate(&self.model)?;
        let warmup
            = self.warmup(config.chain_length, config.m_warmup, config.target)?;
        info!("warmup finished; begin sweeps");
        let mut sweeper
            = Sweeper::new(self, config.chain_length, config.target, warmup)?;
        for spec in config.schedule.iter() {
            for _ in 0..spec.passes {
                sweeper.sweep(spec.m)?;
            }
        }
        Ok(sweeper.into_output())
    }
}

/// State of a finite-system sweep in progress.
///
/// Each call to [`step`][Self::step] moves the pair of free sites by one
/// position, reversing direction at the ends of the chain. A sweep is
/// complete when the system block is on the left and spans exactly half the
/// chain.
#[derive(Debug)]
pub struct Sweeper<'a, E> {
    dmrg: &'a Dmrg<E>,
    chain_length: usize,
    target: Sector,
    blocks: BlockStore,
    transforms: TransformStore,
    sys_side: Side,
    sys_block: Block,
    sys_trans: Option<SpMat<f64>>,
    psi0: Option<nd::Array1<f64>>,
    energy: f64,
    sweeps_done: usize,
    sweep_energies: Vec<f64>,
    history: Vec<StepRecord>,
}

impl<'a, E> Sweeper<'a, E>
where E: Eigensolver
{
    /// Set up sweeps from the output of a warmup to `chain_length` sites.
    ///
    /// The initial system block is the left block spanning half the chain.
    pub fn new(
        dmrg: &'a Dmrg<E>,
        chain_length: usize,
        target: Sector,
        warmup: Warmup,
    ) -> DMRGResult<Self>
    {
        check_length(chain_length, MIN_SWEEP_LENGTH)?;
        let Warmup { blocks, psi0, energy, history } = warmup;
        let sys_block = blocks.require(Side::Left, chain_length / 2)?.clone();
        Ok(Self {
            dmrg,
            chain_length,
            target,
            blocks,
            transforms: TransformStore::new(),
            sys_side: Side::Left,
            sys_block,
            sys_trans: None,
            psi0: Some(psi0),
            energy,
            sweeps_done: 0,
            sweep_energies: Vec::new(),
            history,
        })
    }

    /// Side of the chain the system block is on.
    pub fn sys_side(&self) -> Side { self.sys_side }

    /// Current system block.
    pub fn sys_block(&self) -> &Block { &self.sys_block }

    /// Most recent ground state energy.
    pub fn energy(&self) -> f64 { self.energy }

    /// Number of completed sweeps.
    pub fn sweeps_done(&self) -> usize { self.sweeps_done }

    pub fn blocks(&self) -> &BlockStore { &self.blocks }

    pub fn transforms(&self) -> &TransformStore { &self.transforms }

    pub fn history(&self) -> &[StepRecord] { &self.history }

    /// Return `true` if the free sites are back in the middle of the chain
    /// with the system on the left.
    pub fn sweep_complete(&self) -> bool {
        self.sys_side == Side::Left
            && 2 * self.sys_block.length == self.chain_length
    }

    /// Perform one step of a sweep keeping at most `m` states.
    pub fn step(&mut self, m: usize) -> DMRGResult<&StepRecord> {
        let L = self.chain_length;
        let d = self.dmrg.model.d();
        let env_side = self.sys_side.opposite();
        let env_length = L - self.sys_block.length - 2;
        let env_trans = self.transforms.get(env_side, env_length + 1);

        let guess: Option<nd::Array1<f64>>
            = match (&self.psi0, &self.sys_trans, env_trans) {
                (Some(psi0), Some(sys_trans), Some(env_trans)) => {
                    let g = predict_guess(psi0, sys_trans, env_trans, d)?;
                    Some(g)
                },
                _ => None,
            };
        if guess.is_none() { debug!("no wavefunction guess for this step"); }

        let env_block = self.blocks.require(env_side, env_length)?;
        let res: StepResult;
        if env_block.length == 1 {
            // end of the chain: the environment becomes the system
            let sys_enl_dim = self.sys_block.basis_size * d;
            let env_enl_dim = env_block.basis_size * d;
            let new_sys = env_block.clone();
            let new_env = std::mem::replace(&mut self.sys_block, new_sys);
            self.sys_side = env_side;
            let guess
                = guess.map(|g| swap_roles(&g, sys_enl_dim, env_enl_dim))
                .transpose()?;
            debug!(
                "{}", graphic(self.sys_block.length, new_env.length, self.sys_side));
            res = self.dmrg.single_step(
                &self.sys_block, &new_env, m, self.target, guess.as_ref())?;
        } else {
            debug!(
                "{}", graphic(self.sys_block.length, env_block.length, self.sys_side));
            res = self.dmrg.single_step(
                &self.sys_block, env_block, m, self.target, guess.as_ref())?;
        }

        let record
            = StepRecord::new(
                Phase::Sweep(self.sweeps_done),
                self.sys_side,
                L - res.block.length - 1,
                self.target,
                m,
                &res,
            );
        info!(
            "{}{:<3} E/L = {:.12}, truncation error = {:.3e}{}",
            record.sys_side,
            record.sys_length,
            record.energy_per_site(),
            record.truncation_error,
            record.overlap
                .map(|ov| format!(", overlap = {ov:.8}"))
                .unwrap_or_default(),
        );

        let StepResult { block, energy, transformation, psi0, .. } = res;
        self.blocks.insert(self.sys_side, block.length, block.clone());
        self.transforms.insert(self.sys_side, block.length, transformation.clone());
        self.sys_block = block;
        self.sys_trans = Some(transformation);
        self.psi0 = Some(psi0);
        self.energy = energy;

        if self.sweep_complete() {
            self.sweeps_done += 1;
            self.sweep_energies.push(energy);
        }
        self.history.push(record);
        Ok(&self.history[self.history.len() - 1])
    }

    /// Perform steps keeping at most `m` states until the current sweep is
    /// complete, returning the final energy.
    pub fn sweep(&mut self, m: usize) -> DMRGResult<f64> {
        if m == 0 { return Err(DMRGError::ZeroTruncation); }
        loop {
            self.step(m)?;
            if self.sweep_complete() { break; }
        }
        info!(
            "sweep {} (m = {m}) finished: E = {:.12}, E/L = {:.12}",
            self.sweeps_done, self.energy, self.energy / self.chain_length as f64,
        );
        Ok(self.energy)
    }

    /// Finish, returning everything computed.
    pub fn into_output(self) -> FiniteOutput {
        FiniteOutput {
            energy: self.energy,
            sweep_energies: self.sweep_energies,
            psi0: self.psi0.unwrap_or_else(|| nd::Array1::zeros(0)),
            blocks: self.blocks,
            transforms: self.transforms,
            history: self.history,
        }
    }
}
