//! A single DMRG step: enlarge both blocks, find the ground state of the
//! superblock in a fixed *S*<sub>*z*</sub> sector, and truncate the enlarged
//! system block to the `m` most probable states of its reduced density matrix.
//!
//! The superblock basis is the tensor product of the enlarged system and
//! enlarged environment bases with the environment index fastest; superblock
//! state (*i*, *j*) has index *i*·*m*<sub>env</sub> + *j*. Only the states
//! whose sectors sum to the target are kept, so the Hamiltonian handed to the
//! eigensolver is block-restricted, and the reduced density matrix of the
//! system is block-diagonal by sector.

use std::ops::Range;
use log::{ debug, warn };
use ndarray as nd;
use ndarray_linalg::{ Eigh, UPLO };
use rayon::iter::{ IntoParallelRefIterator, ParallelIterator };
use crate::{
    DMRGError,
    DMRGResult,
    block::{ Block, EnlargedBlock, OpKey },
    eigen::{ EigenPair, Eigensolver },
    model::Model,
    sector::{ Sector, SectorIndex },
    sparse::SpMat,
};

/// Driver for DMRG calculations on a particular model with a particular
/// eigensolver.
#[derive(Clone, Debug)]
pub struct Dmrg<E> {
    pub model: Model,
    pub solver: E,
}

/// Everything produced by a single DMRG step.
#[derive(Clone, Debug)]
pub struct StepResult {
    /// The truncated, enlarged system block.
    pub block: Block,
    /// Superblock ground state energy.
    pub energy: f64,
    /// Map from the enlarged system basis to the truncated one, as an
    /// `m_sys_enl × m'` matrix whose columns are the kept density matrix
    /// eigenvectors.
    pub transformation: SpMat<f64>,
    /// Superblock ground state in the full (unrestricted) superblock basis.
    pub psi0: nd::Array1<f64>,
    /// One minus the total weight of the kept states.
    pub truncation_error: f64,
    /// Sum of all reduced density matrix eigenvalues.
    pub total_weight: f64,
    /// Normalized overlap between the starting guess and the ground state, if
    /// a guess was given.
    pub overlap: Option<f64>,
    /// Enlarged system basis size.
    pub sys_enl_dim: usize,
    /// Enlarged environment basis size.
    pub env_enl_dim: usize,
    /// Size of the superblock basis restricted to the target sector.
    pub restricted_dim: usize,
    /// Size of the full superblock basis.
    pub superblock_dim: usize,
}

/// Build the full superblock Hamiltonian
/// ```text
/// H_sys ⊗ I_env + I_sys ⊗ H_env + two_site(sys connectors, env connectors)
/// ```
pub fn superblock_hamiltonian(
    model: &Model,
    sys_enl: &EnlargedBlock,
    env_enl: &EnlargedBlock,
) -> DMRGResult<SpMat<f64>>
{
    let id_sys: SpMat<f64> = SpMat::eye(sys_enl.basis_size);
    let id_env: SpMat<f64> = SpMat::eye(env_enl.basis_size);
    let h
        = sys_enl.op(OpKey::H)?.kron(&id_env)
        .add(&id_sys.kron(env_enl.op(OpKey::H)?))?
        .add(
            &model.coupling.two_site(
                sys_enl.op(OpKey::ConnSz)?,
                sys_enl.op(OpKey::ConnSp)?,
                env_enl.op(OpKey::ConnSz)?,
                env_enl.op(OpKey::ConnSp)?,
            )?
        )?;
    Ok(h)
}

/// The superblock states belonging to a single system sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorSlice {
    /// Sector of the enlarged system.
    pub sector: Sector,
    /// Enlarged system basis states in `sector`.
    pub sys_states: Vec<usize>,
    /// Number of enlarged environment states in the partner sector.
    pub env_count: usize,
    /// Positions of these states in the restricted basis.
    pub range: Range<usize>,
}

/// The subset of the superblock basis with total sector equal to a target.
///
/// Restricted states are ordered by system sector (in first-seen order), then
/// by system state, then by environment state, so that within each
/// [`SectorSlice`] the amplitudes form a row-major
/// `sys_states.len() × env_count` matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Restriction {
    full_dim: usize,
    basis: Vec<usize>,
    slices: Vec<SectorSlice>,
}

impl Restriction {
    /// Pair every system sector *s* with the environment sector
    /// `target − s`.
    ///
    /// Fails with [`DMRGError::IncompatibleSector`] if no state survives.
    pub fn new(sys_index: &SectorIndex, env_index: &SectorIndex, target: Sector)
        -> DMRGResult<Self>
    {
        let env_dim = env_index.num_states();
        let full_dim = sys_index.num_states() * env_dim;
        let mut basis: Vec<usize> = Vec::new();
        let mut slices: Vec<SectorSlice> = Vec::new();
        for (s, sys_states) in sys_index.iter() {
            let Some(env_states) = env_index.get(target - s) else { continue; };
            let start = basis.len();
            for i in sys_states.iter() {
                basis.extend(env_states.iter().map(|j| i * env_dim + j));
            }
            slices.push(SectorSlice {
                sector: s,
                sys_states: sys_states.to_vec(),
                env_count: env_states.len(),
                range: start..basis.len(),
            });
        }
        if basis.is_empty() {
            return Err(DMRGError::IncompatibleSector { target });
        }
        Ok(Self { full_dim, basis, slices })
    }

    /// Full-basis index of each restricted state.
    pub fn basis(&self) -> &[usize] { &self.basis }

    /// Per-sector layout of the restricted basis.
    pub fn slices(&self) -> &[SectorSlice] { &self.slices }

    /// Number of restricted states.
    pub fn len(&self) -> usize { self.basis.len() }

    pub fn is_empty(&self) -> bool { self.basis.is_empty() }

    /// Size of the full superblock basis.
    pub fn full_dim(&self) -> usize { self.full_dim }

    /// Restrict a matrix on the full basis.
    pub fn restrict_matrix(&self, h: &SpMat<f64>) -> DMRGResult<SpMat<f64>> {
        Ok(h.select(&self.basis, &self.basis)?)
    }

    /// Restrict a full-basis vector.
    pub fn restrict(&self, v: nd::ArrayView1<f64>) -> DMRGResult<nd::Array1<f64>> {
        if v.len() != self.full_dim {
            return Err(DMRGError::InvalidGuess {
                expected: self.full_dim,
                got: v.len(),
            });
        }
        Ok(self.basis.iter().map(|k| v[*k]).collect())
    }

    /// Embed a restricted vector in the full basis, with zeros elsewhere.
    pub fn expand(&self, v: nd::ArrayView1<f64>) -> DMRGResult<nd::Array1<f64>> {
        if v.len() != self.basis.len() {
            return Err(DMRGError::InvalidGuess {
                expected: self.basis.len(),
                got: v.len(),
            });
        }
        let mut full: nd::Array1<f64> = nd::Array1::zeros(self.full_dim);
        self.basis.iter().zip(v.iter())
            .for_each(|(k, a)| { full[*k] = *a; });
        Ok(full)
    }
}

/// An eigenvector of one sector's reduced density matrix.
#[derive(Clone, Debug)]
struct Candidate<'a> {
    weight: f64,
    vector: nd::Array1<f64>,
    sector: Sector,
    states: &'a [usize],
}

// diagonalize the reduced density matrix of the system, sector by sector
fn density_matrix_spectrum<'a>(
    restriction: &'a Restriction,
    psi: &nd::Array1<f64>,
) -> DMRGResult<Vec<Candidate<'a>>>
{
    let per_sector: Vec<Vec<Candidate>>
        = restriction.slices()
        .par_iter()
        .map(|slice| -> DMRGResult<Vec<Candidate>> {
            let psi_s: nd::Array2<f64>
                = nd::Array2::from_shape_vec(
                    (slice.sys_states.len(), slice.env_count),
                    psi.slice(nd::s![slice.range.clone()]).to_vec(),
                )?;
            let rho = psi_s.dot(&psi_s.t());
            let (evals, evecs) = rho.eigh(UPLO::Lower)?;
            let cands: Vec<Candidate>
                = evals.iter().copied()
                .zip(evecs.columns())
                .map(|(weight, v)| Candidate {
                    weight,
                    vector: v.to_owned(),
                    sector: slice.sector,
                    states: slice.sys_states.as_slice(),
                })
                .collect();
            Ok(cands)
        })
        .collect::<DMRGResult<Vec<_>>>()?;
    let mut cands: Vec<Candidate>
        = per_sector.into_iter().flatten().collect();
    cands.sort_by(|l, r| r.weight.total_cmp(&l.weight));
    Ok(cands)
}

/// Normalized overlap |⟨*a*|*b*⟩| / (‖*a*‖ ‖*b*‖), or zero if either vector
/// vanishes.
pub fn overlap(a: &nd::Array1<f64>, b: &nd::Array1<f64>) -> f64 {
    let norm = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norm > 0.0 { a.dot(b).abs() / norm } else { 0.0 }
}

impl<E> Dmrg<E>
where E: Eigensolver
{
    pub fn new(model: Model, solver: E) -> Self { Self { model, solver } }

    // lowest eigenpair, retrying once from a random start if a seeded solve
    // fails
    fn solve(&self, h: &SpMat<f64>, start: Option<&nd::Array1<f64>>)
        -> DMRGResult<EigenPair>
    {
        if let Some(v0) = start {
            match self.solver.lowest(h, Some(v0.view())) {
                Ok(pair) => return Ok(pair),
                Err(err) => {
                    warn!("seeded eigensolve failed ({err}); retrying without guess");
                },
            }
        }
        Ok(self.solver.lowest(h, None)?)
    }

    /// Perform a single DMRG step.
    ///
    /// `sys` and `env` are enlarged by one site each and the superblock ground
    /// state is found in the sector `target`, starting from `guess` (given in
    /// the full superblock basis) if provided. The enlarged system is then
    /// truncated to at most `m` states.
    ///
    /// If `sys` and `env` are the same block (by address), it is only enlarged
    /// once.
    pub fn single_step(
        &self,
        sys: &Block,
        env: &Block,
        m: usize,
        target: Sector,
        guess: Option<&nd::Array1<f64>>,
    ) -> DMRGResult<StepResult>
    {
        if m == 0 { return Err(DMRGError::ZeroTruncation); }
        let same = std::ptr::eq(sys, env);

        let sys_enl = sys.enlarge(&self.model)?;
        let env_enl_owned: EnlargedBlock;
        let env_enl: &EnlargedBlock
            = if same {
                &sys_enl
            } else {
                env_enl_owned = env.enlarge(&self.model)?;
                &env_enl_owned
            };
        let sys_enl_dim = sys_enl.basis_size;
        let env_enl_dim = env_enl.basis_size;

        let h_super = superblock_hamiltonian(&self.model, &sys_enl, env_enl)?;
        let sys_index = SectorIndex::new(&sys_enl.sectors);
        let env_index_owned: SectorIndex;
        let env_index: &SectorIndex
            = if same {
                &sys_index
            } else {
                env_index_owned = SectorIndex::new(&env_enl.sectors);
                &env_index_owned
            };
        let restriction = Restriction::new(&sys_index, env_index, target)?;
        let h_restricted = restriction.restrict_matrix(&h_super)?;
        debug!(
            "m_sys_enl = {}, m_env_enl = {}, superblock {} -> {} in sector {}",
            sys_enl_dim, env_enl_dim,
            h_super.nrows(), restriction.len(), target,
        );

        let start: Option<nd::Array1<f64>>
            = guess.map(|g| restriction.restrict(g.view())).transpose()?;
        let EigenPair { value: energy, vector: psi_restricted, iters }
            = self.solve(&h_restricted, start.as_ref())?;
        debug!("eigensolver finished in {iters} iterations");

        let cands = density_matrix_spectrum(&restriction, &psi_restricted)?;
        let total_weight: f64 = cands.iter().map(|c| c.weight).sum();
        let m_kept = cands.len().min(m);
        let kept = &cands[..m_kept];
        let truncation_error
            = (1.0 - kept.iter().map(|c| c.weight).sum::<f64>()).clamp(0.0, 1.0);
        let transformation
            = SpMat::from_triplets(
                sys_enl_dim,
                m_kept,
                kept.iter().enumerate()
                    .flat_map(|(i, c)| {
                        c.states.iter().zip(c.vector.iter())
                            .map(move |(j, v)| (*j, i, *v))
                    }),
            )?;
        let new_sectors: Vec<Sector> = kept.iter().map(|c| c.sector).collect();
        debug!(
            "kept {m_kept} of {} density matrix eigenstates", cands.len());

        let block = sys_enl.rotate(&transformation, new_sectors)?;
        let psi0 = restriction.expand(psi_restricted.view())?;
        let overlap = guess.map(|g| overlap(g, &psi0));
        if let Some(ov) = overlap {
            debug!("overlap |<psi0_guess|psi0>| = {ov:.12}");
        }

        Ok(StepResult {
            block,
            energy,
            transformation,
            psi0,
            truncation_error,
            total_weight,
            overlap,
            sys_enl_dim,
            env_enl_dim,
            restricted_dim: restriction.len(),
            superblock_dim: restriction.full_dim(),
        })
    }
}
