//! Renormalized blocks of sites.
//!
//! A block describes a contiguous run of sites through a (truncated) basis, the
//! *S*<sub>*z*</sub> sector of each basis state, and a small dictionary of
//! operators in that basis: the block Hamiltonian and the connector operators
//! acting on the site at the block's free edge.
//!
//! ```text
//!  block (m states)   new site (d states)       enlarged block (m·d states)
//! [= = = = = =]    +    [*]            ->     [= = = = = = *]
//! ```
//!
//! Enlarged block states are ordered with the block index slow and the site
//! index fast, so that the enlarged-basis index of (block state *i*, site state
//! *k*) is *i·d* + *k*.

use std::collections::BTreeMap;
use itertools::Itertools;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use crate::{
    DMRGError,
    DMRGResult,
    model::Model,
    sector::Sector,
    sparse::{ SpError, SpMat, SpResult },
};

/// Identifies one of the operators carried by a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKey {
    /// Block Hamiltonian.
    H,
    /// *S*<sub>*z*</sub> on the block's edge site.
    ConnSz,
    /// *S*<sub>+</sub> on the block's edge site.
    ConnSp,
}

impl OpKey {
    /// All keys that a block must carry.
    pub const REQUIRED: [OpKey; 3] = [OpKey::H, OpKey::ConnSz, OpKey::ConnSp];

    pub fn name(&self) -> &'static str {
        match self {
            Self::H => "H",
            Self::ConnSz => "conn_Sz",
            Self::ConnSp => "conn_Sp",
        }
    }
}

pub type OpDict = BTreeMap<OpKey, SpMat<f64>>;

/// A block of `length` sites described in a basis of `basis_size` states.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub length: usize,
    pub basis_size: usize,
    pub ops: OpDict,
    pub sectors: Vec<Sector>,
}

impl Block {
    pub fn new(
        length: usize,
        basis_size: usize,
        ops: OpDict,
        sectors: Vec<Sector>,
    ) -> Self
    {
        Self { length, basis_size, ops, sectors }
    }

    /// Return `true` if every operator is `basis_size × basis_size` and there
    /// is exactly one sector label per basis state.
    pub fn is_valid(&self) -> bool { self.check_shapes().is_ok() }

    fn check_shapes(&self) -> DMRGResult<()> {
        let n = self.basis_size;
        let bad_op
            = self.ops.iter()
            .find(|(_, op)| op.shape() != (n, n));
        if let Some((key, op)) = bad_op {
            return Err(DMRGError::InvalidBlock {
                length: self.length,
                reason: format!(
                    "operator {} has shape {:?}, expected ({n}, {n})",
                    key.name(), op.shape(),
                ),
            });
        }
        if self.sectors.len() != n {
            return Err(DMRGError::InvalidBlock {
                length: self.length,
                reason: format!(
                    "{} sector labels for {n} basis states", self.sectors.len()),
            });
        }
        Ok(())
    }

    /// Like [`is_valid`][Self::is_valid], but additionally requires all
    /// operators needed to enlarge the block, returning an error that names the
    /// first violated condition.
    pub fn validate(&self) -> DMRGResult<()> {
        self.check_shapes()?;
        OpKey::REQUIRED.iter()
            .try_for_each(|key| self.op(*key).map(|_| ()))
    }

    /// Return a reference to an operator, failing if it is absent.
    pub fn op(&self, key: OpKey) -> DMRGResult<&SpMat<f64>> {
        self.ops.get(&key).ok_or(DMRGError::MissingOperator(key.name()))
    }

    /// Add one site to the free edge of the block.
    ///
    /// The new block Hamiltonian is
    /// ```text
    /// H' = H ⊗ I_d + I_m ⊗ H1 + two_site(conn_Sz, conn_Sp, Sz, S+)
    /// ```
    /// and the new connectors act on the added site. Sector labels are summed
    /// over the tensor product, with the site index fastest.
    pub fn enlarge(&self, model: &Model) -> DMRGResult<EnlargedBlock> {
        self.validate()?;
        let site = &model.site;
        let m = self.basis_size;
        let d = site.dim();
        let id_m: SpMat<f64> = SpMat::eye(m);
        let id_d: SpMat<f64> = SpMat::eye(d);

        let h_enl
            = self.op(OpKey::H)?.kron(&id_d)
            .add(&id_m.kron(site.h1()))?
            .add(
                &model.coupling.two_site(
                    self.op(OpKey::ConnSz)?,
                    self.op(OpKey::ConnSp)?,
                    site.sz(),
                    site.sp(),
                )?
            )?;
        let ops: OpDict
            = [
                (OpKey::H, h_enl),
                (OpKey::ConnSz, id_m.kron(site.sz())),
                (OpKey::ConnSp, id_m.kron(site.sp())),
            ]
            .into_iter()
            .collect();
        let sectors: Vec<Sector>
            = self.sectors.iter()
            .cartesian_product(site.sectors().iter())
            .map(|(sb, ss)| *sb + *ss)
            .collect();
        let enlarged
            = EnlargedBlock(Block::new(self.length + 1, m * d, ops, sectors));
        enlarged.validate()?;
        Ok(enlarged)
    }
}

/// A block with one freshly added site, in the untruncated product basis.
///
/// This is kept distinct from [`Block`] so that the two roles in a DMRG step
/// cannot be mixed up; the shape conditions are the same.
#[derive(Clone, Debug, PartialEq)]
pub struct EnlargedBlock(pub(crate) Block);

impl std::ops::Deref for EnlargedBlock {
    type Target = Block;

    fn deref(&self) -> &Block { &self.0 }
}

impl EnlargedBlock {
    /// Unwrap into the underlying block data.
    pub fn into_block(self) -> Block { self.0 }

    /// Project every operator onto the truncated basis spanned by the columns
    /// of `trans`, i.e. `op -> trans† · op · trans`, producing a new block of
    /// the same length labeled with `sectors`.
    ///
    /// Operators are rotated in parallel.
    pub fn rotate(&self, trans: &SpMat<f64>, sectors: Vec<Sector>)
        -> DMRGResult<Block>
    {
        let (nrows, ncols) = trans.shape();
        if nrows != self.basis_size {
            return Err(SpError::IncompatibleShapes {
                op: "rotation",
                lhs: (self.basis_size, self.basis_size),
                rhs: (nrows, ncols),
            }.into());
        }
        let trans_adj = trans.adjoint();
        let ops: OpDict
            = self.ops.iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(key, op)| -> SpResult<(OpKey, SpMat<f64>)> {
                let rotated = trans_adj.matmul(op)?.matmul(trans)?;
                Ok((*key, rotated))
            })
            .collect::<SpResult<OpDict>>()?;
        let block = Block::new(self.length, ncols, ops, sectors);
        block.validate()?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn enlarge_initial() {
        let model = Model::heisenberg();
        let enl = model.initial_block().enlarge(&model).unwrap();
        assert!(enl.is_valid());
        assert_eq!(enl.length, 2);
        assert_eq!(enl.basis_size, 4);
        let twice: Vec<i32> = enl.sectors.iter().map(|s| s.twice()).collect();
        assert_eq!(twice, vec![2, 0, 0, -2]);
        // two-site Heisenberg bond
        let h = enl.op(OpKey::H).unwrap();
        assert_eq!(h.get(0, 0), Some(0.25));
        assert_eq!(h.get(1, 2), Some(0.5));
        assert_eq!(h.get(1, 1), Some(-0.25));
        // connectors act on the new (fast) site
        let sz = enl.op(OpKey::ConnSz).unwrap();
        assert_eq!(sz.get(1, 1), Some(-0.5));
        assert_eq!(sz.get(2, 2), Some(0.5));
    }

    #[test]
    fn rotate_onto_basis_subset() {
        let model = Model::heisenberg();
        let enl
            = model.initial_block().enlarge(&model).unwrap()
            .into_block().enlarge(&model).unwrap();
        assert_eq!(enl.basis_size, 8);
        // columns are unit vectors, so every operator is cut down to the
        // principal submatrix on the kept states
        let keep: [usize; 3] = [1, 2, 4];
        let trans: SpMat<f64>
            = SpMat::from_triplets(
                8, 3, keep.iter().enumerate().map(|(col, k)| (*k, col, 1.0)))
            .unwrap();
        let sectors: Vec<Sector> = keep.iter().map(|k| enl.sectors[*k]).collect();
        let block = enl.rotate(&trans, sectors.clone()).unwrap();
        assert!(block.is_valid());
        assert_eq!(block.length, 3);
        assert_eq!(block.basis_size, 3);
        assert_eq!(block.sectors, sectors);
        for key in OpKey::REQUIRED {
            let a = block.op(key).unwrap().to_dense();
            let b = enl.op(key).unwrap().select(&keep, &keep).unwrap().to_dense();
            a.iter().zip(b.iter())
                .for_each(|(x, y)| assert_abs_diff_eq!(*x, *y, epsilon = 1e-15));
        }
        // ↑↑↓, ↑↓↑ and ↓↑↑ all carry Sz = 1/2
        assert!(sectors.iter().all(|s| s.twice() == 1));
    }

    #[test]
    fn rotate_truncates() {
        let model = Model::heisenberg();
        let enl = model.initial_block().enlarge(&model).unwrap();
        // keep the singlet and the |↑↑⟩ state
        let r = std::f64::consts::FRAC_1_SQRT_2;
        let trans: SpMat<f64>
            = SpMat::from_triplets(4, 2, [(1, 0, r), (2, 0, -r), (0, 1, 1.0)])
            .unwrap();
        let block
            = enl.rotate(&trans, vec![Sector::ZERO, Sector::from_twice(2)])
            .unwrap();
        assert_eq!(block.basis_size, 2);
        let h = block.op(OpKey::H).unwrap();
        assert_abs_diff_eq!(h.get(0, 0).unwrap(), -0.75, epsilon = 1e-14);
        assert_abs_diff_eq!(h.get(1, 1).unwrap(), 0.25, epsilon = 1e-14);
        assert!(enl.rotate(&SpMat::eye(3), vec![Sector::ZERO; 3]).is_err());
    }

    #[test]
    fn invalid_blocks() {
        let model = Model::heisenberg();
        let mut block = model.initial_block();
        block.sectors.pop();
        assert!(!block.is_valid());
        assert!(matches!(block.enlarge(&model), Err(DMRGError::InvalidBlock { .. })));

        let mut block = model.initial_block();
        block.ops.remove(&OpKey::ConnSp);
        assert!(block.is_valid());
        assert!(matches!(
            block.enlarge(&model),
            Err(DMRGError::MissingOperator("conn_Sp")),
        ));

        let mut block = model.initial_block();
        block.ops.insert(OpKey::H, SpMat::eye(3));
        assert!(!block.is_valid());
    }
}
