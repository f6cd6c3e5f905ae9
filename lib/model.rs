//! Single-site operators and nearest-neighbor couplings of the XXZ chain
//!
//! ```text
//! H = Σ_i [ (J/2)(S+_i S-_(i+1) + S-_i S+_(i+1)) + Jz Sz_i Sz_(i+1) ] - h Σ_i Sz_i
//! ```

use crate::{
    DMRGError,
    DMRGResult,
    block::{ Block, OpKey, OpDict },
    sector::Sector,
    sparse::{ SpMat, SpResult },
};

/// Operators on a single spin-*S* site.
///
/// Basis states are ordered by decreasing *m*, from *m* = *S* to *m* = −*S*.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteModel {
    two_s: u32,
    sz: SpMat<f64>,
    sp: SpMat<f64>,
    h1: SpMat<f64>,
    sectors: Vec<Sector>,
}

impl SiteModel {
    /// Create a spin-*S* site, with `two_s` = 2*S*, in a longitudinal field
    /// `field`.
    ///
    /// Fails if `two_s == 0`.
    pub fn spin(two_s: u32, field: f64) -> DMRGResult<Self> {
        if two_s == 0 { return Err(DMRGError::InvalidSpin); }
        let d = two_s as usize + 1;
        let ts = f64::from(two_s);
        // 2m for the k-th basis state
        let twice_m = |k: usize| ts - 2.0 * k as f64;
        let sz = SpMat::from_triplets(
            d, d, (0..d).map(|k| (k, k, twice_m(k) / 2.0)))?;
        let sp = SpMat::from_triplets(
            d, d,
            (1..d).map(|k| {
                let tm = twice_m(k);
                let elem = ((ts * (ts + 2.0) - tm * (tm + 2.0)) / 4.0).sqrt();
                (k - 1, k, elem)
            }),
        )?;
        let h1 = sz.scale(-field);
        let sectors: Vec<Sector>
            = (0..d).map(|k| Sector::from_twice(two_s as i32 - 2 * k as i32))
            .collect();
        Ok(Self { two_s, sz, sp, h1, sectors })
    }

    /// Create a spin-1/2 site in zero field.
    pub fn spin_half() -> Self {
        let sz = SpMat::from_dense(&ndarray::array![[0.5, 0.0], [0.0, -0.5]]);
        let sp = SpMat::from_dense(&ndarray::array![[0.0, 1.0], [0.0, 0.0]]);
        Self {
            two_s: 1,
            sz,
            sp,
            h1: SpMat::zeros(2, 2),
            sectors: vec![Sector::from_twice(1), Sector::from_twice(-1)],
        }
    }

    /// Return 2*S*.
    pub fn two_s(&self) -> u32 { self.two_s }

    /// Return the local dimension 2*S* + 1.
    pub fn dim(&self) -> usize { self.sectors.len() }

    pub fn sz(&self) -> &SpMat<f64> { &self.sz }

    pub fn sp(&self) -> &SpMat<f64> { &self.sp }

    /// Single-site Hamiltonian −*h S*<sub>*z*</sub>.
    pub fn h1(&self) -> &SpMat<f64> { &self.h1 }

    /// Sector of each basis state.
    pub fn sectors(&self) -> &[Sector] { &self.sectors }
}

/// Exchange constants of the nearest-neighbor interaction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coupling {
    /// Transverse (XY) exchange.
    pub j: f64,
    /// Longitudinal (ZZ) exchange.
    pub jz: f64,
}

impl Default for Coupling {
    fn default() -> Self { Self { j: 1.0, jz: 1.0 } }
}

impl Coupling {
    pub fn new(j: f64, jz: f64) -> Self { Self { j, jz } }

    /// Interaction between two subsystems through their connector operators,
    /// acting on the tensor product space of subsystem 1 (slow index) and
    /// subsystem 2 (fast index):
    /// ```text
    /// (J/2)(S+_1 ⊗ S-_2 + S-_1 ⊗ S+_2) + Jz Sz_1 ⊗ Sz_2
    /// ```
    /// where S− = (S+)<sup>†</sup>.
    pub fn two_site(
        &self,
        sz1: &SpMat<f64>,
        sp1: &SpMat<f64>,
        sz2: &SpMat<f64>,
        sp2: &SpMat<f64>,
    ) -> SpResult<SpMat<f64>>
    {
        let flip
            = sp1.kron(&sp2.adjoint())
            .add(&sp1.adjoint().kron(sp2))?
            .scale(self.j / 2.0);
        let ising = sz1.kron(sz2).scale(self.jz);
        flip.add(&ising)
    }
}

/// A chain of identical sites with uniform nearest-neighbor couplings.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub site: SiteModel,
    pub coupling: Coupling,
}

impl Model {
    pub fn new(site: SiteModel, coupling: Coupling) -> Self {
        Self { site, coupling }
    }

    /// Spin-1/2 isotropic Heisenberg chain with *J* = *J*<sub>*z*</sub> = 1.
    pub fn heisenberg() -> Self {
        Self::new(SiteModel::spin_half(), Coupling::default())
    }

    /// Spin-1/2 XXZ chain with anisotropy Δ = *J*<sub>*z*</sub>/*J* and unit
    /// *J*.
    pub fn xxz(delta: f64) -> Self {
        Self::new(SiteModel::spin_half(), Coupling::new(1.0, delta))
    }

    /// Return the local dimension.
    pub fn d(&self) -> usize { self.site.dim() }

    /// Return the length-1 block containing a single site.
    pub fn initial_block(&self) -> Block {
        let ops: OpDict
            = [
                (OpKey::H, self.site.h1.clone()),
                (OpKey::ConnSz, self.site.sz.clone()),
                (OpKey::ConnSp, self.site.sp.clone()),
            ]
            .into_iter()
            .collect();
        Block::new(1, self.d(), ops, self.site.sectors.clone())
    }
}
