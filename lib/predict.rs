//! Carrying a superblock ground state over to the next step of a sweep.
//!
//! After a step with configuration `===**---`, the ground state lives in the
//! basis (system block, site, environment block, site). The next step uses
//! `====**--`, so the first free site has to be absorbed into the system and
//! the environment block has to be opened back up into the (shorter block,
//! site) pair it was built from. Both moves only require the basis
//! transformations already computed when those blocks were made:
//!
//! ```text
//!  (sys_enl, env_enl)                          psi_a  : m_sys_enl × (m_env·d)
//!  -> (sys, env, site)          sys_trans†  ·  psi_b  : m_sys × (m_env·d)
//!  -> (sys, site, env)            reorder      psi_d  : (m_sys·d) × m_env
//!  -> (sys, site, env', site)   · env_trans†  guess  : (m_sys·d) × m_env_enl'
//! ```
//!
//! All reshapes are row-major.

use ndarray as nd;
use crate::{
    DMRGError,
    DMRGResult,
    sparse::SpMat,
};

/// Transform the ground state `psi0` of the previous step into a starting
/// guess for the next one.
///
/// `sys_trans` is the transformation that produced the current system block
/// (`m_sys_enl × m_sys`), `env_trans` the one that produced the previous
/// environment block from its own enlargement (`m_env_enl' × m_env`), and `d`
/// the single-site dimension. The result is a flattened
/// `(m_sys·d) × m_env_enl'` matrix in the superblock basis of the next step.
///
/// Fails if `psi0` does not have `m_sys_enl·m_env·d` elements.
pub fn predict_guess(
    psi0: &nd::Array1<f64>,
    sys_trans: &SpMat<f64>,
    env_trans: &SpMat<f64>,
    d: usize,
) -> DMRGResult<nd::Array1<f64>>
{
    let (m_sys_enl, m_sys) = sys_trans.shape();
    let (_, m_env) = env_trans.shape();
    let expected = m_sys_enl * m_env * d;
    if psi0.len() != expected || d == 0 {
        return Err(DMRGError::InvalidGuess { expected, got: psi0.len() });
    }
    let psi_a: nd::Array2<f64>
        = nd::Array2::from_shape_vec((m_sys_enl, m_env * d), psi0.to_vec())?;
    let psi_b: nd::Array2<f64>
        = sys_trans.adjoint().dot_dense(psi_a.view())?;
    let psi_d: nd::Array2<f64>
        = nd::Array2::from_shape_fn(
            (m_sys * d, m_env),
            |(sk, e)| psi_b[[sk / d, e * d + sk % d]],
        );
    let guess_t: nd::Array2<f64> = env_trans.dot_dense(psi_d.t())?;
    Ok(guess_t.t().iter().copied().collect())
}

/// Exchange the roles of system and environment in a superblock vector, i.e.
/// transpose the row-major `sys_enl_dim × env_enl_dim` matrix it represents.
///
/// Fails if `guess` does not have `sys_enl_dim·env_enl_dim` elements.
pub fn swap_roles(
    guess: &nd::Array1<f64>,
    sys_enl_dim: usize,
    env_enl_dim: usize,
) -> DMRGResult<nd::Array1<f64>>
{
    let expected = sys_enl_dim * env_enl_dim;
    if guess.len() != expected {
        return Err(DMRGError::InvalidGuess { expected, got: guess.len() });
    }
    let mat: nd::Array2<f64>
        = nd::Array2::from_shape_vec((sys_enl_dim, env_enl_dim), guess.to_vec())?;
    Ok(mat.t().iter().copied().collect())
}
