//! Lowest-eigenpair solvers for real symmetric sparse matrices.
//!
//! The DMRG step only ever needs the single lowest eigenpair of the
//! (sector-restricted) superblock Hamiltonian, optionally seeded with a
//! predicted ground state. This is abstracted by the [`Eigensolver`] trait.
//! [`Lanczos`] is the default, iterative implementation; [`FullDiag`] densifies
//! the matrix and is only suitable for small problems, but is exact.

use ndarray as nd;
use ndarray_linalg::{ Eigh, UPLO, error::LinalgError };
use rand::{ Rng, SeedableRng, rngs::StdRng };
use thiserror::Error;
use crate::sparse::{ SpMat, SpError };

#[derive(Debug, Error)]
pub enum EigenError {
    /// Returned when asked to diagonalize a matrix with no rows.
    #[error("error in eigensolver: empty matrix")]
    EmptyMatrix,

    /// Returned when asked to diagonalize a non-square matrix.
    #[error("error in eigensolver: non-square matrix of shape ({0}, {1})")]
    NotSquare(usize, usize),

    /// Returned when the starting vector's length does not match the matrix.
    #[error("error in eigensolver: starting vector has length {got}, expected {expected}")]
    StartVector { expected: usize, got: usize },

    /// Returned when the iteration limit is reached before the residual drops
    /// below tolerance.
    #[error("error in eigensolver: not converged after {iters} iterations (residual {residual:.3e})")]
    NotConverged { iters: usize, residual: f64 },

    #[error("error in eigensolver: {0}")]
    Sparse(#[from] SpError),

    #[error("error in eigensolver: {0}")]
    Linalg(#[from] LinalgError),
}
use EigenError::*;
pub type EigenResult<T> = Result<T, EigenError>;

/// An eigenvalue with its (normalized) eigenvector.
#[derive(Clone, Debug, PartialEq)]
pub struct EigenPair {
    /// The eigenvalue.
    pub value: f64,
    /// The eigenvector, normalized to unit length.
    pub vector: nd::Array1<f64>,
    /// Number of matrix-vector products spent finding the pair.
    pub iters: usize,
}

/// Finds the lowest eigenpair of a real symmetric matrix.
pub trait Eigensolver {
    /// Return the algebraically smallest eigenvalue of `h` and a corresponding
    /// eigenvector.
    ///
    /// If `start` is provided, it is used as the initial guess for iterative
    /// methods. Implementations should fail if `start` does not match the
    /// dimension of `h`, and may ignore it otherwise.
    fn lowest(&self, h: &SpMat<f64>, start: Option<nd::ArrayView1<f64>>)
        -> EigenResult<EigenPair>;
}

fn check_input(h: &SpMat<f64>, start: Option<&nd::ArrayView1<f64>>)
    -> EigenResult<()>
{
    let (nrows, ncols) = h.shape();
    if nrows != ncols { return Err(NotSquare(nrows, ncols)); }
    if nrows == 0 { return Err(EmptyMatrix); }
    if let Some(v0) = start {
        if v0.len() != nrows {
            return Err(StartVector { expected: nrows, got: v0.len() });
        }
    }
    Ok(())
}

/// Restarted Lanczos iteration with full reorthogonalization.
///
/// Each cycle builds a Krylov basis of at most `krylov_dim` vectors, checking
/// the Ritz residual ‖*Hx* − *θx*‖ of the lowest Ritz pair as it goes. If the
/// basis fills up before convergence, the iteration restarts from the current
/// Ritz vector.
///
/// Without a starting vector, the iteration starts from a pseudo-random vector
/// drawn from a generator seeded with `seed`, so that results are
/// reproducible.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lanczos {
    /// Maximum size of the Krylov basis in each cycle.
    pub krylov_dim: usize,
    /// Maximum number of restarts.
    pub max_restarts: usize,
    /// Convergence threshold on the residual, relative to max(1, |θ|).
    pub tol: f64,
    /// Seed for the random starting vector.
    pub seed: u64,
}

impl Default for Lanczos {
    fn default() -> Self {
        Self { krylov_dim: 100, max_restarts: 100, tol: 1e-10, seed: 10546 }
    }
}

// check the Ritz residual every this many iterations
const CHECK_EVERY: usize = 4;
// relative size of the next Lanczos vector below which the Krylov space is
// considered invariant
const BREAKDOWN: f64 = 1e-13;

impl Lanczos {
    /// Create a new solver with default settings.
    pub fn new() -> Self { Self::default() }

    /// Set the maximum Krylov basis size.
    pub fn with_krylov_dim(mut self, krylov_dim: usize) -> Self {
        self.krylov_dim = krylov_dim;
        self
    }

    /// Set the maximum number of restarts.
    pub fn with_max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Set the residual tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol.abs();
        self
    }

    /// Set the seed for random starting vectors.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn random_start(&self, n: usize) -> nd::Array1<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..n).map(|_| rng.gen::<f64>() - 0.5).collect()
    }
}

// lowest eigenpair of the symmetric tridiagonal matrix with diagonal `alpha`
// and off-diagonal `beta`
fn lowest_tridiagonal(alpha: &[f64], beta: &[f64])
    -> EigenResult<(f64, nd::Array1<f64>)>
{
    let k = alpha.len();
    let t: nd::Array2<f64>
        = nd::Array2::from_shape_fn((k, k), |(i, j)| {
            if i == j {
                alpha[i]
            } else if i == j + 1 {
                beta[j]
            } else if j == i + 1 {
                beta[i]
            } else {
                0.0
            }
        });
    let (evals, evecs) = t.eigh(UPLO::Lower)?;
    Ok((evals[0], evecs.column(0).to_owned()))
}

impl Eigensolver for Lanczos {
    fn lowest(&self, h: &SpMat<f64>, start: Option<nd::ArrayView1<f64>>)
        -> EigenResult<EigenPair>
    {
        check_input(h, start.as_ref())?;
        let n = h.nrows();
        if n == 1 {
            let value = h.get(0, 0).unwrap_or(0.0);
            return Ok(EigenPair { value, vector: nd::array![1.0], iters: 0 });
        }

        let mut v: nd::Array1<f64>
            = start.map(|v0| v0.to_owned())
            .unwrap_or_else(|| self.random_start(n));
        let mut norm = v.dot(&v).sqrt();
        if norm <= f64::EPSILON {
            v = self.random_start(n);
            norm = v.dot(&v).sqrt();
        }
        v /= norm;

        let kmax = self.krylov_dim.max(2).min(n);
        let mut iters: usize = 0;
        let mut residual = f64::INFINITY;
        for _ in 0..=self.max_restarts {
            let mut basis: Vec<nd::Array1<f64>> = Vec::with_capacity(kmax);
            let mut alpha: Vec<f64> = Vec::with_capacity(kmax);
            let mut beta: Vec<f64> = Vec::with_capacity(kmax);
            basis.push(v.clone());
            for j in 0..kmax {
                iters += 1;
                let mut w = h.dot_vec(basis[j].view())?;
                let a = basis[j].dot(&w);
                alpha.push(a);
                w.scaled_add(-a, &basis[j]);
                if j > 0 { w.scaled_add(-beta[j - 1], &basis[j - 1]); }
                // two passes of Gram-Schmidt against the whole basis
                for _ in 0..2 {
                    for q in basis.iter() {
                        let c = q.dot(&w);
                        w.scaled_add(-c, q);
                    }
                }
                let b = w.dot(&w).sqrt();

                let invariant = b <= BREAKDOWN * a.abs().max(1.0);
                let full = j + 1 == kmax;
                if invariant || full || (j + 1) % CHECK_EVERY == 0 {
                    let (theta, s) = lowest_tridiagonal(&alpha, &beta)?;
                    residual = (b * s[j]).abs();
                    let converged
                        = invariant || residual <= self.tol * theta.abs().max(1.0);
                    if converged || full {
                        let mut x: nd::Array1<f64> = nd::Array1::zeros(n);
                        basis.iter().zip(s.iter())
                            .for_each(|(q, sk)| { x.scaled_add(*sk, q); });
                        let xnorm = x.dot(&x).sqrt();
                        x /= xnorm;
                        if converged {
                            return Ok(EigenPair { value: theta, vector: x, iters });
                        }
                        v = x;
                        break;
                    }
                }
                beta.push(b);
                basis.push(w / b);
            }
        }
        Err(NotConverged { iters, residual })
    }
}

/// Exact diagonalization by conversion to a dense matrix.
///
/// Ignores any starting vector. Costs *O*(*n*<sup>3</sup>) time and
/// *O*(*n*<sup>2</sup>) memory, so only appropriate for small matrices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FullDiag;

impl Eigensolver for FullDiag {
    fn lowest(&self, h: &SpMat<f64>, start: Option<nd::ArrayView1<f64>>)
        -> EigenResult<EigenPair>
    {
        check_input(h, start.as_ref())?;
        let (evals, evecs) = h.to_dense().eigh(UPLO::Lower)?;
        Ok(EigenPair {
            value: evals[0],
            vector: evecs.column(0).to_owned(),
            iters: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // open-boundary tight-binding chain with a potential; lowest eigenvalue
    // known in closed form for zero potential
    fn chain(n: usize, pot: f64) -> SpMat<f64> {
        let trips
            = (0..n - 1)
            .flat_map(|k| [(k, k + 1, -1.0), (k + 1, k, -1.0)])
            .chain((0..n).map(|k| (k, k, pot * (k as f64).sin())));
        SpMat::from_triplets(n, n, trips).unwrap()
    }

    #[test]
    fn lanczos_free_chain() {
        let n = 80;
        let h = chain(n, 0.0);
        let pair = Lanczos::default().lowest(&h, None).unwrap();
        let exact = -2.0 * (std::f64::consts::PI / (n as f64 + 1.0)).cos();
        assert_abs_diff_eq!(pair.value, exact, epsilon = 1e-9);
        assert_abs_diff_eq!(pair.vector.dot(&pair.vector), 1.0, epsilon = 1e-12);
        let resid = h.dot_vec(pair.vector.view()).unwrap()
            - &pair.vector * pair.value;
        assert!(resid.dot(&resid).sqrt() < 1e-6);
    }

    #[test]
    fn lanczos_matches_full_diag() {
        let h = chain(60, 0.7);
        let lz = Lanczos::default().with_krylov_dim(30).lowest(&h, None).unwrap();
        let ex = FullDiag.lowest(&h, None).unwrap();
        assert_abs_diff_eq!(lz.value, ex.value, epsilon = 1e-9);
        let overlap = lz.vector.dot(&ex.vector).abs();
        assert_abs_diff_eq!(overlap, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn good_start_converges_fast() {
        let h = chain(60, 0.3);
        let ex = FullDiag.lowest(&h, None).unwrap();
        let cold = Lanczos::default().lowest(&h, None).unwrap();
        let warm = Lanczos::default()
            .lowest(&h, Some(ex.vector.view()))
            .unwrap();
        assert_abs_diff_eq!(warm.value, ex.value, epsilon = 1e-9);
        assert!(warm.iters <= cold.iters);
    }

    #[test]
    fn small_and_bad_input() {
        let one: SpMat<f64> = SpMat::from_triplets(1, 1, [(0, 0, -3.0)]).unwrap();
        let pair = Lanczos::default().lowest(&one, None).unwrap();
        assert_eq!(pair.value, -3.0);
        let empty: SpMat<f64> = SpMat::zeros(0, 0);
        assert!(matches!(Lanczos::default().lowest(&empty, None), Err(EmptyMatrix)));
        let rect: SpMat<f64> = SpMat::zeros(2, 3);
        assert!(matches!(FullDiag.lowest(&rect, None), Err(NotSquare(2, 3))));
        let h = chain(5, 0.0);
        let v0 = nd::Array1::<f64>::ones(4);
        assert!(matches!(
            Lanczos::default().lowest(&h, Some(v0.view())),
            Err(StartVector { expected: 5, got: 4 }),
        ));
    }

    #[test]
    fn zero_start_falls_back_to_random() {
        let h = chain(10, 0.0);
        let v0 = nd::Array1::<f64>::zeros(10);
        let pair = Lanczos::default().lowest(&h, Some(v0.view())).unwrap();
        let ex = FullDiag.lowest(&h, None).unwrap();
        assert_abs_diff_eq!(pair.value, ex.value, epsilon = 1e-10);
    }
}
