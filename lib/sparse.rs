//! Compressed sparse row (CSR) matrices.
//!
//! Block operators in DMRG are built almost entirely out of Kronecker products
//! with identities, so they are overwhelmingly sparse. [`SpMat`] provides the
//! handful of operations the algorithm needs on them: Kronecker products,
//! sums, products, adjoints, and symmetric "fancy" slicing by explicit row and
//! column index lists.
//!
//! # Example
//! ```
//! use ndarray as nd;
//! use sz_dmrg::sparse::SpMat;
//!
//! let sp: SpMat<f64> = SpMat::from_dense(&nd::array![[0.0, 1.0], [0.0, 0.0]]);
//! let id: SpMat<f64> = SpMat::eye(2);
//! let op = id.kron(&sp); // acts on the second factor only
//! assert_eq!(op.shape(), (4, 4));
//! assert_eq!(op.nnz(), 2);
//! assert_eq!(op.get(2, 3), Some(1.0));
//! ```

use itertools::{ EitherOrBoth, Itertools };
use ndarray as nd;
use num_complex::ComplexFloat;
use num_traits::Float;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpError {
    /// Returned when building a matrix from triplets with an entry outside of
    /// the requested shape.
    #[error("error in sparse matrix creation: entry ({0}, {1}) out of bounds for shape ({2}, {3})")]
    EntryOutOfBounds(usize, usize, usize, usize),

    /// Returned when a binary operation is attempted between matrices of
    /// incompatible shapes.
    #[error("error in sparse matrix {op}: incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    /// Returned when a selection is attempted with an index out of bounds.
    #[error("error in sparse matrix selection: index {0} out of bounds for dimension {1}")]
    SelectOutOfBounds(usize, usize),

    /// Returned when a selection is attempted with a repeated column index.
    #[error("error in sparse matrix selection: repeated column index {0}")]
    SelectRepeated(usize),
}
use SpError::*;
pub type SpResult<T> = Result<T, SpError>;

/// A sparse matrix in compressed sparse row format.
///
/// Column indices within each row are kept strictly increasing, and explicit
/// zeros are only stored when they arise from cancellation in a sum.
#[derive(Clone, Debug, PartialEq)]
pub struct SpMat<A> {
    nrows: usize,
    ncols: usize,
    // row `i` occupies `indices[indptr[i]..indptr[i + 1]]`
    indptr: Vec<usize>, // length nrows + 1
    indices: Vec<usize>,
    data: Vec<A>,
}

impl<A> SpMat<A>
where A: ComplexFloat
{
    /// Create an all-zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            indptr: vec![0; nrows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Create an `n × n` identity matrix.
    pub fn eye(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            indptr: (0..=n).collect(),
            indices: (0..n).collect(),
            data: vec![A::one(); n],
        }
    }

    /// Build a matrix from `(row, column, value)` triplets.
    ///
    /// Repeated entries are summed and entries that end up exactly zero are
    /// dropped.
    ///
    /// Fails if any entry lies outside of `nrows × ncols`.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I)
        -> SpResult<Self>
    where I: IntoIterator<Item = (usize, usize, A)>
    {
        let mut rows: Vec<Vec<(usize, A)>> = vec![Vec::new(); nrows];
        for (i, j, a) in triplets.into_iter() {
            if i >= nrows || j >= ncols {
                return Err(EntryOutOfBounds(i, j, nrows, ncols));
            }
            rows[i].push((j, a));
        }
        let mut indptr: Vec<usize> = Vec::with_capacity(nrows + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<A> = Vec::new();
        indptr.push(0);
        for mut row in rows.into_iter() {
            row.sort_by_key(|(j, _)| *j);
            row.into_iter()
                .coalesce(|(jl, al), (jr, ar)| {
                    if jl == jr { Ok((jl, al + ar)) } else { Err(((jl, al), (jr, ar))) }
                })
                .filter(|(_, a)| !a.is_zero())
                .for_each(|(j, a)| { indices.push(j); data.push(a); });
            indptr.push(indices.len());
        }
        Ok(Self { nrows, ncols, indptr, indices, data })
    }

    /// Convert from a dense matrix, dropping zeros.
    pub fn from_dense(mat: &nd::Array2<A>) -> Self {
        let (nrows, ncols) = mat.dim();
        let mut indptr: Vec<usize> = Vec::with_capacity(nrows + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<A> = Vec::new();
        indptr.push(0);
        for row in mat.rows() {
            row.iter().enumerate()
                .filter(|(_, a)| !a.is_zero())
                .for_each(|(j, a)| { indices.push(j); data.push(*a); });
            indptr.push(indices.len());
        }
        Self { nrows, ncols, indptr, indices, data }
    }

    /// Convert to a dense matrix.
    pub fn to_dense(&self) -> nd::Array2<A> {
        let mut mat: nd::Array2<A> = nd::Array2::zeros((self.nrows, self.ncols));
        self.iter().for_each(|(i, j, a)| { mat[[i, j]] = a; });
        mat
    }

    /// Return the number of rows.
    pub fn nrows(&self) -> usize { self.nrows }

    /// Return the number of columns.
    pub fn ncols(&self) -> usize { self.ncols }

    /// Return `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) { (self.nrows, self.ncols) }

    /// Return `true` if `self` has as many rows as columns.
    pub fn is_square(&self) -> bool { self.nrows == self.ncols }

    /// Return the number of stored entries.
    pub fn nnz(&self) -> usize { self.data.len() }

    /// Return the `(i, j)`-th element, or `None` if out of bounds.
    pub fn get(&self, i: usize, j: usize) -> Option<A> {
        if i >= self.nrows || j >= self.ncols { return None; }
        let cols = &self.indices[self.indptr[i]..self.indptr[i + 1]];
        let a = cols.binary_search(&j)
            .map(|k| self.data[self.indptr[i] + k])
            .unwrap_or_else(|_| A::zero());
        Some(a)
    }

    /// Iterate over the stored `(column, value)` pairs of the `i`-th row in
    /// increasing column order.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, A)> + '_ {
        let range = self.indptr[i]..self.indptr[i + 1];
        self.indices[range.clone()].iter().copied()
            .zip(self.data[range].iter().copied())
    }

    /// Iterate over all stored `(row, column, value)` triplets in row-major
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, A)> + '_ {
        (0..self.nrows)
            .flat_map(move |i| self.row(i).map(move |(j, a)| (i, j, a)))
    }

    /// Apply a function to every stored element.
    pub fn map<F>(&self, f: F) -> Self
    where F: FnMut(A) -> A
    {
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Multiply every element by a scalar.
    pub fn scale(&self, a: A) -> Self { self.map(|x| x * a) }

    /// Compute the element-wise sum `self + rhs`.
    ///
    /// Fails if the shapes are not equal.
    pub fn add(&self, rhs: &Self) -> SpResult<Self> {
        if self.shape() != rhs.shape() {
            return Err(IncompatibleShapes {
                op: "add",
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        let mut indptr: Vec<usize> = Vec::with_capacity(self.nrows + 1);
        let mut indices: Vec<usize>
            = Vec::with_capacity(self.nnz().max(rhs.nnz()));
        let mut data: Vec<A> = Vec::with_capacity(self.nnz().max(rhs.nnz()));
        indptr.push(0);
        for i in 0..self.nrows {
            self.row(i)
                .merge_join_by(rhs.row(i), |(jl, _), (jr, _)| jl.cmp(jr))
                .map(|entry| {
                    match entry {
                        EitherOrBoth::Both((j, l), (_, r)) => (j, l + r),
                        EitherOrBoth::Left(lhs) => lhs,
                        EitherOrBoth::Right(rhs) => rhs,
                    }
                })
                .for_each(|(j, a)| { indices.push(j); data.push(a); });
            indptr.push(indices.len());
        }
        Ok(Self { nrows: self.nrows, ncols: self.ncols, indptr, indices, data })
    }

    fn transpose_with<F>(&self, f: F) -> Self
    where F: Fn(A) -> A
    {
        let nnz = self.nnz();
        let mut indptr: Vec<usize> = vec![0; self.ncols + 1];
        self.indices.iter().for_each(|j| { indptr[j + 1] += 1; });
        for j in 0..self.ncols { indptr[j + 1] += indptr[j]; }
        let mut next: Vec<usize> = indptr[..self.ncols].to_vec();
        let mut indices: Vec<usize> = vec![0; nnz];
        let mut data: Vec<A> = vec![A::zero(); nnz];
        // rows are visited in order, so the new rows come out sorted
        for (i, j, a) in self.iter() {
            let p = next[j];
            indices[p] = i;
            data[p] = f(a);
            next[j] += 1;
        }
        Self { nrows: self.ncols, ncols: self.nrows, indptr, indices, data }
    }

    /// Return the transpose.
    pub fn transpose(&self) -> Self { self.transpose_with(|a| a) }

    /// Return the conjugate transpose.
    pub fn adjoint(&self) -> Self { self.transpose_with(|a| a.conj()) }

    /// Compute the Kronecker product `self ⊗ rhs`.
    ///
    /// The index of the right factor varies fastest, i.e. element
    /// `(i * p + k, j * q + l)` of the result is `self[i, j] * rhs[k, l]`,
    /// where `rhs` is `p × q`.
    pub fn kron(&self, rhs: &Self) -> Self {
        let nrows = self.nrows * rhs.nrows;
        let ncols = self.ncols * rhs.ncols;
        let mut indptr: Vec<usize> = Vec::with_capacity(nrows + 1);
        let mut indices: Vec<usize> = Vec::with_capacity(self.nnz() * rhs.nnz());
        let mut data: Vec<A> = Vec::with_capacity(self.nnz() * rhs.nnz());
        indptr.push(0);
        for (i, k) in (0..self.nrows).cartesian_product(0..rhs.nrows) {
            for (j, a) in self.row(i) {
                for (l, b) in rhs.row(k) {
                    indices.push(j * rhs.ncols + l);
                    data.push(a * b);
                }
            }
            indptr.push(indices.len());
        }
        Self { nrows, ncols, indptr, indices, data }
    }

    /// Compute the matrix product `self · rhs`.
    ///
    /// Fails if the inner dimensions do not agree.
    pub fn matmul(&self, rhs: &Self) -> SpResult<Self> {
        if self.ncols != rhs.nrows {
            return Err(IncompatibleShapes {
                op: "product",
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        let mut indptr: Vec<usize> = Vec::with_capacity(self.nrows + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<A> = Vec::new();
        // dense accumulator for a single row of the output
        let mut acc: Vec<A> = vec![A::zero(); rhs.ncols];
        let mut occupied: Vec<bool> = vec![false; rhs.ncols];
        let mut cols: Vec<usize> = Vec::new();
        indptr.push(0);
        for i in 0..self.nrows {
            for (k, a) in self.row(i) {
                for (j, b) in rhs.row(k) {
                    if !occupied[j] {
                        occupied[j] = true;
                        cols.push(j);
                    }
                    acc[j] = acc[j] + a * b;
                }
            }
            cols.sort_unstable();
            for j in cols.drain(..) {
                indices.push(j);
                data.push(acc[j]);
                acc[j] = A::zero();
                occupied[j] = false;
            }
            indptr.push(indices.len());
        }
        Ok(Self { nrows: self.nrows, ncols: rhs.ncols, indptr, indices, data })
    }

    /// Compute the matrix-vector product `self · x`.
    ///
    /// Fails if the length of `x` does not equal the number of columns.
    pub fn dot_vec(&self, x: nd::ArrayView1<A>) -> SpResult<nd::Array1<A>> {
        if x.len() != self.ncols {
            return Err(IncompatibleShapes {
                op: "matrix-vector product",
                lhs: self.shape(),
                rhs: (x.len(), 1),
            });
        }
        let y: nd::Array1<A>
            = (0..self.nrows)
            .map(|i| {
                self.row(i)
                    .fold(A::zero(), |acc, (j, a)| acc + a * x[j])
            })
            .collect();
        Ok(y)
    }

    /// Compute the product `self · x` with a dense matrix `x`.
    ///
    /// Fails if the number of rows of `x` does not equal the number of columns
    /// of `self`.
    pub fn dot_dense(&self, x: nd::ArrayView2<A>) -> SpResult<nd::Array2<A>> {
        if x.nrows() != self.ncols {
            return Err(IncompatibleShapes {
                op: "matrix-matrix product",
                lhs: self.shape(),
                rhs: x.dim(),
            });
        }
        let mut y: nd::Array2<A> = nd::Array2::zeros((self.nrows, x.ncols()));
        y.axis_iter_mut(nd::Axis(0))
            .enumerate()
            .for_each(|(i, mut yi)| {
                for (k, a) in self.row(i) {
                    yi.iter_mut()
                        .zip(x.row(k))
                        .for_each(|(yij, xkj)| { *yij = *yij + a * *xkj; });
                }
            });
        Ok(y)
    }

    /// Select the rows and columns of `self` at the given indices, in the
    /// given orders.
    ///
    /// Element `(a, b)` of the result is `self[rows[a], cols[b]]`. Rows may be
    /// repeated, but columns may not.
    ///
    /// Fails if any index is out of bounds or a column index is repeated.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> SpResult<Self> {
        if let Some(i) = rows.iter().find(|i| **i >= self.nrows) {
            return Err(SelectOutOfBounds(*i, self.nrows));
        }
        let mut colmap: Vec<Option<usize>> = vec![None; self.ncols];
        for (jnew, j) in cols.iter().enumerate() {
            match colmap.get_mut(*j) {
                Some(Some(_)) => { return Err(SelectRepeated(*j)); },
                Some(slot) => { *slot = Some(jnew); },
                None => { return Err(SelectOutOfBounds(*j, self.ncols)); },
            }
        }
        let mut indptr: Vec<usize> = Vec::with_capacity(rows.len() + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<A> = Vec::new();
        let mut buf: Vec<(usize, A)> = Vec::new();
        indptr.push(0);
        for i in rows.iter() {
            buf.extend(
                self.row(*i)
                    .filter_map(|(j, a)| colmap[j].map(|jnew| (jnew, a)))
            );
            buf.sort_unstable_by_key(|(j, _)| *j);
            buf.drain(..)
                .for_each(|(j, a)| { indices.push(j); data.push(a); });
            indptr.push(indices.len());
        }
        Ok(Self { nrows: rows.len(), ncols: cols.len(), indptr, indices, data })
    }

    /// Return `true` if `self` is square and equal to its own conjugate
    /// transpose within an absolute tolerance on every element.
    pub fn is_hermitian(&self, tol: A::Real) -> bool {
        if !self.is_square() { return false; }
        self.add(&self.adjoint().scale(-A::one()))
            .map(|diff| diff.data.iter().all(|a| a.abs() <= Float::abs(tol)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::linalg::kron;
    use num_complex::Complex64 as C64;

    fn sample() -> nd::Array2<f64> {
        nd::array![
            [1.0, 0.0, 2.0],
            [0.0, 0.0, 3.0],
            [4.0, 5.0, 0.0],
        ]
    }

    #[test]
    fn dense_conversion() {
        let a = sample();
        let sa = SpMat::from_dense(&a);
        assert_eq!(sa.nnz(), 5);
        assert_eq!(sa.to_dense(), a);
        assert_eq!(sa.get(2, 1), Some(5.0));
        assert_eq!(sa.get(1, 1), Some(0.0));
        assert_eq!(sa.get(3, 0), None);
    }

    #[test]
    fn triplets_sum_and_drop_zeros() {
        let sa: SpMat<f64> = SpMat::from_triplets(
            2, 2,
            [(1, 1, 2.0), (0, 1, 1.0), (1, 1, 3.0), (0, 0, 1.0), (0, 0, -1.0)],
        ).unwrap();
        assert_eq!(sa.nnz(), 2);
        assert_eq!(sa.to_dense(), nd::array![[0.0, 1.0], [0.0, 5.0]]);
        assert!(SpMat::<f64>::from_triplets(2, 2, [(2, 0, 1.0)]).is_err());
    }

    #[test]
    fn kron_matches_dense() {
        let a = sample();
        let b = nd::array![[0.0, 1.0], [-1.0, 2.0]];
        let skron = SpMat::from_dense(&a).kron(&SpMat::from_dense(&b));
        assert_eq!(skron.shape(), (6, 6));
        assert_eq!(skron.to_dense(), kron(&a, &b));
    }

    #[test]
    fn sum_and_product_match_dense() {
        let a = sample();
        let b = a.t().to_owned() * 2.0;
        let sa = SpMat::from_dense(&a);
        let sb = SpMat::from_dense(&b);
        assert_eq!(sa.add(&sb).unwrap().to_dense(), &a + &b);
        assert_eq!(sa.matmul(&sb).unwrap().to_dense(), a.dot(&b));
        assert!(sa.add(&SpMat::eye(2)).is_err());
        assert!(sa.matmul(&SpMat::eye(2)).is_err());
    }

    #[test]
    fn products_with_dense() {
        let a = sample();
        let sa = SpMat::from_dense(&a);
        let x = nd::array![1.0, -1.0, 0.5];
        assert_eq!(sa.dot_vec(x.view()).unwrap(), a.dot(&x));
        let y = nd::array![[1.0, 2.0], [0.0, 1.0], [-1.0, 3.0]];
        assert_eq!(sa.dot_dense(y.view()).unwrap(), a.dot(&y));
        assert_eq!(sa.dot_dense(y.t()).is_err(), true);
    }

    #[test]
    fn adjoint_conjugates() {
        let a: nd::Array2<C64> = nd::array![
            [C64::new(1.0, 0.0), C64::new(0.0, 2.0)],
            [C64::new(3.0, -1.0), C64::new(0.0, 0.0)],
        ];
        let sa = SpMat::from_dense(&a);
        let expected = a.t().mapv(|z| z.conj());
        assert_eq!(sa.adjoint().to_dense(), expected);
        assert_eq!(sa.transpose().to_dense(), a.t().to_owned());
        assert!(!sa.is_hermitian(1e-12));
        let herm = sa.add(&sa.adjoint()).unwrap();
        assert!(herm.is_hermitian(1e-12));
    }

    #[test]
    fn fancy_selection() {
        let a = sample();
        let sa = SpMat::from_dense(&a);
        let sel = sa.select(&[2, 0], &[2, 0]).unwrap();
        assert_eq!(sel.to_dense(), nd::array![[0.0, 4.0], [2.0, 1.0]]);
        let rect = sa.select(&[1], &[0, 1, 2]).unwrap();
        assert_eq!(rect.to_dense(), nd::array![[0.0, 0.0, 3.0]]);
        assert!(sa.select(&[3], &[0]).is_err());
        assert!(sa.select(&[0], &[1, 1]).is_err());
    }

    #[test]
    fn identity_and_scale() {
        let id: SpMat<f64> = SpMat::eye(3);
        let a = SpMat::from_dense(&sample());
        let prod = id.matmul(&a).unwrap().matmul(&id).unwrap();
        assert_eq!(prod, a);
        let scaled = a.scale(0.5).to_dense();
        assert_abs_diff_eq!(scaled[[2, 1]], 2.5);
    }
}
