//! Design Matrices as Linear Operators and their Adjoints
//!
//! Losses only ever touch the design matrix $`X`$ through the products
//! $`XB`$ and $`X^TR`$ (and single columns, for coordinate descent), so dense
//! and column-sparse storage are interchangeable behind [`DesignMatrix`].

use ndarray::prelude::*;
use ndarray::Data;
use linfa_linalg::eigh::EigValshInto;
use sprs::CsMat;

use crate::error::{GlmError, Result};

/// A read-only `n_samples × n_features` matrix
pub trait DesignMatrix {
    fn n_samples(&self) -> usize;
    fn n_features(&self) -> usize;

    /// $`XB`$ for `b` of shape `(n_features, k)`
    fn apply(&self, b: ArrayView2<f64>) -> Array2<f64>;

    /// $`X^TR`$ for `r` of shape `(n_samples, k)`
    fn apply_adj(&self, r: ArrayView2<f64>) -> Array2<f64>;

    /// $`\langle x_j, v \rangle`$
    fn col_dot(&self, j: usize, v: ArrayView1<f64>) -> f64;

    /// $`v \leftarrow v + \alpha x_j`$
    fn col_axpy(&self, j: usize, alpha: f64, v: ArrayViewMut1<f64>);

    fn col_sq_norm(&self, j: usize) -> f64;

    fn col_norms(&self) -> Array1<f64> {
        (0..self.n_features())
            .map(|j| self.col_sq_norm(j).sqrt())
            .collect()
    }
}

impl<S> DesignMatrix for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn n_features(&self) -> usize {
        self.ncols()
    }

    fn apply(&self, b: ArrayView2<f64>) -> Array2<f64> {
        self.dot(&b)
    }

    fn apply_adj(&self, r: ArrayView2<f64>) -> Array2<f64> {
        self.t().dot(&r)
    }

    fn col_dot(&self, j: usize, v: ArrayView1<f64>) -> f64 {
        self.column(j).dot(&v)
    }

    fn col_axpy(&self, j: usize, alpha: f64, mut v: ArrayViewMut1<f64>) {
        v.scaled_add(alpha, &self.column(j));
    }

    fn col_sq_norm(&self, j: usize) -> f64 {
        let col = self.column(j);
        col.dot(&col)
    }
}

/// Compressed sparse column design matrix
#[derive(Debug, Clone)]
pub struct ColumnSparse {
    mat: CsMat<f64>,
}

impl ColumnSparse {
    /// Takes ownership of `mat`, converting CSR input to CSC once
    #[must_use]
    pub fn new(mat: CsMat<f64>) -> ColumnSparse {
        let mat = if mat.is_csc() { mat } else { mat.to_csc() };
        ColumnSparse { mat }
    }

    #[must_use]
    pub fn inner(&self) -> &CsMat<f64> {
        &self.mat
    }
}

impl From<CsMat<f64>> for ColumnSparse {
    fn from(mat: CsMat<f64>) -> Self {
        ColumnSparse::new(mat)
    }
}

impl DesignMatrix for ColumnSparse {
    fn n_samples(&self) -> usize {
        self.mat.rows()
    }

    fn n_features(&self) -> usize {
        self.mat.cols()
    }

    fn apply(&self, b: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_samples(), b.ncols()));
        for (j, col) in self.mat.outer_iterator().enumerate() {
            let b_j = b.row(j);
            for (i, &v) in col.iter() {
                out.row_mut(i).scaled_add(v, &b_j);
            }
        }
        out
    }

    fn apply_adj(&self, r: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_features(), r.ncols()));
        for (j, col) in self.mat.outer_iterator().enumerate() {
            let mut out_j = out.row_mut(j);
            for (i, &v) in col.iter() {
                out_j.scaled_add(v, &r.row(i));
            }
        }
        out
    }

    fn col_dot(&self, j: usize, v: ArrayView1<f64>) -> f64 {
        self.mat
            .outer_view(j)
            .map_or(0., |col| col.iter().map(|(i, &x)| x * v[i]).sum())
    }

    fn col_axpy(&self, j: usize, alpha: f64, mut v: ArrayViewMut1<f64>) {
        if let Some(col) = self.mat.outer_view(j) {
            for (i, &x) in col.iter() {
                v[i] += alpha * x;
            }
        }
    }

    fn col_sq_norm(&self, j: usize) -> f64 {
        self.mat
            .outer_view(j)
            .map_or(0., |col| col.iter().map(|(_, &x)| x * x).sum())
    }
}

/// $`\tilde{X}b`$ where $`\tilde{X} = [\mathbf{1}\ X]`$ when `intercept` is set
///
/// `b` has `intercept + n_features` rows; row 0 is the intercept.
pub fn apply_with_intercept<M>(x: &M, b: ArrayView2<f64>, intercept: bool) -> Array2<f64>
where
    M: DesignMatrix + ?Sized,
{
    if intercept {
        let mut z = x.apply(b.slice(s![1.., ..]));
        z += &b.row(0);
        z
    } else {
        x.apply(b)
    }
}

/// $`\tilde{X}^T r`$, the adjoint of [`apply_with_intercept`]
pub fn adj_with_intercept<M>(x: &M, r: ArrayView2<f64>, intercept: bool) -> Array2<f64>
where
    M: DesignMatrix + ?Sized,
{
    if intercept {
        let coef_part = x.apply_adj(r);
        let mut out = Array2::zeros((coef_part.nrows() + 1, r.ncols()));
        out.row_mut(0).assign(&r.sum_axis(Axis(0)));
        out.slice_mut(s![1.., ..]).assign(&coef_part);
        out
    } else {
        x.apply_adj(r)
    }
}

/// Largest eigenvalue of $`\tilde{X}^T W \tilde{X}`$
///
/// The Gram matrix is formed from products with the identity and its
/// spectrum computed exactly, so the result bounds the curvature of the
/// least-squares loss from above.
pub fn gram_norm<M>(x: &M, intercept: bool, sample_weight: Option<ArrayView1<f64>>) -> Result<f64>
where
    M: DesignMatrix + ?Sized,
{
    let dim = x.n_features() + usize::from(intercept);
    if dim == 0 || x.n_samples() == 0 {
        return Ok(0.);
    }
    let xt = apply_with_intercept(x, Array2::eye(dim).view(), intercept);
    let gram = match sample_weight {
        Some(w) => xt.t().dot(&(&xt * &w.insert_axis(Axis(1)))),
        None => xt.t().dot(&xt),
    };
    let eigvals = gram
        .eigvalsh_into()
        .map_err(|e| GlmError::Numerical(format!("gram matrix eigenvalues: {}", e)))?;
    Ok(eigvals.fold(0., |m, &v| v.max(m)))
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dense_and_sparse() -> (Array2<f64>, ColumnSparse) {
        let A = array![[1., 0., 2.], [0., 3., 0.], [4., 0., 5.], [0., 0., 6.]];
        // CSR on purpose, the constructor converts it
        let S = CsMat::new(
            (4, 3),
            vec![0, 2, 3, 5, 6],
            vec![0, 2, 1, 0, 2, 2],
            vec![1., 2., 3., 4., 5., 6.],
        );
        (A, ColumnSparse::new(S))
    }

    #[test]
    fn sparse_matches_dense() {
        let (A, S) = dense_and_sparse();
        let B = array![[1., -1.], [2., 0.5], [-3., 1.]];
        let R = array![[1., 0.], [0., 1.], [2., -1.], [1., 1.]];
        assert_abs_diff_eq!(S.apply(B.view()), A.apply(B.view()));
        assert_abs_diff_eq!(S.apply_adj(R.view()), A.apply_adj(R.view()));
        assert_abs_diff_eq!(S.col_norms(), A.col_norms());
        let v = array![1., 2., 3., 4.];
        for j in 0..3 {
            assert_abs_diff_eq!(S.col_dot(j, v.view()), A.col_dot(j, v.view()));
        }
        let mut u = Array1::zeros(4);
        S.col_axpy(2, 2., u.view_mut());
        assert_abs_diff_eq!(u, array![4., 0., 10., 12.]);
    }

    #[test]
    fn intercept_adjoint() {
        let (A, _) = dense_and_sparse();
        let b = array![[1.], [1.], [0.], [2.]];
        let z = apply_with_intercept(&A, b.view(), true);
        assert_abs_diff_eq!(z, array![[6.], [1.], [12.], [13.]]);

        // <X~ b, r> == <b, X~^T r>
        let r = array![[1.], [-1.], [0.5], [2.]];
        let lhs = (&z * &r).sum();
        let rhs = (&b * &adj_with_intercept(&A, r.view(), true)).sum();
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
    }

    #[test]
    fn gram_norm_diagonal() {
        let A = array![[10., 0.], [0., 20.]];
        let L = gram_norm(&A, false, None).unwrap();
        assert_abs_diff_eq!(L, 400., epsilon = 1e-9);

        let w = array![1., 0.25];
        let L = gram_norm(&A, false, Some(w.view())).unwrap();
        assert_abs_diff_eq!(L, 100., epsilon = 1e-9);
    }

    #[test]
    fn gram_norm_finds_the_top_eigenvalue() {
        // X^T X has eigenvalues 100 and 1, the top eigenvector is (1, -2)/sqrt(5)
        let A = array![[2.8, -3.6], [-3.6, 8.2]];
        assert_abs_diff_eq!(gram_norm(&A, false, None).unwrap(), 100., epsilon = 1e-9);

        // a first difference operator, whose null space holds the constant vector
        let D = array![[1., -1., 0.], [0., 1., -1.]];
        assert_abs_diff_eq!(gram_norm(&D, false, None).unwrap(), 3., epsilon = 1e-12);

        let (dense, sparse) = dense_and_sparse();
        let w = array![1., 2., 0.5, 0.];
        let expected = {
            let mut xt = Array2::ones((4, 4));
            xt.slice_mut(s![.., 1..]).assign(&dense);
            let scaled = &xt * &w.mapv(f64::sqrt).insert_axis(Axis(1));
            crate::penalty::spectral_norm(scaled.view()).powi(2)
        };
        let L = gram_norm(&sparse, true, Some(w.view())).unwrap();
        assert_abs_diff_eq!(L, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(gram_norm(&dense, true, Some(w.view())).unwrap(), L, epsilon = 1e-9);
    }
}
