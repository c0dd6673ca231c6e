use nalgebra::DMatrix;
use ndarray::prelude::*;

use crate::error::{GlmError, Result};
use crate::func::Function;

pub(crate) fn to_dmatrix(x: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[[i, j]])
}

/// Largest singular value
pub fn spectral_norm(x: ArrayView2<f64>) -> f64 {
    if x.is_empty() {
        return 0.;
    }
    to_dmatrix(x).singular_values().max()
}

/// Sum of the singular values of the coefficient matrix
#[derive(Debug, Clone)]
pub struct NuclearNorm {
    pen_val: f64,
    shape: (usize, usize),
}

impl NuclearNorm {
    #[must_use]
    pub fn new(pen_val: f64, shape: (usize, usize)) -> Self {
        NuclearNorm { pen_val, shape }
    }
}

impl Function for NuclearNorm {
    fn name(&self) -> &'static str {
        "NuclearNorm"
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        if x.is_empty() {
            return 0.;
        }
        self.pen_val * to_dmatrix(x).singular_values().sum()
    }

    fn is_smooth(&self) -> bool {
        false
    }

    fn is_proximable(&self) -> bool {
        true
    }

    /// Soft-thresholds the singular values
    fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
        if x.is_empty() {
            return Ok(x.to_owned());
        }
        let t = step * self.pen_val;
        let mut svd = to_dmatrix(x).svd(true, true);
        svd.singular_values.apply(|s| *s = (*s - t).max(0.));
        let m = svd
            .recompose()
            .map_err(|e| GlmError::Numerical(e.to_string()))?;
        Ok(Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn diagonal_singular_values() {
        let pen = NuclearNorm::new(0.5, (3, 2));
        let x = array![[3., 0.], [0., -1.], [0., 0.]];
        assert_abs_diff_eq!(pen.value(x.view()), 2., epsilon = 1e-12);
        assert_abs_diff_eq!(spectral_norm(x.view()), 3., epsilon = 1e-12);

        // threshold 1.5 keeps only the leading direction
        let out = pen.prox(x.view(), 3.).unwrap();
        assert_abs_diff_eq!(out, array![[1.5, 0.], [0., 0.], [0., 0.]], epsilon = 1e-10);
    }

    #[test]
    fn prox_reduces_rank() {
        let u = array![[1.], [2.], [2.]] / 3.;
        let v = array![[0.6, 0.8]];
        let x = u.dot(&v) * 4. + array![[0.01, 0.], [0., 0.], [0., -0.01]];
        let pen = NuclearNorm::new(1., (3, 2));
        let out = pen.prox(x.view(), 1.).unwrap();
        assert_abs_diff_eq!(spectral_norm(out.view()), spectral_norm(x.view()) - 1., epsilon = 1e-8);
        // the small second singular value is removed
        let sv = to_dmatrix(out.view()).singular_values();
        assert_abs_diff_eq!(sv.min(), 0., epsilon = 1e-10);
    }
}
