use ndarray::prelude::*;

use crate::error::{GlmError, Result};
use crate::func::Function;
use crate::linop::gram_norm;

/// Smooth squared-norm penalty
///
/// Either $`\frac\lambda2 \sum_j w_j \|b_j\|_2^2`$ (plain ridge when `weights`
/// is `None`) or the generalized $`\frac\lambda2 \|TB\|_F^2`$ for a Tikhonov
/// operator $`T`$ with `n_features` columns.
#[derive(Debug, Clone)]
pub struct Ridge {
    pen_val: f64,
    weights: Option<Array1<f64>>,
    tikhonov: Option<Array2<f64>>,
    shape: (usize, usize),
    lip: f64,
}

impl Ridge {
    pub fn new(
        pen_val: f64,
        weights: Option<Array1<f64>>,
        tikhonov: Option<Array2<f64>>,
        shape: (usize, usize),
    ) -> Result<Self> {
        let lip = match (&weights, &tikhonov) {
            (Some(_), Some(_)) => {
                return Err(GlmError::config(
                    "ridge weights and a tikhonov operator cannot both be provided",
                ))
            }
            (Some(w), None) => {
                if w.len() != shape.0 {
                    return Err(GlmError::Shape(format!(
                        "ridge weights have length {} but there are {}",
                        w.len(),
                        shape.0
                    )));
                }
                pen_val * w.iter().cloned().fold(0., f64::max)
            }
            (None, Some(t)) => {
                if t.ncols() != shape.0 {
                    return Err(GlmError::Shape(format!(
                        "tikhonov operator has {} columns but there are {} features",
                        t.ncols(),
                        shape.0
                    )));
                }
                pen_val * gram_norm(t, false, None)?
            }
            (None, None) => pen_val,
        };
        Ok(Ridge {
            pen_val,
            weights,
            tikhonov,
            shape,
            lip,
        })
    }
}

impl Function for Ridge {
    fn name(&self) -> &'static str {
        "Ridge"
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        let sq = match (&self.weights, &self.tikhonov) {
            (_, Some(t)) => t.dot(&x).mapv(|v| v * v).sum(),
            (Some(w), None) => x
                .rows()
                .into_iter()
                .zip(w.iter())
                .map(|(row, &wj)| wj * row.dot(&row))
                .sum(),
            (None, None) => x.iter().map(|v| v * v).sum(),
        };
        0.5 * self.pen_val * sq
    }

    fn is_smooth(&self) -> bool {
        true
    }

    fn grad_lip(&self) -> Option<f64> {
        Some(self.lip)
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let grad = match (&self.weights, &self.tikhonov) {
            (_, Some(t)) => t.t().dot(&t.dot(&x)),
            (Some(w), None) => &x * &w.view().insert_axis(Axis(1)),
            (None, None) => x.to_owned(),
        };
        Ok(grad * self.pen_val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn plain_and_weighted() {
        let x = array![[1., 2.], [-1., 0.]];
        let ridge = Ridge::new(2., None, None, (2, 2)).unwrap();
        assert_abs_diff_eq!(ridge.value(x.view()), 6.);
        assert_abs_diff_eq!(ridge.gradient(x.view()).unwrap(), &x * 2.);
        assert_eq!(ridge.grad_lip(), Some(2.));

        let ridge = Ridge::new(2., Some(array![0.5, 3.]), None, (2, 2)).unwrap();
        assert_abs_diff_eq!(ridge.value(x.view()), 2.5 + 3.);
        assert_abs_diff_eq!(ridge.gradient(x.view()).unwrap(), array![[1., 2.], [-6., 0.]]);
        assert_eq!(ridge.grad_lip(), Some(6.));
    }

    #[test]
    fn tikhonov_difference_operator() {
        // first differences of a 3-vector
        let t = array![[1., -1., 0.], [0., 1., -1.]];
        let ridge = Ridge::new(1., None, Some(t), (3, 1)).unwrap();
        let x = array![[1.], [3.], [0.]];
        assert_abs_diff_eq!(ridge.value(x.view()), 0.5 * (4. + 9.));
        assert_abs_diff_eq!(ridge.gradient(x.view()).unwrap(), array![[-2.], [5.], [-3.]]);
        // eigenvalues of T^T T are 0, 1 and 3
        assert_abs_diff_eq!(ridge.grad_lip().unwrap(), 3., epsilon = 1e-6);
        let constant = array![[2.], [2.], [2.]];
        assert_abs_diff_eq!(ridge.value(constant.view()), 0.);
    }

    #[test]
    fn shape_checks() {
        assert!(matches!(
            Ridge::new(1., Some(array![1.]), None, (2, 1)),
            Err(GlmError::Shape(_))
        ));
        assert!(matches!(
            Ridge::new(1., None, Some(Array2::eye(3)), (2, 1)),
            Err(GlmError::Shape(_))
        ));
    }
}
