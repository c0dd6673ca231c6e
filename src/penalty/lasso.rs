use ndarray::prelude::*;

use crate::error::{GlmError, Result};
use crate::func::Function;

/// $`\mathrm{sign}(v)\max(|v| - t, 0)`$
#[inline]
pub fn soft_thresh(v: f64, t: f64) -> f64 {
    v.signum() * (v.abs() - t).max(0.)
}

/// Entrywise (weighted) L1 norm of the coefficients
///
/// With weights, row $`j`$ is scaled by $`w_j`$; a zero weight leaves the row
/// unpenalized.
#[derive(Debug, Clone)]
pub struct Lasso {
    pen_val: f64,
    weights: Option<Array1<f64>>,
    shape: (usize, usize),
}

impl Lasso {
    #[must_use]
    pub fn new(pen_val: f64, weights: Option<Array1<f64>>, shape: (usize, usize)) -> Self {
        Lasso {
            pen_val,
            weights,
            shape,
        }
    }

    fn row_weight(&self, j: usize) -> f64 {
        self.weights.as_ref().map_or(1., |w| w[j])
    }
}

impl Function for Lasso {
    fn name(&self) -> &'static str {
        "Lasso"
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        let total: f64 = x
            .rows()
            .into_iter()
            .enumerate()
            .map(|(j, row)| self.row_weight(j) * row.iter().map(|v| v.abs()).sum::<f64>())
            .sum();
        self.pen_val * total
    }

    fn is_smooth(&self) -> bool {
        false
    }

    fn is_proximable(&self) -> bool {
        true
    }

    fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
        let mut out = x.to_owned();
        for (j, mut row) in out.rows_mut().into_iter().enumerate() {
            let t = step * self.pen_val * self.row_weight(j);
            row.mapv_inplace(|v| soft_thresh(v, t));
        }
        Ok(out)
    }
}

/// Sum of weighted Frobenius norms of disjoint groups of rows
///
/// Rows outside every group are not penalized. A multi-task lasso is the
/// special case where every row is its own group.
#[derive(Debug, Clone)]
pub struct GroupLasso {
    pen_val: f64,
    groups: Vec<Vec<usize>>,
    weights: Array1<f64>,
    shape: (usize, usize),
}

/// `weights`, or $`\sqrt{|g|}`$ per group
pub fn group_weights(groups: &[Vec<usize>], weights: Option<&Array1<f64>>) -> Result<Array1<f64>> {
    match weights {
        Some(w) if w.len() != groups.len() => Err(GlmError::Shape(format!(
            "group weights have length {} but there are {} groups",
            w.len(),
            groups.len()
        ))),
        Some(w) => Ok(w.clone()),
        None => Ok(groups.iter().map(|g| (g.len() as f64).sqrt()).collect()),
    }
}

/// Frobenius norm of the rows of `x` listed in `group`
pub(crate) fn group_norm(x: ArrayView2<f64>, group: &[usize]) -> f64 {
    group
        .iter()
        .map(|&j| x.row(j).dot(&x.row(j)))
        .sum::<f64>()
        .sqrt()
}

impl GroupLasso {
    pub fn new(
        pen_val: f64,
        groups: Vec<Vec<usize>>,
        weights: Option<Array1<f64>>,
        shape: (usize, usize),
    ) -> Result<Self> {
        let mut seen = vec![false; shape.0];
        for &j in groups.iter().flatten() {
            match seen.get_mut(j) {
                None => {
                    return Err(GlmError::Shape(format!(
                        "group index {} out of range for {} features",
                        j, shape.0
                    )))
                }
                Some(true) => {
                    return Err(GlmError::config(format!(
                        "feature {} belongs to more than one group",
                        j
                    )))
                }
                Some(s) => *s = true,
            }
        }
        let weights = group_weights(&groups, weights.as_ref())?;
        Ok(GroupLasso {
            pen_val,
            groups,
            weights,
            shape,
        })
    }

    /// One group per row, weighted by `weights` (default 1)
    #[must_use]
    pub fn rows(pen_val: f64, weights: Option<Array1<f64>>, shape: (usize, usize)) -> Self {
        GroupLasso {
            pen_val,
            groups: (0..shape.0).map(|j| vec![j]).collect(),
            weights: weights.unwrap_or_else(|| Array1::ones(shape.0)),
            shape,
        }
    }
}

impl Function for GroupLasso {
    fn name(&self) -> &'static str {
        "GroupLasso"
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        let total: f64 = self
            .groups
            .iter()
            .zip(self.weights.iter())
            .map(|(g, &w)| w * group_norm(x, g))
            .sum();
        self.pen_val * total
    }

    fn is_smooth(&self) -> bool {
        false
    }

    fn is_proximable(&self) -> bool {
        true
    }

    fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
        let mut out = x.to_owned();
        for (g, &w) in self.groups.iter().zip(self.weights.iter()) {
            let norm = group_norm(x, g);
            let scale = if norm > 0. {
                (1. - step * self.pen_val * w / norm).max(0.)
            } else {
                0.
            };
            for &j in g {
                out.row_mut(j).mapv_inplace(|v| v * scale);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn soft_threshold_vector() {
        let lasso = Lasso::new(1., None, (3, 1));
        let x = array![[3.], [-2.], [0.5]];
        assert_abs_diff_eq!(lasso.prox(x.view(), 1.).unwrap(), array![[2.], [-1.], [0.]]);
        assert_abs_diff_eq!(lasso.value(x.view()), 5.5);
    }

    #[test]
    fn weighted_rows() {
        let lasso = Lasso::new(2., Some(array![0., 1., 0.5]), (3, 2));
        let x = array![[5., -5.], [1., -3.], [1., 2.]];
        // thresholds 0, 1, 0.5 at step 0.5
        assert_abs_diff_eq!(
            lasso.prox(x.view(), 0.5).unwrap(),
            array![[5., -5.], [0., -2.], [0.5, 1.5]]
        );
        assert_abs_diff_eq!(lasso.value(x.view()), 2. * (4. + 1.5));
    }

    #[test]
    fn group_prox_shrinks_whole_groups() {
        let pen = GroupLasso::new(1., vec![vec![0, 1], vec![2]], Some(array![1., 1.]), (4, 1)).unwrap();
        let x = array![[3.], [4.], [0.5], [7.]];
        let out = pen.prox(x.view(), 1.).unwrap();
        // norm 5 shrinks by 1/5, norm 0.5 vanishes, row 3 is unpenalized
        assert_abs_diff_eq!(out, array![[2.4], [3.2], [0.], [7.]], epsilon = 1e-12);
        assert_abs_diff_eq!(pen.value(x.view()), 5.5);
    }

    #[test]
    fn group_default_weights() {
        let pen = GroupLasso::new(1., vec![vec![0, 1, 2, 3]], None, (4, 1)).unwrap();
        let x = array![[1.], [1.], [1.], [1.]];
        assert_abs_diff_eq!(pen.value(x.view()), 4.);
    }

    #[test]
    fn group_validation() {
        assert!(matches!(
            GroupLasso::new(1., vec![vec![0, 5]], None, (3, 1)),
            Err(GlmError::Shape(_))
        ));
        assert!(matches!(
            GroupLasso::new(1., vec![vec![0, 1], vec![1]], None, (3, 1)),
            Err(GlmError::Configuration(_))
        ));
        assert!(matches!(
            GroupLasso::new(1., vec![vec![0], vec![1]], Some(array![1.]), (3, 1)),
            Err(GlmError::Shape(_))
        ));
    }

    #[test]
    fn multi_task_rows() {
        let pen = GroupLasso::rows(1., None, (2, 2));
        let x = array![[3., 4.], [0.6, 0.8]];
        let out = pen.prox(x.view(), 2.).unwrap();
        assert_abs_diff_eq!(out, array![[1.8, 2.4], [0., 0.]], epsilon = 1e-12);
        assert_abs_diff_eq!(pen.value(x.view()), 6.);
    }
}
