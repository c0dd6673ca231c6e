use ndarray::prelude::*;

use super::{weighted_mean, SampleLoss};
use crate::error::Result;

/// $`\log(1 + e^z)`$ without overflow
#[inline]
fn softplus(z: f64) -> f64 {
    z.max(0.) + (-z.abs()).exp().ln_1p()
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0. {
        1. / (1. + (-z).exp())
    } else {
        let e = z.exp();
        e / (1. + e)
    }
}

/// Logistic regression loss for $`y \in [0, 1]`$
///
/// ```math
/// \ell(z, y) = \log(1 + e^z) - y z
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logistic;

impl SampleLoss for Logistic {
    fn name(&self) -> &'static str {
        "Logistic"
    }

    fn loss(&self, z: f64, y: f64) -> f64 {
        softplus(z) - y * z
    }

    fn grad(&self, z: f64, y: f64) -> f64 {
        sigmoid(z) - y
    }

    fn curvature(&self) -> Option<f64> {
        Some(0.25)
    }

    /// $`\mathrm{logit}(\bar{y})`$, with $`\bar{y}`$ kept away from 0 and 1
    fn intercept_at_coef_eq0(
        &self,
        y: ArrayView1<f64>,
        sample_weight: Option<ArrayView1<f64>>,
    ) -> Result<f64> {
        let p = weighted_mean(y, sample_weight).max(1e-10).min(1. - 1e-10);
        Ok((p / (1. - p)).ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn logistic_formulas() {
        let z = array![[0.], [800.], [-800.]];
        let y = array![[1.], [1.], [0.]];
        assert_abs_diff_eq!(
            Logistic.sample_losses(z.view(), y.view()),
            array![2f64.ln(), 0., 0.],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            Logistic.sample_grads(z.view(), y.view()),
            array![[-0.5], [0.], [0.]],
            epsilon = 1e-12
        );
    }

    #[test]
    fn logit_of_mean() {
        let y = array![1., 0., 0., 0.];
        let b0 = Logistic.intercept_at_coef_eq0(y.view(), None).unwrap();
        assert_abs_diff_eq!(sigmoid(b0), 0.25, epsilon = 1e-12);
        let ones = array![1., 1.];
        assert!(Logistic.intercept_at_coef_eq0(ones.view(), None).unwrap().is_finite());
    }
}
