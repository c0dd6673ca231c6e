use ndarray::prelude::*;

use super::{weighted_mean, SampleLoss};
use crate::direct::{brentq, median};
use crate::error::{GlmError, Result};

/// Huber loss of a residual
///
/// ```math
/// h_k(r) = \begin{cases} r^2/2 & |r| \leq k \\ k(|r| - k/2) & |r| > k \end{cases}
/// ```
#[inline]
pub fn huber_loss(r: f64, knot: f64) -> f64 {
    let r_abs = r.abs();
    if r_abs <= knot {
        0.5 * r * r
    } else {
        knot * (r_abs - 0.5 * knot)
    }
}

/// $`h_k'(r)`$, the residual clipped to $`[-k, k]`$
#[inline]
pub fn huber_grad(r: f64, knot: f64) -> f64 {
    if r.abs() <= knot {
        r
    } else {
        knot * r.signum()
    }
}

/// The Huberized Mean
///
/// Location $`m`$ solving $`\sum_i w_i h_k'(m - v_i) = 0`$. The score is
/// non-decreasing in $`m`$, so the root is searched between the mean and the
/// median first, then between the extreme values, which always bracket it.
pub fn huberized_mean(
    values: ArrayView1<f64>,
    knot: f64,
    sample_weight: Option<ArrayView1<f64>>,
) -> Result<f64> {
    let (lo, hi) = match (values.iter().cloned().reduce(f64::min), values.iter().cloned().reduce(f64::max)) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return Err(GlmError::Numerical("huberized mean of no values".into())),
    };
    let score = |m: f64| weighted_mean(values.mapv(|v| huber_grad(m - v, knot)).view(), sample_weight);

    let avg = weighted_mean(values, sample_weight);
    let med = values
        .as_slice()
        .map_or_else(|| median(&values.to_vec()), median)
        .unwrap_or(avg);
    let (a, b) = (avg.min(med), avg.max(med));
    let (score_a, score_b) = (score(a), score(b));
    if score_a == 0. {
        return Ok(a);
    }
    if score_b == 0. {
        return Ok(b);
    }
    let xtol = 1e-12 * (1. + hi.abs().max(lo.abs()));
    if score_a < 0. && score_b > 0. {
        brentq(score, a, b, xtol, 500)
    } else {
        brentq(score, lo, hi, xtol, 500)
    }
}

/// Huber regression loss, $`\ell(z, y) = h_k(z - y)`$
#[derive(Debug, Clone, Copy)]
pub struct Huber {
    knot: f64,
}

impl Huber {
    pub fn new(knot: f64) -> Result<Self> {
        if !(knot > 0.) || !knot.is_finite() {
            return Err(GlmError::config(format!(
                "huber knot must be positive, got {}",
                knot
            )));
        }
        Ok(Huber { knot })
    }

    pub fn knot(&self) -> f64 {
        self.knot
    }
}

impl Default for Huber {
    fn default() -> Self {
        Huber { knot: 1.35 }
    }
}

impl SampleLoss for Huber {
    fn name(&self) -> &'static str {
        "Huber"
    }

    fn loss(&self, z: f64, y: f64) -> f64 {
        huber_loss(z - y, self.knot)
    }

    fn grad(&self, z: f64, y: f64) -> f64 {
        huber_grad(z - y, self.knot)
    }

    fn curvature(&self) -> Option<f64> {
        Some(1.)
    }

    fn intercept_at_coef_eq0(
        &self,
        y: ArrayView1<f64>,
        sample_weight: Option<ArrayView1<f64>>,
    ) -> Result<f64> {
        huberized_mean(y, self.knot, sample_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn huber_pieces() {
        assert_abs_diff_eq!(huber_loss(0.5, 1.), 0.125);
        assert_abs_diff_eq!(huber_loss(3., 1.), 2.5);
        assert_abs_diff_eq!(huber_loss(-3., 1.), 2.5);
        assert_abs_diff_eq!(huber_grad(0.5, 1.), 0.5);
        assert_abs_diff_eq!(huber_grad(-3., 1.), -1.);
        // continuous at the knot
        assert_abs_diff_eq!(huber_loss(1., 1.), 0.5);
        assert_abs_diff_eq!(huber_loss(1. + 1e-12, 1.), 0.5, epsilon = 1e-10);
    }

    #[test]
    fn huber_is_squared_error_inside_knot() {
        let huber = Huber::new(2.).unwrap();
        let z = array![[0.3], [1.], [-4.]];
        let y = array![[0.], [2.], [1.]];
        assert_abs_diff_eq!(
            huber.sample_losses(z.view(), y.view()),
            array![0.045, 0.5, 8.]
        );
        assert_abs_diff_eq!(
            huber.sample_grads(z.view(), y.view()),
            array![[0.3], [-1.], [-2.]]
        );
    }

    #[test]
    fn huberized_mean_resists_outliers() {
        let values = array![0., 0., 10.];
        let m = huberized_mean(values.view(), 1., None).unwrap();
        // score(m) = (2*min(m, 1) - 1) / 3 = 0 with m < 1
        assert_abs_diff_eq!(m, 0.5, epsilon = 1e-9);
        assert!(m < 10. / 3.);
    }

    #[test]
    fn huberized_mean_of_symmetric_data_is_the_mean() {
        let values = array![-2., -1., 0., 1., 2.];
        let m = huberized_mean(values.view(), 1.35, None).unwrap();
        assert_abs_diff_eq!(m, 0., epsilon = 1e-10);
    }

    #[test]
    fn huberized_mean_large_knot_is_mean() {
        let values = array![1., 2., 6., 7.5];
        let w = array![1., 3., 1., 0.5];
        let m = huberized_mean(values.view(), 100., Some(w.view())).unwrap();
        assert_abs_diff_eq!(m, weighted_mean(values.view(), Some(w.view())), epsilon = 1e-9);
    }

    #[test]
    fn huberized_mean_constant() {
        let values = array![4., 4., 4.];
        assert_abs_diff_eq!(huberized_mean(values.view(), 1., None).unwrap(), 4.);
    }

    #[test]
    fn invalid_knot() {
        assert!(Huber::new(-1.).is_err());
        assert!(Huber::new(f64::NAN).is_err());
    }
}
