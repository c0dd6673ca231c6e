use ndarray::prelude::*;

use super::{weighted_mean, SampleLoss};
use crate::error::Result;

/// Poisson regression loss with a negative log link
///
/// ```math
/// \ell(z, y) = e^{-z} - y z
/// ```
/// The derivative reported by [`SampleLoss::grad`] is $`y - e^{-z}`$, which
/// puts the coefficient gradient at $`\frac1n X^T (y - e^{-z})`$. Both
/// conventions are kept as they are used by existing fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poisson;

impl SampleLoss for Poisson {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    fn loss(&self, z: f64, y: f64) -> f64 {
        (-z).exp() - y * z
    }

    fn grad(&self, z: f64, y: f64) -> f64 {
        y - (-z).exp()
    }

    fn curvature(&self) -> Option<f64> {
        None
    }

    /// Stationary point of the intercept, $`e^{-\beta_0} = \bar{y}`$
    fn intercept_at_coef_eq0(
        &self,
        y: ArrayView1<f64>,
        sample_weight: Option<ArrayView1<f64>>,
    ) -> Result<f64> {
        let y_bar = weighted_mean(y, sample_weight);
        Ok(if y_bar > 0. { -y_bar.ln() } else { 0. })
    }
}
