use ndarray::prelude::*;

use super::{weighted_mean, SampleLoss};
use crate::error::Result;

/// Squared error, $`\ell(z, y) = \frac12 (z - y)^2`$
#[derive(Debug, Clone, Copy, Default)]
pub struct LinReg;

impl SampleLoss for LinReg {
    fn name(&self) -> &'static str {
        "LinReg"
    }

    fn loss(&self, z: f64, y: f64) -> f64 {
        0.5 * (z - y).powi(2)
    }

    fn grad(&self, z: f64, y: f64) -> f64 {
        z - y
    }

    fn curvature(&self) -> Option<f64> {
        Some(1.)
    }

    fn intercept_at_coef_eq0(
        &self,
        y: ArrayView1<f64>,
        sample_weight: Option<ArrayView1<f64>>,
    ) -> Result<f64> {
        Ok(weighted_mean(y, sample_weight))
    }
}
