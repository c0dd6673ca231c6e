//! Convex constraint sets, as indicator functions
//!
//! The value is 0 on the set and `+inf` off it, and the proximal operator is
//! the Euclidean projection (independent of the step).

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{GlmError, Result};
use crate::func::Function;

/// Which set the coefficients are constrained to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintConfig {
    /// Every coefficient is non-negative
    Positive,
    /// `lower <= b_jk <= upper`
    Bounds { lower: f64, upper: f64 },
    /// $`\sum_{jk} |b_{jk}| \leq r`$
    L1Ball { radius: f64 },
}

impl ConstraintConfig {
    pub fn build(&self, n_features: usize, n_responses: usize) -> Result<Box<dyn Function>> {
        let shape = (n_features, n_responses);
        Ok(match *self {
            ConstraintConfig::Positive => Box::new(Bounds {
                lower: 0.,
                upper: f64::INFINITY,
                shape,
                name: "Positive",
            }),
            ConstraintConfig::Bounds { lower, upper } => {
                if lower.is_nan() || upper.is_nan() || lower > upper {
                    return Err(GlmError::config(format!(
                        "empty box constraint [{}, {}]",
                        lower, upper
                    )));
                }
                Box::new(Bounds {
                    lower,
                    upper,
                    shape,
                    name: "Bounds",
                })
            }
            ConstraintConfig::L1Ball { radius } => {
                if !(radius >= 0.) {
                    return Err(GlmError::config(format!(
                        "L1 ball radius must be non-negative, got {}",
                        radius
                    )));
                }
                Box::new(L1Ball { radius, shape })
            }
        })
    }
}

/// Entrywise interval constraint
#[derive(Debug, Clone)]
pub struct Bounds {
    lower: f64,
    upper: f64,
    shape: (usize, usize),
    name: &'static str,
}

impl Function for Bounds {
    fn name(&self) -> &'static str {
        self.name
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        if x.iter().all(|&v| v >= self.lower && v <= self.upper) {
            0.
        } else {
            f64::INFINITY
        }
    }

    fn is_smooth(&self) -> bool {
        false
    }

    fn is_proximable(&self) -> bool {
        true
    }

    fn prox(&self, x: ArrayView2<f64>, _step: f64) -> Result<Array2<f64>> {
        Ok(x.mapv(|v| v.max(self.lower).min(self.upper)))
    }
}

/// Entrywise L1 ball of the whole coefficient matrix
#[derive(Debug, Clone)]
pub struct L1Ball {
    radius: f64,
    shape: (usize, usize),
}

/// Threshold $`\theta`$ such that $`\sum_i \max(|v_i| - \theta, 0) = r`$,
/// or 0 if `v` is already inside the ball
///
/// Sort-based, following Duchi et al. (2008).
pub fn l1_ball_threshold(v: ArrayView2<f64>, radius: f64) -> f64 {
    let mut mags: Vec<f64> = v.iter().map(|x| x.abs()).collect();
    if mags.iter().sum::<f64>() <= radius {
        return 0.;
    }
    mags.sort_by(|a, b| b.total_cmp(a));
    let mut cumsum = 0.;
    let mut theta = 0.;
    for (j, &u) in mags.iter().enumerate() {
        cumsum += u;
        let candidate = (cumsum - radius) / (j + 1) as f64;
        if u - candidate > 0. {
            theta = candidate;
        } else {
            break;
        }
    }
    theta
}

impl Function for L1Ball {
    fn name(&self) -> &'static str {
        "L1Ball"
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        // small slack for projections that land on the boundary
        let norm: f64 = x.iter().map(|v| v.abs()).sum();
        if norm <= self.radius * (1. + 1e-12) + 1e-12 {
            0.
        } else {
            f64::INFINITY
        }
    }

    fn is_smooth(&self) -> bool {
        false
    }

    fn is_proximable(&self) -> bool {
        true
    }

    fn prox(&self, x: ArrayView2<f64>, _step: f64) -> Result<Array2<f64>> {
        let theta = l1_ball_threshold(x, self.radius);
        Ok(x.mapv(|v| v.signum() * (v.abs() - theta).max(0.)))
    }
}
