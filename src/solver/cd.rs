//! Cyclic coordinate descent for the (elastic net) lasso
//!
//! Minimizes
//! ```math
//! \frac{1}{2n}\|y - Xb\|_2^2 + \lambda \sum_j w_j |b_j| + \frac\rho2 \|b\|_2^2
//! ```
//! one coordinate at a time, keeping the residual $`r = y - Xb`$ up to date.

use log::{debug, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FitResult, GlmSolver, Solution};
use crate::error::{GlmError, Result};
use crate::linop::DesignMatrix;
use crate::loss::{GlmData, LossConfig};
use crate::penalty::{lasso_and_ridge_from_enet, soft_thresh, PenaltyConfig, PenaltyKind, PenaltyUpdate};

/// Epoch and tolerance controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateDescent {
    pub max_epochs: usize,
    /// Stop once the largest KKT violation is at most this
    pub tol: f64,
}

impl Default for CoordinateDescent {
    fn default() -> Self {
        CoordinateDescent {
            max_epochs: 50_000,
            tol: 1e-4,
        }
    }
}

/// The penalty in the form coordinate descent works with
#[derive(Debug, Clone, PartialEq)]
pub struct CdPenalty {
    /// $`\lambda`$
    pub lasso: f64,
    pub weights: Option<Array1<f64>>,
    /// $`\rho`$
    pub ridge: f64,
}

impl CdPenalty {
    pub fn from_config(config: &PenaltyConfig, n_features: usize) -> Result<Self> {
        let penalty = match config.kind() {
            &PenaltyKind::Lasso { pen_val } => CdPenalty {
                lasso: pen_val,
                weights: None,
                ridge: 0.,
            },
            PenaltyKind::WeightedLasso { pen_val, weights } => CdPenalty {
                lasso: *pen_val,
                weights: Some(weights.clone()),
                ridge: 0.,
            },
            PenaltyKind::ElasticNet {
                pen_val,
                l1_ratio,
                lasso_weights,
                ridge_weights: None,
                tikhonov: None,
            } => {
                let (lasso, ridge) = lasso_and_ridge_from_enet(*pen_val, *l1_ratio);
                CdPenalty {
                    lasso,
                    weights: lasso_weights.clone(),
                    ridge,
                }
            }
            other => {
                return Err(GlmError::config(format!(
                    "coordinate descent does not support the {} penalty{}",
                    other.name(),
                    if let PenaltyKind::ElasticNet { .. } = other {
                        " with ridge weights or a tikhonov operator"
                    } else {
                        ""
                    }
                )))
            }
        };
        if let Some(w) = &penalty.weights {
            if w.len() != n_features {
                return Err(GlmError::Shape(format!(
                    "lasso weights have length {} but there are {}",
                    w.len(),
                    n_features
                )));
            }
        }
        Ok(penalty)
    }

    fn weight(&self, j: usize) -> f64 {
        self.weights.as_ref().map_or(1., |w| w[j])
    }

    fn value(&self, coef: ArrayView1<f64>) -> f64 {
        let l1: f64 = coef
            .iter()
            .enumerate()
            .map(|(j, b)| self.weight(j) * b.abs())
            .sum();
        self.lasso * l1 + 0.5 * self.ridge * coef.dot(&coef)
    }
}

/// Largest violation of the optimality conditions
fn kkt_violation<M>(x: &M, penalty: &CdPenalty, coef: ArrayView1<f64>, residual: ArrayView1<f64>) -> f64
where
    M: DesignMatrix + ?Sized,
{
    let n = x.n_samples() as f64;
    (0..x.n_features())
        .map(|j| {
            let grad = -x.col_dot(j, residual) / n + penalty.ridge * coef[j];
            let thresh = penalty.lasso * penalty.weight(j);
            if coef[j] != 0. {
                (grad + thresh * coef[j].signum()).abs()
            } else {
                (grad.abs() - thresh).max(0.)
            }
        })
        .fold(0., f64::max)
}

/// Runs coordinate descent from `coef`, where `residual` must equal
/// $`y - X\,\mathrm{coef}`$ and `col_norms_sq` holds $`\|x_j\|_2^2`$
///
/// Returns the coefficients, the objective after every epoch and the final
/// largest KKT violation.
pub fn solve_cd<M>(
    x: &M,
    y: ArrayView1<f64>,
    penalty: &CdPenalty,
    mut coef: Array1<f64>,
    mut residual: Array1<f64>,
    col_norms_sq: ArrayView1<f64>,
    cfg: &CoordinateDescent,
) -> (Array1<f64>, Vec<f64>, f64)
where
    M: DesignMatrix + ?Sized,
{
    let n = y.len() as f64;
    let objective = |coef: ArrayView1<f64>, residual: ArrayView1<f64>| {
        0.5 * residual.dot(&residual) / n + penalty.value(coef)
    };

    let mut history = Vec::new();
    let mut kkt = kkt_violation(x, penalty, coef.view(), residual.view());
    for _epoch in 0..cfg.max_epochs {
        if kkt <= cfg.tol {
            break;
        }
        for j in 0..coef.len() {
            let curv = col_norms_sq[j] / n;
            let denom = curv + penalty.ridge;
            let old = coef[j];
            let new = if denom > 0. {
                let z = x.col_dot(j, residual.view()) / n + curv * old;
                soft_thresh(z, penalty.lasso * penalty.weight(j)) / denom
            } else {
                0.
            };
            if new != old {
                x.col_axpy(j, old - new, residual.view_mut());
                coef[j] = new;
            }
        }
        history.push(objective(coef.view(), residual.view()));
        kkt = kkt_violation(x, penalty, coef.view(), residual.view());
    }
    if kkt > cfg.tol {
        warn!(
            "coordinate descent stopped after {} epochs with KKT violation {:.3e}",
            cfg.max_epochs, kkt
        );
    }
    (coef, history, kkt)
}

/// Coordinate descent trace
#[derive(Debug, Clone, PartialEq)]
pub struct CdTrace {
    pub objective: Vec<f64>,
    pub kkt_max: f64,
}

impl CdTrace {
    pub fn epochs(&self) -> usize {
        self.objective.len()
    }
}

impl CoordinateDescent {
    /// Binds coordinate descent to a single-response squared error problem
    /// without intercept
    pub fn setup<'a, M>(
        &self,
        data: GlmData<'a, M>,
        loss: &LossConfig,
        penalty: PenaltyConfig,
        fit_intercept: bool,
    ) -> Result<CdGlm<'a, M>>
    where
        M: DesignMatrix + ?Sized,
    {
        if fit_intercept {
            return Err(GlmError::config(
                "coordinate descent does not fit an intercept",
            ));
        }
        if *loss != LossConfig::LinReg {
            return Err(GlmError::config(
                "coordinate descent only supports the squared error loss",
            ));
        }
        if data.is_multi_response() || data.n_responses() != 1 {
            return Err(GlmError::config(
                "coordinate descent only supports a single response",
            ));
        }
        if data.sample_weight.is_some() {
            return Err(GlmError::config(
                "coordinate descent does not support sample weights",
            ));
        }
        let cd_penalty = CdPenalty::from_config(&penalty, data.n_features())?;
        let col_norms_sq: Array1<f64> = (0..data.n_features()).map(|j| data.x.col_sq_norm(j)).collect();
        debug!(
            "coordinate descent on {}x{} design with {} penalty",
            data.n_samples(),
            data.n_features(),
            penalty.kind().name()
        );
        Ok(CdGlm {
            config: self.clone(),
            x: data.x,
            y: data.y.index_axis_move(Axis(1), 0),
            penalty,
            cd_penalty,
            col_norms_sq,
        })
    }
}

/// [`CoordinateDescent`] bound to its data and penalty
pub struct CdGlm<'a, M: ?Sized> {
    config: CoordinateDescent,
    x: &'a M,
    y: ArrayView1<'a, f64>,
    penalty: PenaltyConfig,
    cd_penalty: CdPenalty,
    col_norms_sq: Array1<f64>,
}

impl<'a, M: ?Sized> CdGlm<'a, M> {
    pub fn penalty(&self) -> &PenaltyConfig {
        &self.penalty
    }
}

impl<'a, M> GlmSolver for CdGlm<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    type Trace = CdTrace;

    fn update_penalty(&mut self, update: &PenaltyUpdate) -> Result<()> {
        let mut penalty = self.penalty.clone();
        penalty.apply(update)?;
        self.cd_penalty = CdPenalty::from_config(&penalty, self.x.n_features())?;
        self.penalty = penalty;
        Ok(())
    }

    fn solve(&self, init: Option<&Solution>) -> Result<FitResult<CdTrace>> {
        let p = self.x.n_features();
        let coef = match init {
            Some(sol) => {
                if sol.coef.dim() != (p, 1) {
                    return Err(GlmError::dims(
                        "coefficient initializer",
                        format!("{:?}", (p, 1)),
                        format!("{:?}", sol.coef.dim()),
                    ));
                }
                sol.coef.column(0).to_owned()
            }
            None => Array1::zeros(p),
        };
        let fitted = self.x.apply(coef.view().insert_axis(Axis(1)));
        let residual = &self.y - &fitted.column(0);
        let (coef, objective, kkt_max) = solve_cd(
            self.x,
            self.y,
            &self.cd_penalty,
            coef,
            residual,
            self.col_norms_sq.view(),
            &self.config,
        );
        Ok(FitResult {
            solution: Solution {
                coef: coef.insert_axis(Axis(1)),
                intercept: None,
            },
            trace: CdTrace { objective, kkt_max },
        })
    }
}
