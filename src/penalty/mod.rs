//! Penalties and Constraints on the Coefficients
//!
//! A penalty is described by a [`PenaltyConfig`], a plain value that the path
//! driver edits between solves, and turned into [`Function`]s by the pure
//! factory [`build`]. Non-smooth parts are handled by the solver's prox step;
//! smooth parts (ridge, the ridge half of the elastic net) are added to the
//! loss.
//!
//! None of the functions built here know about the intercept. The solver wraps
//! them with [`crate::func::WithIntercept`] once, so the bare penalty can
//! still be used elsewhere, e.g. by [`pen_max`].

mod constraint;
pub use constraint::*;
mod lasso;
pub use lasso::*;
mod nuclear;
pub use nuclear::*;
mod pen_max;
pub use pen_max::*;
mod ridge;
pub use ridge::*;

use std::convert::TryFrom;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{GlmError, Result};
use crate::func::Function;

/// The penalty families, each carrying only its own parameters
#[derive(Debug, Clone, PartialEq)]
pub enum PenaltyKind {
    /// $`\lambda \sum_{jk} |b_{jk}|`$
    Lasso { pen_val: f64 },
    /// $`\lambda \sum_{jk} w_j |b_{jk}|`$
    WeightedLasso { pen_val: f64, weights: Array1<f64> },
    /// $`\lambda \sum_g w_g \|B_g\|_F`$ over disjoint groups of rows;
    /// `weights` default to $`\sqrt{|g|}`$
    GroupLasso {
        pen_val: f64,
        groups: Vec<Vec<usize>>,
        weights: Option<Array1<f64>>,
    },
    /// $`\lambda \sum_j w_j \|b_j\|_2`$ over the rows of a multi-response coefficient
    MultiTaskLasso {
        pen_val: f64,
        weights: Option<Array1<f64>>,
    },
    /// $`\lambda \sum_i \sigma_i(B)`$
    Nuclear { pen_val: f64 },
    /// $`\frac\lambda2 \sum_j w_j \|b_j\|_2^2`$ or $`\frac\lambda2 \|TB\|_F^2`$
    Ridge {
        pen_val: f64,
        weights: Option<Array1<f64>>,
        tikhonov: Option<Array2<f64>>,
    },
    /// Lasso with strength `pen_val * l1_ratio` plus ridge with strength
    /// `pen_val * (1 - l1_ratio)`
    ElasticNet {
        pen_val: f64,
        l1_ratio: f64,
        lasso_weights: Option<Array1<f64>>,
        ridge_weights: Option<Array1<f64>>,
        tikhonov: Option<Array2<f64>>,
    },
}

impl PenaltyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PenaltyKind::Lasso { .. } => "lasso",
            PenaltyKind::WeightedLasso { .. } => "weighted_l1",
            PenaltyKind::GroupLasso { .. } => "group_lasso",
            PenaltyKind::MultiTaskLasso { .. } => "multi_task",
            PenaltyKind::Nuclear { .. } => "nuclear",
            PenaltyKind::Ridge { .. } => "ridge",
            PenaltyKind::ElasticNet { .. } => "l1_plus_l2",
        }
    }

    pub fn pen_val(&self) -> f64 {
        match *self {
            PenaltyKind::Lasso { pen_val }
            | PenaltyKind::WeightedLasso { pen_val, .. }
            | PenaltyKind::GroupLasso { pen_val, .. }
            | PenaltyKind::MultiTaskLasso { pen_val, .. }
            | PenaltyKind::Nuclear { pen_val }
            | PenaltyKind::Ridge { pen_val, .. }
            | PenaltyKind::ElasticNet { pen_val, .. } => pen_val,
        }
    }

    fn pen_val_mut(&mut self) -> &mut f64 {
        match self {
            PenaltyKind::Lasso { pen_val }
            | PenaltyKind::WeightedLasso { pen_val, .. }
            | PenaltyKind::GroupLasso { pen_val, .. }
            | PenaltyKind::MultiTaskLasso { pen_val, .. }
            | PenaltyKind::Nuclear { pen_val }
            | PenaltyKind::Ridge { pen_val, .. }
            | PenaltyKind::ElasticNet { pen_val, .. } => pen_val,
        }
    }
}

/// Splits an elastic net strength into `(lasso, ridge)` strengths
#[must_use]
pub fn lasso_and_ridge_from_enet(pen_val: f64, l1_ratio: f64) -> (f64, f64) {
    (pen_val * l1_ratio, pen_val * (1. - l1_ratio))
}

/// New values for the tunable parameters of a penalty
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PenaltyUpdate {
    pub pen_val: Option<f64>,
    pub l1_ratio: Option<f64>,
}

impl PenaltyUpdate {
    #[must_use]
    pub fn pen_val(pen_val: f64) -> Self {
        PenaltyUpdate {
            pen_val: Some(pen_val),
            l1_ratio: None,
        }
    }

    #[must_use]
    pub fn enet(pen_val: f64, l1_ratio: f64) -> Self {
        PenaltyUpdate {
            pen_val: Some(pen_val),
            l1_ratio: Some(l1_ratio),
        }
    }
}

/// A validated penalty description
///
/// Every successful [`PenaltyConfig::apply`] bumps the version, so a caller
/// holding a function built from an older version can tell it is stale.
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyConfig {
    kind: PenaltyKind,
    version: u64,
}

fn check_strength(what: &str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0. {
        Ok(())
    } else {
        Err(GlmError::config(format!(
            "{} must be finite and non-negative, got {}",
            what, v
        )))
    }
}

fn check_weights(what: &str, weights: Option<&Array1<f64>>) -> Result<()> {
    match weights {
        Some(w) if w.iter().any(|&v| !(v.is_finite() && v >= 0.)) => Err(GlmError::config(
            format!("{} must be finite and non-negative", what),
        )),
        _ => Ok(()),
    }
}

fn check_l1_ratio(l1_ratio: f64) -> Result<()> {
    if (0. ..=1.).contains(&l1_ratio) {
        Ok(())
    } else {
        Err(GlmError::config(format!(
            "l1_ratio must lie in [0, 1], got {}",
            l1_ratio
        )))
    }
}

impl PenaltyConfig {
    pub fn new(kind: PenaltyKind) -> Result<Self> {
        let config = PenaltyConfig { kind, version: 0 };
        config.validate()?;
        Ok(config)
    }

    pub fn lasso(pen_val: f64) -> Result<Self> {
        PenaltyConfig::new(PenaltyKind::Lasso { pen_val })
    }

    pub fn enet(pen_val: f64, l1_ratio: f64) -> Result<Self> {
        PenaltyConfig::new(PenaltyKind::ElasticNet {
            pen_val,
            l1_ratio,
            lasso_weights: None,
            ridge_weights: None,
            tikhonov: None,
        })
    }

    pub fn kind(&self) -> &PenaltyKind {
        &self.kind
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Checks everything that does not depend on the data dimensions
    pub fn validate(&self) -> Result<()> {
        check_strength("pen_val", self.kind.pen_val())?;
        match &self.kind {
            PenaltyKind::Lasso { .. } | PenaltyKind::Nuclear { .. } => Ok(()),
            PenaltyKind::WeightedLasso { weights, .. } => check_weights("lasso weights", Some(weights)),
            PenaltyKind::GroupLasso {
                groups, weights, ..
            } => {
                if groups.iter().any(Vec::is_empty) {
                    return Err(GlmError::config("groups must be non-empty"));
                }
                check_weights("group weights", weights.as_ref())
            }
            PenaltyKind::MultiTaskLasso { weights, .. } => {
                check_weights("multi-task weights", weights.as_ref())
            }
            PenaltyKind::Ridge {
                weights, tikhonov, ..
            } => {
                if weights.is_some() && tikhonov.is_some() {
                    return Err(GlmError::config(
                        "ridge weights and a tikhonov operator cannot both be provided",
                    ));
                }
                check_weights("ridge weights", weights.as_ref())
            }
            PenaltyKind::ElasticNet {
                l1_ratio,
                lasso_weights,
                ridge_weights,
                tikhonov,
                ..
            } => {
                check_l1_ratio(*l1_ratio)?;
                if ridge_weights.is_some() && tikhonov.is_some() {
                    return Err(GlmError::config(
                        "ridge weights and a tikhonov operator cannot both be provided",
                    ));
                }
                check_weights("lasso weights", lasso_weights.as_ref())?;
                check_weights("ridge weights", ridge_weights.as_ref())
            }
        }
    }

    /// Applies `update` in place; on error the configuration is unchanged
    pub fn apply(&mut self, update: &PenaltyUpdate) -> Result<()> {
        let mut kind = self.kind.clone();
        if let Some(pen_val) = update.pen_val {
            *kind.pen_val_mut() = pen_val;
        }
        if let Some(new_ratio) = update.l1_ratio {
            match &mut kind {
                PenaltyKind::ElasticNet { l1_ratio, .. } => *l1_ratio = new_ratio,
                other => {
                    return Err(GlmError::config(format!(
                        "l1_ratio cannot be set on a {} penalty",
                        other.name()
                    )))
                }
            }
        }
        PenaltyConfig {
            kind: kind.clone(),
            version: self.version,
        }
        .validate()?;
        self.kind = kind;
        self.version += 1;
        Ok(())
    }
}

/// The functions a penalty contributes to the objective
pub struct PenaltyParts {
    /// Handled through its proximal operator
    pub non_smooth: Option<Box<dyn Function>>,
    /// Added to the loss
    pub smooth: Option<Box<dyn Function>>,
}

fn check_len(what: &str, weights: &Array1<f64>, n: usize) -> Result<()> {
    if weights.len() == n {
        Ok(())
    } else {
        Err(GlmError::Shape(format!(
            "{} has length {} but there are {}",
            what,
            weights.len(),
            n
        )))
    }
}

/// Builds the penalty functions of `config` for a `n_features × n_responses`
/// coefficient
pub fn build(config: &PenaltyConfig, n_features: usize, n_responses: usize) -> Result<PenaltyParts> {
    let shape = (n_features, n_responses);
    let parts = match config.kind() {
        &PenaltyKind::Lasso { pen_val } => PenaltyParts {
            non_smooth: Some(Box::new(Lasso::new(pen_val, None, shape))),
            smooth: None,
        },
        PenaltyKind::WeightedLasso { pen_val, weights } => {
            check_len("lasso weights", weights, n_features)?;
            PenaltyParts {
                non_smooth: Some(Box::new(Lasso::new(*pen_val, Some(weights.clone()), shape))),
                smooth: None,
            }
        }
        PenaltyKind::GroupLasso {
            pen_val,
            groups,
            weights,
        } => PenaltyParts {
            non_smooth: Some(Box::new(GroupLasso::new(
                *pen_val,
                groups.clone(),
                weights.clone(),
                shape,
            )?)),
            smooth: None,
        },
        PenaltyKind::MultiTaskLasso { pen_val, weights } => {
            if let Some(w) = weights {
                check_len("multi-task weights", w, n_features)?;
            }
            PenaltyParts {
                non_smooth: Some(Box::new(GroupLasso::rows(*pen_val, weights.clone(), shape))),
                smooth: None,
            }
        }
        &PenaltyKind::Nuclear { pen_val } => PenaltyParts {
            non_smooth: Some(Box::new(NuclearNorm::new(pen_val, shape))),
            smooth: None,
        },
        PenaltyKind::Ridge {
            pen_val,
            weights,
            tikhonov,
        } => PenaltyParts {
            non_smooth: None,
            smooth: Some(Box::new(Ridge::new(
                *pen_val,
                weights.clone(),
                tikhonov.clone(),
                shape,
            )?)),
        },
        PenaltyKind::ElasticNet {
            pen_val,
            l1_ratio,
            lasso_weights,
            ridge_weights,
            tikhonov,
        } => {
            if let Some(w) = lasso_weights {
                check_len("lasso weights", w, n_features)?;
            }
            let (lasso, ridge) = lasso_and_ridge_from_enet(*pen_val, *l1_ratio);
            PenaltyParts {
                non_smooth: Some(Box::new(Lasso::new(lasso, lasso_weights.clone(), shape))),
                smooth: Some(Box::new(Ridge::new(
                    ridge,
                    ridge_weights.clone(),
                    tikhonov.clone(),
                    shape,
                )?)),
            }
        }
    };
    Ok(parts)
}

/// A penalty as read from a configuration file
///
/// ```json
/// {"kind": "l1_plus_l2", "pen_val": 0.5, "l1_ratio": 0.8}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltySpec {
    pub kind: String,
    pub pen_val: f64,
    pub l1_ratio: f64,
    pub weights: Option<Vec<f64>>,
    pub ridge_weights: Option<Vec<f64>>,
    pub groups: Option<Vec<Vec<usize>>>,
    pub tikhonov: Option<Vec<Vec<f64>>>,
}

impl Default for PenaltySpec {
    fn default() -> Self {
        PenaltySpec {
            kind: "lasso".to_string(),
            pen_val: 1.,
            l1_ratio: 0.5,
            weights: None,
            ridge_weights: None,
            groups: None,
            tikhonov: None,
        }
    }
}

fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(GlmError::Shape("tikhonov rows have different lengths".into()));
    }
    let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
    Array2::from_shape_vec((rows.len(), n_cols), flat).map_err(|e| GlmError::Shape(e.to_string()))
}

impl TryFrom<PenaltySpec> for PenaltyConfig {
    type Error = GlmError;

    fn try_from(spec: PenaltySpec) -> Result<Self> {
        let pen_val = spec.pen_val;
        let weights = spec.weights.map(Array1::from);
        let ridge_weights = spec.ridge_weights.map(Array1::from);
        let tikhonov = spec.tikhonov.as_deref().map(matrix_from_rows).transpose()?;
        let kind = match spec.kind.as_str() {
            "lasso" => PenaltyKind::Lasso { pen_val },
            "weighted_l1" | "weighted_lasso" => PenaltyKind::WeightedLasso {
                pen_val,
                weights: weights
                    .ok_or_else(|| GlmError::config("weighted_l1 requires weights"))?,
            },
            "group_lasso" | "groups" => PenaltyKind::GroupLasso {
                pen_val,
                groups: spec
                    .groups
                    .ok_or_else(|| GlmError::config("group_lasso requires groups"))?,
                weights,
            },
            "multi_task" => PenaltyKind::MultiTaskLasso { pen_val, weights },
            "nuclear" | "nuc" => PenaltyKind::Nuclear { pen_val },
            "ridge" => PenaltyKind::Ridge {
                pen_val,
                weights: ridge_weights.or(weights),
                tikhonov,
            },
            "l1_plus_l2" | "enet" | "elastic_net" => PenaltyKind::ElasticNet {
                pen_val,
                l1_ratio: spec.l1_ratio,
                lasso_weights: weights,
                ridge_weights,
                tikhonov,
            },
            other => {
                return Err(GlmError::config(format!(
                    "unknown penalty kind '{}'",
                    other
                )))
            }
        };
        PenaltyConfig::new(kind)
    }
}
