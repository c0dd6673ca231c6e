use ndarray::prelude::*;

use super::lasso::{group_norm, group_weights};
use super::nuclear::spectral_norm;
use super::PenaltyKind;
use crate::error::{GlmError, Result};
use crate::linop::DesignMatrix;
use crate::loss::Glm;

fn max_abs_ratio(grad: ArrayView2<f64>, weights: Option<&Array1<f64>>) -> f64 {
    grad.rows()
        .into_iter()
        .enumerate()
        .filter_map(|(j, row)| {
            let w = weights.map_or(1., |w| w[j]);
            if w > 0. {
                Some(row.iter().fold(0., |acc: f64, v| acc.max(v.abs())) / w)
            } else {
                None
            }
        })
        .fold(0., f64::max)
}

/// Smallest penalty strength at which the zero coefficient is optimal
///
/// The dual norm of the loss gradient with respect to the coefficients,
/// evaluated at zero coefficients and the default intercept. Rows or groups
/// with zero weight are unpenalized and do not enter the maximum.
pub fn pen_max<M>(kind: &PenaltyKind, glm: &Glm<M>) -> Result<f64>
where
    M: DesignMatrix + ?Sized,
{
    let grad = glm.coef_grad_at_zero()?;
    let check = |what: &str, w: Option<&Array1<f64>>| match w {
        Some(w) if w.len() != grad.nrows() => Err(GlmError::Shape(format!(
            "{} have length {} but there are {}",
            what,
            w.len(),
            grad.nrows()
        ))),
        _ => Ok(()),
    };
    let value = match kind {
        PenaltyKind::Lasso { .. } => max_abs_ratio(grad.view(), None),
        PenaltyKind::WeightedLasso { weights, .. } => {
            check("lasso weights", Some(weights))?;
            max_abs_ratio(grad.view(), Some(weights))
        }
        PenaltyKind::GroupLasso {
            groups, weights, ..
        } => {
            let weights = group_weights(groups, weights.as_ref())?;
            groups
                .iter()
                .zip(weights.iter())
                .filter(|&(_, &w)| w > 0.)
                .map(|(g, &w)| {
                    if g.iter().any(|&j| j >= grad.nrows()) {
                        Err(GlmError::Shape(format!(
                            "group index out of range for {} features",
                            grad.nrows()
                        )))
                    } else {
                        Ok(group_norm(grad.view(), g) / w)
                    }
                })
                .collect::<Result<Vec<f64>>>()?
                .into_iter()
                .fold(0., f64::max)
        }
        PenaltyKind::MultiTaskLasso { weights, .. } => {
            check("multi-task weights", weights.as_ref())?;
            grad.rows()
                .into_iter()
                .enumerate()
                .filter_map(|(j, row)| {
                    let w = weights.as_ref().map_or(1., |w| w[j]);
                    if w > 0. {
                        Some(row.dot(&row).sqrt() / w)
                    } else {
                        None
                    }
                })
                .fold(0., f64::max)
        }
        PenaltyKind::Nuclear { .. } => spectral_norm(grad.view()),
        PenaltyKind::ElasticNet {
            l1_ratio,
            lasso_weights,
            ..
        } => {
            if *l1_ratio <= 0. {
                return Err(GlmError::config(
                    "an elastic net without lasso part has no largest penalty value",
                ));
            }
            check("lasso weights", lasso_weights.as_ref())?;
            max_abs_ratio(grad.view(), lasso_weights.as_ref()) / l1_ratio
        }
        PenaltyKind::Ridge { .. } => {
            return Err(GlmError::config(
                "a ridge penalty never zeroes the coefficients",
            ))
        }
    };
    Ok(value)
}
