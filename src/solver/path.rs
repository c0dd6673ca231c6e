//! Regularization paths
//!
//! Solutions vary continuously with the penalty strength, so solving a
//! decreasing sequence of penalty values, each started from the previous
//! solution, costs far fewer iterations than solving every point from
//! scratch.

use log::info;

use super::{FitResult, GlmSolver, Solution};
use crate::error::{GlmError, Result};
use crate::penalty::PenaltyUpdate;

/// Lazily solves one path point per `next()`
///
/// Holds the solver mutably for its whole life. After the first error the
/// iterator is exhausted.
pub struct PathIter<'s, S, I> {
    solver: &'s mut S,
    updates: I,
    current: Option<Solution>,
    warm_start: bool,
    index: usize,
    failed: bool,
}

/// Solves along `updates`, warm starting every point from the previous
/// solution (the first from `init`, or the default initializer)
pub fn solve_path<S, I>(solver: &mut S, updates: I, init: Option<Solution>) -> PathIter<'_, S, I::IntoIter>
where
    S: GlmSolver,
    I: IntoIterator<Item = PenaltyUpdate>,
{
    PathIter {
        solver,
        updates: updates.into_iter(),
        current: init,
        warm_start: true,
        index: 0,
        failed: false,
    }
}

/// Solves along `updates`, every point from the default initializer
pub fn cold_path<S, I>(solver: &mut S, updates: I) -> PathIter<'_, S, I::IntoIter>
where
    S: GlmSolver,
    I: IntoIterator<Item = PenaltyUpdate>,
{
    PathIter {
        solver,
        updates: updates.into_iter(),
        current: None,
        warm_start: false,
        index: 0,
        failed: false,
    }
}

impl<'s, S, I> PathIter<'s, S, I>
where
    S: GlmSolver,
    I: Iterator<Item = PenaltyUpdate>,
{
    fn step(&mut self, update: &PenaltyUpdate) -> Result<FitResult<S::Trace>> {
        self.solver.update_penalty(update)?;
        let init = if self.warm_start {
            self.current.as_ref()
        } else {
            None
        };
        let fit = self.solver.solve(init)?;
        if self.warm_start {
            self.current = Some(fit.solution.clone());
        }
        Ok(fit)
    }
}

impl<'s, S, I> Iterator for PathIter<'s, S, I>
where
    S: GlmSolver,
    I: Iterator<Item = PenaltyUpdate>,
{
    type Item = Result<(FitResult<S::Trace>, PenaltyUpdate)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let update = self.updates.next()?;
        self.index += 1;
        match self.step(&update) {
            Ok(fit) => {
                info!(
                    "path point {}: pen_val {:?}, l1_ratio {:?}",
                    self.index, update.pen_val, update.l1_ratio
                );
                Some(Ok((fit, update)))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl<'s, S, I> std::iter::FusedIterator for PathIter<'s, S, I>
where
    S: GlmSolver,
    I: std::iter::FusedIterator<Item = PenaltyUpdate>,
{
}

/// `n` log-spaced penalty values from `pen_max` down to `min_ratio * pen_max`
pub fn pen_val_seq(pen_max: f64, n: usize, min_ratio: f64) -> Result<Vec<f64>> {
    if !(pen_max > 0. && pen_max.is_finite()) {
        return Err(GlmError::config(format!(
            "pen_max must be positive and finite, got {}",
            pen_max
        )));
    }
    if !(min_ratio > 0. && min_ratio <= 1.) {
        return Err(GlmError::config(format!(
            "min_ratio must lie in (0, 1], got {}",
            min_ratio
        )));
    }
    Ok(match n {
        0 => Vec::new(),
        1 => vec![pen_max],
        _ => (0..n)
            .map(|i| pen_max * min_ratio.powf(i as f64 / (n - 1) as f64))
            .collect(),
    })
}

/// One update per value, requiring the values not to increase
pub fn decreasing_updates(pen_vals: &[f64], l1_ratio: Option<f64>) -> Result<Vec<PenaltyUpdate>> {
    if let Some(pair) = pen_vals.windows(2).find(|pair| pair[1] > pair[0]) {
        return Err(GlmError::config(format!(
            "penalty values must be non-increasing, found {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(pen_vals
        .iter()
        .map(|&pen_val| PenaltyUpdate {
            pen_val: Some(pen_val),
            l1_ratio,
        })
        .collect())
}
