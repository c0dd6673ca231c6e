//! Fast Iterative Shrinking/Thresholding Algorithm

use std::time::{Duration, Instant};

use log::{trace, warn};
use ndarray::prelude::*;
use linfa_linalg::norm::Norm;
use serde::{Deserialize, Serialize};

use crate::error::{GlmError, Result};
use crate::func::Function;

/// How the step size is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepRule {
    /// Constant step `1 / L`
    Lipschitz(f64),
    /// Backtracking line search starting from `init`
    Backtracking { init: f64 },
}

/// Iteration controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FistaConfig {
    pub max_iter: usize,
    /// Stop when the largest entry of $`x_{k+1} - x_k`$ is at most this
    pub xtol: Option<f64>,
    /// Stop when $`|F_{k+1} - F_k| \le \mathrm{rtol}\,|F_k|`$, relative to
    /// the previous objective
    pub rtol: Option<f64>,
    /// Stop when the absolute objective change is at most this
    pub atol: Option<f64>,
    pub bt_max_steps: usize,
    /// Step multiplier after a rejected backtracking trial, in (0, 1)
    pub bt_shrink: f64,
    /// Step multiplier applied before each backtracking search, at least 1
    pub bt_grow: Option<f64>,
    /// Use Nesterov momentum; plain proximal gradient otherwise
    pub accel: bool,
    /// Reset the momentum when it points uphill
    pub restart: bool,
    /// 0: no history, 1: record per-iteration history, 2: also log every iteration
    pub tracking_level: u8,
}

impl Default for FistaConfig {
    fn default() -> Self {
        FistaConfig {
            max_iter: 1000,
            xtol: Some(1e-4),
            rtol: None,
            atol: None,
            bt_max_steps: 20,
            bt_shrink: 0.5,
            bt_grow: Some(1.1),
            accel: true,
            restart: true,
            tracking_level: 0,
        }
    }
}

fn check_tol(what: &str, tol: Option<f64>) -> Result<()> {
    match tol {
        Some(t) if !(t >= 0.) => Err(GlmError::config(format!(
            "{} must be non-negative, got {}",
            what, t
        ))),
        _ => Ok(()),
    }
}

impl FistaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(GlmError::config("max_iter must be at least 1"));
        }
        check_tol("xtol", self.xtol)?;
        check_tol("rtol", self.rtol)?;
        check_tol("atol", self.atol)?;
        if !(self.bt_shrink > 0. && self.bt_shrink < 1.) {
            return Err(GlmError::config(format!(
                "bt_shrink must lie in (0, 1), got {}",
                self.bt_shrink
            )));
        }
        if let Some(grow) = self.bt_grow {
            if !(grow >= 1. && grow.is_finite()) {
                return Err(GlmError::config(format!(
                    "bt_grow must be at least 1, got {}",
                    grow
                )));
            }
        }
        Ok(())
    }
}

/// Why the iteration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    MaxIter,
    XTol,
    RTol,
    ATol,
    Callback,
}

/// Per-iteration records, kept when `tracking_level >= 1`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FistaHistory {
    pub objective: Vec<f64>,
    pub step: Vec<f64>,
    pub x_diff: Vec<f64>,
}

/// What happened during a run
#[derive(Debug, Clone, PartialEq)]
pub struct FistaTrace {
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// Backtracking searches that hit `bt_max_steps`
    pub bt_failures: usize,
    pub restarts: usize,
    /// A step of length `1 / L` raised the objective, so backtracking took over
    pub lipschitz_fallback: bool,
    /// Last accepted step size
    pub step: f64,
    /// Objective at the returned point
    pub objective: f64,
    pub runtime: Duration,
    pub history: Option<FistaHistory>,
}

impl FistaTrace {
    pub fn converged(&self) -> bool {
        self.stop_reason != StopReason::MaxIter && self.bt_failures == 0
    }
}

struct Composite<'f> {
    smooth: &'f dyn Function,
    non_smooth: Option<&'f dyn Function>,
}

impl<'f> Composite<'f> {
    fn objective(&self, x: ArrayView2<f64>) -> f64 {
        self.smooth.value(x) + self.non_smooth.map_or(0., |g| g.value(x))
    }

    fn prox(&self, v: Array2<f64>, step: f64) -> Result<Array2<f64>> {
        match self.non_smooth {
            Some(g) => g.prox(v.view(), step),
            None => Ok(v),
        }
    }

    /// One proximal gradient step from `point`, returning the new point, the
    /// step used and whether backtracking ran out of trials
    fn step_from(
        &self,
        point: ArrayView2<f64>,
        rule: StepRule,
        step: f64,
        cfg: &FistaConfig,
    ) -> Result<(Array2<f64>, f64, bool)> {
        let grad = self.smooth.gradient(point)?;
        if let StepRule::Lipschitz(_) = rule {
            let x = self.prox(&point - &(&grad * step), step)?;
            return Ok((x, step, false));
        }

        let f_point = self.smooth.value(point);
        let slack = 1e-12 * f_point.abs().max(1.);
        let mut s = step;
        let mut trial = 0;
        loop {
            let x = self.prox(&point - &(&grad * s), s)?;
            let d = &x - &point;
            let upper = f_point + (&grad * &d).sum() + d.iter().map(|v| v * v).sum::<f64>() / (2. * s);
            if self.smooth.value(x.view()) <= upper + slack {
                return Ok((x, s, false));
            }
            if trial == cfg.bt_max_steps {
                return Ok((x, s, true));
            }
            trial += 1;
            s *= cfg.bt_shrink;
        }
    }
}

/// Fast Iterative Shrinking/Thresholding Algorithm
///
/// Minimizes $`f(x) + g(x)`$ for smooth `smooth` $`f`$ and proximable
/// `non_smooth` $`g`$ (zero when `None`), starting from `x0`.
///
/// The momentum restarts when the step reverses direction,
/// $`\langle x_{k+1} - x_k, x_k - x_{k-1} \rangle < 0`$, and whenever an
/// accelerated step increases the objective it is discarded for a plain
/// proximal gradient step from $`x_k`$, so the objective never increases
/// while `restart` is on. A step of length `1 / L` from $`x_k`$ that still
/// goes uphill means `L` is too small, and backtracking takes over.
///
/// `callback` is called with every iterate (and `x0` as iteration 0) and
/// stops the run by returning `true`. The best iterate seen is returned.
///
/// Hitting `max_iter` or exhausting the line search is not an error; it is
/// logged and recorded in the trace.
pub fn fista(
    smooth: &dyn Function,
    non_smooth: Option<&dyn Function>,
    x0: ArrayView2<f64>,
    rule: StepRule,
    cfg: &FistaConfig,
    mut callback: impl FnMut(ArrayView2<f64>, usize) -> bool,
) -> Result<(Array2<f64>, FistaTrace)> {
    cfg.validate()?;
    if !smooth.is_smooth() {
        return Err(GlmError::NotSmooth(smooth.name()));
    }
    if x0.dim() != smooth.shape() {
        return Err(GlmError::dims(
            "initial point",
            format!("{:?}", smooth.shape()),
            format!("{:?}", x0.dim()),
        ));
    }
    if let Some(g) = non_smooth {
        if !g.is_proximable() {
            return Err(GlmError::NotProximable(g.name()));
        }
        if g.shape() != smooth.shape() {
            return Err(GlmError::dims(
                "non-smooth domain",
                format!("{:?}", smooth.shape()),
                format!("{:?}", g.shape()),
            ));
        }
    }
    let mut step = match rule {
        StepRule::Lipschitz(lip) if lip > 0. && lip.is_finite() => 1. / lip,
        StepRule::Backtracking { init } if init > 0. && init.is_finite() => init,
        _ => {
            return Err(GlmError::config(format!(
                "step rule {:?} needs a positive finite constant",
                rule
            )))
        }
    };
    let problem = Composite { smooth, non_smooth };
    let start = Instant::now();

    let mut x = x0.to_owned();
    let mut x_prev = x.clone();
    let mut y = x.clone();
    let mut rule = rule;
    let mut t: f64 = 1.;
    let mut obj = problem.objective(x.view());
    let mut best = x.clone();
    let mut best_obj = obj;

    let mut bt_failures = 0;
    let mut restarts = 0;
    let mut lipschitz_fallback = false;
    let mut iterations = 0;
    let mut stop_reason = StopReason::MaxIter;
    let mut history = if cfg.tracking_level >= 1 {
        Some(FistaHistory::default())
    } else {
        None
    };

    if callback(x.view(), 0) {
        stop_reason = StopReason::Callback;
    } else {
        for iter in 1..=cfg.max_iter {
            iterations = iter;
            if let (StepRule::Backtracking { .. }, Some(grow)) = (rule, cfg.bt_grow) {
                step *= grow;
            }

            let (mut x_new, mut used, mut failed) = problem.step_from(y.view(), rule, step, cfg)?;
            let mut obj_new = problem.objective(x_new.view());
            let mut restarted = false;
            if cfg.accel && cfg.restart && !(obj_new <= obj) {
                // momentum overshot, fall back to a step from the current iterate
                let (xs, us, fs) = problem.step_from(x.view(), rule, used, cfg)?;
                x_new = xs;
                used = us;
                failed = fs;
                obj_new = problem.objective(x_new.view());
                t = 1.;
                restarted = true;
            }
            if let StepRule::Lipschitz(lip) = rule {
                let from_current = restarted || !cfg.accel;
                if from_current && !(obj_new <= obj + 1e-12 * obj.abs().max(1.)) {
                    // a proximal step of length 1/L cannot go uphill when L is valid
                    warn!(
                        "objective increased with lipschitz constant {:e}, switching to backtracking",
                        lip
                    );
                    rule = StepRule::Backtracking { init: used };
                    lipschitz_fallback = true;
                    let (xs, us, fs) = problem.step_from(x.view(), rule, used, cfg)?;
                    x_new = xs;
                    used = us;
                    failed = fs;
                    obj_new = problem.objective(x_new.view());
                    t = 1.;
                    restarted = true;
                }
            }
            step = used;
            if failed {
                bt_failures += 1;
            }

            let diff = &x_new - &x;
            if cfg.accel {
                if cfg.restart && !restarted && (&diff * &(&x - &x_prev)).sum() < 0. {
                    t = 1.;
                    restarted = true;
                }
                let t_new = (1. + (1. + 4. * t * t).sqrt()) / 2.;
                y = &x_new + &(&diff * ((t - 1.) / t_new));
                t = t_new;
            } else {
                y = x_new.clone();
            }
            if restarted {
                restarts += 1;
            }

            let x_diff = diff.norm_max();
            let obj_change = (obj_new - obj).abs();
            if let Some(h) = history.as_mut() {
                h.objective.push(obj_new);
                h.step.push(step);
                h.x_diff.push(x_diff);
            }
            if cfg.tracking_level >= 2 {
                trace!(
                    "fista iter {}: objective {:.6e}, step {:.3e}, |dx| {:.3e}{}",
                    iter,
                    obj_new,
                    step,
                    x_diff,
                    if restarted { ", restart" } else { "" }
                );
            }

            let prev_obj = obj;
            x_prev = std::mem::replace(&mut x, x_new);
            obj = obj_new;
            if obj <= best_obj || !best_obj.is_finite() {
                best.assign(&x);
                best_obj = obj;
            }

            if cfg.xtol.map_or(false, |tol| x_diff <= tol) {
                stop_reason = StopReason::XTol;
                break;
            }
            if cfg
                .rtol
                .map_or(false, |tol| obj_change <= tol * prev_obj.abs())
            {
                stop_reason = StopReason::RTol;
                break;
            }
            if cfg.atol.map_or(false, |tol| obj_change <= tol) {
                stop_reason = StopReason::ATol;
                break;
            }
            if callback(x.view(), iter) {
                stop_reason = StopReason::Callback;
                break;
            }
        }
    }

    if stop_reason == StopReason::MaxIter {
        warn!("fista reached max_iter = {} without converging", cfg.max_iter);
    }
    if bt_failures > 0 {
        warn!(
            "backtracking hit {} trials in {} of {} iterations",
            cfg.bt_max_steps, bt_failures, iterations
        );
    }

    let trace = FistaTrace {
        iterations,
        stop_reason,
        bt_failures,
        restarts,
        lipschitz_fallback,
        step,
        objective: best_obj,
        runtime: start.elapsed(),
        history,
    };
    Ok((best, trace))
}
