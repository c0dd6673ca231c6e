//! The `ndarray-glm-fista` crate fits penalized generalized linear models
//! on `ndarray` data with accelerated proximal gradient methods.
//!
//! A fit minimizes a smooth loss plus a penalty (or subject to a constraint),
//! ```math
//! \min_{\beta_0, B} \; \frac1n \sum_i w_i\, \ell(x_i^T B + \beta_0, y_i) + \lambda\, p(B) ,
//! ```
//! and is built from a few composable pieces:
//! - losses: squared error, Huber, Poisson and logistic ([`loss`])
//! - penalties: lasso, weighted lasso, group and multi-task lasso, nuclear
//!   norm, ridge and elastic net, plus convex constraints ([`penalty`])
//! - the FISTA iteration with backtracking and adaptive restart ([`prox`])
//! - GLM solvers and warm-started regularization paths ([`solver`])
//!
//! Dense `ndarray` designs and column-sparse `sprs` designs are both
//! supported through [`linop::DesignMatrix`].
//!
//! ```no_run
//! use ndarray::array;
//! use ndarray_glm_fista::loss::{GlmData, LossConfig};
//! use ndarray_glm_fista::penalty::PenaltyConfig;
//! use ndarray_glm_fista::solver::{decreasing_updates, pen_val_seq, solve_path, FistaSolver};
//!
//! let x = array![[1., 0.], [0., 1.], [1., 1.], [2., -1.]];
//! let y = array![1., 2., 3., 0.];
//! let data = GlmData::new(&x, y.view()).unwrap();
//! let mut solver = FistaSolver::default()
//!     .setup(data, &LossConfig::LinReg, Some(PenaltyConfig::lasso(1.).unwrap()), None, true)
//!     .unwrap();
//! let grid = pen_val_seq(solver.pen_max().unwrap(), 20, 0.01).unwrap();
//! for point in solve_path(&mut solver, decreasing_updates(&grid, None).unwrap(), None) {
//!     let (fit, update) = point.unwrap();
//!     println!("{:?}: {}", update.pen_val, fit.solution.coef);
//! }
//! ```

#![cfg_attr(all(rustc_nightly, test), feature(test))]
#[cfg(all(rustc_nightly, test))]
extern crate test;

pub mod direct;
pub mod error;
pub mod func;
pub mod linop;
pub mod loss;
pub mod penalty;
pub mod prox;
pub mod solver;

pub use error::{GlmError, Result};
