//! GLM Solvers
//!
//! A solver is set up once with its data, loss and penalty, then solved any
//! number of times as the penalty parameters change. [`solve_path`] drives a
//! solver along a grid of penalty values, warm starting each solve from the
//! previous solution.

mod cd;
pub use cd::*;
mod fista;
pub use self::fista::*;
mod path;
pub use path::*;

use ndarray::prelude::*;

use crate::error::Result;
use crate::penalty::PenaltyUpdate;

/// Fitted coefficients, `n_features × n_responses`, and the intercept per
/// response when one is fit
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub coef: Array2<f64>,
    pub intercept: Option<Array1<f64>>,
}

/// A solution together with the solver's record of how it was found
#[derive(Debug, Clone)]
pub struct FitResult<T> {
    pub solution: Solution,
    pub trace: T,
}

/// A configured solver for one data set
pub trait GlmSolver {
    type Trace;

    /// Changes the penalty parameters for subsequent solves
    fn update_penalty(&mut self, update: &PenaltyUpdate) -> Result<()>;

    /// Solves from `init`, or from the default initializer when `None`
    fn solve(&self, init: Option<&Solution>) -> Result<FitResult<Self::Trace>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use ndarray::prelude::*;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;

    /// Gaussian design with a sparse linear response plus noise
    pub(crate) fn random_problem(seed: u64, n: usize, p: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0., 1.).unwrap();
        let x = Array2::random_using((n, p), normal, &mut rng);
        let noise = Array1::random_using(n, normal, &mut rng);
        let truth = Array1::from_shape_fn(p, |j| if j < 3 { 3. - j as f64 } else { 0. });
        let y = x.dot(&truth) + noise * 0.5 + 1.;
        (x, y)
    }
}
