//! Minimization for Composite Functions consisting of
//! L-smooth _f_ and non-smooth prox-friendly _g_
//!
//! This covers every penalized GLM in the crate: the loss (plus any ridge
//! term) is _f_, and the lasso-type penalty or the constraint is _g_, as a
//! projection is the proximal operator of a constraint set.

mod fista;
pub use fista::*;

use ndarray::ArrayView;

/// Do nothing function for optional user callback (returns false)
#[allow(clippy::needless_pass_by_value)]
pub fn nop<T, D>(_x: ArrayView<T, D>, _itr: usize) -> bool {
    false
}
