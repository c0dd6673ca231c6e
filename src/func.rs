//! Functions of the Optimization Variable
//!
//! Every loss, penalty and constraint is a [`Function`] of the same matrix
//! variable. Rows are `[intercept; coef]` when an intercept is fit (otherwise
//! just `coef`), and there is one column per response.
//!
//! A function is either smooth, with a gradient and possibly a Lipschitz
//! constant $`L`$ such that
//! ```math
//! \| \nabla f(x) - \nabla f(z) \|_F \leq L \| x - z \|_F ,
//! ```
//! or proximable, with a cheap proximal operator
//! ```math
//! \mathrm{prox}_{s g}(v) = \mathrm{arg}\!\min_u \; g(u) + \frac{1}{2s}\|u - v\|_F^2 .
//! ```
//! Asking a function for the capability it lacks is an error, not a panic.

use ndarray::prelude::*;

use crate::error::{GlmError, Result};

/// A function of a `shape.0 × shape.1` matrix
pub trait Function {
    /// Used in error messages
    fn name(&self) -> &'static str;

    /// Domain dimensions, fixed at construction
    fn shape(&self) -> (usize, usize);

    fn value(&self, x: ArrayView2<f64>) -> f64;

    fn is_smooth(&self) -> bool;

    fn is_proximable(&self) -> bool {
        false
    }

    /// Lipschitz constant of the gradient, if known
    fn grad_lip(&self) -> Option<f64> {
        None
    }

    fn gradient(&self, _x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Err(GlmError::NotSmooth(self.name()))
    }

    fn prox(&self, _x: ArrayView2<f64>, _step: f64) -> Result<Array2<f64>> {
        Err(GlmError::NotProximable(self.name()))
    }
}

impl<'r, F> Function for &'r F
where
    F: Function + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn shape(&self) -> (usize, usize) {
        (**self).shape()
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        (**self).value(x)
    }

    fn is_smooth(&self) -> bool {
        (**self).is_smooth()
    }

    fn is_proximable(&self) -> bool {
        (**self).is_proximable()
    }

    fn grad_lip(&self) -> Option<f64> {
        (**self).grad_lip()
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        (**self).gradient(x)
    }

    fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
        (**self).prox(x, step)
    }
}

/// Pointwise sum of two functions on the same domain
pub struct Sum<'a> {
    first: Box<dyn Function + 'a>,
    second: Box<dyn Function + 'a>,
}

impl<'a> Sum<'a> {
    pub fn new(first: Box<dyn Function + 'a>, second: Box<dyn Function + 'a>) -> Result<Self> {
        if first.shape() != second.shape() {
            return Err(GlmError::dims(
                "summed function domain",
                format!("{:?}", first.shape()),
                format!("{:?}", second.shape()),
            ));
        }
        Ok(Sum { first, second })
    }
}

impl<'a> Function for Sum<'a> {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn shape(&self) -> (usize, usize) {
        self.first.shape()
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        self.first.value(x) + self.second.value(x)
    }

    fn is_smooth(&self) -> bool {
        self.first.is_smooth() && self.second.is_smooth()
    }

    fn grad_lip(&self) -> Option<f64> {
        Some(self.first.grad_lip()? + self.second.grad_lip()?)
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.is_smooth() {
            return Err(GlmError::NotSmooth(self.name()));
        }
        Ok(self.first.gradient(x)? + self.second.gradient(x)?)
    }
}

/// Leaves row 0 (the intercept) untouched by a coefficient function
///
/// The wrapped function sees only rows `1..`; the intercept row contributes
/// nothing to the value, has zero gradient and is passed through by `prox`.
pub struct WithIntercept<'a> {
    base: Box<dyn Function + 'a>,
}

impl<'a> WithIntercept<'a> {
    #[must_use]
    pub fn new(base: Box<dyn Function + 'a>) -> Self {
        WithIntercept { base }
    }
}

/// Wraps `func` with [`WithIntercept`] when `fit_intercept` is set
#[must_use]
pub fn wrap_intercept<'a>(func: Box<dyn Function + 'a>, fit_intercept: bool) -> Box<dyn Function + 'a> {
    if fit_intercept {
        Box::new(WithIntercept::new(func))
    } else {
        func
    }
}

/// Stacks `first` on top of `rest`
pub(crate) fn stack_rows(first: ArrayView1<f64>, rest: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((rest.nrows() + 1, rest.ncols()));
    out.row_mut(0).assign(&first);
    out.slice_mut(s![1.., ..]).assign(&rest);
    out
}

impl<'a> Function for WithIntercept<'a> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn shape(&self) -> (usize, usize) {
        let (rows, cols) = self.base.shape();
        (rows + 1, cols)
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        self.base.value(x.slice(s![1.., ..]))
    }

    fn is_smooth(&self) -> bool {
        self.base.is_smooth()
    }

    fn is_proximable(&self) -> bool {
        self.base.is_proximable()
    }

    fn grad_lip(&self) -> Option<f64> {
        self.base.grad_lip()
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let coef_grad = self.base.gradient(x.slice(s![1.., ..]))?;
        let zero = Array1::zeros(x.ncols());
        Ok(stack_rows(zero.view(), coef_grad.view()))
    }

    fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
        let coef = self.base.prox(x.slice(s![1.., ..]), step)?;
        Ok(stack_rows(x.row(0), coef.view()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// f(x) = a/2 ||x - c||^2
    pub(crate) struct Quadratic {
        pub a: f64,
        pub c: Array2<f64>,
    }

    impl Function for Quadratic {
        fn name(&self) -> &'static str {
            "Quadratic"
        }
        fn shape(&self) -> (usize, usize) {
            self.c.dim()
        }
        fn value(&self, x: ArrayView2<f64>) -> f64 {
            0.5 * self.a * (&x - &self.c).mapv(|v| v * v).sum()
        }
        fn is_smooth(&self) -> bool {
            true
        }
        fn grad_lip(&self) -> Option<f64> {
            Some(self.a)
        }
        fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
            Ok((&x - &self.c) * self.a)
        }
    }

    /// g(x) = sum |x|
    pub(crate) struct AbsSum {
        pub shape: (usize, usize),
    }

    impl Function for AbsSum {
        fn name(&self) -> &'static str {
            "AbsSum"
        }
        fn shape(&self) -> (usize, usize) {
            self.shape
        }
        fn value(&self, x: ArrayView2<f64>) -> f64 {
            x.mapv(f64::abs).sum()
        }
        fn is_smooth(&self) -> bool {
            false
        }
        fn is_proximable(&self) -> bool {
            true
        }
        fn prox(&self, x: ArrayView2<f64>, step: f64) -> Result<Array2<f64>> {
            Ok(x.mapv(|v| v.signum() * (v.abs() - step).max(0.)))
        }
    }

    #[test]
    fn sum_of_smooth() {
        let f = Quadratic {
            a: 1.,
            c: array![[1.], [2.]],
        };
        let g = Quadratic {
            a: 3.,
            c: array![[0.], [0.]],
        };
        let h = Sum::new(Box::new(f), Box::new(g)).unwrap();
        let x = array![[1.], [1.]];
        assert!(h.is_smooth());
        assert_abs_diff_eq!(h.value(x.view()), 0.5 + 3.);
        assert_abs_diff_eq!(h.gradient(x.view()).unwrap(), array![[3.], [2.]]);
        assert_eq!(h.grad_lip(), Some(4.));
        assert!(matches!(h.prox(x.view(), 1.), Err(GlmError::NotProximable(_))));
    }

    #[test]
    fn sum_with_nonsmooth_has_no_gradient() {
        let f = Quadratic {
            a: 1.,
            c: array![[1.], [2.]],
        };
        let h = Sum::new(Box::new(f), Box::new(AbsSum { shape: (2, 1) })).unwrap();
        assert!(!h.is_smooth());
        assert_eq!(h.grad_lip(), None);
        assert_eq!(
            h.gradient(array![[0.], [0.]].view()),
            Err(GlmError::NotSmooth("Sum"))
        );
    }

    #[test]
    fn sum_dimension_mismatch() {
        let err = Sum::new(
            Box::new(AbsSum { shape: (2, 1) }),
            Box::new(AbsSum { shape: (3, 1) }),
        );
        assert!(matches!(err, Err(GlmError::DimensionMismatch { .. })));
    }

    #[test]
    fn intercept_passes_through() {
        let g = wrap_intercept(Box::new(AbsSum { shape: (2, 1) }), true);
        assert_eq!(g.shape(), (3, 1));
        let x = array![[-5.], [3.], [-0.5]];
        assert_abs_diff_eq!(g.value(x.view()), 3.5);
        assert_abs_diff_eq!(g.prox(x.view(), 1.).unwrap(), array![[-5.], [2.], [0.]]);
        assert!(matches!(g.gradient(x.view()), Err(GlmError::NotSmooth(_))));

        let f = wrap_intercept(
            Box::new(Quadratic {
                a: 2.,
                c: array![[0.], [0.]],
            }),
            true,
        );
        assert_abs_diff_eq!(f.gradient(x.view()).unwrap(), array![[0.], [6.], [-1.]]);
    }
}
