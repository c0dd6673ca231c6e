//! Smooth GLM Losses
//!
//! A GLM loss is an average of per-observation losses of the linear predictor
//! ```math
//! f(\beta_0, B) = \frac1n \sum_{i=1}^n w_i\, \ell(z_i, y_i),
//! \qquad z_i = x_i^T B + \beta_0 ,
//! ```
//! so the gradient is $`\frac1n \tilde{X}^T W \ell'(Z, Y)`$ and, whenever
//! $`\ell''`$ is bounded by $`c`$, the gradient is Lipschitz with
//! ```math
//! L = \frac{c}{n} \sigma_1(\tilde{X}^T W \tilde{X}) .
//! ```
//! Multi-response data simply sums the per-output losses.

mod huber;
pub use huber::*;
mod lin_reg;
pub use lin_reg::*;
mod logistic;
pub use logistic::*;
mod poisson;
pub use poisson::*;

use log::{debug, warn};
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::error::{GlmError, Result};
use crate::func::{stack_rows, Function};
use crate::linop::{adj_with_intercept, apply_with_intercept, gram_norm, DesignMatrix};

/// Per-observation loss $`\ell(z, y)`$ of the linear predictor
pub trait SampleLoss {
    fn name(&self) -> &'static str;

    /// $`\ell(z, y)`$ for a single entry
    fn loss(&self, z: f64, y: f64) -> f64;

    /// The derivative used for $`\partial \ell / \partial z`$
    fn grad(&self, z: f64, y: f64) -> f64;

    /// Upper bound on $`\partial^2 \ell / \partial z^2`$, `None` if unbounded
    fn curvature(&self) -> Option<f64>;

    /// Intercept minimizing the loss of one response when all coefficients are zero
    fn intercept_at_coef_eq0(&self, y: ArrayView1<f64>, sample_weight: Option<ArrayView1<f64>>)
        -> Result<f64>;

    /// Per-observation losses, summed across responses
    fn sample_losses(&self, z: ArrayView2<f64>, y: ArrayView2<f64>) -> Array1<f64> {
        z.rows()
            .into_iter()
            .zip(y.rows())
            .map(|(z_i, y_i)| {
                z_i.iter()
                    .zip(y_i.iter())
                    .map(|(&zij, &yij)| self.loss(zij, yij))
                    .sum::<f64>()
            })
            .collect()
    }

    /// Entrywise derivatives with respect to `z`
    fn sample_grads(&self, z: ArrayView2<f64>, y: ArrayView2<f64>) -> Array2<f64> {
        Zip::from(&z).and(&y).map_collect(|&zij, &yij| self.grad(zij, yij))
    }
}

/// Which loss to fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LossConfig {
    LinReg,
    Huber {
        #[serde(default = "default_knot")]
        knot: f64,
    },
    Poisson,
    Logistic,
}

fn default_knot() -> f64 {
    1.35
}

impl Default for LossConfig {
    fn default() -> Self {
        LossConfig::LinReg
    }
}

impl LossConfig {
    pub fn build(&self) -> Result<Box<dyn SampleLoss>> {
        Ok(match *self {
            LossConfig::LinReg => Box::new(LinReg),
            LossConfig::Huber { knot } => Box::new(Huber::new(knot)?),
            LossConfig::Poisson => Box::new(Poisson),
            LossConfig::Logistic => Box::new(Logistic),
        })
    }
}

/// Borrowed training data
///
/// `y` is always stored as a matrix with one column per response.
pub struct GlmData<'a, M: ?Sized> {
    pub x: &'a M,
    pub y: ArrayView2<'a, f64>,
    pub sample_weight: Option<ArrayView1<'a, f64>>,
    multi_response: bool,
}

impl<'a, M: ?Sized> Clone for GlmData<'a, M> {
    fn clone(&self) -> Self {
        GlmData {
            x: self.x,
            y: self.y,
            sample_weight: self.sample_weight,
            multi_response: self.multi_response,
        }
    }
}

impl<'a, M> GlmData<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    /// Single-response data
    pub fn new(x: &'a M, y: ArrayView1<'a, f64>) -> Result<Self> {
        let data = GlmData {
            x,
            y: y.insert_axis(Axis(1)),
            sample_weight: None,
            multi_response: false,
        };
        data.check_samples(data.y.nrows(), "response")?;
        Ok(data)
    }

    /// Multi-response data, one column of `y` per response
    pub fn multi_response(x: &'a M, y: ArrayView2<'a, f64>) -> Result<Self> {
        let data = GlmData {
            x,
            y,
            sample_weight: None,
            multi_response: true,
        };
        data.check_samples(y.nrows(), "response")?;
        if y.ncols() == 0 {
            return Err(GlmError::dims("number of responses", "at least 1", 0));
        }
        Ok(data)
    }

    pub fn with_sample_weight(mut self, sample_weight: ArrayView1<'a, f64>) -> Result<Self> {
        self.check_samples(sample_weight.len(), "sample_weight")?;
        if sample_weight.iter().any(|&w| !(w >= 0.) || !w.is_finite()) {
            return Err(GlmError::config("sample weights must be finite and non-negative"));
        }
        self.sample_weight = Some(sample_weight);
        Ok(self)
    }

    fn check_samples(&self, found: usize, what: &'static str) -> Result<()> {
        if found != self.x.n_samples() {
            return Err(GlmError::dims(what, self.x.n_samples(), found));
        }
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.x.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.x.n_features()
    }

    pub fn n_responses(&self) -> usize {
        self.y.ncols()
    }

    pub fn is_multi_response(&self) -> bool {
        self.multi_response
    }
}

/// $`\sum_i w_i v_i / \sum_i w_i`$, the plain mean without weights
pub(crate) fn weighted_mean(values: ArrayView1<f64>, sample_weight: Option<ArrayView1<f64>>) -> f64 {
    match sample_weight {
        Some(w) if w.sum() > 0. => values.dot(&w) / w.sum(),
        _ => values.mean().unwrap_or(0.),
    }
}

/// A GLM loss bound to its data
pub struct Glm<'a, M: ?Sized> {
    data: GlmData<'a, M>,
    loss: Box<dyn SampleLoss>,
    fit_intercept: bool,
    lip: Option<f64>,
}

impl<'a, M> Glm<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    /// Binds `loss` to `data`, computing the gradient's Lipschitz constant once
    pub fn new(data: GlmData<'a, M>, loss: Box<dyn SampleLoss>, fit_intercept: bool) -> Self {
        let mut glm = Glm {
            data,
            loss,
            fit_intercept,
            lip: None,
        };
        glm.lip = glm.compute_lip();
        debug!(
            "{} loss on {}x{} design, intercept: {}, lipschitz: {:?}",
            glm.loss.name(),
            glm.data.n_samples(),
            glm.data.n_features(),
            fit_intercept,
            glm.lip
        );
        glm
    }

    pub fn data(&self) -> &GlmData<'a, M> {
        &self.data
    }

    pub fn loss(&self) -> &dyn SampleLoss {
        self.loss.as_ref()
    }

    pub fn fit_intercept(&self) -> bool {
        self.fit_intercept
    }

    /// $`\frac{c}{n}\sigma_1(\tilde{X}^T W \tilde{X})`$, `None` when the curvature is unbounded
    pub fn compute_lip(&self) -> Option<f64> {
        let c = self.loss.curvature()?;
        let n = self.data.n_samples() as f64;
        match gram_norm(self.data.x, self.fit_intercept, self.data.sample_weight) {
            Ok(gram) => Some(c * gram / n),
            Err(err) => {
                warn!("no lipschitz constant for {}: {}", self.loss.name(), err);
                None
            }
        }
    }

    pub fn linear_predictor(&self, x: ArrayView2<f64>) -> Array2<f64> {
        apply_with_intercept(self.data.x, x, self.fit_intercept)
    }

    /// Zero coefficients with the loss-minimizing intercept
    pub fn default_init(&self) -> Result<Array2<f64>> {
        let (rows, cols) = self.shape();
        let mut init = Array2::zeros((rows, cols));
        if self.fit_intercept {
            for (k, y_k) in self.data.y.columns().into_iter().enumerate() {
                init[[0, k]] = self
                    .loss
                    .intercept_at_coef_eq0(y_k, self.data.sample_weight)?;
            }
        }
        Ok(init)
    }

    /// Stacks an intercept on top of the coefficients in the variable layout
    pub fn cat_intercept_coef(
        &self,
        intercept: Option<ArrayView1<f64>>,
        coef: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        let expected = (self.data.n_features(), self.data.n_responses());
        if coef.dim() != expected {
            return Err(GlmError::dims(
                "coefficient initializer",
                format!("{:?}", expected),
                format!("{:?}", coef.dim()),
            ));
        }
        match (self.fit_intercept, intercept) {
            (false, _) => Ok(coef.to_owned()),
            (true, Some(b0)) if b0.len() == expected.1 => Ok(stack_rows(b0, coef)),
            (true, Some(b0)) => Err(GlmError::dims("intercept initializer", expected.1, b0.len())),
            (true, None) => Err(GlmError::config("an intercept initializer is required")),
        }
    }

    /// Splits a variable into `(coef, intercept)`
    pub fn decat_coef_intercept(&self, x: ArrayView2<f64>) -> (Array2<f64>, Option<Array1<f64>>) {
        if self.fit_intercept {
            (x.slice(s![1.., ..]).to_owned(), Some(x.row(0).to_owned()))
        } else {
            (x.to_owned(), None)
        }
    }

    /// Gradient of the coefficient block with the intercept held at its default
    /// and all coefficients at zero
    pub fn coef_grad_at_zero(&self) -> Result<Array2<f64>> {
        let init = self.default_init()?;
        let grad = self.gradient(init.view())?;
        Ok(if self.fit_intercept {
            grad.slice(s![1.., ..]).to_owned()
        } else {
            grad
        })
    }
}

impl<'a, M> Function for Glm<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    fn name(&self) -> &'static str {
        self.loss.name()
    }

    fn shape(&self) -> (usize, usize) {
        (
            self.data.n_features() + usize::from(self.fit_intercept),
            self.data.n_responses(),
        )
    }

    fn value(&self, x: ArrayView2<f64>) -> f64 {
        let z = self.linear_predictor(x);
        let losses = self.loss.sample_losses(z.view(), self.data.y);
        let total = match self.data.sample_weight {
            Some(w) => losses.dot(&w),
            None => losses.sum(),
        };
        total / self.data.n_samples() as f64
    }

    fn is_smooth(&self) -> bool {
        true
    }

    fn grad_lip(&self) -> Option<f64> {
        self.lip
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let z = self.linear_predictor(x);
        let mut g = self.loss.sample_grads(z.view(), self.data.y);
        if let Some(w) = self.data.sample_weight {
            g *= &w.insert_axis(Axis(1));
        }
        let grad = adj_with_intercept(self.data.x, g.view(), self.fit_intercept);
        Ok(grad / self.data.n_samples() as f64)
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Central differences of `f.value`
    fn numeric_grad(f: &dyn Function, x: ArrayView2<f64>) -> Array2<f64> {
        let h = 1e-6;
        let mut out = Array2::zeros(x.dim());
        for ((i, j), o) in out.indexed_iter_mut() {
            let mut xp = x.to_owned();
            let mut xm = x.to_owned();
            xp[[i, j]] += h;
            xm[[i, j]] -= h;
            *o = (f.value(xp.view()) - f.value(xm.view())) / (2. * h);
        }
        out
    }

    fn design() -> (Array2<f64>, Array1<f64>) {
        let X = array![[1., 2.], [0., -1.], [3., 1.], [-2., 0.5], [1., 1.]];
        let y = array![1., -2., 4., 0.5, 0.];
        (X, y)
    }

    #[test]
    fn lin_reg_gradient_matches_differences() {
        let (X, y) = design();
        let w = array![1., 2., 0.5, 1., 0.];
        let data = GlmData::new(&X, y.view())
            .unwrap()
            .with_sample_weight(w.view())
            .unwrap();
        let glm = Glm::new(data, LossConfig::LinReg.build().unwrap(), true);
        let x = array![[0.3], [-0.7], [1.1]];
        assert_abs_diff_eq!(
            glm.gradient(x.view()).unwrap(),
            numeric_grad(&glm, x.view()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn huber_multi_response_gradient_matches_differences() {
        let (X, y) = design();
        let Y = ndarray::stack![Axis(1), y, y.mapv(|v| 3. * v - 1.)];
        let data = GlmData::multi_response(&X, Y.view()).unwrap();
        let glm = Glm::new(data, LossConfig::Huber { knot: 1. }.build().unwrap(), true);
        assert_eq!(glm.shape(), (3, 2));
        let x = array![[0.1, -1.], [0.5, 2.], [-0.2, 0.4]];
        assert_abs_diff_eq!(
            glm.gradient(x.view()).unwrap(),
            numeric_grad(&glm, x.view()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn lin_reg_lipschitz_is_gram_norm() {
        let X = array![[10., 0.], [0., 20.]];
        let y = array![50., 100.];
        let data = GlmData::new(&X, y.view()).unwrap();
        let glm = Glm::new(data, LossConfig::LinReg.build().unwrap(), false);
        // (1/n) * sigma_1(X^T X) = 400 / 2
        assert_abs_diff_eq!(glm.grad_lip().unwrap(), 200., epsilon = 1e-6);

        let poisson = Glm::new(
            GlmData::new(&X, y.view()).unwrap(),
            LossConfig::Poisson.build().unwrap(),
            false,
        );
        assert_eq!(poisson.grad_lip(), None);
    }

    #[test]
    fn lipschitz_bounds_the_weighted_gram_matrix() {
        let (X, y) = design();
        let w = array![1., 2., 0.5, 1., 3.];
        let data = GlmData::new(&X, y.view())
            .unwrap()
            .with_sample_weight(w.view())
            .unwrap();
        let glm = Glm::new(data, LossConfig::LinReg.build().unwrap(), true);

        // sigma_1(W^{1/2} [1 X])^2 / n
        let mut xt = Array2::ones((5, 3));
        xt.slice_mut(s![.., 1..]).assign(&X);
        let scaled = &xt * &w.mapv(f64::sqrt).insert_axis(Axis(1));
        let exact = crate::penalty::spectral_norm(scaled.view()).powi(2) / 5.;
        let lip = glm.grad_lip().unwrap();
        assert!(lip >= exact * (1. - 1e-12), "{} < {}", lip, exact);
        assert_abs_diff_eq!(lip, exact, epsilon = 1e-9 * exact);

        let logistic = Glm::new(
            GlmData::new(&X, y.view()).unwrap(),
            LossConfig::Logistic.build().unwrap(),
            false,
        );
        let exact = crate::penalty::spectral_norm(X.view()).powi(2) / 5. / 4.;
        assert!(logistic.grad_lip().unwrap() >= exact * (1. - 1e-12));
    }

    #[test]
    fn default_init_and_layout() {
        let (X, y) = design();
        let data = GlmData::new(&X, y.view()).unwrap();
        let glm = Glm::new(data, LossConfig::LinReg.build().unwrap(), true);
        let init = glm.default_init().unwrap();
        assert_abs_diff_eq!(init, array![[0.7], [0.], [0.]], epsilon = 1e-12);

        let coef = array![[1.], [2.]];
        let b0 = array![-1.];
        let x = glm.cat_intercept_coef(Some(b0.view()), coef.view()).unwrap();
        assert_abs_diff_eq!(x, array![[-1.], [1.], [2.]]);
        let (c, i) = glm.decat_coef_intercept(x.view());
        assert_abs_diff_eq!(c, coef);
        assert_eq!(i, Some(b0.clone()));

        assert!(matches!(
            glm.cat_intercept_coef(None, coef.view()),
            Err(GlmError::Configuration(_))
        ));
        assert!(matches!(
            glm.cat_intercept_coef(Some(b0.view()), array![[1.]].view()),
            Err(GlmError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn data_shape_checks() {
        let (X, _) = design();
        let short = array![1., 2.];
        assert!(matches!(
            GlmData::new(&X, short.view()),
            Err(GlmError::DimensionMismatch { .. })
        ));
        let y = array![1., 2., 3., 4., 5.];
        let negative = array![1., -1., 1., 1., 1.];
        let data = GlmData::new(&X, y.view()).unwrap();
        assert!(data.with_sample_weight(negative.view()).is_err());
    }

    #[test]
    fn loss_config_from_json() {
        let cfg: LossConfig = serde_json::from_str(r#"{"kind": "huber"}"#).unwrap();
        assert_eq!(cfg, LossConfig::Huber { knot: 1.35 });
        let cfg: LossConfig = serde_json::from_str(r#"{"kind": "poisson"}"#).unwrap();
        assert_eq!(cfg, LossConfig::Poisson);
        assert!(serde_json::from_str::<LossConfig>(r#"{"kind": "gamma"}"#).is_err());
        assert!(LossConfig::Huber { knot: 0. }.build().is_err());
    }
}
