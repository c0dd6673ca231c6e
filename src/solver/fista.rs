use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FitResult, GlmSolver, Solution};
use crate::error::{GlmError, Result};
use crate::func::{wrap_intercept, Function, Sum};
use crate::linop::DesignMatrix;
use crate::loss::{Glm, GlmData, LossConfig};
use crate::penalty::{self, ConstraintConfig, PenaltyConfig, PenaltyUpdate};
use crate::prox::{fista, nop, FistaConfig, FistaTrace, StepRule};

/// Solves penalized GLMs with FISTA
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FistaSolver {
    pub config: FistaConfig,
}

impl FistaSolver {
    #[must_use]
    pub fn new(config: FistaConfig) -> Self {
        FistaSolver { config }
    }

    /// Binds the solver to a problem
    ///
    /// At most one of `penalty` and `constraint` may be given.
    pub fn setup<'a, M>(
        &self,
        data: GlmData<'a, M>,
        loss: &LossConfig,
        penalty: Option<PenaltyConfig>,
        constraint: Option<ConstraintConfig>,
        fit_intercept: bool,
    ) -> Result<FistaGlm<'a, M>>
    where
        M: DesignMatrix + ?Sized,
    {
        self.config.validate()?;
        if penalty.is_some() && constraint.is_some() {
            return Err(GlmError::config(
                "a penalty and a constraint cannot both be provided",
            ));
        }
        let glm = Glm::new(data, loss.build()?, fit_intercept);
        let mut solver = FistaGlm {
            config: self.config.clone(),
            glm,
            penalty,
            constraint,
            smooth_pen: None,
            non_smooth: None,
        };
        solver.build_penalty()?;
        Ok(solver)
    }
}

/// A [`FistaSolver`] bound to its data, loss and penalty
pub struct FistaGlm<'a, M: ?Sized> {
    config: FistaConfig,
    glm: Glm<'a, M>,
    penalty: Option<PenaltyConfig>,
    constraint: Option<ConstraintConfig>,
    smooth_pen: Option<Box<dyn Function>>,
    non_smooth: Option<Box<dyn Function>>,
}

impl<'a, M> FistaGlm<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    pub fn glm(&self) -> &Glm<'a, M> {
        &self.glm
    }

    pub fn penalty(&self) -> Option<&PenaltyConfig> {
        self.penalty.as_ref()
    }

    /// Largest useful penalty value for the current penalty kind
    pub fn pen_max(&self) -> Result<f64> {
        match &self.penalty {
            Some(p) => penalty::pen_max(p.kind(), &self.glm),
            None => Err(GlmError::config("no penalty to compute pen_max for")),
        }
    }

    fn build_penalty(&mut self) -> Result<()> {
        let data = self.glm.data();
        let (p, k) = (data.n_features(), data.n_responses());
        let intercept = self.glm.fit_intercept();
        let (smooth, non_smooth) = match (&self.penalty, &self.constraint) {
            (Some(pen), _) => {
                let parts = penalty::build(pen, p, k)?;
                (parts.smooth, parts.non_smooth)
            }
            (None, Some(con)) => (None, Some(con.build(p, k)?)),
            (None, None) => (None, None),
        };
        self.smooth_pen = smooth.map(|f| wrap_intercept(f, intercept));
        self.non_smooth = non_smooth.map(|f| wrap_intercept(f, intercept));
        Ok(())
    }

    fn initial_point(&self, init: Option<&Solution>) -> Result<Array2<f64>> {
        match init {
            Some(sol) if !self.glm.fit_intercept() || sol.intercept.is_some() => self
                .glm
                .cat_intercept_coef(sol.intercept.as_ref().map(|b| b.view()), sol.coef.view()),
            _ => {
                debug!("starting from the default initializer");
                self.glm.default_init()
            }
        }
    }
}

impl<'a, M> GlmSolver for FistaGlm<'a, M>
where
    M: DesignMatrix + ?Sized,
{
    type Trace = FistaTrace;

    fn update_penalty(&mut self, update: &PenaltyUpdate) -> Result<()> {
        match self.penalty.as_mut() {
            Some(pen) => pen.apply(update)?,
            None => return Err(GlmError::config("there is no penalty to update")),
        }
        self.build_penalty()
    }

    fn solve(&self, init: Option<&Solution>) -> Result<FitResult<FistaTrace>> {
        let x0 = self.initial_point(init)?;
        let smooth: Box<dyn Function + '_> = match &self.smooth_pen {
            Some(ridge) => Box::new(Sum::new(Box::new(&self.glm), Box::new(ridge.as_ref()))?),
            None => Box::new(&self.glm),
        };
        let rule = match smooth.grad_lip() {
            Some(lip) if lip > 0. && lip.is_finite() => StepRule::Lipschitz(lip),
            _ => StepRule::Backtracking { init: 1. },
        };
        debug!(
            "fista on {} with {} penalty, step rule {:?}",
            self.glm.name(),
            self.penalty.as_ref().map_or("no", |p| p.kind().name()),
            rule
        );
        let (x, trace) = fista(
            smooth.as_ref(),
            self.non_smooth.as_deref(),
            x0.view(),
            rule,
            &self.config,
            nop,
        )?;
        let (coef, intercept) = self.glm.decat_coef_intercept(x.view());
        Ok(FitResult {
            solution: Solution { coef, intercept },
            trace,
        })
    }
}
