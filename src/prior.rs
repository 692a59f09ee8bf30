use rand::Rng;
use tracing::debug;

use crate::{
    BoundedParameter, CoefficientCoupling, CouplingConfig, Error, GlmConfig, GlmParameters,
    GlmSummary, Kernel, MultiGlm, PredictorSet, Proposal, Result, Scope,
};

/// Entry point for a host sampler: evaluates the GLM prior on a vector
/// parameter and proposes coupled coefficient moves.
#[derive(Debug, Clone)]
pub struct GlmPrior {
    glm: MultiGlm,
    coupling: Option<CoefficientCoupling>,
}

impl GlmPrior {
    pub fn new(
        config: &GlmConfig,
        predictors: PredictorSet,
        params: &mut GlmParameters,
    ) -> Result<Self> {
        Ok(Self {
            glm: MultiGlm::new(config, predictors, params)?,
            coupling: None,
        })
    }

    pub fn from_json(
        json: &str,
        predictors: PredictorSet,
        params: &mut GlmParameters,
    ) -> Result<Self> {
        Self::new(&GlmConfig::from_json(json)?, predictors, params)
    }

    pub fn glm(&self) -> &MultiGlm {
        &self.glm
    }

    pub fn glm_mut(&mut self) -> &mut MultiGlm {
        &mut self.glm
    }

    /// Log prior density of `values`. Negative infinity when the current
    /// parameters give a mean outside the family's domain; an error only for
    /// structural problems such as a length mismatch.
    pub fn evaluate_log_prior(&self, params: &GlmParameters, values: &[f64]) -> Result<f64> {
        self.glm.log_prior(params, values)
    }

    /// Proposes a coupled coefficient move with the given kernel, window
    /// width and scope. Acceptance statistics carry over between calls that
    /// use the same kernel and scope.
    pub fn propose_coefficient_move<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        params: &mut GlmParameters,
        response: &mut BoundedParameter,
        kernel: Kernel,
        width: f64,
        scope: Scope,
    ) -> Result<Proposal> {
        if !(width.is_finite() && width > 0.0) {
            return Err(Error::InvalidWindowSize(width));
        }
        let coupling = match self.coupling.take() {
            Some(mut coupling) if coupling.kernel() == kernel && coupling.scope() == scope => {
                coupling.set_window_size(width)?;
                coupling
            },
            _ => {
                debug!(?kernel, width, ?scope, "Configuring coupled coefficient move");
                let mut config = CouplingConfig::new(kernel, width, scope);
                config.optimise = false;
                CoefficientCoupling::new(config, &self.glm)?
            },
        };
        let coupling = self.coupling.insert(coupling);
        coupling.propose(rng, &self.glm, params, response)
    }

    /// Commits the last coupled move.
    pub fn accept(&mut self) {
        if let Some(coupling) = self.coupling.as_mut() {
            coupling.accept();
        }
    }

    /// Undoes the last coupled move.
    pub fn reject(&mut self, params: &mut GlmParameters, response: &mut BoundedParameter) {
        if let Some(coupling) = self.coupling.as_mut() {
            coupling.reject(params, response);
        }
    }

    pub fn coupling(&self) -> Option<&CoefficientCoupling> {
        self.coupling.as_ref()
    }

    pub fn current_means(&self, params: &GlmParameters) -> Result<Vec<f64>> {
        self.glm.all_means(params)
    }

    pub fn current_variances(&self, params: &GlmParameters) -> Result<Vec<f64>> {
        self.glm.all_variances(params)
    }

    pub fn summary(
        &self,
        params: &GlmParameters,
        response: Option<&BoundedParameter>,
    ) -> Result<GlmSummary> {
        GlmSummary::new(&self.glm, params, response)
    }
}
