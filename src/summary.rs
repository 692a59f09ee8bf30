use serde::Serialize;

use crate::{BoundedParameter, Error, GlmParameters, MultiGlm, Result};

/// Snapshot of the GLM state for trace output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlmSummary {
    /// `g^-1(intercept)`, the mean with every coefficient switched off.
    pub baseline: f64,
    /// Coefficients with inactive entries reported as zero.
    pub coefficients: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<bool>>,
    /// `mu_i - R_i` for a coupled response `R`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<f64>>,
}

impl GlmSummary {
    pub fn new(
        glm: &MultiGlm,
        params: &GlmParameters,
        response: Option<&BoundedParameter>,
    ) -> Result<Self> {
        glm.check_parameters(params)?;
        let baseline = glm.link().inverse(params.intercept)?;
        let coefficients = (0..glm.num_predictors())
            .map(|j| params.effective_coefficient(j))
            .collect();
        let errors = match response {
            Some(response) => {
                let means = glm.all_means(params)?;
                if response.len() != means.len() {
                    return Err(Error::DimensionMismatch {
                        expected: means.len(),
                        found: response.len(),
                    });
                }
                Some(
                    means
                        .iter()
                        .zip(response.values())
                        .map(|(mu, r)| mu - r)
                        .collect(),
                )
            },
            None => None,
        };
        Ok(Self {
            baseline,
            coefficients,
            indicators: params.indicators.clone(),
            errors,
        })
    }

    /// Column names in the order of [`GlmSummary::row`], using the predictor
    /// names of `glm`.
    pub fn header(&self, glm: &MultiGlm) -> Vec<String> {
        let names = glm.predictors().names();
        let mut header = vec!["baseline".to_string()];
        header.extend(names.iter().map(|n| format!("coefficient.{n}")));
        if self.indicators.is_some() {
            header.extend(names.iter().map(|n| format!("indicator.{n}")));
        }
        if let Some(errors) = &self.errors {
            header.extend((0..errors.len()).map(|i| format!("error.{i}")));
        }
        header
    }

    /// Flat numeric row, indicators encoded as 0 and 1.
    pub fn row(&self) -> Vec<f64> {
        let mut row = vec![self.baseline];
        row.extend(&self.coefficients);
        if let Some(indicators) = &self.indicators {
            row.extend(indicators.iter().map(|b| if *b { 1.0 } else { 0.0 }));
        }
        if let Some(errors) = &self.errors {
            row.extend(errors);
        }
        row
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
