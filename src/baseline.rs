use tracing::debug;

use crate::{Error, Link, PredictorSet, PredictorTransform, Result};

/// A deterministic GLM function around a baseline value,
///
/// `value_i = g^-1(g(baseline) + sum_j c_j * beta_j * x_ij + e_(i mod E))`,
///
/// used to build per-dimension rates (log link), probabilities (logit link)
/// or plain linear values (identity link) from predictors.
#[derive(Debug, Clone)]
pub struct BaselineGlm {
    link: Link,
    predictors: PredictorSet,
}

impl BaselineGlm {
    pub const LINKS: [Link; 3] = [Link::Log, Link::Logit, Link::Identity];

    #[tracing::instrument(skip(predictors))]
    pub fn new(
        link: Link,
        predictors: PredictorSet,
        transform: PredictorTransform,
    ) -> Result<Self> {
        if !Self::LINKS.contains(&link) {
            return Err(Error::UnsupportedBaselineLink(link));
        }
        let predictors = predictors.transformed(transform)?;
        debug!(%link, predictors = predictors.len(), "Created baseline GLM");
        Ok(Self { link, predictors })
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn dimension(&self) -> usize {
        self.predictors.dimension()
    }

    pub fn predictors(&self) -> &PredictorSet {
        &self.predictors
    }

    /// The intercept `g(baseline)`. Fails if the baseline is outside the
    /// link's domain.
    pub fn intercept(&self, baseline: f64) -> Result<f64> {
        self.link.apply(baseline)
    }

    /// Evaluates the function in every dimension. A missing indicator
    /// vector means every coefficient is active; error terms are recycled
    /// over the dimensions and their count must divide `D`.
    pub fn values(
        &self,
        baseline: f64,
        coefficients: &[f64],
        indicators: Option<&[bool]>,
        errors: Option<&[f64]>,
    ) -> Result<Vec<f64>> {
        let p = self.predictors.len();
        if coefficients.len() != p {
            return Err(Error::CoefficientLengthMismatch {
                expected: p,
                found: coefficients.len(),
            });
        }
        if let Some(indicators) = indicators {
            if indicators.len() != p {
                return Err(Error::IndicatorLengthMismatch {
                    expected: p,
                    found: indicators.len(),
                });
            }
        }
        let d = self.dimension();
        if let Some(errors) = errors {
            if errors.is_empty() || d % errors.len() != 0 {
                return Err(Error::ErrorTermLength {
                    dimension: d,
                    len: errors.len(),
                });
            }
        }

        let intercept = self.intercept(baseline)?;
        (0..d)
            .map(|i| {
                let mut eta = intercept;
                for (j, beta) in coefficients.iter().enumerate() {
                    if indicators.is_none_or(|ind| ind[j]) {
                        eta += beta * self.predictors.value(i, j);
                    }
                }
                if let Some(errors) = errors {
                    eta += errors[i % errors.len()];
                }
                self.link.inverse(eta)
            })
            .collect()
    }
}
