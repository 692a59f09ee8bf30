use rand::Rng;
use tracing::{debug, warn};

use crate::{
    Error, Family, GlmConfig, GlmParameters, GlmUnit, Link, PredictorSet, ResizePolicy, Result,
};

/// A GLM over `D` dimensions sharing one set of coefficients.
///
/// Means and variances are recomputed from the parameters on every call. The
/// only cached values are the explicitly stored means used to resynchronise a
/// coupled response after the host changes state behind the model's back.
#[derive(Debug, Clone)]
pub struct MultiGlm {
    family: Family,
    link: Link,
    predictors: PredictorSet,
    stored_means: Option<Vec<f64>>,
}

impl MultiGlm {
    #[tracing::instrument(skip(predictors, params))]
    pub fn new(
        config: &GlmConfig,
        predictors: PredictorSet,
        params: &mut GlmParameters,
    ) -> Result<Self> {
        config.validate()?;
        let family = config.family;
        let link = config.resolved_link();
        family.validate_extras(&params.extras)?;
        let predictors = predictors.transformed(config.transform)?;
        let p = predictors.len();

        if params.coefficients.len() != p {
            match config.resize {
                ResizePolicy::Strict => {
                    return Err(Error::CoefficientLengthMismatch {
                        expected: p,
                        found: params.coefficients.len(),
                    })
                },
                ResizePolicy::Lenient => {
                    warn!(
                        "Resizing coefficients from {} to {} to match the predictors",
                        params.coefficients.len(),
                        p
                    );
                    params.coefficients.resize(p);
                },
            }
        }
        if let Some(indicators) = params.indicators.as_mut() {
            if indicators.len() != p {
                match config.resize {
                    ResizePolicy::Strict => {
                        return Err(Error::IndicatorLengthMismatch {
                            expected: p,
                            found: indicators.len(),
                        })
                    },
                    ResizePolicy::Lenient => {
                        warn!(
                            "Resizing indicators from {} to {} to match the predictors",
                            indicators.len(),
                            p
                        );
                        indicators.resize(p, false);
                    },
                }
            }
        }

        debug!(
            %family,
            %link,
            dimension = predictors.dimension(),
            predictors = p,
            "Created GLM"
        );
        Ok(Self {
            family,
            link,
            predictors,
            stored_means: None,
        })
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn predictors(&self) -> &PredictorSet {
        &self.predictors
    }

    /// Number of dimensions `D`.
    pub fn dimension(&self) -> usize {
        self.predictors.dimension()
    }

    /// Number of predictors `P`.
    pub fn num_predictors(&self) -> usize {
        self.predictors.len()
    }

    /// Checks that `params` still has one coefficient (and indicator) per
    /// predictor.
    pub fn check_parameters(&self, params: &GlmParameters) -> Result<()> {
        let p = self.num_predictors();
        if params.coefficients.len() != p {
            return Err(Error::CoefficientLengthMismatch {
                expected: p,
                found: params.coefficients.len(),
            });
        }
        if let Some(indicators) = &params.indicators {
            if indicators.len() != p {
                return Err(Error::IndicatorLengthMismatch {
                    expected: p,
                    found: indicators.len(),
                });
            }
        }
        Ok(())
    }

    fn check_dimension(&self, found: usize) -> Result<()> {
        if found != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                found,
            });
        }
        Ok(())
    }

    pub fn unit<'a>(&'a self, params: &'a GlmParameters, index: usize) -> Result<GlmUnit<'a>> {
        GlmUnit::new(self.family, self.link, &self.predictors, params, index)
    }

    pub fn units<'a>(
        &'a self,
        params: &'a GlmParameters,
    ) -> Result<impl Iterator<Item = GlmUnit<'a>> + 'a> {
        self.check_parameters(params)?;
        let (family, link, predictors) = (self.family, self.link, &self.predictors);
        Ok((0..self.dimension()).map(move |index| GlmUnit {
            family,
            link,
            predictors,
            params,
            index,
        }))
    }

    /// Sum of the per-dimension log densities of `values`.
    ///
    /// Fails with a dimension mismatch if `values` does not have one entry
    /// per dimension, and with a domain error if any mean is invalid.
    pub fn log_density(&self, params: &GlmParameters, values: &[f64]) -> Result<f64> {
        self.check_dimension(values.len())?;
        let mut logp = 0.0;
        for (unit, x) in self.units(params)?.zip(values) {
            logp += unit.log_density(*x)?;
        }
        Ok(logp)
    }

    /// Like [`MultiGlm::log_density`] but an invalid mean gives a log prior
    /// of negative infinity instead of an error.
    pub fn log_prior(&self, params: &GlmParameters, values: &[f64]) -> Result<f64> {
        match self.log_density(params, values) {
            Err(e) if e.is_recoverable() => Ok(f64::NEG_INFINITY),
            other => other,
        }
    }

    pub fn mean_at(&self, params: &GlmParameters, index: usize) -> Result<f64> {
        self.check_parameters(params)?;
        self.unit(params, index)?.mean()
    }

    pub fn variance_at(&self, params: &GlmParameters, index: usize) -> Result<f64> {
        self.check_parameters(params)?;
        self.unit(params, index)?.variance()
    }

    pub fn all_means(&self, params: &GlmParameters) -> Result<Vec<f64>> {
        self.units(params)?.map(|unit| unit.mean()).collect()
    }

    pub fn all_variances(&self, params: &GlmParameters) -> Result<Vec<f64>> {
        self.units(params)?.map(|unit| unit.variance()).collect()
    }

    /// Draws `n` response vectors of length `D`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        params: &GlmParameters,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let distributions = self
            .units(params)?
            .map(|unit| unit.distribution())
            .collect::<Result<Vec<_>>>()?;
        (0..n)
            .map(|_| distributions.iter().map(|d| d.sample(rng)).collect())
            .collect()
    }

    /// Snapshots the current means as the reference for resynchronisation.
    pub fn store_means(&mut self, params: &GlmParameters) -> Result<()> {
        self.stored_means = Some(self.all_means(params)?);
        Ok(())
    }

    pub fn set_stored_means(&mut self, means: Vec<f64>) -> Result<()> {
        self.check_dimension(means.len())?;
        self.stored_means = Some(means);
        Ok(())
    }

    pub fn stored_means(&self) -> Option<&[f64]> {
        self.stored_means.as_deref()
    }

    pub fn clear_stored_means(&mut self) {
        self.stored_means = None;
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use test_log::test;

    use super::*;
    use crate::{Bounds, Extras, PredictorTransform};

    macro_rules! assert_float_eq {
        ($a:expr, $b:expr, $tol:expr) => {
            assert!(($a - $b).abs() < $tol, "{:.22} != {:.22}", $a, $b);
        };
    }

    macro_rules! float_eq {
        ($a:expr, $b:expr) => {
            assert_float_eq!($a, $b, 1e-12);
        };
    }

    fn predictors() -> PredictorSet {
        PredictorSet::new(vec![
            ("a", vec![1.0, 2.0, 0.5]),
            ("b", vec![0.0, 1.0, -1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_means_and_variances() {
        let mut params = GlmParameters::new(0.5, vec![1.0, -0.5], Extras::sigma2(2.0));
        let glm =
            MultiGlm::new(&GlmConfig::new(Family::Normal), predictors(), &mut params).unwrap();
        assert_eq!(glm.dimension(), 3);
        assert_eq!(glm.num_predictors(), 2);
        assert_eq!(glm.link(), Link::Identity);
        let means = glm.all_means(&params).unwrap();
        float_eq!(means[0], 1.5);
        float_eq!(means[1], 2.0);
        float_eq!(means[2], 1.5);
        float_eq!(glm.mean_at(&params, 1).unwrap(), 2.0);
        assert_eq!(glm.all_variances(&params).unwrap(), vec![2.0; 3]);
        float_eq!(glm.variance_at(&params, 2).unwrap(), 2.0);
        assert!(matches!(
            glm.mean_at(&params, 3),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_log_density() {
        let mut params = GlmParameters::new(0.5, vec![1.0, -0.5], Extras::none());
        let glm = MultiGlm::new(&GlmConfig::new(Family::Poisson), predictors(), &mut params)
            .unwrap();
        let values = [1.0, 3.0, 0.0];
        let expected = glm
            .units(&params)
            .unwrap()
            .zip(values)
            .map(|(u, x)| u.log_density(x).unwrap())
            .sum::<f64>();
        float_eq!(glm.log_density(&params, &values).unwrap(), expected);
        assert!(matches!(
            glm.log_density(&params, &[1.0, 3.0, 0.0, 2.0]),
            Err(Error::DimensionMismatch {
                expected: 3,
                found: 4
            })
        ));
        assert_eq!(
            glm.log_density(&params, &[1.0, 3.5, 0.0]).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_log_prior_domain() {
        let mut params = GlmParameters::new(0.5, vec![1.0, -0.5], Extras::none());
        let glm = MultiGlm::new(
            &GlmConfig::new(Family::Poisson).with_link(Link::Identity),
            predictors(),
            &mut params,
        )
        .unwrap();
        params.intercept = -5.0;
        assert!(glm.log_density(&params, &[1.0, 1.0, 1.0]).is_err());
        assert_eq!(
            glm.log_prior(&params, &[1.0, 1.0, 1.0]).unwrap(),
            f64::NEG_INFINITY
        );
        assert!(glm.log_prior(&params, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_strict_resize() {
        let mut params = GlmParameters::new(0.0, vec![1.0], Extras::none());
        assert!(matches!(
            MultiGlm::new(&GlmConfig::new(Family::Poisson), predictors(), &mut params),
            Err(Error::CoefficientLengthMismatch {
                expected: 2,
                found: 1
            })
        ));
        let mut params = GlmParameters::new(0.0, vec![1.0, 2.0], Extras::none())
            .with_indicators(vec![true, true, true]);
        assert!(matches!(
            MultiGlm::new(&GlmConfig::new(Family::Poisson), predictors(), &mut params),
            Err(Error::IndicatorLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_lenient_resize() {
        let config = GlmConfig::new(Family::Poisson).with_resize(ResizePolicy::Lenient);
        let mut params =
            GlmParameters::new(0.0, vec![1.0], Extras::none()).with_indicators(vec![true]);
        MultiGlm::new(&config, predictors(), &mut params).unwrap();
        assert_eq!(params.coefficients.values(), &[1.0, 0.0]);
        assert_eq!(params.indicators, Some(vec![true, false]));

        let mut params = GlmParameters::new(0.0, vec![1.0, 2.0, 3.0], Extras::none());
        MultiGlm::new(&config, predictors(), &mut params).unwrap();
        assert_eq!(params.coefficients.values(), &[1.0, 2.0]);

        // zero is outside the bounds, so the padding sits on the nearest edge
        let mut params = GlmParameters::new(0.0, vec![0.75], Extras::none())
            .with_coefficient_bounds(Bounds::new(0.5, 1.0).unwrap());
        MultiGlm::new(&config, predictors(), &mut params).unwrap();
        assert_eq!(params.coefficients.values(), &[0.75, 0.5]);
        assert!(params.coefficients.within_bounds());
    }

    #[test]
    fn test_construction_errors() {
        let mut params = GlmParameters::new(0.0, vec![1.0, 2.0], Extras::none());
        assert!(matches!(
            MultiGlm::new(
                &GlmConfig::new(Family::Poisson).with_link(Link::Logit),
                predictors(),
                &mut params
            ),
            Err(Error::InvalidLink { .. })
        ));
        assert!(matches!(
            MultiGlm::new(&GlmConfig::new(Family::Gamma), predictors(), &mut params),
            Err(Error::MissingExtra { .. })
        ));
        let err = MultiGlm::new(
            &GlmConfig::new(Family::Poisson).with_transform(PredictorTransform {
                log: true,
                ..Default::default()
            }),
            predictors(),
            &mut params,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NegativePredictor { .. }));
    }

    #[test]
    fn test_check_parameters() {
        let mut params = GlmParameters::new(0.0, vec![1.0, 2.0], Extras::none());
        let glm = MultiGlm::new(&GlmConfig::new(Family::Poisson), predictors(), &mut params)
            .unwrap();
        params.coefficients.resize(3);
        assert!(matches!(
            glm.all_means(&params),
            Err(Error::CoefficientLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_stored_means() {
        let mut params = GlmParameters::new(0.5, vec![1.0, -0.5], Extras::sigma(1.0));
        let mut glm =
            MultiGlm::new(&GlmConfig::new(Family::Normal), predictors(), &mut params).unwrap();
        assert!(glm.stored_means().is_none());
        glm.store_means(&params).unwrap();
        params.intercept = 1.5;
        assert_eq!(glm.stored_means().unwrap(), &[1.5, 2.0, 1.5]);
        assert_eq!(glm.all_means(&params).unwrap(), vec![2.5, 3.0, 2.5]);
        assert!(glm.set_stored_means(vec![1.0]).is_err());
        glm.clear_stored_means();
        assert!(glm.stored_means().is_none());
    }

    #[test]
    fn test_sample() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let mut params = GlmParameters::new(0.5, vec![1.0, -0.5], Extras::none());
        let glm = MultiGlm::new(&GlmConfig::new(Family::Poisson), predictors(), &mut params)
            .unwrap();
        let draws = glm.sample(&params, 4000, &mut rng).unwrap();
        assert_eq!(draws.len(), 4000);
        assert!(draws.iter().all(|row| row.len() == 3));
        let means = glm.all_means(&params).unwrap();
        for i in 0..3 {
            let m = draws.iter().map(|row| row[i]).sum::<f64>() / 4000.0;
            let se = (means[i] / 4000.0).sqrt();
            assert!((m - means[i]).abs() < 5.0 * se, "{} {}", m, means[i]);
        }
    }
}
