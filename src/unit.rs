use rand::Rng;

use crate::{Error, Family, FamilyDistribution, GlmParameters, Link, PredictorSet, Result};

/// The GLM evaluated in a single dimension `i`. Holds no state of its own;
/// every value is derived from the borrowed parameters on each call.
#[derive(Debug, Clone, Copy)]
pub struct GlmUnit<'a> {
    pub(crate) family: Family,
    pub(crate) link: Link,
    pub(crate) predictors: &'a PredictorSet,
    pub(crate) params: &'a GlmParameters,
    pub(crate) index: usize,
}

impl<'a> GlmUnit<'a> {
    pub fn new(
        family: Family,
        link: Link,
        predictors: &'a PredictorSet,
        params: &'a GlmParameters,
        index: usize,
    ) -> Result<Self> {
        if index >= predictors.dimension() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: predictors.dimension(),
            });
        }
        Ok(Self {
            family,
            link,
            predictors,
            params,
            index,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// `eta = intercept + sum_j c_j * beta_j * x_ij`, summed in predictor
    /// order.
    pub fn linear_predictor(&self) -> f64 {
        let mut eta = self.params.intercept;
        for j in 0..self.predictors.len() {
            eta += self.params.effective_coefficient(j) * self.predictors.value(self.index, j);
        }
        eta
    }

    /// The mean `mu = g^-1(eta)`, which must lie in the family's domain.
    pub fn mean(&self) -> Result<f64> {
        let mu = self.link.inverse(self.linear_predictor())?;
        self.family.validate_mean(mu)?;
        Ok(mu)
    }

    pub fn variance(&self) -> Result<f64> {
        self.family.variance(self.mean()?, &self.params.extras)
    }

    /// `d mu / d eta` at the current linear predictor.
    pub fn mean_derivative(&self) -> f64 {
        self.link.derivative(self.linear_predictor())
    }

    pub fn distribution(&self) -> Result<FamilyDistribution> {
        self.family.distribution(self.mean()?, &self.params.extras)
    }

    pub fn log_density(&self, x: f64) -> Result<f64> {
        Ok(self.distribution()?.ln_density(x))
    }

    pub fn density(&self, x: f64) -> Result<f64> {
        Ok(self.distribution()?.density(x))
    }

    pub fn cdf(&self, x: f64) -> Result<f64> {
        Ok(self.distribution()?.cdf(x))
    }

    pub fn inverse_cdf(&self, p: f64) -> Result<f64> {
        self.distribution()?.inverse_cdf(p)
    }

    /// `P(x0 < X <= x1)` in this dimension.
    pub fn interval_probability(&self, x0: f64, x1: f64) -> Result<f64> {
        self.distribution()?.interval_probability(x0, x1)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.distribution()?.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::Extras;

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

    fn ones(p: usize) -> PredictorSet {
        PredictorSet::unnamed(vec![vec![1.0]; p]).unwrap()
    }

    #[test]
    fn test_indicator_gating() {
        let predictors = ones(3);
        let params = GlmParameters::new(1.0, vec![2.0, 3.0, 4.0], Extras::sigma(1.0))
            .with_indicators(vec![true, false, true]);
        let unit = GlmUnit::new(Family::Normal, Link::Identity, &predictors, &params, 0).unwrap();
        float_eq!(unit.linear_predictor(), 7.0);
        float_eq!(unit.mean().unwrap(), 7.0);

        let params = params.with_indicators(vec![false, false, false]);
        let unit = GlmUnit::new(Family::Normal, Link::Identity, &predictors, &params, 0).unwrap();
        float_eq!(unit.mean().unwrap(), 1.0);
    }

    #[test]
    fn test_normal_identity() {
        let predictors = PredictorSet::unnamed(vec![vec![1.0], vec![2.0]]).unwrap();
        let params = GlmParameters::new(2.0, vec![1.5, -0.5], Extras::sigma(0.7));
        let unit = GlmUnit::new(Family::Normal, Link::Identity, &predictors, &params, 0).unwrap();
        float_eq!(unit.mean().unwrap(), 2.5);
        float_eq!(unit.variance().unwrap(), 0.49);
        float_eq!(unit.mean_derivative(), 1.0);
        let expected = -0.5 * (2.0 * std::f64::consts::PI * 0.49).ln();
        float_eq!(unit.log_density(2.5).unwrap(), expected);
    }

    #[test]
    fn test_gamma_inverse() {
        let predictors = ones(1);
        let params = GlmParameters::new(1.0, vec![1.5], Extras::shape(2.0));
        let unit = GlmUnit::new(Family::Gamma, Link::Inverse, &predictors, &params, 0).unwrap();
        float_eq!(unit.linear_predictor(), 2.5);
        float_eq!(unit.mean().unwrap(), 0.4);
        float_eq!(unit.variance().unwrap(), 0.16 / 2.0);
    }

    #[test]
    fn test_gamma_log() {
        let predictors = PredictorSet::unnamed(vec![vec![2.0], vec![1.5]]).unwrap();
        let params = GlmParameters::new(1.0, vec![0.3, 0.2], Extras::shape(2.5));
        let unit = GlmUnit::new(Family::Gamma, Link::Log, &predictors, &params, 0).unwrap();
        float_eq!(unit.linear_predictor(), 1.9);
        let mu = unit.mean().unwrap();
        assert_float_eq!(mu, 6.6859, 1e-4);
        float_eq!(mu, 1.9f64.exp());
        let var = unit.variance().unwrap();
        assert_float_eq!(var, 17.88, 1e-2);
        float_eq!(var, mu * mu / 2.5);
    }

    #[test]
    fn test_quantiles() {
        let predictors = PredictorSet::unnamed(vec![vec![1.0], vec![2.0]]).unwrap();
        let params = GlmParameters::new(2.0, vec![1.5, -0.5], Extras::sigma(0.7));
        let unit = GlmUnit::new(Family::Normal, Link::Identity, &predictors, &params, 0).unwrap();
        assert_float_eq!(unit.inverse_cdf(0.5).unwrap(), 2.5, 1e-12);
        let x = unit.inverse_cdf(0.9).unwrap();
        assert_float_eq!(unit.cdf(x).unwrap(), 0.9, 1e-10);
        assert_float_eq!(
            unit.interval_probability(2.5, f64::INFINITY).unwrap(),
            0.5,
            1e-12
        );
        assert!(unit.inverse_cdf(-0.1).is_err());

        let params = GlmParameters::new(-2.0, vec![0.5, 0.0], Extras::none());
        let unit = GlmUnit::new(Family::Poisson, Link::Identity, &predictors, &params, 0).unwrap();
        assert!(matches!(
            unit.inverse_cdf(0.5),
            Err(Error::MeanDomain { .. })
        ));
    }

    #[test]
    fn test_mean_domain_errors() {
        let predictors = ones(1);
        let params = GlmParameters::new(0.9, vec![0.5], Extras::n_trials(5));
        let unit =
            GlmUnit::new(Family::Binomial, Link::Identity, &predictors, &params, 0).unwrap();
        assert!(matches!(unit.mean(), Err(Error::MeanDomain { .. })));
        assert!(unit.log_density(1.0).unwrap_err().is_recoverable());

        let params = GlmParameters::new(-2.0, vec![0.5], Extras::none());
        let unit = GlmUnit::new(Family::Poisson, Link::Identity, &predictors, &params, 0).unwrap();
        assert!(matches!(unit.mean(), Err(Error::MeanDomain { .. })));

        let params = GlmParameters::new(-2.0, vec![0.5], Extras::shape(1.0));
        let unit = GlmUnit::new(Family::Gamma, Link::Inverse, &predictors, &params, 0).unwrap();
        assert!(matches!(unit.mean(), Err(Error::LinkDomain { .. })));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let predictors = ones(1);
        let params = GlmParameters::new(0.0, vec![0.5], Extras::none());
        assert!(matches!(
            GlmUnit::new(Family::Poisson, Link::Log, &predictors, &params, 1),
            Err(Error::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }
}
