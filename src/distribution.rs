use rand::Rng;
use rand_distr::Distribution as Sampler;
use statrs::{
    distribution::{
        Binomial, Continuous, ContinuousCDF, Discrete, DiscreteCDF, Gamma, NegativeBinomial,
        Normal, Poisson,
    },
    statistics::{DiscreteDistribution, Distribution as Moments},
};

use crate::{
    link::{ln_pnorm, pnorm},
    Error, Result,
};

fn distribution_error(e: impl std::fmt::Display) -> Error {
    Error::Distribution(e.to_string())
}

/// Inverse Gaussian (Wald) distribution with mean `mean` and shape `shape`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseGaussian {
    mean: f64,
    shape: f64,
}

impl InverseGaussian {
    pub fn new(mean: f64, shape: f64) -> Result<Self> {
        if !(mean.is_finite() && mean > 0.0) {
            return Err(Error::Distribution(format!(
                "inverse gaussian mean must be positive, got {mean}"
            )));
        }
        if !(shape.is_finite() && shape > 0.0) {
            return Err(Error::Distribution(format!(
                "inverse gaussian shape must be positive, got {shape}"
            )));
        }
        Ok(Self { mean, shape })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn variance(&self) -> f64 {
        self.mean.powi(3) / self.shape
    }

    pub fn ln_pdf(&self, x: f64) -> f64 {
        if !(x.is_finite() && x > 0.0) {
            return f64::NEG_INFINITY;
        }
        let (mu, lambda) = (self.mean, self.shape);
        0.5 * (lambda / (2.0 * std::f64::consts::PI * x.powi(3))).ln()
            - lambda * (x - mu).powi(2) / (2.0 * mu * mu * x)
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= 0.0 {
            return 0.0;
        }
        if x == f64::INFINITY {
            return 1.0;
        }
        let (mu, lambda) = (self.mean, self.shape);
        let r = (lambda / x).sqrt();
        let first = pnorm(r * (x / mu - 1.0));
        // exp(2 lambda / mu) overflows long before the product does
        let second = (2.0 * lambda / mu + ln_pnorm(-r * (x / mu + 1.0))).exp();
        (first + second).min(1.0)
    }

    /// Quantile by bisection on [`InverseGaussian::cdf`], which is continuous
    /// and strictly increasing on `(0, inf)`. Runs until the bracket can no
    /// longer be split in binary64.
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        if p.is_nan() {
            return f64::NAN;
        }
        if p <= 0.0 {
            return 0.0;
        }
        if p >= 1.0 {
            return f64::INFINITY;
        }
        let mut lo = 0.0;
        let mut hi = self.mean;
        while self.cdf(hi) < p {
            lo = hi;
            hi *= 2.0;
        }
        loop {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                return hi;
            }
            if self.cdf(mid) >= p {
                hi = mid;
            } else {
                lo = mid;
            }
        }
    }
}

/// A fully parameterised response distribution for one dimension.
#[derive(Debug, Clone)]
pub enum FamilyDistribution {
    Normal(Normal),
    Poisson(Poisson),
    Binomial(Binomial),
    Gamma(Gamma),
    InverseGaussian(InverseGaussian),
    NegativeBinomial(NegativeBinomial),
}

impl FamilyDistribution {
    pub fn normal(mean: f64, sd: f64) -> Result<Self> {
        Normal::new(mean, sd)
            .map(Self::Normal)
            .map_err(distribution_error)
    }

    pub fn poisson(mean: f64) -> Result<Self> {
        Poisson::new(mean)
            .map(Self::Poisson)
            .map_err(distribution_error)
    }

    pub fn binomial(n: u64, p: f64) -> Result<Self> {
        Binomial::new(p, n)
            .map(Self::Binomial)
            .map_err(distribution_error)
    }

    /// Gamma with the given shape and mean, i.e. rate `shape / mean`.
    pub fn gamma(shape: f64, mean: f64) -> Result<Self> {
        Gamma::new(shape, shape / mean)
            .map(Self::Gamma)
            .map_err(distribution_error)
    }

    pub fn inverse_gaussian(mean: f64, shape: f64) -> Result<Self> {
        InverseGaussian::new(mean, shape).map(Self::InverseGaussian)
    }

    /// Negative binomial with size `r` and mean `mean`, i.e. success
    /// probability `r / (r + mean)`.
    pub fn negative_binomial(size: f64, mean: f64) -> Result<Self> {
        NegativeBinomial::new(size, size / (size + mean))
            .map(Self::NegativeBinomial)
            .map_err(distribution_error)
    }

    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Self::Poisson(_) | Self::Binomial(_) | Self::NegativeBinomial(_)
        )
    }

    pub fn mean(&self) -> f64 {
        match self {
            Self::Normal(d) => d.mean(),
            Self::Poisson(d) => d.mean(),
            Self::Binomial(d) => d.mean(),
            Self::Gamma(d) => d.mean(),
            Self::InverseGaussian(d) => Some(d.mean()),
            Self::NegativeBinomial(d) => DiscreteDistribution::mean(d),
        }
        .unwrap_or(f64::NAN)
    }

    pub fn variance(&self) -> f64 {
        match self {
            Self::Normal(d) => d.variance(),
            Self::Poisson(d) => d.variance(),
            Self::Binomial(d) => d.variance(),
            Self::Gamma(d) => d.variance(),
            Self::InverseGaussian(d) => Some(d.variance()),
            Self::NegativeBinomial(d) => DiscreteDistribution::variance(d),
        }
        .unwrap_or(f64::NAN)
    }

    /// Log density (or log mass) at `x`, negative infinity outside the
    /// support.
    pub fn ln_density(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => {
                if x.is_finite() {
                    d.ln_pdf(x)
                } else {
                    f64::NEG_INFINITY
                }
            },
            Self::Gamma(d) => {
                if x.is_finite() && x >= 0.0 {
                    d.ln_pdf(x)
                } else {
                    f64::NEG_INFINITY
                }
            },
            Self::InverseGaussian(d) => d.ln_pdf(x),
            Self::Poisson(d) => count(x).map_or(f64::NEG_INFINITY, |k| d.ln_pmf(k)),
            Self::Binomial(d) => count(x)
                .filter(|k| *k <= d.n())
                .map_or(f64::NEG_INFINITY, |k| d.ln_pmf(k)),
            Self::NegativeBinomial(d) => count(x).map_or(f64::NEG_INFINITY, |k| d.ln_pmf(k)),
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        self.ln_density(x).exp()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        match self {
            Self::Normal(d) => d.cdf(x),
            Self::Gamma(d) => {
                if x <= 0.0 {
                    0.0
                } else {
                    d.cdf(x)
                }
            },
            Self::InverseGaussian(d) => d.cdf(x),
            Self::Poisson(d) => discrete_cdf(x, |k| d.cdf(k)),
            Self::Binomial(d) => discrete_cdf(x, |k| d.cdf(k)),
            Self::NegativeBinomial(d) => discrete_cdf(x, |k| d.cdf(k)),
        }
    }

    /// Quantile function `inf { x : cdf(x) >= p }`. For `p = 0` and `p = 1`
    /// this is the lower and upper end of the support.
    pub fn inverse_cdf(&self, p: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidProbability(p));
        }
        Ok(match self {
            Self::Normal(d) => d.inverse_cdf(p),
            Self::Gamma(d) => d.inverse_cdf(p),
            Self::InverseGaussian(d) => d.inverse_cdf(p),
            Self::Poisson(d) => discrete_quantile(p, None, |k| d.cdf(k), |p| d.inverse_cdf(p)),
            Self::Binomial(d) => {
                discrete_quantile(p, Some(d.n()), |k| d.cdf(k), |p| d.inverse_cdf(p))
            },
            Self::NegativeBinomial(d) => {
                discrete_quantile(p, None, |k| d.cdf(k), |p| d.inverse_cdf(p))
            },
        })
    }

    /// `P(x0 < X <= x1) = cdf(x1) - cdf(x0)`.
    pub fn interval_probability(&self, x0: f64, x1: f64) -> Result<f64> {
        if x0.is_nan() || x1.is_nan() || x0 > x1 {
            return Err(Error::InvalidInterval {
                lower: x0,
                upper: x1,
            });
        }
        Ok((self.cdf(x1) - self.cdf(x0)).max(0.0))
    }

    /// Draws one value from the distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        Ok(match self {
            Self::Normal(d) => rand_distr::Normal::new(
                d.mean().unwrap_or(f64::NAN),
                d.std_dev().unwrap_or(f64::NAN),
            )
            .map_err(distribution_error)?
            .sample(rng),
            Self::Poisson(d) => rand_distr::Poisson::new(d.lambda())
                .map_err(distribution_error)?
                .sample(rng),
            Self::Binomial(d) => rand_distr::Binomial::new(d.n(), d.p())
                .map_err(distribution_error)?
                .sample(rng) as f64,
            Self::Gamma(d) => rand_distr::Gamma::new(d.shape(), 1.0 / d.rate())
                .map_err(distribution_error)?
                .sample(rng),
            Self::InverseGaussian(d) => rand_distr::InverseGaussian::new(d.mean(), d.shape())
                .map_err(distribution_error)?
                .sample(rng),
            Self::NegativeBinomial(d) => {
                // gamma-poisson mixture
                let scale = (1.0 - d.p()) / d.p();
                let lambda = rand_distr::Gamma::new(d.r(), scale)
                    .map_err(distribution_error)?
                    .sample(rng);
                if lambda <= 0.0 {
                    0.0
                } else {
                    rand_distr::Poisson::new(lambda)
                        .map_err(distribution_error)?
                        .sample(rng)
                }
            },
        })
    }
}

fn discrete_cdf(x: f64, cdf: impl Fn(u64) -> f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x == f64::INFINITY {
        1.0
    } else {
        cdf(x.floor() as u64)
    }
}

/// Smallest count `k` with `cdf(k) >= p`. `max` is the top of the support
/// when it is finite. The statrs search assumes `cdf(0) < p < 1`.
fn discrete_quantile(
    p: f64,
    max: Option<u64>,
    cdf: impl Fn(u64) -> f64,
    search: impl Fn(f64) -> u64,
) -> f64 {
    if p <= cdf(0) {
        0.0
    } else if p >= 1.0 {
        max.map_or(f64::INFINITY, |n| n as f64)
    } else {
        search(p) as f64
    }
}

/// Non-negative integral `x` as a count.
fn count(x: f64) -> Option<u64> {
    if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64 {
        Some(x as u64)
    } else {
        None
    }
}
