use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, FamilyDistribution, Link, Result};

/// Exponential family of the response distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Normal,
    Poisson,
    Binomial,
    Gamma,
    InverseGaussian,
    NegativeBinomial,
}

/// Family specific parameters that are not determined by the mean.
///
/// Exactly the parameters a family needs must be present, see
/// [`Family::validate_extras`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Extras {
    /// Normal standard deviation.
    pub sigma: Option<f64>,
    /// Normal variance, alternative to `sigma`.
    pub sigma2: Option<f64>,
    /// Binomial number of trials.
    pub n_trials: Option<u64>,
    /// Gamma shape, or the inverse Gaussian shape `lambda`.
    pub shape: Option<f64>,
    /// Negative binomial size (dispersion) `r`.
    pub size: Option<f64>,
}

impl Extras {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sigma(sigma: f64) -> Self {
        Self {
            sigma: Some(sigma),
            ..Self::default()
        }
    }

    pub fn sigma2(sigma2: f64) -> Self {
        Self {
            sigma2: Some(sigma2),
            ..Self::default()
        }
    }

    pub fn n_trials(n: u64) -> Self {
        Self {
            n_trials: Some(n),
            ..Self::default()
        }
    }

    pub fn shape(shape: f64) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn size(size: f64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    fn present(&self) -> [(&'static str, bool); 5] {
        [
            ("sigma", self.sigma.is_some()),
            ("sigma2", self.sigma2.is_some()),
            ("n_trials", self.n_trials.is_some()),
            ("shape", self.shape.is_some()),
            ("size", self.size.is_some()),
        ]
    }
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Normal,
        Family::Poisson,
        Family::Binomial,
        Family::Gamma,
        Family::InverseGaussian,
        Family::NegativeBinomial,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::Poisson => "poisson",
            Family::Binomial => "binomial",
            Family::Gamma => "gamma",
            Family::InverseGaussian => "inverse_gaussian",
            Family::NegativeBinomial => "negative_binomial",
        }
    }

    pub fn canonical_link(&self) -> Link {
        match self {
            Family::Normal => Link::Identity,
            Family::Poisson => Link::Log,
            Family::Binomial => Link::Logit,
            Family::Gamma => Link::Inverse,
            Family::InverseGaussian => Link::InverseSquared,
            Family::NegativeBinomial => Link::Log,
        }
    }

    /// Links accepted for this family, canonical link first.
    pub fn valid_links(&self) -> &'static [Link] {
        match self {
            Family::Normal => &[Link::Identity, Link::Log],
            Family::Poisson => &[Link::Log, Link::Identity, Link::Sqrt],
            Family::Binomial => &[Link::Logit, Link::Probit, Link::Identity],
            Family::Gamma => &[Link::Inverse, Link::Log, Link::Identity],
            Family::InverseGaussian => &[
                Link::InverseSquared,
                Link::Inverse,
                Link::Log,
                Link::Identity,
            ],
            Family::NegativeBinomial => &[Link::Log, Link::Identity, Link::Sqrt],
        }
    }

    pub fn is_valid_link(&self, link: Link) -> bool {
        self.valid_links().contains(&link)
    }

    pub fn check_link(&self, link: Link) -> Result<()> {
        if self.is_valid_link(link) {
            Ok(())
        } else {
            Err(Error::InvalidLink {
                family: *self,
                link,
            })
        }
    }

    /// Names of the extra parameters this family requires. The normal family
    /// takes either `sigma` or `sigma2`.
    pub fn required_extras(&self) -> &'static [&'static str] {
        match self {
            Family::Normal => &["sigma", "sigma2"],
            Family::Poisson => &[],
            Family::Binomial => &["n_trials"],
            Family::Gamma | Family::InverseGaussian => &["shape"],
            Family::NegativeBinomial => &["size"],
        }
    }

    pub fn validate_mean(&self, mu: f64) -> Result<()> {
        let ok = match self {
            Family::Normal => mu.is_finite(),
            Family::Poisson
            | Family::Gamma
            | Family::InverseGaussian
            | Family::NegativeBinomial => mu.is_finite() && mu > 0.0,
            Family::Binomial => (0.0..=1.0).contains(&mu),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::MeanDomain {
                family: *self,
                value: mu,
            })
        }
    }

    pub fn validate_extras(&self, extras: &Extras) -> Result<()> {
        let required = self.required_extras();
        for (name, present) in extras.present() {
            if present && !required.contains(&name) {
                return Err(Error::UnusedExtra {
                    family: *self,
                    extra: name,
                });
            }
        }
        match self {
            Family::Normal => match (extras.sigma, extras.sigma2) {
                (Some(_), Some(_)) => Err(Error::ConflictingScale),
                (None, None) => Err(Error::MissingExtra {
                    family: *self,
                    extra: "sigma",
                }),
                (Some(sigma), None) => positive("sigma", sigma).map(|_| ()),
                (None, Some(sigma2)) => positive("sigma2", sigma2).map(|_| ()),
            },
            Family::Poisson => Ok(()),
            Family::Binomial => match extras.n_trials {
                Some(0) => Err(Error::InvalidExtra {
                    extra: "n_trials",
                    value: 0.0,
                }),
                Some(_) => Ok(()),
                None => Err(Error::MissingExtra {
                    family: *self,
                    extra: "n_trials",
                }),
            },
            Family::Gamma | Family::InverseGaussian => {
                positive("shape", self.require(extras.shape, "shape")?).map(|_| ())
            },
            Family::NegativeBinomial => {
                positive("size", self.require(extras.size, "size")?).map(|_| ())
            },
        }
    }

    /// Variance of the response at mean `mu`.
    pub fn variance(&self, mu: f64, extras: &Extras) -> Result<f64> {
        Ok(match self {
            Family::Normal => self.sigma2(extras)?,
            Family::Poisson => mu,
            Family::Binomial => self.n_trials(extras)? as f64 * mu * (1.0 - mu),
            Family::Gamma => mu * mu / self.require(extras.shape, "shape")?,
            Family::InverseGaussian => mu * mu * mu / self.require(extras.shape, "shape")?,
            Family::NegativeBinomial => mu + mu * mu / self.require(extras.size, "size")?,
        })
    }

    /// Builds the response distribution with mean `mu`.
    pub fn distribution(&self, mu: f64, extras: &Extras) -> Result<FamilyDistribution> {
        self.validate_mean(mu)?;
        match self {
            Family::Normal => FamilyDistribution::normal(mu, self.sigma2(extras)?.sqrt()),
            Family::Poisson => FamilyDistribution::poisson(mu),
            Family::Binomial => FamilyDistribution::binomial(self.n_trials(extras)?, mu),
            Family::Gamma => FamilyDistribution::gamma(self.require(extras.shape, "shape")?, mu),
            Family::InverseGaussian => {
                FamilyDistribution::inverse_gaussian(mu, self.require(extras.shape, "shape")?)
            },
            Family::NegativeBinomial => {
                FamilyDistribution::negative_binomial(self.require(extras.size, "size")?, mu)
            },
        }
    }

    fn sigma2(&self, extras: &Extras) -> Result<f64> {
        match (extras.sigma, extras.sigma2) {
            (_, Some(sigma2)) => Ok(sigma2),
            (Some(sigma), None) => Ok(sigma * sigma),
            (None, None) => Err(Error::MissingExtra {
                family: *self,
                extra: "sigma",
            }),
        }
    }

    fn n_trials(&self, extras: &Extras) -> Result<u64> {
        extras.n_trials.ok_or(Error::MissingExtra {
            family: *self,
            extra: "n_trials",
        })
    }

    fn require(&self, value: Option<f64>, extra: &'static str) -> Result<f64> {
        value.ok_or(Error::MissingExtra {
            family: *self,
            extra,
        })
    }
}

fn positive(extra: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidExtra { extra, value })
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "normal" | "gaussian" => Ok(Family::Normal),
            "poisson" => Ok(Family::Poisson),
            "binomial" => Ok(Family::Binomial),
            "gamma" => Ok(Family::Gamma),
            "inversegaussian" => Ok(Family::InverseGaussian),
            "negativebinomial" => Ok(Family::NegativeBinomial),
            _ => Err(Error::UnknownFamily(s.to_string())),
        }
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Family {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

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

    #[test]
    fn test_canonical_links_are_valid() {
        for family in Family::ALL {
            assert!(family.is_valid_link(family.canonical_link()));
            assert_eq!(family.valid_links()[0], family.canonical_link());
        }
        assert_eq!(Family::Gamma.canonical_link(), Link::Inverse);
        assert_eq!(Family::Binomial.canonical_link(), Link::Logit);
    }

    #[test]
    fn test_valid_link_table() {
        assert!(Family::Normal.is_valid_link(Link::Log));
        assert!(!Family::Normal.is_valid_link(Link::Logit));
        assert!(Family::Poisson.is_valid_link(Link::Sqrt));
        assert!(!Family::Poisson.is_valid_link(Link::Probit));
        assert!(Family::Binomial.is_valid_link(Link::Probit));
        assert!(!Family::Binomial.is_valid_link(Link::Log));
        assert!(Family::Gamma.is_valid_link(Link::Identity));
        assert!(!Family::Gamma.is_valid_link(Link::Sqrt));
        assert!(matches!(
            Family::Poisson.check_link(Link::Logit),
            Err(Error::InvalidLink { .. })
        ));
    }

    #[test]
    fn test_validate_mean() {
        assert!(Family::Normal.validate_mean(-5.0).is_ok());
        assert!(Family::Normal.validate_mean(f64::NAN).is_err());
        assert!(Family::Poisson.validate_mean(0.0).is_err());
        assert!(Family::Poisson.validate_mean(-1.0).is_err());
        assert!(Family::Gamma.validate_mean(0.0).is_err());
        assert!(Family::Binomial.validate_mean(1.2).is_err());
        assert!(Family::Binomial.validate_mean(-0.1).is_err());
        assert!(Family::Binomial.validate_mean(0.0).is_ok());
        assert!(Family::Binomial.validate_mean(1.0).is_ok());
        assert!(Family::NegativeBinomial.validate_mean(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_extras() {
        assert!(Family::Normal.validate_extras(&Extras::sigma(1.0)).is_ok());
        assert!(Family::Normal.validate_extras(&Extras::sigma2(4.0)).is_ok());
        assert!(matches!(
            Family::Normal.validate_extras(&Extras::none()),
            Err(Error::MissingExtra { .. })
        ));
        let both = Extras {
            sigma: Some(1.0),
            sigma2: Some(1.0),
            ..Extras::default()
        };
        assert!(matches!(
            Family::Normal.validate_extras(&both),
            Err(Error::ConflictingScale)
        ));
        assert!(matches!(
            Family::Normal.validate_extras(&Extras::sigma(-1.0)),
            Err(Error::InvalidExtra { .. })
        ));
        assert!(Family::Poisson.validate_extras(&Extras::none()).is_ok());
        assert!(matches!(
            Family::Poisson.validate_extras(&Extras::shape(2.0)),
            Err(Error::UnusedExtra { .. })
        ));
        assert!(matches!(
            Family::Binomial.validate_extras(&Extras::n_trials(0)),
            Err(Error::InvalidExtra { .. })
        ));
        assert!(Family::Binomial.validate_extras(&Extras::n_trials(10)).is_ok());
        assert!(matches!(
            Family::Gamma.validate_extras(&Extras::none()),
            Err(Error::MissingExtra { .. })
        ));
        assert!(matches!(
            Family::Gamma.validate_extras(&Extras::shape(f64::NAN)),
            Err(Error::InvalidExtra { .. })
        ));
        assert!(Family::InverseGaussian
            .validate_extras(&Extras::shape(3.0))
            .is_ok());
        assert!(Family::NegativeBinomial
            .validate_extras(&Extras::size(2.0))
            .is_ok());
        assert!(matches!(
            Family::NegativeBinomial.validate_extras(&Extras::sigma(2.0)),
            Err(Error::UnusedExtra { .. })
        ));
    }

    #[test]
    fn test_variance() {
        float_eq!(Family::Normal.variance(3.0, &Extras::sigma(2.0)).unwrap(), 4.0);
        float_eq!(Family::Normal.variance(3.0, &Extras::sigma2(2.0)).unwrap(), 2.0);
        float_eq!(Family::Poisson.variance(3.5, &Extras::none()).unwrap(), 3.5);
        float_eq!(
            Family::Binomial
                .variance(0.3, &Extras::n_trials(10))
                .unwrap(),
            2.1
        );
        float_eq!(Family::Gamma.variance(0.4, &Extras::shape(2.0)).unwrap(), 0.08);
        float_eq!(
            Family::InverseGaussian
                .variance(2.0, &Extras::shape(4.0))
                .unwrap(),
            2.0
        );
        float_eq!(
            Family::NegativeBinomial
                .variance(3.0, &Extras::size(1.5))
                .unwrap(),
            9.0
        );
    }

    #[test]
    fn test_distribution_checks_mean() {
        assert!(matches!(
            Family::Poisson.distribution(-1.0, &Extras::none()),
            Err(Error::MeanDomain { .. })
        ));
        let d = Family::Gamma.distribution(2.0, &Extras::shape(3.0)).unwrap();
        float_eq!(d.mean(), 2.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("GAUSSIAN".parse::<Family>().unwrap(), Family::Normal);
        assert_eq!(
            "negative_binomial".parse::<Family>().unwrap(),
            Family::NegativeBinomial
        );
        assert!("weibull".parse::<Family>().is_err());
        let extras: Extras = serde_json::from_str(r#"{"shape": 2.5}"#).unwrap();
        assert_eq!(extras, Extras::shape(2.5));
        assert!(serde_json::from_str::<Extras>(r#"{"alpha": 1.0}"#).is_err());
    }
}
