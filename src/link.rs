use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use statrs::function::erf::{erfc, erfc_inv};

use crate::{Error, Result};

/// Probabilities are kept inside `[PROB_EPSILON, 1 - PROB_EPSILON]`.
pub const PROB_EPSILON: f64 = 1e-15;
/// Largest argument passed to `exp`.
pub const MAX_EXP_ARG: f64 = 700.0;

const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Link function `g` mapping a mean `mu` onto the linear predictor scale,
/// `eta = g(mu)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Identity,
    Log,
    Logit,
    Probit,
    Inverse,
    Sqrt,
    InverseSquared,
}

impl Link {
    pub const ALL: [Link; 7] = [
        Link::Identity,
        Link::Log,
        Link::Logit,
        Link::Probit,
        Link::Inverse,
        Link::Sqrt,
        Link::InverseSquared,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Link::Identity => "identity",
            Link::Log => "log",
            Link::Logit => "logit",
            Link::Probit => "probit",
            Link::Inverse => "inverse",
            Link::Sqrt => "sqrt",
            Link::InverseSquared => "inverse_squared",
        }
    }

    /// Human readable description of the values `apply` accepts.
    pub fn domain(&self) -> &'static str {
        match self {
            Link::Identity => "mu must be finite",
            Link::Log | Link::Inverse | Link::InverseSquared => "mu must be positive",
            Link::Logit | Link::Probit => "mu must be in (0, 1)",
            Link::Sqrt => "mu must be non-negative",
        }
    }

    pub fn validate_domain(&self, mu: f64) -> Result<()> {
        let ok = mu.is_finite()
            && match self {
                Link::Identity => true,
                Link::Log | Link::Inverse | Link::InverseSquared => mu > 0.0,
                Link::Logit | Link::Probit => mu > 0.0 && mu < 1.0,
                Link::Sqrt => mu >= 0.0,
            };
        if ok {
            Ok(())
        } else {
            Err(Error::LinkDomain {
                link: *self,
                requirement: self.domain(),
                value: mu,
            })
        }
    }

    /// `eta = g(mu)`.
    pub fn apply(&self, mu: f64) -> Result<f64> {
        self.validate_domain(mu)?;
        let eta = match self {
            Link::Identity => mu,
            Link::Log => mu.ln(),
            Link::Logit => {
                let p = clamp_prob(mu);
                (p / (1.0 - p)).ln()
            },
            Link::Probit => qnorm(clamp_prob(mu)),
            Link::Inverse => 1.0 / mu,
            Link::Sqrt => mu.sqrt(),
            Link::InverseSquared => 1.0 / (mu * mu),
        };
        // tiny means overflow the inverse links
        if !eta.is_finite() {
            return Err(Error::LinkDomain {
                link: *self,
                requirement: "g(mu) must be finite",
                value: mu,
            });
        }
        Ok(eta)
    }

    /// `mu = g^-1(eta)`.
    pub fn inverse(&self, eta: f64) -> Result<f64> {
        if !eta.is_finite() {
            return Err(Error::NonFiniteLinearPredictor(eta));
        }
        match self {
            Link::Identity => Ok(eta),
            Link::Log => Ok(eta.min(MAX_EXP_ARG).exp()),
            Link::Logit => Ok(logistic(eta)),
            Link::Probit => Ok(clamp_prob(pnorm(eta))),
            Link::Inverse => {
                if eta.abs() < PROB_EPSILON {
                    return Err(self.eta_error("eta must be nonzero", eta));
                }
                let mu = 1.0 / eta;
                if mu <= 0.0 {
                    return Err(self.eta_error("mean must be positive", eta));
                }
                Ok(mu)
            },
            Link::Sqrt => {
                if eta < 0.0 {
                    return Err(self.eta_error("eta must be non-negative", eta));
                }
                Ok(eta * eta)
            },
            Link::InverseSquared => {
                if eta <= 0.0 {
                    return Err(self.eta_error("eta must be positive", eta));
                }
                Ok(1.0 / eta.sqrt())
            },
        }
    }

    /// `d mu / d eta` evaluated at `eta`.
    pub fn derivative(&self, eta: f64) -> f64 {
        match self {
            Link::Identity => 1.0,
            Link::Log => eta.min(MAX_EXP_ARG).exp(),
            Link::Logit => {
                if eta.abs() > MAX_EXP_ARG {
                    0.0
                } else {
                    let p = logistic(eta);
                    p * (1.0 - p)
                }
            },
            Link::Probit => dnorm(eta),
            Link::Inverse => -1.0 / (eta * eta),
            Link::Sqrt => 2.0 * eta,
            Link::InverseSquared => -0.5 * eta.powf(-1.5),
        }
    }

    fn eta_error(&self, requirement: &'static str, eta: f64) -> Error {
        Error::LinkDomain {
            link: *self,
            requirement,
            value: eta,
        }
    }
}

#[inline(always)]
fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
}

fn logistic(eta: f64) -> f64 {
    if eta > MAX_EXP_ARG {
        return 1.0 - PROB_EPSILON;
    }
    if eta < -MAX_EXP_ARG {
        return PROB_EPSILON;
    }
    let p = if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    };
    clamp_prob(p)
}

#[inline(always)]
pub(crate) fn pnorm(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// `ln(pnorm(x))`, switching to the asymptotic Mills ratio expansion in the
/// lower tail where `pnorm` underflows.
pub(crate) fn ln_pnorm(x: f64) -> f64 {
    if x > -30.0 || x.is_nan() {
        return pnorm(x).ln();
    }
    let z2 = x * x;
    let u = 1.0 / z2;
    let series = 1.0 + u * (-1.0 + u * (3.0 + u * (-15.0 + u * (105.0 - 945.0 * u))));
    -0.5 * z2 - (-x / FRAC_1_SQRT_2PI).ln() + series.ln()
}

#[inline(always)]
fn qnorm(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

#[inline(always)]
fn dnorm(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Link {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "identity" => Ok(Link::Identity),
            "log" => Ok(Link::Log),
            "logit" => Ok(Link::Logit),
            "probit" => Ok(Link::Probit),
            "inverse" => Ok(Link::Inverse),
            "sqrt" => Ok(Link::Sqrt),
            "inversesquared" => Ok(Link::InverseSquared),
            _ => Err(Error::UnknownLink(s.to_string())),
        }
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
