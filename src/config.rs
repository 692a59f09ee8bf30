use serde::{Deserialize, Serialize};

use crate::{Error, Family, Kernel, Link, PredictorTransform, Result, Scope};

/// What to do when the coefficient or indicator vector does not have one
/// entry per predictor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Fail with a length mismatch error.
    #[default]
    Strict,
    /// Pad coefficients with zero clamped into their bounds and indicators
    /// with `false`, or truncate.
    Lenient,
}

/// Configuration of a [`MultiGlm`](crate::MultiGlm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlmConfig {
    pub family: Family,
    /// Link function, the family's canonical link when absent.
    #[serde(default)]
    pub link: Option<Link>,
    #[serde(default)]
    pub resize: ResizePolicy,
    #[serde(default)]
    pub transform: PredictorTransform,
}

impl GlmConfig {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            link: None,
            resize: ResizePolicy::Strict,
            transform: PredictorTransform::default(),
        }
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_resize(mut self, resize: ResizePolicy) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_transform(mut self, transform: PredictorTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn resolved_link(&self) -> Link {
        self.link.unwrap_or_else(|| self.family.canonical_link())
    }

    pub fn validate(&self) -> Result<()> {
        self.family.check_link(self.resolved_link())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_window_size() -> f64 {
    1.0
}

fn default_optimise() -> bool {
    true
}

/// Configuration of a [`CoefficientCoupling`](crate::CoefficientCoupling)
/// move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouplingConfig {
    #[serde(default)]
    pub kernel: Kernel,
    #[serde(default = "default_window_size")]
    pub window_size: f64,
    #[serde(default)]
    pub scope: Scope,
    /// Adapt the window size towards the target acceptance rate.
    #[serde(default = "default_optimise")]
    pub optimise: bool,
    /// Overrides the default target acceptance rate of the scope.
    #[serde(default)]
    pub target_acceptance: Option<f64>,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::default(),
            window_size: default_window_size(),
            scope: Scope::default(),
            optimise: default_optimise(),
            target_acceptance: None,
        }
    }
}

impl CouplingConfig {
    pub fn new(kernel: Kernel, window_size: f64, scope: Scope) -> Self {
        Self {
            kernel,
            window_size,
            scope,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.window_size.is_finite() && self.window_size > 0.0) {
            return Err(Error::InvalidWindowSize(self.window_size));
        }
        self.kernel.validate()?;
        if let Some(target) = self.target_acceptance {
            if !(target > 0.0 && target < 1.0) {
                return Err(Error::InvalidExtra {
                    extra: "target_acceptance",
                    value: target,
                });
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_glm_config_defaults() {
        let config = GlmConfig::from_json(r#"{"family": "poisson"}"#).unwrap();
        assert_eq!(config.family, Family::Poisson);
        assert_eq!(config.resolved_link(), Link::Log);
        assert_eq!(config.resize, ResizePolicy::Strict);
        assert!(config.transform.is_identity());
    }

    #[test]
    fn test_glm_config_full() {
        let config = GlmConfig::from_json(
            r#"{
                "family": "GAMMA",
                "link": "log",
                "resize": "lenient",
                "transform": {"log": true, "standardize": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.family, Family::Gamma);
        assert_eq!(config.resolved_link(), Link::Log);
        assert_eq!(config.resize, ResizePolicy::Lenient);
        assert!(config.transform.log && config.transform.standardize);
        assert_eq!(config.transform.ddof, 0);
    }

    #[test]
    fn test_glm_config_invalid() {
        assert!(matches!(
            GlmConfig::from_json(r#"{"family": "binomial", "link": "log"}"#),
            Err(Error::InvalidLink { .. })
        ));
        assert!(matches!(
            GlmConfig::from_json(r#"{"family": "weibull"}"#),
            Err(Error::Json(_))
        ));
        assert!(GlmConfig::from_json(r#"{"family": "normal", "sigma": 1.0}"#).is_err());
    }

    #[test]
    fn test_coupling_config() {
        let config = CouplingConfig::from_json(
            r#"{"kernel": {"type": "uniform"}, "window_size": 0.5, "scope": {"type": "all"}}"#,
        )
        .unwrap();
        assert_eq!(config.kernel, Kernel::Uniform);
        assert_eq!(config.window_size, 0.5);
        assert_eq!(config.scope, Scope::All);
        assert!(config.optimise);

        let config = CouplingConfig::from_json(
            r#"{"kernel": {"type": "bactrian", "m": 0.95}, "scope": {"type": "single", "index": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.kernel, Kernel::Bactrian { m: 0.95 });
        assert_eq!(config.scope, Scope::Single { index: Some(2) });
        assert_eq!(config.window_size, 1.0);

        assert!(matches!(
            CouplingConfig::from_json(r#"{"window_size": -1.0}"#),
            Err(Error::InvalidWindowSize(_))
        ));
        assert!(matches!(
            CouplingConfig::from_json(r#"{"kernel": {"type": "bactrian", "m": 1.0}}"#),
            Err(Error::InvalidBactrian(_))
        ));
    }
}
