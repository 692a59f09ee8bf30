use serde::{Deserialize, Serialize};

use crate::{Error, Extras, Result};

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(Error::InvalidBounds { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn unbounded() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    #[inline(always)]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn check(&self, value: f64) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::BoundsViolation {
                value,
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}

/// A vector of values sharing one set of bounds. Used for the regression
/// coefficients and for the response vector kept in step with the GLM means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedParameter {
    values: Vec<f64>,
    #[serde(default)]
    bounds: Bounds,
}

impl BoundedParameter {
    pub fn new(values: Vec<f64>, bounds: Bounds) -> Self {
        Self { values, bounds }
    }

    pub fn unbounded(values: Vec<f64>) -> Self {
        Self::new(values, Bounds::unbounded())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.values
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: self.values.len(),
            })
    }

    /// Writes `value` at `index`, refusing values outside the bounds.
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index, len })?;
        if value.is_nan() {
            return Err(Error::BoundsViolation {
                value,
                lower: self.bounds.lower,
                upper: self.bounds.upper,
            });
        }
        self.bounds.check(value)?;
        *slot = value;
        Ok(())
    }

    /// Writes `value` at `index` without a bounds check. Used when restoring
    /// pre-images.
    pub(crate) fn restore(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn within_bounds(&self) -> bool {
        self.values.iter().all(|v| self.bounds.contains(*v))
    }

    /// Truncates, or pads with zero clamped into the bounds.
    pub(crate) fn resize(&mut self, len: usize) {
        let pad = 0.0f64.max(self.bounds.lower).min(self.bounds.upper);
        self.values.resize(len, pad);
    }
}

/// The mutable GLM state owned by the sampler.
///
/// A missing indicator vector means every coefficient is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlmParameters {
    pub intercept: f64,
    pub coefficients: BoundedParameter,
    #[serde(default)]
    pub indicators: Option<Vec<bool>>,
    #[serde(default)]
    pub extras: Extras,
}

impl GlmParameters {
    pub fn new(intercept: f64, coefficients: Vec<f64>, extras: Extras) -> Self {
        Self {
            intercept,
            coefficients: BoundedParameter::unbounded(coefficients),
            indicators: None,
            extras,
        }
    }

    pub fn with_indicators(mut self, indicators: Vec<bool>) -> Self {
        self.indicators = Some(indicators);
        self
    }

    pub fn with_coefficient_bounds(mut self, bounds: Bounds) -> Self {
        self.coefficients.bounds = bounds;
        self
    }

    /// Whether coefficient `j` contributes to the linear predictor.
    #[inline(always)]
    pub fn is_active(&self, j: usize) -> bool {
        match &self.indicators {
            Some(indicators) => indicators.get(j).copied().unwrap_or(false),
            None => true,
        }
    }

    /// Coefficient `j` if active, zero otherwise.
    #[inline(always)]
    pub fn effective_coefficient(&self, j: usize) -> f64 {
        if self.is_active(j) {
            self.coefficients.values.get(j).copied().unwrap_or(0.0)
        } else {
            0.0
        }
    }
}
