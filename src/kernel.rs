use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Proposal kernel for symmetric random-walk steps. Every kernel draws a
/// zero-centred, symmetric step which is then scaled by the window size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// Standard normal step.
    #[default]
    Gaussian,
    /// Uniform step on `(-1, 1)`.
    Uniform,
    /// Mixture of two normals centred at `-m` and `m` with standard
    /// deviation `sqrt(1 - m^2)`, so the step has unit variance.
    Bactrian { m: f64 },
}

impl Kernel {
    pub fn validate(&self) -> Result<()> {
        match self {
            Kernel::Bactrian { m } if !(0.0..1.0).contains(m) => Err(Error::InvalidBactrian(*m)),
            _ => Ok(()),
        }
    }

    /// Draws a step of scale `window`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, window: f64) -> f64 {
        let step = match self {
            Kernel::Gaussian => rng.sample::<f64, _>(StandardNormal),
            Kernel::Uniform => rng.gen_range(-1.0..1.0),
            Kernel::Bactrian { m } => {
                let z = rng.sample::<f64, _>(StandardNormal);
                let centre = if rng.gen_bool(0.5) { *m } else { -*m };
                centre + z * (1.0 - m * m).sqrt()
            },
        };
        step * window
    }
}
