use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{BoundedParameter, CouplingConfig, Error, GlmParameters, Kernel, MultiGlm, Result};

/// Which coefficients a coupling move perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    /// One coefficient, either the fixed `index` or one chosen uniformly at
    /// random on every proposal.
    Single {
        #[serde(default)]
        index: Option<usize>,
    },
    /// Every coefficient at once.
    All,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Single { index: None }
    }
}

impl Scope {
    pub fn target_acceptance(&self) -> f64 {
        match self {
            Scope::Single { .. } => 0.44,
            Scope::All => 0.234,
        }
    }
}

/// Why a proposal was rejected before reaching the host's Metropolis step.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    CoefficientOutOfBounds { index: usize, value: f64 },
    ResponseOutOfBounds { index: usize, value: f64 },
    NoChange,
    Domain(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CoefficientOutOfBounds { index, value } => {
                write!(f, "coefficient {index} proposed out of bounds at {value}")
            },
            RejectReason::ResponseOutOfBounds { index, value } => {
                write!(f, "response {index} shifted out of bounds to {value}")
            },
            RejectReason::NoChange => f.write_str("proposal did not change the state"),
            RejectReason::Domain(msg) => write!(f, "invalid mean: {msg}"),
        }
    }
}

/// Outcome of a proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// The state was changed; the value is the log Hastings ratio.
    Hastings(f64),
    /// The state was left untouched and the step must be rejected.
    Reject(RejectReason),
}

impl Proposal {
    /// Log Hastings ratio, negative infinity for a rejected proposal.
    pub fn log_hastings(&self) -> f64 {
        match self {
            Proposal::Hastings(h) => *h,
            Proposal::Reject(_) => f64::NEG_INFINITY,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Proposal::Reject(_))
    }
}

/// Pre-images of every write made during one proposal, so the proposal can
/// be undone as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    coefficients: Vec<(usize, f64)>,
    response: Vec<(usize, f64)>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty() && self.response.is_empty()
    }

    fn set_coefficient(
        &mut self,
        params: &mut GlmParameters,
        index: usize,
        value: f64,
    ) -> Result<()> {
        let old = params.coefficients.get(index)?;
        params.coefficients.set(index, value)?;
        self.coefficients.push((index, old));
        Ok(())
    }

    fn set_response(
        &mut self,
        response: &mut BoundedParameter,
        index: usize,
        value: f64,
    ) -> Result<()> {
        let old = response.get(index)?;
        if !value.is_finite() {
            let bounds = response.bounds();
            return Err(Error::BoundsViolation {
                value,
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        response.set(index, value)?;
        self.response.push((index, old));
        Ok(())
    }

    /// Restores every recorded pre-image, newest first.
    pub fn rollback(self, params: &mut GlmParameters, response: &mut BoundedParameter) {
        for (index, old) in self.coefficients.iter().rev() {
            params.coefficients.restore(*index, *old);
        }
        self.rollback_response(response);
    }

    /// Restores only the response pre-images.
    pub fn rollback_response(self, response: &mut BoundedParameter) {
        for (index, old) in self.response.into_iter().rev() {
            response.restore(index, old);
        }
    }
}

/// Accept and reject counts of an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceStats {
    pub accepted: u64,
    pub rejected: u64,
}

impl AcceptanceStats {
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Fraction of accepted proposals, zero before any proposal.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total() as f64
        }
    }
}

/// Window-size adaptation shared by the random-walk style operators.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tuning {
    window_size: f64,
    optimise: bool,
    target: f64,
    stats: AcceptanceStats,
}

impl Tuning {
    /// Step on the log window size, shrinking as proposals accumulate.
    fn calc_delta(&self, log_alpha: f64) -> f64 {
        if log_alpha.is_nan() {
            return 0.0;
        }
        let count = self.stats.total() as f64 + 1.0;
        let delta = (log_alpha.min(0.0).exp() - self.target) / count;
        if delta.is_finite() {
            delta
        } else {
            0.0
        }
    }

    fn optimize(&mut self, log_alpha: f64) {
        if !self.optimise {
            return;
        }
        let delta = self.calc_delta(log_alpha) + self.window_size.ln();
        self.window_size = delta.exp();
    }

    fn performance_suggestion(&self, name: &str, low: f64, high: f64) -> Option<String> {
        if self.stats.total() == 0 {
            return None;
        }
        let prob = self.stats.acceptance_rate();
        let ratio = (prob / self.target).clamp(0.5, 2.0);
        if prob < low || prob > high {
            let suggestion = format!(
                "Try setting window size to about {:.4}",
                self.window_size * ratio
            );
            warn!(
                "{} acceptance rate {:.4} is far from the target {:.4}. {}",
                name, prob, self.target, suggestion
            );
            Some(suggestion)
        } else {
            None
        }
    }
}

/// Shifts the response by the change in GLM means, `R_i += new_i - old_i`,
/// recording pre-images in `tx`.
fn shift_response(
    tx: &mut Transaction,
    response: &mut BoundedParameter,
    old: &[f64],
    new: &[f64],
) -> std::result::Result<(), RejectReason> {
    for (i, (o, n)) in old.iter().zip(new).enumerate() {
        let value = response.values()[i] + (n - o);
        if tx.set_response(response, i, value).is_err() {
            return Err(RejectReason::ResponseOutOfBounds { index: i, value });
        }
    }
    Ok(())
}

fn check_response(glm: &MultiGlm, response: &BoundedParameter) -> Result<()> {
    if response.len() != glm.dimension() {
        return Err(Error::DimensionMismatch {
            expected: glm.dimension(),
            found: response.len(),
        });
    }
    Ok(())
}

/// Means of the current state, or the reason the state has none.
fn means_or_reject(
    glm: &MultiGlm,
    params: &GlmParameters,
) -> Result<std::result::Result<Vec<f64>, RejectReason>> {
    match glm.all_means(params) {
        Ok(means) => Ok(Ok(means)),
        Err(e) if e.is_recoverable() => Ok(Err(RejectReason::Domain(e.to_string()))),
        Err(e) => Err(e),
    }
}

/// Deterministic coupling move: perturbs GLM coefficients and shifts a
/// dependent response vector by the resulting change in every mean, so the
/// response keeps its offset from the GLM. The map is a volume-preserving
/// translation, so the log Hastings ratio of a successful proposal is zero.
///
/// Any bounds or domain failure rolls the whole proposal back before
/// returning [`Proposal::Reject`]. After a successful proposal the pre-images
/// are kept until the host calls [`accept`](Self::accept) or
/// [`reject`](Self::reject).
#[derive(Debug, Clone)]
pub struct CoefficientCoupling {
    kernel: Kernel,
    scope: Scope,
    tuning: Tuning,
    pending: Option<Transaction>,
}

impl CoefficientCoupling {
    pub fn new(config: CouplingConfig, glm: &MultiGlm) -> Result<Self> {
        config.validate()?;
        if let Scope::Single { index: Some(index) } = config.scope {
            if index >= glm.num_predictors() {
                return Err(Error::CoefficientIndex {
                    index,
                    len: glm.num_predictors(),
                });
            }
        }
        Ok(Self {
            kernel: config.kernel,
            scope: config.scope,
            tuning: Tuning {
                window_size: config.window_size,
                optimise: config.optimise,
                target: config
                    .target_acceptance
                    .unwrap_or_else(|| config.scope.target_acceptance()),
                stats: AcceptanceStats::default(),
            },
            pending: None,
        })
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn window_size(&self) -> f64 {
        self.tuning.window_size
    }

    pub fn set_window_size(&mut self, window_size: f64) -> Result<()> {
        if !(window_size.is_finite() && window_size > 0.0) {
            return Err(Error::InvalidWindowSize(window_size));
        }
        self.tuning.window_size = window_size;
        Ok(())
    }

    pub fn target_acceptance(&self) -> f64 {
        self.tuning.target
    }

    pub fn stats(&self) -> AcceptanceStats {
        self.tuning.stats
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[tracing::instrument(skip(self, rng, glm, params, response))]
    pub fn propose<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        glm: &MultiGlm,
        params: &mut GlmParameters,
        response: &mut BoundedParameter,
    ) -> Result<Proposal> {
        check_response(glm, response)?;
        glm.check_parameters(params)?;
        self.pending = None;

        let old = match means_or_reject(glm, params)? {
            Ok(means) => means,
            Err(reason) => return Ok(self.rejected(reason)),
        };

        let p = glm.num_predictors();
        let indices = match self.scope {
            Scope::Single { index: Some(index) } => {
                if index >= p {
                    return Err(Error::CoefficientIndex { index, len: p });
                }
                index..index + 1
            },
            Scope::Single { index: None } => {
                let index = rng.gen_range(0..p);
                index..index + 1
            },
            Scope::All => 0..p,
        };

        let mut tx = Transaction::default();
        let mut changed = false;
        for j in indices {
            let current = params.coefficients.values()[j];
            let value = current + self.kernel.draw(rng, self.tuning.window_size);
            changed |= value != current;
            if tx.set_coefficient(params, j, value).is_err() {
                tx.rollback(params, response);
                return Ok(self.rejected(RejectReason::CoefficientOutOfBounds { index: j, value }));
            }
        }
        if !changed {
            tx.rollback(params, response);
            return Ok(self.rejected(RejectReason::NoChange));
        }

        let new = match means_or_reject(glm, params)? {
            Ok(means) => means,
            Err(reason) => {
                tx.rollback(params, response);
                return Ok(self.rejected(reason));
            },
        };
        if let Err(reason) = shift_response(&mut tx, response, &old, &new) {
            tx.rollback(params, response);
            return Ok(self.rejected(reason));
        }

        trace!(window_size = self.tuning.window_size, "Proposed coupled move");
        self.pending = Some(tx);
        Ok(Proposal::Hastings(0.0))
    }

    fn rejected(&self, reason: RejectReason) -> Proposal {
        trace!(%reason, "Rejected coupled move");
        Proposal::Reject(reason)
    }

    /// Commits the last proposal.
    pub fn accept(&mut self) {
        self.pending = None;
        self.tuning.stats.accepted += 1;
    }

    /// Rejects the last proposal, undoing its writes if it changed the state.
    pub fn reject(&mut self, params: &mut GlmParameters, response: &mut BoundedParameter) {
        if let Some(tx) = self.pending.take() {
            tx.rollback(params, response);
        }
        self.tuning.stats.rejected += 1;
    }

    /// Adapts the window size given the log acceptance probability of the
    /// last step.
    pub fn optimize(&mut self, log_alpha: f64) {
        self.tuning.optimize(log_alpha);
    }

    pub fn performance_suggestion(&self) -> Option<String> {
        self.tuning
            .performance_suggestion("Coefficient coupling", 0.10, 0.70)
    }
}

/// Re-synchronises a coupled response after the GLM means changed outside a
/// [`CoefficientCoupling`] move, e.g. when another operator changed the
/// intercept or the indicators. Uses the means stored on the [`MultiGlm`] as
/// the old means and the current means as the new ones.
#[derive(Debug, Clone, Default)]
pub struct ResponseResync {
    stats: AcceptanceStats,
    pending: Option<Transaction>,
}

impl ResponseResync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> AcceptanceStats {
        self.stats
    }

    #[tracing::instrument(skip(self, glm, params, response))]
    pub fn propose(
        &mut self,
        glm: &MultiGlm,
        params: &GlmParameters,
        response: &mut BoundedParameter,
    ) -> Result<Proposal> {
        check_response(glm, response)?;
        self.pending = None;
        let old = glm.stored_means().ok_or(Error::MissingStoredMeans)?.to_vec();
        let new = match means_or_reject(glm, params)? {
            Ok(means) => means,
            Err(reason) => {
                trace!(%reason, "Rejected resync");
                return Ok(Proposal::Reject(reason));
            },
        };
        let mut tx = Transaction::default();
        if let Err(reason) = shift_response(&mut tx, response, &old, &new) {
            tx.rollback_response(response);
            trace!(%reason, "Rejected resync");
            return Ok(Proposal::Reject(reason));
        }
        trace!("Resynchronised response");
        self.pending = Some(tx);
        Ok(Proposal::Hastings(0.0))
    }

    /// Commits the last proposal and stores the current means as the new
    /// reference.
    pub fn accept(&mut self, glm: &mut MultiGlm, params: &GlmParameters) -> Result<()> {
        self.pending = None;
        self.stats.accepted += 1;
        glm.store_means(params)
    }

    pub fn reject(&mut self, response: &mut BoundedParameter) {
        if let Some(tx) = self.pending.take() {
            tx.rollback_response(response);
        }
        self.stats.rejected += 1;
    }
}

/// Random walk on a single entry of a bounded parameter.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    kernel: Kernel,
    index: Option<usize>,
    tuning: Tuning,
    pending: Option<(usize, f64)>,
}

impl RandomWalk {
    pub const TARGET_ACCEPTANCE: f64 = 0.3;

    /// Walk on entry `index`, or on a uniformly chosen entry each step when
    /// `index` is `None`.
    pub fn new(kernel: Kernel, window_size: f64, index: Option<usize>) -> Result<Self> {
        kernel.validate()?;
        if !(window_size.is_finite() && window_size > 0.0) {
            return Err(Error::InvalidWindowSize(window_size));
        }
        debug!(?kernel, window_size, ?index, "Created random walk");
        Ok(Self {
            kernel,
            index,
            tuning: Tuning {
                window_size,
                optimise: true,
                target: Self::TARGET_ACCEPTANCE,
                stats: AcceptanceStats::default(),
            },
            pending: None,
        })
    }

    pub fn with_optimise(mut self, optimise: bool) -> Self {
        self.tuning.optimise = optimise;
        self
    }

    pub fn window_size(&self) -> f64 {
        self.tuning.window_size
    }

    pub fn stats(&self) -> AcceptanceStats {
        self.tuning.stats
    }

    pub fn propose<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        parameter: &mut BoundedParameter,
    ) -> Result<Proposal> {
        self.pending = None;
        let len = parameter.len();
        let index = match self.index {
            Some(index) => index,
            None if len > 0 => rng.gen_range(0..len),
            None => return Err(Error::IndexOutOfBounds { index: 0, len }),
        };
        let current = parameter.get(index)?;
        let value = current + self.kernel.draw(rng, self.tuning.window_size);
        if !parameter.bounds().contains(value) {
            trace!(index, value, "Random walk proposed out of bounds");
            return Ok(Proposal::Reject(RejectReason::CoefficientOutOfBounds {
                index,
                value,
            }));
        }
        parameter.set(index, value)?;
        self.pending = Some((index, current));
        Ok(Proposal::Hastings(0.0))
    }

    pub fn accept(&mut self) {
        self.pending = None;
        self.tuning.stats.accepted += 1;
    }

    pub fn reject(&mut self, parameter: &mut BoundedParameter) {
        if let Some((index, old)) = self.pending.take() {
            parameter.restore(index, old);
        }
        self.tuning.stats.rejected += 1;
    }

    pub fn optimize(&mut self, log_alpha: f64) {
        self.tuning.optimize(log_alpha);
    }

    pub fn performance_suggestion(&self) -> Option<String> {
        self.tuning.performance_suggestion("Random walk", 0.10, 0.40)
    }
}
