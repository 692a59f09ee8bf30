use crate::{Family, Link};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("no predictors supplied")]
    NoPredictors,
    #[error("predictor {0} has no values")]
    EmptyPredictor(String),
    #[error("predictor {name} has length {found}, expected {expected}")]
    PredictorLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("coefficient vector has length {found}, expected {expected}")]
    CoefficientLengthMismatch { expected: usize, found: usize },
    #[error("indicator vector has length {found}, expected {expected}")]
    IndicatorLengthMismatch { expected: usize, found: usize },
    #[error("link {link} is not valid for the {family} family")]
    InvalidLink { family: Family, link: Link },
    #[error("the {family} family requires the {extra} parameter")]
    MissingExtra { family: Family, extra: &'static str },
    #[error("the {family} family does not use the {extra} parameter")]
    UnusedExtra { family: Family, extra: &'static str },
    #[error("only one of sigma and sigma2 may be supplied")]
    ConflictingScale,
    #[error("invalid value {value} for parameter {extra}")]
    InvalidExtra { extra: &'static str, value: f64 },
    #[error("unknown distribution family: {0}")]
    UnknownFamily(String),
    #[error("unknown link function: {0}")]
    UnknownLink(String),
    #[error("link {0} is not supported for a baseline GLM")]
    UnsupportedBaselineLink(Link),
    #[error("invalid bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("invalid window size {0}")]
    InvalidWindowSize(f64),
    #[error("invalid bactrian spike parameter {0}, must be in [0, 1)")]
    InvalidBactrian(f64),
    #[error("coefficient index {index} out of range for {len} coefficients")]
    CoefficientIndex { index: usize, len: usize },
    #[error("no stored means to resynchronise against")]
    MissingStoredMeans,
    #[error("error term length {len} does not divide dimension {dimension}")]
    ErrorTermLength { dimension: usize, len: usize },
    #[error("predictor {name} has negative value {value}, cannot log transform")]
    NegativePredictor { name: String, value: f64 },
    #[error("predictor {0} has zero standard deviation")]
    ConstantPredictor(String),
    #[error("predictor {0} contains non-finite values")]
    NonFinitePredictor(String),
    #[error("value {value} outside the domain of the {link} link ({requirement})")]
    LinkDomain {
        link: Link,
        requirement: &'static str,
        value: f64,
    },
    #[error("non-finite linear predictor {0}")]
    NonFiniteLinearPredictor(f64),
    #[error("mean {value} outside the domain of the {family} family")]
    MeanDomain { family: Family, value: f64 },
    #[error("distribution error: {0}")]
    Distribution(String),
    #[error("probability {0} outside [0, 1]")]
    InvalidProbability(f64),
    #[error("invalid interval ({lower}, {upper}]")]
    InvalidInterval { lower: f64, upper: f64 },
    #[error("expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("index {index} out of bounds for dimension {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("value {value} outside bounds [{lower}, {upper}]")]
    BoundsViolation { value: f64, lower: f64, upper: f64 },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] used to decide whether a failure is a
/// per-step rejection or a structural problem the caller must fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Transform,
    Domain,
    Dimension,
    Bounds,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoPredictors
            | Error::EmptyPredictor(_)
            | Error::PredictorLengthMismatch { .. }
            | Error::CoefficientLengthMismatch { .. }
            | Error::IndicatorLengthMismatch { .. }
            | Error::InvalidLink { .. }
            | Error::MissingExtra { .. }
            | Error::UnusedExtra { .. }
            | Error::ConflictingScale
            | Error::InvalidExtra { .. }
            | Error::UnknownFamily(_)
            | Error::UnknownLink(_)
            | Error::UnsupportedBaselineLink(_)
            | Error::InvalidBounds { .. }
            | Error::InvalidWindowSize(_)
            | Error::InvalidBactrian(_)
            | Error::CoefficientIndex { .. }
            | Error::MissingStoredMeans
            | Error::ErrorTermLength { .. }
            | Error::Json(_) => ErrorKind::Config,
            Error::NegativePredictor { .. }
            | Error::ConstantPredictor(_)
            | Error::NonFinitePredictor(_) => ErrorKind::Transform,
            Error::LinkDomain { .. }
            | Error::NonFiniteLinearPredictor(_)
            | Error::MeanDomain { .. }
            | Error::Distribution(_)
            | Error::InvalidProbability(_)
            | Error::InvalidInterval { .. } => ErrorKind::Domain,
            Error::DimensionMismatch { .. } | Error::IndexOutOfBounds { .. } => {
                ErrorKind::Dimension
            },
            Error::BoundsViolation { .. } => ErrorKind::Bounds,
        }
    }

    /// Domain and bounds failures describe a bad proposal rather than a bad
    /// model, so a sampler can reject the step and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Domain | ErrorKind::Bounds)
    }
}
