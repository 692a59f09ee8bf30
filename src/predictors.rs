use faer::{Mat, RowRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// One-time transforms applied to every predictor column, log first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorTransform {
    /// Replace each value `x` with `ln(1 + x)`.
    pub log: bool,
    /// Centre each column and scale it to unit standard deviation.
    pub standardize: bool,
    /// Delta degrees of freedom of the standard deviation used by
    /// `standardize`. Zero gives the population standard deviation.
    pub ddof: usize,
}

impl PredictorTransform {
    pub fn is_identity(&self) -> bool {
        !self.log && !self.standardize
    }
}

/// `P` named predictors observed in each of `D` dimensions, stored as a
/// `D x P` matrix.
#[derive(Debug, Clone)]
pub struct PredictorSet {
    names: Vec<String>,
    data: Mat<f64>,
}

impl PredictorSet {
    pub fn new<S: Into<String>>(predictors: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let (names, columns): (Vec<String>, Vec<Vec<f64>>) = predictors
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .unzip();
        Self::from_columns(names, columns)
    }

    /// Predictors named `x0`, `x1`, ...
    pub fn unnamed(columns: Vec<Vec<f64>>) -> Result<Self> {
        let names = (0..columns.len()).map(|j| format!("x{j}")).collect();
        Self::from_columns(names, columns)
    }

    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::NoPredictors);
        }
        if names.len() != columns.len() {
            return Err(Error::PredictorLengthMismatch {
                name: "names".to_string(),
                expected: columns.len(),
                found: names.len(),
            });
        }
        let nrows = columns[0].len();
        if nrows == 0 {
            return Err(Error::EmptyPredictor(names[0].clone()));
        }
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != nrows {
                return Err(Error::PredictorLengthMismatch {
                    name: name.clone(),
                    expected: nrows,
                    found: column.len(),
                });
            }
            if column.iter().any(|x| !x.is_finite()) {
                return Err(Error::NonFinitePredictor(name.clone()));
            }
        }
        let data = Mat::from_fn(nrows, columns.len(), |i, j| columns[j][i]);
        debug!(
            dimension = nrows,
            predictors = columns.len(),
            "Loaded predictors"
        );
        Ok(Self { names, data })
    }

    /// Applies `transform` to every column, returning the transformed set.
    #[tracing::instrument(skip(self))]
    pub fn transformed(self, transform: PredictorTransform) -> Result<Self> {
        if transform.is_identity() {
            return Ok(self);
        }
        let mut columns = (0..self.len())
            .map(|j| self.column(j))
            .collect::<Vec<_>>();
        for (name, column) in self.names.iter().zip(columns.iter_mut()) {
            if transform.log {
                log1p_column(name, column)?;
            }
            if transform.standardize {
                standardize_column(name, column, transform.ddof)?;
            }
        }
        debug!("Transformed predictors");
        Self::from_columns(self.names, columns)
    }

    /// Number of dimensions `D`.
    pub fn dimension(&self) -> usize {
        self.data.nrows()
    }

    /// Number of predictors `P`.
    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ncols() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Value of predictor `j` in dimension `i`.
    #[inline(always)]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    /// All predictor values for dimension `i`.
    pub fn row(&self, i: usize) -> RowRef<'_, f64> {
        self.data.row(i)
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.dimension()).map(|i| self.data[(i, j)]).collect()
    }

    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| self.column(j))
    }
}

fn log1p_column(name: &str, column: &mut [f64]) -> Result<()> {
    if let Some(&value) = column.iter().find(|x| **x < 0.0) {
        return Err(Error::NegativePredictor {
            name: name.to_string(),
            value,
        });
    }
    for x in column.iter_mut() {
        *x = x.ln_1p();
    }
    Ok(())
}

/// Returns the mean and variance of `data` with `df` delta degrees of
/// freedom.
pub(crate) fn mean_variance(data: &[f64], df: usize) -> (f64, f64) {
    let n = data.len();
    let mean = data.iter().sum::<f64>() / n as f64;
    if n <= df {
        return (mean, 0.0);
    }
    let sum = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    (mean, sum / (n - df) as f64)
}

fn standardize_column(name: &str, column: &mut [f64], df: usize) -> Result<()> {
    let (mean, var) = mean_variance(column, df);
    let sd = var.sqrt();
    if sd == 0.0 || !sd.is_finite() {
        return Err(Error::ConstantPredictor(name.to_string()));
    }
    let sd_recip = 1.0 / sd;
    for x in column.iter_mut() {
        *x = (*x - mean) * sd_recip;
    }
    Ok(())
}
