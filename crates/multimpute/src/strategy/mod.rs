//! Strategy registry and per-column imputation strategies.
//!
//! Every strategy name maps to a [`StrategyKind`]. A kind knows which column
//! types it accepts and which options it takes; [`build`] turns a kind plus
//! options into a boxed [`Strategy`]. Inside a chain the engine hands each
//! strategy an [`ImputationTask`] describing the target column's observed and
//! missing rows and the current predictor design.

mod bayesian;
mod matching;
mod options;
mod regression;
mod timeseries;
mod univariate;

pub use options::StrategyOptions;

pub(crate) use univariate::modes;

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Design, ModelError};
use crate::schema::{ColumnDescriptor, ColumnType};
use crate::table::{Table, Value};

/// Random number generator owned by one chain.
pub type ChainRng = ChaCha8Rng;

// ============================================================================
// Errors
// ============================================================================

/// Failure of a strategy while fitting or predicting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("insufficient data: {available} observed rows, need more than {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("singular design matrix")]
    SingularMatrix,

    #[error("model did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("invalid option '{key}' for strategy '{strategy}': {message}")]
    InvalidOption {
        strategy: String,
        key: String,
        message: String,
    },

    #[error("degenerate input: {0}")]
    Degenerate(String),

    #[error("strategy produced {actual} values for {expected} missing rows")]
    OutputLength { expected: usize, actual: usize },
}

impl From<ModelError> for StrategyError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InsufficientData {
                available,
                required,
            } => StrategyError::InsufficientData {
                available,
                required,
            },
            ModelError::Singular => StrategyError::SingularMatrix,
            ModelError::NoConvergence { iterations } => StrategyError::NoConvergence { iterations },
            other => StrategyError::Degenerate(other.to_string()),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The closed set of imputation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    Mean,
    Median,
    Mode,
    Random,
    Norm,
    Categorical,
    Constant,
    Interpolate,
    Locf,
    Nocb,
    LeastSquares,
    Stochastic,
    BinaryLogistic,
    MultinomialLogistic,
    BayesianLeastSquares,
    BayesianBinaryLogistic,
    Pmm,
    Lrd,
    DefaultUnivariate,
    DefaultTime,
    DefaultPredictive,
}

impl StrategyKind {
    /// Every registered strategy.
    pub const ALL: [StrategyKind; 21] = [
        StrategyKind::Mean,
        StrategyKind::Median,
        StrategyKind::Mode,
        StrategyKind::Random,
        StrategyKind::Norm,
        StrategyKind::Categorical,
        StrategyKind::Constant,
        StrategyKind::Interpolate,
        StrategyKind::Locf,
        StrategyKind::Nocb,
        StrategyKind::LeastSquares,
        StrategyKind::Stochastic,
        StrategyKind::BinaryLogistic,
        StrategyKind::MultinomialLogistic,
        StrategyKind::BayesianLeastSquares,
        StrategyKind::BayesianBinaryLogistic,
        StrategyKind::Pmm,
        StrategyKind::Lrd,
        StrategyKind::DefaultUnivariate,
        StrategyKind::DefaultTime,
        StrategyKind::DefaultPredictive,
    ];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Mean => "mean",
            StrategyKind::Median => "median",
            StrategyKind::Mode => "mode",
            StrategyKind::Random => "random",
            StrategyKind::Norm => "norm",
            StrategyKind::Categorical => "categorical",
            StrategyKind::Constant => "constant",
            StrategyKind::Interpolate => "interpolate",
            StrategyKind::Locf => "locf",
            StrategyKind::Nocb => "nocb",
            StrategyKind::LeastSquares => "least squares",
            StrategyKind::Stochastic => "stochastic",
            StrategyKind::BinaryLogistic => "binary logistic",
            StrategyKind::MultinomialLogistic => "multinomial logistic",
            StrategyKind::BayesianLeastSquares => "bayesian least squares",
            StrategyKind::BayesianBinaryLogistic => "bayesian binary logistic",
            StrategyKind::Pmm => "pmm",
            StrategyKind::Lrd => "lrd",
            StrategyKind::DefaultUnivariate => "default univariate",
            StrategyKind::DefaultTime => "default time",
            StrategyKind::DefaultPredictive => "default predictive",
        }
    }

    /// Whether the strategy can impute a column of the given type.
    pub fn accepts(&self, column_type: ColumnType) -> bool {
        match self {
            StrategyKind::Mean
            | StrategyKind::Median
            | StrategyKind::Norm
            | StrategyKind::Interpolate
            | StrategyKind::LeastSquares
            | StrategyKind::Stochastic
            | StrategyKind::BayesianLeastSquares
            | StrategyKind::Pmm
            | StrategyKind::Lrd => column_type == ColumnType::Continuous,
            StrategyKind::Categorical | StrategyKind::MultinomialLogistic => column_type.is_leveled(),
            StrategyKind::BinaryLogistic | StrategyKind::BayesianBinaryLogistic => {
                column_type == ColumnType::Binary
            }
            StrategyKind::Mode
            | StrategyKind::Random
            | StrategyKind::Constant
            | StrategyKind::Locf
            | StrategyKind::Nocb
            | StrategyKind::DefaultUnivariate
            | StrategyKind::DefaultTime
            | StrategyKind::DefaultPredictive => true,
        }
    }

    /// The concrete strategy a default kind stands for on a column type.
    pub fn resolve(&self, column_type: ColumnType) -> StrategyKind {
        match (self, column_type) {
            (StrategyKind::DefaultUnivariate, ColumnType::Continuous) => StrategyKind::Mean,
            (StrategyKind::DefaultUnivariate, _) => StrategyKind::Mode,
            (StrategyKind::DefaultTime, ColumnType::Continuous) => StrategyKind::Interpolate,
            (StrategyKind::DefaultTime, _) => StrategyKind::Locf,
            (StrategyKind::DefaultPredictive, ColumnType::Continuous) => StrategyKind::Pmm,
            (StrategyKind::DefaultPredictive, ColumnType::Binary) => StrategyKind::BinaryLogistic,
            (StrategyKind::DefaultPredictive, ColumnType::Categorical) => {
                StrategyKind::MultinomialLogistic
            }
            (kind, _) => *kind,
        }
    }

    /// Whether the strategy conditions on predictor columns.
    pub fn uses_predictors(&self) -> bool {
        matches!(
            self,
            StrategyKind::LeastSquares
                | StrategyKind::Stochastic
                | StrategyKind::BinaryLogistic
                | StrategyKind::MultinomialLogistic
                | StrategyKind::BayesianLeastSquares
                | StrategyKind::BayesianBinaryLogistic
                | StrategyKind::Pmm
                | StrategyKind::Lrd
                | StrategyKind::DefaultPredictive
        )
    }

    /// Option keys the strategy understands.
    pub fn option_keys(&self) -> &'static [&'static str] {
        match self {
            StrategyKind::Mode | StrategyKind::DefaultUnivariate => &["fill_strategy"],
            StrategyKind::Constant => &["fill_value"],
            StrategyKind::Interpolate | StrategyKind::DefaultTime => {
                &["method", "order", "time_column"]
            }
            StrategyKind::BinaryLogistic
            | StrategyKind::MultinomialLogistic
            | StrategyKind::BayesianBinaryLogistic => &["ridge"],
            StrategyKind::Pmm | StrategyKind::Lrd => &["neighbors"],
            StrategyKind::DefaultPredictive => &["neighbors", "ridge"],
            _ => &[],
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ");
        StrategyKind::ALL
            .iter()
            .find(|k| k.name() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.name().to_string()
    }
}

// ============================================================================
// Tasks and traits
// ============================================================================

/// Observed values of the column being imputed.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Numeric values on the observed rows.
    Continuous(Array1<f64>),
    /// Level codes on the observed rows, indexing into `levels`.
    Levels { codes: Vec<usize>, levels: Vec<Value> },
}

impl Target {
    pub fn len(&self) -> usize {
        match self {
            Target::Continuous(values) => values.len(),
            Target::Levels { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observed values as cells.
    pub fn values(&self) -> Vec<Value> {
        match self {
            Target::Continuous(values) => values.iter().map(|&v| Value::Number(v)).collect(),
            Target::Levels { codes, levels } => codes.iter().map(|&c| levels[c].clone()).collect(),
        }
    }

    /// Numeric view: values for continuous targets, codes for leveled ones.
    pub fn numeric(&self) -> Array1<f64> {
        match self {
            Target::Continuous(values) => values.clone(),
            Target::Levels { codes, .. } => codes.iter().map(|&c| c as f64).collect(),
        }
    }
}

/// Everything a strategy sees when imputing one column once.
#[derive(Debug, Clone)]
pub struct ImputationTask<'a> {
    pub column: &'a str,
    pub column_type: ColumnType,
    /// Observed values, aligned with `observed_rows`.
    pub target: Target,
    pub observed_rows: &'a [usize],
    pub missing_rows: &'a [usize],
    /// Predictor design over all rows of `table`; empty for univariate strategies.
    pub design: &'a Design,
    /// Current working table.
    pub table: &'a Table,
}

impl<'a> ImputationTask<'a> {
    /// Continuous target values or a degenerate-input error.
    pub fn continuous_target(&self) -> Result<&Array1<f64>, StrategyError> {
        match &self.target {
            Target::Continuous(values) => Ok(values),
            Target::Levels { .. } => Err(StrategyError::Degenerate(format!(
                "column '{}' is not continuous",
                self.column
            ))),
        }
    }

    /// Level codes and levels or a degenerate-input error.
    pub fn level_target(&self) -> Result<(&[usize], &[Value]), StrategyError> {
        match &self.target {
            Target::Levels { codes, levels } => Ok((codes, levels)),
            Target::Continuous(_) => Err(StrategyError::Degenerate(format!(
                "column '{}' has no levels",
                self.column
            ))),
        }
    }

    /// Fail unless at least `required` rows are observed.
    pub fn require_observed(&self, required: usize) -> Result<(), StrategyError> {
        if self.observed_rows.len() < required {
            return Err(StrategyError::InsufficientData {
                available: self.observed_rows.len(),
                required: required.saturating_sub(1),
            });
        }
        Ok(())
    }
}

/// An unfitted imputation strategy bound to one column.
pub trait Strategy: fmt::Debug + Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// The fill value of a constant strategy.
    fn constant_value(&self) -> Option<&Value> {
        None
    }

    /// Check the strategy against the table it will run on.
    fn validate(&self, _table: &Table) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Learn from the observed rows of the task.
    fn fit(
        &self,
        task: &ImputationTask<'_>,
        rng: &mut ChainRng,
    ) -> Result<Box<dyn FittedStrategy>, StrategyError>;
}

/// A strategy fit on the current state of a chain.
pub trait FittedStrategy {
    /// One value per missing row of the task, in `missing_rows` order.
    fn predict(
        &self,
        task: &ImputationTask<'_>,
        rng: &mut ChainRng,
    ) -> Result<Vec<Value>, StrategyError>;
}

/// Fit then predict, checking the output length.
pub fn fit_predict(
    strategy: &dyn Strategy,
    task: &ImputationTask<'_>,
    rng: &mut ChainRng,
) -> Result<Vec<Value>, StrategyError> {
    let fitted = strategy.fit(task, rng)?;
    let values = fitted.predict(task, rng)?;
    if values.len() != task.missing_rows.len() {
        return Err(StrategyError::OutputLength {
            expected: task.missing_rows.len(),
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Build the strategy for a column, validating its options.
pub fn build(
    kind: StrategyKind,
    descriptor: &ColumnDescriptor,
    options: &StrategyOptions,
) -> Result<Box<dyn Strategy>, StrategyError> {
    options.check_keys(kind.name(), kind.option_keys())?;
    let name = kind.name();
    let resolved = kind.resolve(descriptor.column_type);

    let strategy: Box<dyn Strategy> = match resolved {
        StrategyKind::Mean => Box::new(univariate::Mean),
        StrategyKind::Median => Box::new(univariate::Median),
        StrategyKind::Mode => Box::new(univariate::Mode::from_options(name, options)?),
        StrategyKind::Random => Box::new(univariate::RandomDraw),
        StrategyKind::Norm => Box::new(univariate::Norm),
        StrategyKind::Categorical => Box::new(univariate::CategoricalDraw),
        StrategyKind::Constant => {
            Box::new(univariate::Constant::from_options(name, descriptor, options)?)
        }
        StrategyKind::Interpolate => {
            Box::new(timeseries::Interpolate::from_options(name, options)?)
        }
        StrategyKind::Locf => Box::new(timeseries::CarryForward),
        StrategyKind::Nocb => Box::new(timeseries::CarryBackward),
        StrategyKind::LeastSquares => Box::new(regression::LeastSquares),
        StrategyKind::Stochastic => Box::new(regression::Stochastic),
        StrategyKind::BinaryLogistic => {
            Box::new(regression::BinaryLogistic::from_options(name, options)?)
        }
        StrategyKind::MultinomialLogistic => {
            Box::new(regression::MultinomialLogistic::from_options(name, options)?)
        }
        StrategyKind::BayesianLeastSquares => Box::new(bayesian::BayesianLeastSquares),
        StrategyKind::BayesianBinaryLogistic => {
            Box::new(bayesian::BayesianBinaryLogistic::from_options(name, options)?)
        }
        StrategyKind::Pmm => Box::new(matching::PredictiveMeanMatching::from_options(name, options)?),
        StrategyKind::Lrd => Box::new(matching::LocalResidualDraw::from_options(name, options)?),
        StrategyKind::DefaultUnivariate
        | StrategyKind::DefaultTime
        | StrategyKind::DefaultPredictive => {
            return Err(StrategyError::Degenerate(format!(
                "'{}' did not resolve to a concrete strategy",
                name
            )));
        }
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("PMM".parse::<StrategyKind>().unwrap(), StrategyKind::Pmm);
        assert_eq!(
            "least_squares".parse::<StrategyKind>().unwrap(),
            StrategyKind::LeastSquares
        );
        assert_eq!(
            " Bayesian Binary Logistic ".parse::<StrategyKind>().unwrap(),
            StrategyKind::BayesianBinaryLogistic
        );
        assert!("knn".parse::<StrategyKind>().is_err());
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&StrategyKind::DefaultPredictive).unwrap();
        assert_eq!(json, "\"default predictive\"");
        let kind: StrategyKind = serde_json::from_str("\"stochastic\"").unwrap();
        assert_eq!(kind, StrategyKind::Stochastic);
        assert!(serde_json::from_str::<StrategyKind>("\"nope\"").is_err());
    }

    #[test]
    fn test_accepts() {
        assert!(StrategyKind::Pmm.accepts(ColumnType::Continuous));
        assert!(!StrategyKind::Pmm.accepts(ColumnType::Binary));
        assert!(StrategyKind::BinaryLogistic.accepts(ColumnType::Binary));
        assert!(!StrategyKind::BinaryLogistic.accepts(ColumnType::Categorical));
        assert!(StrategyKind::MultinomialLogistic.accepts(ColumnType::Binary));
        assert!(StrategyKind::Constant.accepts(ColumnType::Categorical));
    }

    #[test]
    fn test_defaults_resolve_by_type() {
        let p = StrategyKind::DefaultPredictive;
        assert_eq!(p.resolve(ColumnType::Continuous), StrategyKind::Pmm);
        assert_eq!(p.resolve(ColumnType::Binary), StrategyKind::BinaryLogistic);
        assert_eq!(
            p.resolve(ColumnType::Categorical),
            StrategyKind::MultinomialLogistic
        );
        assert_eq!(
            StrategyKind::DefaultTime.resolve(ColumnType::Binary),
            StrategyKind::Locf
        );
        assert_eq!(StrategyKind::Norm.resolve(ColumnType::Binary), StrategyKind::Norm);
    }

    #[test]
    fn test_build_rejects_unknown_option() {
        let descriptor = ColumnDescriptor::new("x", 0, ColumnType::Continuous, true);
        let options = StrategyOptions::new().with("neighbours", 3);
        let err = build(StrategyKind::Pmm, &descriptor, &options).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidOption { .. }));
        let ok = build(
            StrategyKind::Pmm,
            &descriptor,
            &StrategyOptions::new().with("neighbors", 3),
        )
        .unwrap();
        assert_eq!(ok.kind(), StrategyKind::Pmm);
    }

    #[test]
    fn test_constant_requires_fill_value() {
        let descriptor = ColumnDescriptor::new("x", 0, ColumnType::Continuous, true);
        assert!(build(StrategyKind::Constant, &descriptor, &StrategyOptions::new()).is_err());
        let options = StrategyOptions::new().with("fill_value", "zero");
        assert!(build(StrategyKind::Constant, &descriptor, &options).is_err());
        let options = StrategyOptions::new().with("fill_value", 0.0);
        assert!(build(StrategyKind::Constant, &descriptor, &options).is_ok());
    }
}
