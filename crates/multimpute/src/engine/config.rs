//! Imputer configuration.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ImputeError, Result};
use crate::schema::ColumnType;
use crate::strategy::{StrategyKind, StrategyOptions};

/// Which strategy imputes which column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategyConfig {
    /// One strategy for every incomplete column.
    All(StrategyKind),
    /// Only the listed columns are imputed, each with its own strategy.
    PerColumn(IndexMap<String, StrategyKind>),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::All(StrategyKind::DefaultPredictive)
    }
}

/// Predictors for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PredictorSpecRepr", into = "PredictorSpecRepr")]
pub enum PredictorSpec {
    /// Every other column in table order.
    All,
    /// No predictors.
    None,
    /// The listed columns in the given order.
    Columns(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PredictorSpecRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<PredictorSpecRepr> for PredictorSpec {
    type Error = String;

    fn try_from(repr: PredictorSpecRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            PredictorSpecRepr::Keyword(word) => match word.trim().to_lowercase().as_str() {
                "all" => Ok(PredictorSpec::All),
                "none" => Ok(PredictorSpec::None),
                _ => Err(format!(
                    "predictors must be \"all\", \"none\" or a list of columns, got \"{}\"",
                    word
                )),
            },
            PredictorSpecRepr::List(columns) => Ok(PredictorSpec::Columns(columns)),
        }
    }
}

impl From<PredictorSpec> for PredictorSpecRepr {
    fn from(spec: PredictorSpec) -> Self {
        match spec {
            PredictorSpec::All => PredictorSpecRepr::Keyword("all".to_string()),
            PredictorSpec::None => PredictorSpecRepr::Keyword("none".to_string()),
            PredictorSpec::Columns(columns) => PredictorSpecRepr::List(columns),
        }
    }
}

/// Predictor sets for the imputed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictorsConfig {
    /// The same spec for every column.
    All(PredictorSpec),
    /// Per-column specs; absent columns use every other column.
    PerColumn(IndexMap<String, PredictorSpec>),
}

impl Default for PredictorsConfig {
    fn default() -> Self {
        PredictorsConfig::All(PredictorSpec::All)
    }
}

/// Column order within one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitOrder {
    /// Ascending missing count, ties by column position.
    #[default]
    LeftToRight,
    /// A fresh random permutation every iteration.
    Random,
}

/// Whether imputations are produced up front or on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialize {
    #[default]
    Eager,
    Lazy,
}

/// Configuration for a multiple-imputation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputerConfig {
    /// Number of imputed datasets.
    pub n: usize,
    /// Iterations per chain.
    #[serde(alias = "k")]
    pub iterations: usize,
    pub strategy: StrategyConfig,
    pub predictors: PredictorsConfig,
    /// Extra options keyed by column name or strategy name; column entries win.
    pub options: IndexMap<String, StrategyOptions>,
    pub visit: VisitOrder,
    /// Base seed; drawn at random per run when absent.
    pub seed: Option<u64>,
    pub materialize: Materialize,
    /// Log per-chain progress at info level.
    pub verbose: bool,
    /// Record per-iteration summaries of imputed values.
    pub diagnostics: bool,
    /// Run chains on the rayon thread pool.
    pub parallel: bool,
    /// Stop a chain early once imputed values change by at most this much.
    pub tolerance: Option<f64>,
    /// Declared column types replacing the inferred ones.
    pub column_types: IndexMap<String, ColumnType>,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            n: 5,
            iterations: 5,
            strategy: StrategyConfig::default(),
            predictors: PredictorsConfig::default(),
            options: IndexMap::new(),
            visit: VisitOrder::default(),
            seed: None,
            materialize: Materialize::default(),
            verbose: false,
            diagnostics: false,
            parallel: false,
            tolerance: None,
            column_types: IndexMap::new(),
        }
    }
}

impl ImputerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ImputeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ImputerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that do not depend on the table.
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(ImputeError::Configuration(
                "n must be at least 1".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(ImputeError::Configuration(
                "iterations must be at least 1".to_string(),
            ));
        }
        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(ImputeError::Configuration(format!(
                    "tolerance must be a non-negative number, got {}",
                    tol
                )));
            }
        }
        Ok(())
    }

    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Use one strategy for every incomplete column.
    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.strategy = StrategyConfig::All(kind);
        self
    }

    /// Bind a strategy to one column, switching to per-column mode.
    pub fn with_column_strategy(mut self, column: impl Into<String>, kind: StrategyKind) -> Self {
        match &mut self.strategy {
            StrategyConfig::PerColumn(map) => {
                map.insert(column.into(), kind);
            }
            StrategyConfig::All(_) => {
                let mut map = IndexMap::new();
                map.insert(column.into(), kind);
                self.strategy = StrategyConfig::PerColumn(map);
            }
        }
        self
    }

    pub fn with_predictors(mut self, predictors: PredictorsConfig) -> Self {
        self.predictors = predictors;
        self
    }

    /// Set the predictors of one column, switching to per-column mode.
    pub fn with_column_predictors(mut self, column: impl Into<String>, spec: PredictorSpec) -> Self {
        match &mut self.predictors {
            PredictorsConfig::PerColumn(map) => {
                map.insert(column.into(), spec);
            }
            PredictorsConfig::All(_) => {
                let mut map = IndexMap::new();
                map.insert(column.into(), spec);
                self.predictors = PredictorsConfig::PerColumn(map);
            }
        }
        self
    }

    /// Options for a column or strategy name.
    pub fn with_options(mut self, target: impl Into<String>, options: StrategyOptions) -> Self {
        self.options.insert(target.into(), options);
        self
    }

    pub fn with_visit(mut self, visit: VisitOrder) -> Self {
        self.visit = visit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_materialize(mut self, materialize: Materialize) -> Self {
        self.materialize = materialize;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(column.into(), column_type);
        self
    }
}

impl fmt::Display for VisitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitOrder::LeftToRight => write!(f, "left-to-right"),
            VisitOrder::Random => write!(f, "random"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ImputerConfig::default();
        assert_eq!(config.n, 5);
        assert_eq!(config.iterations, 5);
        assert_eq!(
            config.strategy,
            StrategyConfig::All(StrategyKind::DefaultPredictive)
        );
        assert_eq!(config.predictors, PredictorsConfig::All(PredictorSpec::All));
        assert_eq!(config.materialize, Materialize::Eager);
        assert!(config.tolerance.is_none());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "n": 3,
            "k": 10,
            "strategy": {"age": "norm", "income": "pmm"},
            "predictors": {"age": "none", "income": ["age", "gender"]},
            "options": {"pmm": {"neighbors": 3}},
            "visit": "random",
            "seed": 42,
            "materialize": "lazy"
        }"#;
        let config: ImputerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.n, 3);
        assert_eq!(config.iterations, 10);
        match &config.strategy {
            StrategyConfig::PerColumn(map) => assert_eq!(map["income"], StrategyKind::Pmm),
            other => panic!("unexpected {:?}", other),
        }
        match &config.predictors {
            PredictorsConfig::PerColumn(map) => {
                assert_eq!(map["age"], PredictorSpec::None);
                assert_eq!(
                    map["income"],
                    PredictorSpec::Columns(vec!["age".into(), "gender".into()])
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(config.visit, VisitOrder::Random);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.materialize, Materialize::Lazy);
    }

    #[test]
    fn test_single_strategy_and_keyword_predictors() {
        let config: ImputerConfig =
            serde_json::from_str(r#"{"strategy": "least squares", "predictors": "all"}"#).unwrap();
        assert_eq!(config.strategy, StrategyConfig::All(StrategyKind::LeastSquares));
        assert!(serde_json::from_str::<ImputerConfig>(r#"{"predictors": "some"}"#).is_err());
        assert!(serde_json::from_str::<ImputerConfig>(r#"{"strategy": "magic"}"#).is_err());
    }

    #[test]
    fn test_builders_switch_to_per_column() {
        let config = ImputerConfig::new()
            .with_column_strategy("a", StrategyKind::Mean)
            .with_column_strategy("b", StrategyKind::Mode)
            .with_column_predictors("a", PredictorSpec::None);
        match config.strategy {
            StrategyConfig::PerColumn(map) => assert_eq!(map.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(config.predictors, PredictorsConfig::PerColumn(_)));
    }

    #[test]
    fn test_validate() {
        assert!(ImputerConfig::new().with_n(0).validate().is_err());
        assert!(ImputerConfig::new().with_iterations(0).validate().is_err());
        assert!(ImputerConfig::new().with_tolerance(-1.0).validate().is_err());
        assert!(ImputerConfig::new().with_tolerance(0.01).validate().is_ok());
    }

    #[test]
    fn test_from_json_file() {
        use std::io::Write;
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"n": 2, "seed": 7}}"#).unwrap();
        let config = ImputerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.n, 2);
        assert_eq!(config.seed, Some(7));

        let missing = ImputerConfig::from_json_file("/nonexistent/config.json");
        assert!(matches!(missing, Err(ImputeError::Io { .. })));
    }
}
