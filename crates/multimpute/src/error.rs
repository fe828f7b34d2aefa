//! Error types for the multimpute library.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::ColumnType;
use crate::strategy::StrategyError;

/// Main error type for imputation and pooling operations.
#[derive(Debug, Error)]
pub enum ImputeError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing CSV/TSV data.
    #[error("Parse error at row {row}, column {column}: {message}")]
    Parse {
        row: usize,
        column: usize,
        message: String,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Empty file or no data to impute.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structural table error (ragged columns, unknown column, wrong cell kind).
    #[error("Table error: {0}")]
    Table(String),

    /// Invalid strategy, predictor or type configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A strategy was bound to a column whose type it cannot impute.
    #[error("Configuration error: strategy '{strategy}' cannot impute {column_type} column '{column}'")]
    StrategyMismatch {
        column: String,
        strategy: String,
        column_type: ColumnType,
    },

    /// A column's strategy failed to fit or predict inside a chain.
    #[error("Chain {chain} failed on column '{column}' at iteration {iteration}: {source}")]
    ChainFit {
        chain: usize,
        column: String,
        iteration: usize,
        #[source]
        source: StrategyError,
    },

    /// Rubin's rules could not be applied.
    #[error("Pooling error: {0}")]
    Pooling(String),

    /// An analysis model could not be fit outside of a chain.
    #[error("Model error: {0}")]
    Model(String),
}

impl ImputeError {
    /// True for errors raised while validating configuration, before any chain runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ImputeError::Configuration(_) | ImputeError::StrategyMismatch { .. }
        )
    }
}

/// Result type alias for multimpute operations.
pub type Result<T> = std::result::Result<T, ImputeError>;
