//! Multimpute: multiple imputation by chained equations for tabular data.
//!
//! An incomplete [`Table`] goes in; `n` completed tables come out, each from an
//! independent, seeded chain that repeatedly re-imputes every incomplete
//! column from the others. Estimates computed on each completed table are then
//! combined with Rubin's rules.
//!
//! # Core Principles
//!
//! - **Validate first**: every configuration error surfaces before a chain runs
//! - **Non-destructive**: the source table is never modified
//! - **Reproducible**: a base seed fixes every chain, sequential or parallel
//!
//! # Example
//!
//! ```no_run
//! use multimpute::{ImputerConfig, MultipleImputer, Parser, StrategyKind};
//!
//! let (table, _) = Parser::new().parse_file("survey.csv").unwrap();
//! let config = ImputerConfig::new()
//!     .with_n(5)
//!     .with_strategy(StrategyKind::Pmm)
//!     .with_seed(42);
//!
//! let imputations = MultipleImputer::new(config).impute_eager(&table).unwrap();
//! for imputation in &imputations {
//!     println!("imputation {}: {} missing", imputation.index, imputation.table.total_missing());
//! }
//! ```

pub mod analysis;
pub mod engine;
pub mod error;
pub mod input;
pub mod models;
pub mod patterns;
pub mod schema;
pub mod stats;
pub mod strategy;
pub mod table;

pub use analysis::{
    pool, MiFitResult, MiLinearRegression, MiLogisticRegression, PooledEstimate, PooledReport,
    Pooler,
};
pub use engine::{
    Imputation, ImputationOutput, ImputationPlan, ImputationSet, ImputerConfig, LazyImputations,
    Materialize, MultipleImputer, PredictorSpec, PredictorsConfig, StrategyConfig, VisitOrder,
};
pub use error::{ImputeError, Result};
pub use input::{Parser, ParserConfig, SourceMetadata, TableWriter};
pub use models::{FittedModel, LinearRegression, LogisticRegression, StatModel};
pub use patterns::MissingnessAnalyzer;
pub use schema::{ColumnDescriptor, ColumnType, TableSchema};
pub use strategy::{StrategyError, StrategyKind, StrategyOptions};
pub use table::{ColumnData, Table, Value};
