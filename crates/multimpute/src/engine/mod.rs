//! Chained-equations imputation engine.
//!
//! [`MultipleImputer`] validates an [`ImputerConfig`] against a table into an
//! [`ImputationPlan`], then runs one independent [`Chain`] per imputation.

mod chain;
mod config;
mod orchestrator;
mod plan;
mod predictors;

pub use chain::{run_chain, Chain, ChainState, ChainTrace, ColumnDiagnostics, Imputation};
pub use config::{
    ImputerConfig, Materialize, PredictorSpec, PredictorsConfig, StrategyConfig, VisitOrder,
};
pub use orchestrator::{
    chain_seed, ImputationOutput, ImputationSet, LazyImputations, LazyIter, MultipleImputer,
};
pub use plan::{ColumnPlan, ImputationPlan};
pub use predictors::{PredictorGraph, PredictorResolver};
