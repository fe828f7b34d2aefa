//! Downstream analysis of imputed datasets.

mod mi_models;
mod pooling;

pub use mi_models::{MiFitResult, MiLinearRegression, MiLogisticRegression};
pub use pooling::{pool, PooledEstimate, PooledReport, Pooler};
