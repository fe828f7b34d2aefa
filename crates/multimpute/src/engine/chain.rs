//! One chain of chained-equations imputation.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ImputeError, Result};
use crate::models::Design;
use crate::schema::ColumnDescriptor;
use crate::stats::descriptive;
use crate::strategy::{fit_predict, ChainRng, ImputationTask, StrategyError};
use crate::table::{Table, Value};

use super::config::VisitOrder;
use super::plan::{ColumnPlan, ImputationPlan};

/// Lifecycle of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Initialized,
    Iterating,
    Converged,
}

/// Summary of the values imputed for one column in one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiagnostics {
    pub iteration: usize,
    pub column: String,
    /// Mean of the imputed values (level codes for leveled columns).
    pub mean: f64,
    pub std_dev: f64,
    /// Mean absolute change from the previous iteration, if there was one.
    pub change: Option<f64>,
}

/// Per-iteration diagnostics of a whole chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainTrace {
    pub entries: Vec<ColumnDiagnostics>,
    /// Iterations actually run.
    pub iterations: usize,
    /// Whether the tolerance stopped the chain early.
    pub converged_early: bool,
}

impl ChainTrace {
    /// Entries for one column, in iteration order.
    pub fn column(&self, name: &str) -> impl Iterator<Item = &ColumnDiagnostics> {
        let name = name.to_string();
        self.entries.iter().filter(move |e| e.column == name)
    }
}

/// A completed table produced by one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputation {
    /// 1-based position within the run.
    pub index: usize,
    /// Seed of the chain's random number generator.
    pub seed: u64,
    pub table: Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ChainTrace>,
}

/// Working state of one chain.
pub struct Chain<'p> {
    plan: &'p ImputationPlan,
    index: usize,
    seed: u64,
    table: Table,
    state: ChainState,
    iteration: usize,
    rng: ChainRng,
    last_imputed: IndexMap<String, Vec<f64>>,
    trace: Option<ChainTrace>,
}

impl<'p> Chain<'p> {
    /// Copy the source table and give every touched missing cell its initial fill.
    pub fn new(plan: &'p ImputationPlan, source: &Table, index: usize, seed: u64) -> Result<Self> {
        let mut table = source.clone();
        for (name, value) in &plan.initial_fill {
            let column = table.column_mut(name)?;
            for row in column.missing_rows() {
                column.set(row, value.clone())?;
            }
        }

        Ok(Self {
            plan,
            index,
            seed,
            table,
            state: ChainState::Initialized,
            iteration: 0,
            rng: ChainRng::seed_from_u64(seed),
            last_imputed: IndexMap::new(),
            trace: plan.diagnostics.then(ChainTrace::default),
        })
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The working table in its current state.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Run one pass over the bound columns.
    pub fn step(&mut self) -> Result<()> {
        if self.state == ChainState::Converged {
            return Ok(());
        }
        self.state = ChainState::Iterating;
        self.iteration += 1;

        let plan = self.plan;
        let mut order: Vec<&ColumnPlan> = plan.columns.iter().collect();
        if plan.visit == VisitOrder::Random {
            order.shuffle(&mut self.rng);
        }

        let mut max_change: Option<f64> = None;
        for column in order {
            let change = self.impute_column(column)?;
            max_change = match (max_change, change) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (None, c) | (c, None) => c,
            };
        }

        let converged = match (plan.tolerance, max_change) {
            (Some(tol), Some(change)) if self.iteration > 1 => change <= tol,
            _ => false,
        };
        if converged {
            debug!(
                chain = self.index,
                iteration = self.iteration,
                "chain converged within tolerance"
            );
            self.state = ChainState::Converged;
            if let Some(trace) = self.trace.as_mut() {
                trace.converged_early = self.iteration < plan.iterations;
            }
        }
        Ok(())
    }

    /// Fit and predict one column, writing the predictions into the working table.
    ///
    /// Returns the mean absolute change from the previous iteration.
    fn impute_column(&mut self, column: &ColumnPlan) -> Result<Option<f64>> {
        let (chain, iteration) = (self.index, self.iteration);
        let chain_error = |source: StrategyError| ImputeError::ChainFit {
            chain,
            column: column.name().to_string(),
            iteration,
            source,
        };

        let design = if column.uses_predictors() {
            Design::encode(&self.table, &column.encodings)
                .map_err(|e| chain_error(e.into()))?
        } else {
            Design::empty(self.table.n_rows())
        };

        let task = ImputationTask {
            column: column.name(),
            column_type: column.descriptor.column_type,
            target: column.target.clone(),
            observed_rows: &column.observed_rows,
            missing_rows: &column.missing_rows,
            design: &design,
            table: &self.table,
        };
        let values = fit_predict(column.strategy.as_ref(), &task, &mut self.rng)
            .map_err(chain_error)?;

        let coded: Vec<f64> = values
            .iter()
            .map(|v| numeric_code(&column.descriptor, v))
            .collect();

        let target = self.table.column_mut(column.name())?;
        for (&row, value) in column.missing_rows.iter().zip(values) {
            target.set(row, value)?;
        }

        let change = self.last_imputed.get(column.name()).map(|previous| {
            let total: f64 = previous
                .iter()
                .zip(&coded)
                .map(|(a, b)| (a - b).abs())
                .sum();
            total / coded.len().max(1) as f64
        });

        trace!(
            chain = self.index,
            iteration = self.iteration,
            column = column.name(),
            change = ?change,
            "imputed column"
        );

        if let Some(trace) = self.trace.as_mut() {
            trace.entries.push(ColumnDiagnostics {
                iteration: self.iteration,
                column: column.name().to_string(),
                mean: descriptive::mean(&coded),
                std_dev: descriptive::std_dev(&coded, 0),
                change,
            });
        }
        self.last_imputed.insert(column.name().to_string(), coded);
        Ok(change)
    }

    /// Iterate to the budget (or convergence) and produce the completed table.
    pub fn run(mut self, source: &Table) -> Result<Imputation> {
        while self.iteration < self.plan.iterations && self.state != ChainState::Converged {
            self.step()?;
        }
        self.state = ChainState::Converged;
        self.finish(source)
    }

    fn finish(mut self, source: &Table) -> Result<Imputation> {
        // Predictor-only columns go back to missing
        for name in &self.plan.predictor_only {
            let rows = source.require(name)?.missing_rows();
            let column = self.table.column_mut(name)?;
            for row in rows {
                column.clear(row);
            }
        }

        if let Some(trace) = self.trace.as_mut() {
            trace.iterations = self.iteration;
        }

        Ok(Imputation {
            index: self.index,
            seed: self.seed,
            table: self.table,
            trace: self.trace,
        })
    }
}

/// Numeric code of an imputed value: the value itself or its level index.
fn numeric_code(descriptor: &ColumnDescriptor, value: &Value) -> f64 {
    if descriptor.column_type.is_leveled() {
        descriptor
            .level_code(value)
            .map(|c| c as f64)
            .unwrap_or(f64::NAN)
    } else {
        value.as_f64().unwrap_or(f64::NAN)
    }
}

/// Run one complete chain.
pub fn run_chain(plan: &ImputationPlan, source: &Table, index: usize, seed: u64) -> Result<Imputation> {
    if plan.is_noop() {
        return Ok(Imputation {
            index,
            seed,
            table: source.clone(),
            trace: plan.diagnostics.then(ChainTrace::default),
        });
    }
    Chain::new(plan, source, index, seed)?.run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ImputerConfig;
    use crate::strategy::StrategyKind;
    use crate::table::ColumnData;

    fn table() -> Table {
        Table::from_columns(vec![
            (
                "x",
                ColumnData::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            ),
            (
                "y",
                ColumnData::from_f64(vec![2.1, f64::NAN, 6.2, 7.9, f64::NAN, 12.1, 14.0, 15.8]),
            ),
            (
                "z",
                ColumnData::from_f64(vec![f64::NAN, 1.7, 2.4, 3.9, 4.2, 5.8, 6.1, 7.9]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_initial_fill_uses_mean() {
        let config = ImputerConfig::new().with_column_strategy("y", StrategyKind::Mean);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        let chain = Chain::new(&plan, &table(), 1, 0).unwrap();
        assert_eq!(chain.state(), ChainState::Initialized);
        let expected = (2.1 + 6.2 + 7.9 + 12.1 + 14.0 + 15.8) / 6.0;
        assert_eq!(chain.table().get(1, "y"), Some(Value::Number(expected)));
    }

    #[test]
    fn test_predictor_only_column_restored() {
        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::LeastSquares)
            .with_iterations(3);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        assert_eq!(plan.predictor_only, vec!["z".to_string()]);
        let out = run_chain(&plan, &table(), 1, 99).unwrap();
        assert_eq!(out.table.missing_count("y"), 0);
        assert!(out.table.is_missing(0, "z"));
    }

    #[test]
    fn test_diagnostics_and_tolerance() {
        // Deterministic fit against fixed predictors: no change after the first pass
        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::LeastSquares)
            .with_iterations(20)
            .with_tolerance(1e-6)
            .with_diagnostics(true);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        let out = run_chain(&plan, &table(), 1, 5).unwrap();
        let trace = out.trace.unwrap();
        assert!(trace.converged_early);
        assert_eq!(trace.iterations, 2);
        let entries: Vec<_> = trace.column("y").collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].change.is_none());
        assert_eq!(entries[1].change, Some(0.0));
    }

    #[test]
    fn test_same_seed_same_chain() {
        let config = ImputerConfig::new()
            .with_strategy(StrategyKind::Stochastic)
            .with_visit(VisitOrder::Random);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        let a = run_chain(&plan, &table(), 1, 17).unwrap();
        let b = run_chain(&plan, &table(), 1, 17).unwrap();
        assert_eq!(a.table, b.table);
    }
}
