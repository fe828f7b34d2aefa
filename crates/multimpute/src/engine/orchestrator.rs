//! Multiple-imputation orchestrator: runs n independent chains.

use std::iter::FusedIterator;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::table::Table;

use super::chain::{run_chain, Imputation};
use super::config::{ImputerConfig, Materialize};
use super::plan::ImputationPlan;

/// Seed of the chain at `index` (0-based) derived from the run's base seed.
///
/// SplitMix64 finalizer over the base seed offset by the chain position.
pub fn chain_seed(base: u64, index: usize) -> u64 {
    let mut z = base.wrapping_add((index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// All imputations of an eager run, ordered by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationSet {
    /// Base seed the chain seeds were derived from.
    pub base_seed: u64,
    pub imputations: Vec<Imputation>,
}

impl ImputationSet {
    pub fn len(&self) -> usize {
        self.imputations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imputations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Imputation> {
        self.imputations.iter()
    }

    /// Completed tables in index order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.imputations.iter().map(|i| &i.table)
    }

    /// Imputation by its 1-based index.
    pub fn get(&self, index: usize) -> Option<&Imputation> {
        index.checked_sub(1).and_then(|i| self.imputations.get(i))
    }
}

impl IntoIterator for ImputationSet {
    type Item = Imputation;
    type IntoIter = std::vec::IntoIter<Imputation>;

    fn into_iter(self) -> Self::IntoIter {
        self.imputations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ImputationSet {
    type Item = &'a Imputation;
    type IntoIter = std::slice::Iter<'a, Imputation>;

    fn into_iter(self) -> Self::IntoIter {
        self.imputations.iter()
    }
}

/// Imputations produced one chain at a time.
///
/// Owns its copy of the source table and the validated plan, so it outlives
/// the table it was created from.
#[derive(Debug, Clone)]
pub struct LazyImputations {
    source: Table,
    plan: Arc<ImputationPlan>,
    base_seed: u64,
    n: usize,
    verbose: bool,
}

impl LazyImputations {
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn plan(&self) -> &ImputationPlan {
        &self.plan
    }

    /// Start (or restart) the sequence from the first chain.
    pub fn iter(&self) -> LazyIter<'_> {
        LazyIter {
            owner: self,
            next: 0,
            failed: false,
        }
    }

    /// Run every remaining chain and collect the results.
    pub fn collect_all(&self) -> Result<ImputationSet> {
        let imputations = self.iter().collect::<Result<Vec<_>>>()?;
        Ok(ImputationSet {
            base_seed: self.base_seed,
            imputations,
        })
    }
}

impl<'a> IntoIterator for &'a LazyImputations {
    type Item = Result<Imputation>;
    type IntoIter = LazyIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`LazyImputations`]; stops for good after the first error.
#[derive(Debug)]
pub struct LazyIter<'a> {
    owner: &'a LazyImputations,
    next: usize,
    failed: bool,
}

impl Iterator for LazyIter<'_> {
    type Item = Result<Imputation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.owner.n {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let result = run_indexed(
            &self.owner.plan,
            &self.owner.source,
            self.owner.base_seed,
            index,
            self.owner.verbose,
        );
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.owner.n.saturating_sub(self.next);
        (0, Some(remaining))
    }
}

impl FusedIterator for LazyIter<'_> {}

/// Result of [`MultipleImputer::impute`], shaped by the `materialize` setting.
#[derive(Debug, Clone)]
pub enum ImputationOutput {
    Eager(ImputationSet),
    Lazy(LazyImputations),
}

impl ImputationOutput {
    pub fn base_seed(&self) -> u64 {
        match self {
            ImputationOutput::Eager(set) => set.base_seed,
            ImputationOutput::Lazy(lazy) => lazy.base_seed,
        }
    }

    /// Materialize the output, running any chains not yet run.
    pub fn into_set(self) -> Result<ImputationSet> {
        match self {
            ImputationOutput::Eager(set) => Ok(set),
            ImputationOutput::Lazy(lazy) => lazy.collect_all(),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Produces n completed tables from one incomplete table.
#[derive(Debug, Clone, Default)]
pub struct MultipleImputer {
    config: ImputerConfig,
}

impl MultipleImputer {
    pub fn new(config: ImputerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImputerConfig {
        &self.config
    }

    /// Analyze `table` and validate the configuration against it.
    ///
    /// Every configuration error surfaces here; no chain has run yet.
    pub fn plan(&self, table: &Table) -> Result<ImputationPlan> {
        ImputationPlan::build(table, &self.config)
    }

    /// Run all n chains and keep every completed table.
    pub fn impute_eager(&self, table: &Table) -> Result<ImputationSet> {
        let plan = self.plan(table)?;
        let base_seed = self.base_seed();
        self.log_start(&plan, base_seed);

        let n = self.config.n;
        let verbose = self.config.verbose;
        let imputations = if self.config.parallel {
            (0..n)
                .into_par_iter()
                .map(|i| run_indexed(&plan, table, base_seed, i, verbose))
                .collect::<Result<Vec<_>>>()?
        } else {
            (0..n)
                .map(|i| run_indexed(&plan, table, base_seed, i, verbose))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(ImputationSet {
            base_seed,
            imputations,
        })
    }

    /// Validate now, run chains on demand.
    pub fn impute_lazy(&self, table: &Table) -> Result<LazyImputations> {
        let plan = self.plan(table)?;
        let base_seed = self.base_seed();
        self.log_start(&plan, base_seed);

        Ok(LazyImputations {
            source: table.clone(),
            plan: Arc::new(plan),
            base_seed,
            n: self.config.n,
            verbose: self.config.verbose,
        })
    }

    /// Eager or lazy imputation according to `materialize`.
    pub fn impute(&self, table: &Table) -> Result<ImputationOutput> {
        match self.config.materialize {
            Materialize::Eager => self.impute_eager(table).map(ImputationOutput::Eager),
            Materialize::Lazy => self.impute_lazy(table).map(ImputationOutput::Lazy),
        }
    }

    fn base_seed(&self) -> u64 {
        self.config.seed.unwrap_or_else(rand::random)
    }

    fn log_start(&self, plan: &ImputationPlan, base_seed: u64) {
        if self.config.verbose {
            info!(
                n = self.config.n,
                iterations = plan.iterations,
                columns = plan.columns.len(),
                base_seed,
                "starting multiple imputation"
            );
        } else {
            debug!(n = self.config.n, base_seed, "starting multiple imputation");
        }
    }
}

fn run_indexed(
    plan: &ImputationPlan,
    source: &Table,
    base_seed: u64,
    index: usize,
    verbose: bool,
) -> Result<Imputation> {
    let seed = chain_seed(base_seed, index);
    let imputation = run_chain(plan, source, index + 1, seed)?;
    if verbose {
        info!(chain = index + 1, seed, "chain complete");
    }
    Ok(imputation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyKind;
    use crate::table::ColumnData;

    fn table() -> Table {
        Table::from_columns(vec![
            (
                "x",
                ColumnData::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]),
            ),
            (
                "y",
                ColumnData::from_f64(vec![
                    2.2,
                    f64::NAN,
                    6.1,
                    8.3,
                    9.7,
                    f64::NAN,
                    14.2,
                    15.9,
                    18.4,
                    19.8,
                ]),
            ),
        ])
        .unwrap()
    }

    fn config() -> ImputerConfig {
        ImputerConfig::new()
            .with_n(4)
            .with_strategy(StrategyKind::BayesianLeastSquares)
            .with_seed(2024)
    }

    #[test]
    fn test_chain_seeds_are_distinct() {
        let seeds: Vec<u64> = (0..100).map(|i| chain_seed(7, i)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
        assert_eq!(chain_seed(7, 3), chain_seed(7, 3));
    }

    #[test]
    fn test_eager_indices_and_seeds() {
        let set = MultipleImputer::new(config()).impute_eager(&table()).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.base_seed, 2024);
        for (i, imputation) in set.iter().enumerate() {
            assert_eq!(imputation.index, i + 1);
            assert_eq!(imputation.seed, chain_seed(2024, i));
            assert_eq!(imputation.table.missing_count("y"), 0);
        }
        assert_eq!(set.get(1).map(|i| i.index), Some(1));
        assert!(set.get(0).is_none());
    }

    #[test]
    fn test_lazy_restarts() {
        let lazy = MultipleImputer::new(config()).impute_lazy(&table()).unwrap();
        let first: Vec<Table> = lazy.iter().map(|r| r.unwrap().table).collect();
        let second: Vec<Table> = lazy.iter().map(|r| r.unwrap().table).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_materialize_selects_output() {
        let imputer = MultipleImputer::new(config().with_materialize(Materialize::Lazy));
        match imputer.impute(&table()).unwrap() {
            ImputationOutput::Lazy(lazy) => assert_eq!(lazy.len(), 4),
            ImputationOutput::Eager(_) => panic!("expected lazy output"),
        }
    }

    #[test]
    fn test_random_base_seed_recorded() {
        let imputer = MultipleImputer::new(ImputerConfig::new().with_n(2));
        let set = imputer.impute_eager(&table()).unwrap();
        assert_eq!(set.imputations[0].seed, chain_seed(set.base_seed, 0));
    }
}
