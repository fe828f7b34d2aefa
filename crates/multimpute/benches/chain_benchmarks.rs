//! Imputation and pooling performance benchmarks.
//!
//! Measures plan resolution, single chains per strategy, and full multi-chain runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use multimpute::engine::run_chain;
use multimpute::{
    ColumnData, ImputerConfig, MiLinearRegression, MultipleImputer, StrategyKind, Table,
};

/// Generate a mixed table with roughly 15% missing cells in the incomplete columns.
fn generate_survey(rows: usize) -> Table {
    let regions = ["north", "south", "east", "west"];
    let mut age = Vec::with_capacity(rows);
    let mut income = Vec::with_capacity(rows);
    let mut score = Vec::with_capacity(rows);
    let mut smoker = Vec::with_capacity(rows);
    let mut region = Vec::with_capacity(rows);

    for row in 0..rows {
        let a = 20.0 + (row * 37 % 50) as f64;
        let wobble = ((row * 7919) % 101) as f64 / 10.0 - 5.0;
        age.push(if row % 7 == 3 { f64::NAN } else { a });
        income.push(if row % 6 == 1 { f64::NAN } else { 20.0 + 0.5 * a + wobble });
        score.push(if row % 9 == 5 { f64::NAN } else { 0.3 * a - wobble });
        smoker.push(if row % 8 == 2 {
            None
        } else if (row * 13) % 5 < 2 {
            Some("yes")
        } else {
            Some("no")
        });
        region.push(if row % 11 == 4 {
            None
        } else {
            Some(regions[row % regions.len()])
        });
    }

    Table::from_columns(vec![
        ("age", ColumnData::from_f64(age)),
        ("income", ColumnData::from_f64(income)),
        ("score", ColumnData::from_f64(score)),
        ("smoker", ColumnData::from_text(smoker)),
        ("region", ColumnData::from_text(region)),
    ])
    .unwrap()
}

/// Benchmark plan resolution (schema analysis plus strategy and predictor validation).
fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for rows in [100, 1_000, 10_000].iter() {
        let table = generate_survey(*rows);
        let imputer = MultipleImputer::new(ImputerConfig::new());
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &table, |b, table| {
            b.iter(|| black_box(imputer.plan(table).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark one chain per numeric strategy.
fn bench_chain_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_strategy");
    let table = generate_survey(1_000);

    for kind in [
        StrategyKind::Mean,
        StrategyKind::Norm,
        StrategyKind::LeastSquares,
        StrategyKind::BayesianLeastSquares,
        StrategyKind::Pmm,
        StrategyKind::Lrd,
    ] {
        let config = ImputerConfig::new()
            .with_iterations(5)
            .with_column_strategy("age", kind)
            .with_column_strategy("income", kind)
            .with_column_strategy("score", kind);
        let plan = MultipleImputer::new(config).plan(&table).unwrap();
        group.bench_function(kind.to_string(), |b| {
            b.iter(|| black_box(run_chain(&plan, &table, 1, 42).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark full multi-chain runs, sequential against parallel.
fn bench_multiple_imputation(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiple_imputation");
    group.sample_size(20);
    let table = generate_survey(2_000);

    for parallel in [false, true] {
        let config = ImputerConfig::new()
            .with_n(5)
            .with_iterations(5)
            .with_seed(7)
            .with_parallel(parallel);
        let imputer = MultipleImputer::new(config);
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| black_box(imputer.impute_eager(&table).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark imputation followed by pooled linear regression.
fn bench_pooled_regression(c: &mut Criterion) {
    let table = generate_survey(1_000);
    let config = ImputerConfig::new().with_n(5).with_iterations(5).with_seed(11);

    c.bench_function("pooled_linear_regression", |b| {
        b.iter(|| {
            black_box(
                MiLinearRegression::new(config.clone())
                    .fit(&table, "income", &["age", "smoker", "region"])
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_plan,
    bench_chain_strategies,
    bench_multiple_imputation,
    bench_pooled_regression,
);
criterion_main!(benches);
