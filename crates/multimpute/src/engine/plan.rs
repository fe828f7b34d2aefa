//! Validated imputation plan.
//!
//! Every configuration check happens here, before any chain runs: column type
//! overrides, strategy legality, strategy options and predictor sets.

use std::sync::Arc;

use indexmap::IndexMap;
use ndarray::Array1;
use tracing::{debug, info};

use crate::error::{ImputeError, Result};
use crate::models::Encoding;
use crate::patterns::MissingnessAnalyzer;
use crate::schema::{ColumnDescriptor, ColumnType, TableSchema};
use crate::stats::descriptive;
use crate::strategy::{self, Strategy, StrategyKind, StrategyOptions, Target};
use crate::table::{ColumnData, Table, Value};

use super::config::{ImputerConfig, StrategyConfig, VisitOrder};
use super::predictors::{PredictorGraph, PredictorResolver};

/// Everything needed to impute one column inside a chain.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    /// Descriptor with strategy and predictors filled in.
    pub descriptor: ColumnDescriptor,
    /// Strategy as configured (defaults unresolved).
    pub kind: StrategyKind,
    pub strategy: Arc<dyn Strategy>,
    /// Design encodings of the predictors; empty for strategies without predictors.
    pub encodings: Vec<Encoding>,
    pub observed_rows: Vec<usize>,
    pub missing_rows: Vec<usize>,
    /// Observed values of the column.
    pub target: Target,
}

impl ColumnPlan {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn uses_predictors(&self) -> bool {
        !self.encodings.is_empty()
    }
}

/// A fully validated plan for imputing one table.
#[derive(Debug, Clone)]
pub struct ImputationPlan {
    /// Analyzed schema; bound columns carry their strategy and predictors.
    pub schema: TableSchema,
    /// Bound incomplete columns in default visit order.
    pub columns: Vec<ColumnPlan>,
    /// Predictors of every bound column.
    pub predictors: PredictorGraph,
    /// Incomplete columns used as predictors but not imputed themselves.
    pub predictor_only: Vec<String>,
    /// Initial fill for every column touched by a chain.
    pub initial_fill: IndexMap<String, Value>,
    pub iterations: usize,
    pub visit: VisitOrder,
    pub tolerance: Option<f64>,
    pub diagnostics: bool,
}

impl ImputationPlan {
    /// Analyze `table` and validate `config` against it.
    pub fn build(table: &Table, config: &ImputerConfig) -> Result<Self> {
        config.validate()?;
        let mut schema = MissingnessAnalyzer::new().analyze(table);

        for (column, column_type) in &config.column_types {
            let data = table.column(column).ok_or_else(|| {
                ImputeError::Configuration(format!("type declared for unknown column '{}'", column))
            })?;
            let descriptor = schema.get_column_mut(column).ok_or_else(|| {
                ImputeError::Configuration(format!("unknown column '{}'", column))
            })?;
            MissingnessAnalyzer::override_type(descriptor, data, *column_type)?;
        }

        let bindings = bind_strategies(&schema, &config.strategy)?;
        check_option_targets(table, config)?;

        let targets: Vec<String> = bindings.keys().cloned().collect();
        let resolver = PredictorResolver::new(table.column_names());
        let predictors = resolver.resolve(&config.predictors, &targets)?;

        let mut columns = Vec::with_capacity(bindings.len());
        for (name, kind) in &bindings {
            let data = table.require(name)?;
            let mut descriptor = schema
                .get_column(name)
                .cloned()
                .ok_or_else(|| ImputeError::Table(format!("unknown column '{}'", name)))?;

            if !kind.accepts(descriptor.column_type) {
                return Err(ImputeError::StrategyMismatch {
                    column: name.clone(),
                    strategy: kind.name().to_string(),
                    column_type: descriptor.column_type,
                });
            }
            if descriptor.is_fully_missing() && *kind != StrategyKind::Constant {
                return Err(ImputeError::Configuration(format!(
                    "column '{}' has no observed values; only the constant strategy can fill it",
                    name
                )));
            }

            let options = options_for(table, config, name, *kind);
            let invalid = |e: strategy::StrategyError| {
                ImputeError::Configuration(format!("column '{}': {}", name, e))
            };
            let built = strategy::build(*kind, &descriptor, &options).map_err(invalid)?;
            built.validate(table).map_err(invalid)?;

            let column_predictors = predictors.get(name).cloned().unwrap_or_default();
            let encodings = if kind.resolve(descriptor.column_type).uses_predictors() {
                column_predictors
                    .iter()
                    .filter_map(|p| schema.get_column(p))
                    .map(Encoding::for_descriptor)
                    .collect()
            } else {
                Vec::new()
            };

            descriptor.strategy = Some(kind.name().to_string());
            descriptor.predictors = column_predictors;
            let target = build_target(&descriptor, data)?;

            columns.push(ColumnPlan {
                kind: *kind,
                strategy: Arc::from(built),
                encodings,
                observed_rows: data.observed_rows(),
                missing_rows: data.missing_rows(),
                target,
                descriptor,
            });
        }

        for plan in &columns {
            if let Some(d) = schema.get_column_mut(plan.name()) {
                d.strategy = plan.descriptor.strategy.clone();
                d.predictors = plan.descriptor.predictors.clone();
            }
        }

        let predictor_only = predictor_only_columns(&schema, &columns);
        let initial_fill = initial_fill(table, &schema, &columns, &predictor_only)?;

        let log_plan = |columns: &[ColumnPlan]| {
            columns
                .iter()
                .map(|c| format!("{}={}", c.name(), c.kind))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if config.verbose {
            info!(columns = %log_plan(&columns), "imputation plan ready");
        } else {
            debug!(columns = %log_plan(&columns), "imputation plan ready");
        }

        Ok(Self {
            schema,
            columns,
            predictors,
            predictor_only,
            initial_fill,
            iterations: config.iterations,
            visit: config.visit,
            tolerance: config.tolerance,
            diagnostics: config.diagnostics,
        })
    }

    /// True when no column needs imputing.
    pub fn is_noop(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnPlan> {
        self.columns.iter().find(|c| c.name() == name)
    }
}

/// Incomplete columns bound to a strategy, in default visit order.
fn bind_strategies(
    schema: &TableSchema,
    config: &StrategyConfig,
) -> Result<IndexMap<String, StrategyKind>> {
    let mut bindings = IndexMap::new();
    match config {
        StrategyConfig::All(kind) => {
            for name in &schema.visit_order {
                bindings.insert(name.clone(), *kind);
            }
        }
        StrategyConfig::PerColumn(map) => {
            if let Some(unknown) = map.keys().find(|k| schema.get_column(k).is_none()) {
                return Err(ImputeError::Configuration(format!(
                    "strategy given for unknown column '{}'",
                    unknown
                )));
            }
            // Complete columns are never imputed but their strategies must still fit their types
            for (name, kind) in map {
                if let Some(descriptor) = schema.get_column(name) {
                    if !kind.accepts(descriptor.column_type) {
                        return Err(ImputeError::StrategyMismatch {
                            column: name.clone(),
                            strategy: kind.name().to_string(),
                            column_type: descriptor.column_type,
                        });
                    }
                }
            }
            for name in &schema.visit_order {
                if let Some(kind) = map.get(name) {
                    bindings.insert(name.clone(), *kind);
                }
            }
        }
    }
    Ok(bindings)
}

/// Option keys must name a column or a strategy.
fn check_option_targets(table: &Table, config: &ImputerConfig) -> Result<()> {
    for key in config.options.keys() {
        if !table.has_column(key) && key.parse::<StrategyKind>().is_err() {
            return Err(ImputeError::Configuration(format!(
                "options given for '{}', which is neither a column nor a strategy",
                key
            )));
        }
    }
    Ok(())
}

/// Strategy-level options overridden by column-level options.
fn options_for(table: &Table, config: &ImputerConfig, column: &str, kind: StrategyKind) -> StrategyOptions {
    let by_strategy = config
        .options
        .iter()
        .find(|(k, _)| !table.has_column(k) && k.parse::<StrategyKind>().ok() == Some(kind))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    match config.options.get(column) {
        Some(column_options) => by_strategy.merged(column_options),
        None => by_strategy,
    }
}

fn build_target(descriptor: &ColumnDescriptor, data: &ColumnData) -> Result<Target> {
    let rows = data.observed_rows();
    match descriptor.column_type {
        ColumnType::Continuous => {
            let values: Array1<f64> = rows.iter().filter_map(|&r| data.get_f64(r)).collect();
            if values.len() != rows.len() {
                return Err(ImputeError::Table(format!(
                    "column '{}' is continuous but stores text",
                    descriptor.name
                )));
            }
            Ok(Target::Continuous(values))
        }
        ColumnType::Binary | ColumnType::Categorical => {
            let codes = rows
                .iter()
                .map(|&r| {
                    data.get(r)
                        .and_then(|v| descriptor.level_code(&v))
                        .ok_or_else(|| {
                            ImputeError::Table(format!(
                                "row {} of column '{}' is not a known level",
                                r, descriptor.name
                            ))
                        })
                })
                .collect::<Result<Vec<usize>>>()?;
            Ok(Target::Levels {
                codes,
                levels: descriptor.levels.clone(),
            })
        }
    }
}

fn predictor_only_columns(schema: &TableSchema, columns: &[ColumnPlan]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for plan in columns.iter().filter(|c| c.uses_predictors()) {
        for encoding in &plan.encodings {
            let name = encoding.column();
            let incomplete = schema.get_column(name).is_some_and(|d| !d.is_complete());
            let bound = columns.iter().any(|c| c.name() == name);
            if incomplete && !bound && !out.iter().any(|o| o == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

fn initial_fill(
    table: &Table,
    schema: &TableSchema,
    columns: &[ColumnPlan],
    predictor_only: &[String],
) -> Result<IndexMap<String, Value>> {
    let mut fill = IndexMap::new();

    let touched = columns
        .iter()
        .map(|c| (c.name().to_string(), Some(c)))
        .chain(predictor_only.iter().map(|n| (n.clone(), None)));

    for (name, plan) in touched {
        let descriptor = schema
            .get_column(&name)
            .ok_or_else(|| ImputeError::Table(format!("unknown column '{}'", name)))?;

        if let Some(plan) = plan {
            if plan.kind == StrategyKind::Constant {
                let value = constant_value(plan)?;
                fill.insert(name, value);
                continue;
            }
        }

        if descriptor.is_fully_missing() {
            return Err(ImputeError::Configuration(format!(
                "predictor column '{}' has no observed values",
                name
            )));
        }

        let data = table.require(&name)?;
        let value = match descriptor.column_type {
            ColumnType::Continuous => {
                let observed: Vec<f64> = data
                    .observed_rows()
                    .into_iter()
                    .filter_map(|r| data.get_f64(r))
                    .collect();
                Value::Number(descriptive::mean(&observed))
            }
            ColumnType::Binary | ColumnType::Categorical => {
                strategy::modes(&data.observed_values())
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ImputeError::Configuration(format!("column '{}' has no levels", name))
                    })?
            }
        };
        fill.insert(name, value);
    }
    Ok(fill)
}

fn constant_value(plan: &ColumnPlan) -> Result<Value> {
    plan.strategy.constant_value().cloned().ok_or_else(|| {
        ImputeError::Configuration(format!(
            "column '{}' is bound to constant without a fill value",
            plan.name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{PredictorSpec, PredictorsConfig};
    use crate::strategy::StrategyKind;

    fn table() -> Table {
        Table::from_columns(vec![
            (
                "x",
                ColumnData::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            ),
            (
                "y",
                ColumnData::from_f64(vec![1.5, f64::NAN, 3.5, f64::NAN, 5.5, 6.5, f64::NAN, 8.5]),
            ),
            (
                "g",
                ColumnData::from_text(vec![
                    Some("a"),
                    Some("b"),
                    None,
                    Some("a"),
                    Some("b"),
                    Some("a"),
                    Some("b"),
                    Some("a"),
                ]),
            ),
            ("empty", ColumnData::from_f64(vec![f64::NAN; 8])),
        ])
        .unwrap()
    }

    fn predictive() -> ImputerConfig {
        ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::DefaultPredictive)
            .with_column_strategy("g", StrategyKind::DefaultPredictive)
            .with_column_predictors("y", PredictorSpec::Columns(vec!["x".into(), "g".into()]))
            .with_column_predictors("g", PredictorSpec::Columns(vec!["x".into()]))
    }

    #[test]
    fn test_plan_follows_visit_order() {
        let plan = ImputationPlan::build(&table(), &predictive()).unwrap();
        let names: Vec<&str> = plan.columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["g", "y"]);
        assert_eq!(plan.schema.get_column("g").unwrap().strategy.as_deref(), Some("default predictive"));
        assert_eq!(plan.predictors["y"], vec!["x", "g"]);
        assert!(plan.predictor_only.is_empty());
        assert_eq!(plan.initial_fill["g"], Value::from("a"));
    }

    #[test]
    fn test_dummy_encoding_for_leveled_predictor() {
        let plan = ImputationPlan::build(&table(), &predictive()).unwrap();
        let y = plan.column("y").unwrap();
        let names: Vec<String> = y.encodings.iter().flat_map(|e| e.output_names()).collect();
        assert_eq!(names, vec!["x", "g[b]"]);
        assert_eq!(y.missing_rows, vec![1, 3, 6]);
    }

    #[test]
    fn test_univariate_strategy_has_no_encodings() {
        let config = ImputerConfig::new().with_column_strategy("y", StrategyKind::Median);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        assert!(!plan.column("y").unwrap().uses_predictors());
        assert!(plan.predictor_only.is_empty());
    }

    #[test]
    fn test_strategy_type_mismatch() {
        let config = ImputerConfig::new().with_column_strategy("g", StrategyKind::Mean);
        let err = ImputationPlan::build(&table(), &config).unwrap_err();
        assert!(matches!(err, ImputeError::StrategyMismatch { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_strategy_checked_on_complete_column() {
        let table = table();
        let mut complete = table.clone();
        complete.set(2, "g", Value::from("b")).unwrap();
        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::Mean)
            .with_column_strategy("g", StrategyKind::LeastSquares);
        let err = ImputationPlan::build(&complete, &config).unwrap_err();
        match err {
            ImputeError::StrategyMismatch { column, .. } => assert_eq!(column, "g"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_time_column_checked_before_any_chain() {
        let interpolate = |time_column: &str| {
            ImputerConfig::new()
                .with_column_strategy("y", StrategyKind::Interpolate)
                .with_options(
                    "y",
                    StrategyOptions::new()
                        .with("method", "time")
                        .with("time_column", time_column),
                )
        };

        let err = ImputationPlan::build(&table(), &interpolate("nope")).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {}", err);
        assert!(err.to_string().contains("nope"));

        let err = ImputationPlan::build(&table(), &interpolate("g")).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {}", err);

        let plan = ImputationPlan::build(&table(), &interpolate("x")).unwrap();
        assert_eq!(plan.columns.len(), 1);
    }

    #[test]
    fn test_fully_missing_column_needs_constant() {
        let config = ImputerConfig::new().with_column_strategy("empty", StrategyKind::Mean);
        assert!(ImputationPlan::build(&table(), &config).unwrap_err().is_configuration());

        let config = ImputerConfig::new()
            .with_column_strategy("empty", StrategyKind::Constant)
            .with_options("empty", StrategyOptions::new().with("fill_value", 0.0));
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        assert_eq!(plan.initial_fill["empty"], Value::Number(0.0));
    }

    #[test]
    fn test_all_strategy_rejects_fully_missing_column() {
        let config = ImputerConfig::new().with_strategy(StrategyKind::DefaultUnivariate);
        assert!(ImputationPlan::build(&table(), &config).is_err());
    }

    #[test]
    fn test_unknown_targets_rejected() {
        let config = ImputerConfig::new().with_column_strategy("height", StrategyKind::Mean);
        assert!(ImputationPlan::build(&table(), &config).unwrap_err().is_configuration());

        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::Mean)
            .with_options("nonsense", StrategyOptions::new());
        assert!(ImputationPlan::build(&table(), &config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_invalid_option_is_configuration_error() {
        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::Pmm)
            .with_options("y", StrategyOptions::new().with("neighbours", 3));
        assert!(ImputationPlan::build(&table(), &config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_column_options_override_strategy_options() {
        let config = ImputerConfig::new()
            .with_options("pmm", StrategyOptions::new().with("neighbors", 3))
            .with_options("y", StrategyOptions::new().with("neighbors", 7));
        let table = table();
        let y = options_for(&table, &config, "y", StrategyKind::Pmm);
        assert_eq!(y.positive_usize("pmm", "neighbors").unwrap(), Some(7));
        let x = options_for(&table, &config, "x", StrategyKind::Pmm);
        assert_eq!(x.positive_usize("pmm", "neighbors").unwrap(), Some(3));
        let g = options_for(&table, &config, "g", StrategyKind::Lrd);
        assert!(g.is_empty());
    }

    #[test]
    fn test_predictor_only_columns_get_initial_fill() {
        let config = ImputerConfig::new()
            .with_column_strategy("y", StrategyKind::LeastSquares)
            .with_predictors(PredictorsConfig::All(PredictorSpec::Columns(vec![
                "x".into(),
                "g".into(),
            ])));
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        assert_eq!(plan.predictor_only, vec!["g".to_string()]);
        assert!(plan.initial_fill.contains_key("g"));
    }

    #[test]
    fn test_type_override() {
        let config = ImputerConfig::new()
            .with_column_strategy("g", StrategyKind::Mode)
            .with_column_type("g", ColumnType::Categorical);
        let plan = ImputationPlan::build(&table(), &config).unwrap();
        assert_eq!(plan.column("g").unwrap().descriptor.column_type, ColumnType::Categorical);

        let config = ImputerConfig::new().with_column_type("g", ColumnType::Continuous);
        assert!(ImputationPlan::build(&table(), &config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_complete_table_is_noop() {
        let table = Table::from_columns(vec![("x", ColumnData::from_f64(vec![1.0, 2.0]))]).unwrap();
        let plan = ImputationPlan::build(&table, &ImputerConfig::new()).unwrap();
        assert!(plan.is_noop());
    }
}
