//! Regression models fit across multiply imputed datasets and pooled.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{Imputation, ImputationOutput, ImputerConfig, MultipleImputer};
use crate::error::{ImputeError, Result};
use crate::models::{
    Design, Encoding, FittedLinearRegression, FittedLogisticRegression, FittedModel,
    LinearRegression, LogisticRegression, StatModel,
};
use crate::patterns::MissingnessAnalyzer;
use crate::schema::{ColumnType, TableSchema};
use crate::table::Table;

use super::pooling::{PooledReport, Pooler};

/// Pooled fit of one model over every imputed dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiFitResult<M> {
    pub report: PooledReport,
    /// One fitted model per imputation, in imputation order.
    pub models: Vec<M>,
    pub response: String,
    /// Predictor encodings shared by every fit.
    pub encodings: Vec<Encoding>,
}

impl<M: FittedModel> MiFitResult<M> {
    /// Average of the per-dataset predictions for the rows of `table`.
    ///
    /// Logistic models average probabilities.
    pub fn predict(&self, table: &Table) -> Result<Array1<f64>> {
        let design = Design::encode(table, &self.encodings)?;
        let mut total = Array1::<f64>::zeros(table.n_rows());
        for model in &self.models {
            total += &model.predict(&design.matrix)?;
        }
        Ok(total / self.models.len().max(1) as f64)
    }
}

/// Ordinary least squares fit on each imputed dataset, pooled with Rubin's rules.
#[derive(Debug, Clone, Default)]
pub struct MiLinearRegression {
    imputer: MultipleImputer,
    model: LinearRegression,
    pooler: Pooler,
}

impl MiLinearRegression {
    pub fn new(config: ImputerConfig) -> Self {
        Self {
            imputer: MultipleImputer::new(config),
            model: LinearRegression::new(),
            pooler: Pooler::new(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.pooler = self.pooler.with_alpha(alpha);
        self
    }

    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.model = self.model.with_intercept(fit_intercept);
        self
    }

    /// Impute `table`, regress `response` on `predictors` in each completed
    /// table and pool the estimates.
    pub fn fit(
        &self,
        table: &Table,
        response: &str,
        predictors: &[&str],
    ) -> Result<MiFitResult<FittedLinearRegression>> {
        let schema = MissingnessAnalyzer::new().analyze(table);
        let descriptor = response_descriptor(&schema, response)?;
        if !descriptor.numeric {
            return Err(ImputeError::Configuration(format!(
                "response '{}' must be numeric for linear regression",
                response
            )));
        }
        let encodings = predictor_encodings(&schema, response, predictors)?;

        let models = fit_each(&self.imputer, table, |completed| {
            let design = Design::encode(completed, &encodings)?;
            let target = numeric_target(completed, response)?;
            Ok(self.model.fit(&design, &target)?)
        })?;

        let report = self.pooler.pool(&models)?;
        Ok(MiFitResult {
            report,
            models,
            response: response.to_string(),
            encodings,
        })
    }
}

/// Logistic regression fit on each imputed dataset, pooled with Rubin's rules.
///
/// The response must be binary; its second level is the positive class.
#[derive(Debug, Clone, Default)]
pub struct MiLogisticRegression {
    imputer: MultipleImputer,
    model: LogisticRegression,
    pooler: Pooler,
}

impl MiLogisticRegression {
    pub fn new(config: ImputerConfig) -> Self {
        Self {
            imputer: MultipleImputer::new(config),
            model: LogisticRegression::new(),
            pooler: Pooler::new(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.pooler = self.pooler.with_alpha(alpha);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.model = self.model.with_max_iter(max_iter);
        self
    }

    pub fn fit(
        &self,
        table: &Table,
        response: &str,
        predictors: &[&str],
    ) -> Result<MiFitResult<FittedLogisticRegression>> {
        let schema = MissingnessAnalyzer::new().analyze(table);
        let descriptor = response_descriptor(&schema, response)?.clone();
        if descriptor.column_type != ColumnType::Binary {
            return Err(ImputeError::Configuration(format!(
                "response '{}' must be binary for logistic regression, found {}",
                response, descriptor.column_type
            )));
        }
        let encodings = predictor_encodings(&schema, response, predictors)?;

        let models = fit_each(&self.imputer, table, |completed| {
            let design = Design::encode(completed, &encodings)?;
            let column = completed.require(response)?;
            let target = (0..completed.n_rows())
                .map(|row| {
                    column
                        .get(row)
                        .and_then(|v| descriptor.level_code(&v))
                        .map(|code| code as f64)
                        .ok_or_else(|| {
                            ImputeError::Model(format!(
                                "response '{}' has no known level at row {}",
                                response, row
                            ))
                        })
                })
                .collect::<Result<Array1<f64>>>()?;
            Ok(self.model.fit(&design, &target)?)
        })?;

        let report = self.pooler.pool(&models)?;
        Ok(MiFitResult {
            report,
            models,
            response: response.to_string(),
            encodings,
        })
    }
}

fn response_descriptor<'s>(
    schema: &'s TableSchema,
    response: &str,
) -> Result<&'s crate::schema::ColumnDescriptor> {
    schema.get_column(response).ok_or_else(|| {
        ImputeError::Configuration(format!("unknown response column '{}'", response))
    })
}

fn predictor_encodings(
    schema: &TableSchema,
    response: &str,
    predictors: &[&str],
) -> Result<Vec<Encoding>> {
    if predictors.contains(&response) {
        return Err(ImputeError::Configuration(format!(
            "response '{}' cannot also be a predictor",
            response
        )));
    }
    predictors
        .iter()
        .map(|name| {
            schema
                .get_column(name)
                .map(Encoding::for_descriptor)
                .ok_or_else(|| {
                    ImputeError::Configuration(format!("unknown predictor column '{}'", name))
                })
        })
        .collect()
}

fn numeric_target(table: &Table, response: &str) -> Result<Array1<f64>> {
    let column = table.require(response)?;
    (0..table.n_rows())
        .map(|row| {
            column.get_f64(row).ok_or_else(|| {
                ImputeError::Model(format!(
                    "response '{}' is missing at row {}",
                    response, row
                ))
            })
        })
        .collect()
}

/// Fit one model per imputed table, consuming lazy output chain by chain.
fn fit_each<M>(
    imputer: &MultipleImputer,
    table: &Table,
    mut fit: impl FnMut(&Table) -> Result<M>,
) -> Result<Vec<M>> {
    let mut fit_one = |imputation: &Imputation| {
        debug!(imputation = imputation.index, "fitting analysis model");
        fit(&imputation.table)
    };
    match imputer.impute(table)? {
        ImputationOutput::Eager(set) => set.iter().map(&mut fit_one).collect(),
        ImputationOutput::Lazy(lazy) => lazy
            .iter()
            .map(|imputation| imputation.and_then(|i| fit_one(&i)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyKind;
    use crate::table::ColumnData;

    fn table() -> Table {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i % 7 == 3 {
                    f64::NAN
                } else {
                    1.0 + 2.0 * v + if i % 2 == 0 { 0.5 } else { -0.5 }
                }
            })
            .collect();
        let g: Vec<Option<&str>> = (0..30)
            .map(|i| match i {
                5 | 17 => None,
                _ if (i * 7) % 10 < 5 => Some("no"),
                _ => Some("yes"),
            })
            .collect();
        Table::from_columns(vec![
            ("x", ColumnData::from_f64(x)),
            ("y", ColumnData::from_f64(y)),
            ("g", ColumnData::from_text(g)),
        ])
        .unwrap()
    }

    fn config() -> ImputerConfig {
        ImputerConfig::new()
            .with_n(3)
            .with_strategy(StrategyKind::DefaultPredictive)
            .with_seed(11)
    }

    #[test]
    fn test_linear_fit_pools_each_dataset() {
        let result = MiLinearRegression::new(config())
            .fit(&table(), "y", &["x"])
            .unwrap();
        assert_eq!(result.models.len(), 3);
        assert_eq!(result.report.n, 3);
        let slope = result.report.get("x").unwrap();
        assert!((slope.estimate - 2.0).abs() < 0.1);

        let predictions = result.predict(&table()).unwrap();
        assert_eq!(predictions.len(), 30);
    }

    #[test]
    fn test_logistic_fit_uses_binary_response() {
        let result = MiLogisticRegression::new(config())
            .fit(&table(), "g", &["x"])
            .unwrap();
        assert_eq!(result.report.param_names(), vec!["const", "x"]);
        let probabilities = result.predict(&table()).unwrap();
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_response_checks() {
        let model = MiLinearRegression::new(config());
        assert!(model.fit(&table(), "y", &["y"]).unwrap_err().is_configuration());
        assert!(model.fit(&table(), "g", &["x"]).unwrap_err().is_configuration());
        assert!(model.fit(&table(), "y", &["z"]).unwrap_err().is_configuration());
    }
}
