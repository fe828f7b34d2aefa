//! Regression strategies that condition on predictor columns.

use ndarray::{Array1, Array2};
use rand_distr::{Distribution, Normal};

use crate::models::design::{add_intercept, select_columns};
use crate::models::{LinearRegression, LogisticRegression, MultinomialLogit};
use crate::table::Value;

use super::{
    ChainRng, FittedStrategy, ImputationTask, Strategy, StrategyError, StrategyKind,
    StrategyOptions,
};

/// L2 penalty used by logistic strategies unless configured otherwise.
pub(crate) const DEFAULT_RIDGE: f64 = 1e-2;

pub(crate) fn ridge_option(strategy: &str, options: &StrategyOptions) -> Result<f64, StrategyError> {
    Ok(options
        .non_negative_f64(strategy, "ridge")?
        .unwrap_or(DEFAULT_RIDGE))
}

/// Predictor matrices for the observed and missing rows of a task.
///
/// Columns that are constant over the observed rows carry no information
/// for the fit and are dropped. No intercept column is included.
pub(crate) struct PreparedDesign {
    pub observed: Array2<f64>,
    pub missing: Array2<f64>,
}

impl PreparedDesign {
    pub fn new(task: &ImputationTask<'_>) -> Self {
        let columns = task.design.varying_columns(task.observed_rows);
        Self {
            observed: select_columns(&task.design.rows(task.observed_rows), &columns),
            missing: select_columns(&task.design.rows(task.missing_rows), &columns),
        }
    }
}

/// Level codes remapped onto the levels that actually occur.
pub(crate) struct PresentLevels {
    /// Original code of each present class.
    pub classes: Vec<usize>,
    /// Observed codes as indices into `classes`.
    pub codes: Vec<usize>,
}

impl PresentLevels {
    pub fn new(codes: &[usize]) -> Self {
        let mut classes = codes.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let codes = codes
            .iter()
            .map(|c| classes.partition_point(|k| k < c))
            .collect();
        Self { classes, codes }
    }
}

struct Fixed(Vec<Value>);

impl FittedStrategy for Fixed {
    fn predict(&self, _task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Least squares
// ============================================================================

/// OLS conditional mean.
#[derive(Debug, Clone, Copy)]
pub struct LeastSquares;

impl Strategy for LeastSquares {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastSquares
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        let y = task.continuous_target()?;
        let design = PreparedDesign::new(task);
        let fit = LinearRegression::fit_matrix(&add_intercept(&design.observed), y)?;
        let predictions = add_intercept(&design.missing).dot(&fit.beta);
        Ok(Box::new(Fixed(predictions.iter().map(|&v| Value::Number(v)).collect())))
    }
}

/// OLS conditional mean plus normal residual noise.
#[derive(Debug, Clone, Copy)]
pub struct Stochastic;

struct FittedStochastic {
    predictions: Array1<f64>,
    noise: Normal<f64>,
}

impl Strategy for Stochastic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Stochastic
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        let y = task.continuous_target()?;
        let design = PreparedDesign::new(task);
        let fit = LinearRegression::fit_matrix(&add_intercept(&design.observed), y)?;
        let noise = Normal::new(0.0, fit.sigma2.sqrt())
            .map_err(|e| StrategyError::Degenerate(format!("residual spread: {}", e)))?;
        Ok(Box::new(FittedStochastic {
            predictions: add_intercept(&design.missing).dot(&fit.beta),
            noise,
        }))
    }
}

impl FittedStrategy for FittedStochastic {
    fn predict(&self, _task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(self
            .predictions
            .iter()
            .map(|&mu| Value::Number(mu + self.noise.sample(rng)))
            .collect())
    }
}

// ============================================================================
// Logistic
// ============================================================================

/// Most probable class of a penalized logistic regression.
#[derive(Debug, Clone)]
pub struct BinaryLogistic {
    ridge: f64,
}

impl BinaryLogistic {
    pub fn from_options(strategy: &str, options: &StrategyOptions) -> Result<Self, StrategyError> {
        Ok(Self {
            ridge: ridge_option(strategy, options)?,
        })
    }
}

/// Fit a binary logistic model on the task, or return the only observed level.
pub(crate) fn fit_binary(
    task: &ImputationTask<'_>,
    ridge: f64,
) -> Result<BinaryFit, StrategyError> {
    task.require_observed(1)?;
    let (codes, levels) = task.level_target()?;
    let present = PresentLevels::new(codes);
    if present.classes.len() < 2 {
        return Ok(BinaryFit::Single(levels[present.classes[0]].clone()));
    }
    if present.classes.len() > 2 {
        return Err(StrategyError::Degenerate(format!(
            "column '{}' has {} levels, binary logistic needs 2",
            task.column,
            present.classes.len()
        )));
    }

    let design = PreparedDesign::new(task);
    let x_obs = add_intercept(&design.observed);
    let y: Array1<f64> = present.codes.iter().map(|&c| c as f64).collect();
    let model = LogisticRegression::new().with_ridge(ridge);
    let (beta, covariance) = model.fit_matrix(&x_obs, &y)?;

    Ok(BinaryFit::Model {
        beta,
        covariance,
        x_missing: add_intercept(&design.missing),
        negative: levels[present.classes[0]].clone(),
        positive: levels[present.classes[1]].clone(),
    })
}

pub(crate) enum BinaryFit {
    Single(Value),
    Model {
        beta: Array1<f64>,
        covariance: Array2<f64>,
        x_missing: Array2<f64>,
        negative: Value,
        positive: Value,
    },
}

impl Strategy for BinaryLogistic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BinaryLogistic
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        let n_missing = task.missing_rows.len();
        let values = match fit_binary(task, self.ridge)? {
            BinaryFit::Single(level) => vec![level; n_missing],
            BinaryFit::Model {
                beta,
                x_missing,
                negative,
                positive,
                ..
            } => x_missing
                .dot(&beta)
                .iter()
                .map(|&eta| if eta > 0.0 { positive.clone() } else { negative.clone() })
                .collect(),
        };
        Ok(Box::new(Fixed(values)))
    }
}

/// Most probable class of a penalized multinomial logistic regression.
#[derive(Debug, Clone)]
pub struct MultinomialLogistic {
    ridge: f64,
}

impl MultinomialLogistic {
    pub fn from_options(strategy: &str, options: &StrategyOptions) -> Result<Self, StrategyError> {
        Ok(Self {
            ridge: ridge_option(strategy, options)?,
        })
    }
}

impl Strategy for MultinomialLogistic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MultinomialLogistic
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let (codes, levels) = task.level_target()?;
        let present = PresentLevels::new(codes);
        if present.classes.len() < 2 {
            let level = levels[present.classes[0]].clone();
            return Ok(Box::new(Fixed(vec![level; task.missing_rows.len()])));
        }

        let design = PreparedDesign::new(task);
        let fit = MultinomialLogit::new().with_ridge(self.ridge).fit(
            &design.observed,
            &present.codes,
            present.classes.len(),
        )?;
        let values = fit
            .predict_class(&design.missing)?
            .into_iter()
            .map(|c| levels[present.classes[c]].clone())
            .collect();
        Ok(Box::new(Fixed(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Design, Encoding};
    use crate::schema::ColumnType;
    use crate::strategy::{fit_predict, Target};
    use crate::table::{ColumnData, Table};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn table() -> Table {
        Table::from_columns(vec![
            ("x", ColumnData::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 2.5, 5.5])),
            ("k", ColumnData::from_f64(vec![7.0; 8])),
        ])
        .unwrap()
    }

    fn design(table: &Table) -> Design {
        Design::encode(
            table,
            &[
                Encoding::Numeric { column: "x".into() },
                Encoding::Numeric { column: "k".into() },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_present_levels() {
        let present = PresentLevels::new(&[2, 0, 2, 2]);
        assert_eq!(present.classes, vec![0, 2]);
        assert_eq!(present.codes, vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_least_squares_drops_constant_predictor() {
        let table = table();
        let design = design(&table);
        let observed: Vec<usize> = (0..6).collect();
        let missing = vec![6, 7];
        // y = 2x + 1; the constant column k would make X'X singular
        let target = Target::Continuous(ndarray::array![3.0, 5.0, 7.0, 9.0, 11.0, 13.0]);
        let task = ImputationTask {
            column: "y",
            column_type: ColumnType::Continuous,
            target,
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(3);
        let out = fit_predict(&LeastSquares, &task, &mut rng).unwrap();
        assert_abs_diff_eq!(out[0].as_f64().unwrap(), 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[1].as_f64().unwrap(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_binary_logistic_follows_predictor() {
        let table = table();
        let design = design(&table);
        let observed: Vec<usize> = (0..6).collect();
        let missing = vec![6, 7];
        let levels = vec![Value::from("lo"), Value::from("hi")];
        let target = Target::Levels {
            codes: vec![0, 0, 1, 0, 1, 1],
            levels,
        };
        let task = ImputationTask {
            column: "g",
            column_type: ColumnType::Binary,
            target,
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(3);
        let strategy = BinaryLogistic { ridge: DEFAULT_RIDGE };
        let out = fit_predict(&strategy, &task, &mut rng).unwrap();
        assert_eq!(out, vec![Value::from("lo"), Value::from("hi")]);
    }

    #[test]
    fn test_single_observed_class() {
        let table = table();
        let design = design(&table);
        let observed: Vec<usize> = (0..6).collect();
        let missing = vec![6, 7];
        let target = Target::Levels {
            codes: vec![1; 6],
            levels: vec![Value::from("a"), Value::from("b"), Value::from("c")],
        };
        let task = ImputationTask {
            column: "g",
            column_type: ColumnType::Categorical,
            target,
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(3);
        let strategy = MultinomialLogistic { ridge: DEFAULT_RIDGE };
        let out = fit_predict(&strategy, &task, &mut rng).unwrap();
        assert_eq!(out, vec![Value::from("b"); 2]);
    }

    #[test]
    fn test_too_few_rows_is_insufficient_data() {
        let table = table();
        let design = design(&table);
        let observed = vec![0];
        let missing: Vec<usize> = (1..8).collect();
        let task = ImputationTask {
            column: "y",
            column_type: ColumnType::Continuous,
            target: Target::Continuous(ndarray::array![1.0]),
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(3);
        let result = fit_predict(&Stochastic, &task, &mut rng);
        assert!(matches!(result, Err(StrategyError::InsufficientData { .. })));
    }
}
