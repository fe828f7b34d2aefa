//! Strategies that impute from approximate posterior predictive draws.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{ChiSquared, Distribution, StandardNormal};

use crate::models::design::add_intercept;
use crate::models::{sigmoid, LeastSquaresFit, LinearRegression};
use crate::stats::linalg;
use crate::table::Value;

use super::regression::{fit_binary, ridge_option, BinaryFit, PreparedDesign};
use super::{
    ChainRng, FittedStrategy, ImputationTask, Strategy, StrategyError, StrategyKind,
    StrategyOptions,
};

/// Draw from `N(mean, cov)`. A zero covariance returns the mean.
pub(crate) fn mvn_draw(
    mean: &Array1<f64>,
    cov: &Array2<f64>,
    rng: &mut ChainRng,
) -> Result<Array1<f64>, StrategyError> {
    if cov.iter().all(|&v| v == 0.0) {
        return Ok(mean.clone());
    }
    let l = linalg::cholesky(cov).ok_or(StrategyError::SingularMatrix)?;
    let z: Array1<f64> = (0..mean.len())
        .map(|_| {
            let v: f64 = StandardNormal.sample(rng);
            v
        })
        .collect();
    Ok(mean + &l.dot(&z))
}

/// One draw of `(β, σ²)` from the noninformative-prior posterior of an OLS fit.
///
/// `σ²* = SSR / χ²(n - p)` and `β* ~ N(β̂, σ²* (X'X)⁻¹)`.
pub(crate) fn draw_ols_posterior(
    fit: &LeastSquaresFit,
    rng: &mut ChainRng,
) -> Result<(Array1<f64>, f64), StrategyError> {
    let chi = ChiSquared::new(fit.df)
        .map_err(|e| StrategyError::Degenerate(format!("chi-squared({}): {}", fit.df, e)))?;
    let g: f64 = chi.sample(rng);
    let sigma2 = if g > 0.0 { fit.ssr / g } else { fit.sigma2 };
    let beta = mvn_draw(&fit.beta, &(&fit.xtx_inv * sigma2), rng)?;
    Ok((beta, sigma2))
}

// ============================================================================
// Bayesian least squares
// ============================================================================

/// Posterior predictive draws from a normal linear model.
#[derive(Debug, Clone, Copy)]
pub struct BayesianLeastSquares;

struct FittedBayesianLeastSquares {
    means: Array1<f64>,
    sigma: f64,
}

impl Strategy for BayesianLeastSquares {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BayesianLeastSquares
    }

    fn fit(&self, task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        let y = task.continuous_target()?;
        let design = PreparedDesign::new(task);
        let fit = LinearRegression::fit_matrix(&add_intercept(&design.observed), y)?;
        let (beta, sigma2) = draw_ols_posterior(&fit, rng)?;
        Ok(Box::new(FittedBayesianLeastSquares {
            means: add_intercept(&design.missing).dot(&beta),
            sigma: sigma2.sqrt(),
        }))
    }
}

impl FittedStrategy for FittedBayesianLeastSquares {
    fn predict(&self, _task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(self
            .means
            .iter()
            .map(|&mu| {
                let z: f64 = StandardNormal.sample(rng);
                Value::Number(mu + self.sigma * z)
            })
            .collect())
    }
}

// ============================================================================
// Bayesian binary logistic
// ============================================================================

/// Bernoulli draws under a Laplace-approximate posterior draw of the coefficients.
#[derive(Debug, Clone)]
pub struct BayesianBinaryLogistic {
    ridge: f64,
}

impl BayesianBinaryLogistic {
    pub fn from_options(strategy: &str, options: &StrategyOptions) -> Result<Self, StrategyError> {
        Ok(Self {
            ridge: ridge_option(strategy, options)?,
        })
    }
}

struct FittedBayesianLogistic {
    probabilities: Array1<f64>,
    negative: Value,
    positive: Value,
}

impl Strategy for BayesianBinaryLogistic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BayesianBinaryLogistic
    }

    fn fit(&self, task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        match fit_binary(task, self.ridge)? {
            BinaryFit::Single(level) => Ok(Box::new(FittedBayesianLogistic {
                probabilities: Array1::ones(task.missing_rows.len()),
                negative: level.clone(),
                positive: level,
            })),
            BinaryFit::Model {
                beta,
                covariance,
                x_missing,
                negative,
                positive,
            } => {
                let draw = mvn_draw(&beta, &covariance, rng)?;
                let probabilities = x_missing.dot(&draw).mapv(sigmoid);
                Ok(Box::new(FittedBayesianLogistic {
                    probabilities,
                    negative,
                    positive,
                }))
            }
        }
    }
}

impl FittedStrategy for FittedBayesianLogistic {
    fn predict(&self, _task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(self
            .probabilities
            .iter()
            .map(|&p| {
                if rng.r#gen::<f64>() < p {
                    self.positive.clone()
                } else {
                    self.negative.clone()
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Design, Encoding};
    use crate::schema::ColumnType;
    use crate::strategy::{fit_predict, Target};
    use crate::table::{ColumnData, Table};
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_mvn_draw_zero_covariance() {
        let mut rng = ChainRng::seed_from_u64(1);
        let mean = array![1.0, 2.0];
        let draw = mvn_draw(&mean, &Array2::zeros((2, 2)), &mut rng).unwrap();
        assert_eq!(draw, mean);
    }

    #[test]
    fn test_mvn_draw_moments() {
        let mut rng = ChainRng::seed_from_u64(11);
        let mean = array![0.0];
        let cov = array![[4.0]];
        let draws: Vec<f64> = (0..4000)
            .map(|_| mvn_draw(&mean, &cov, &mut rng).unwrap()[0])
            .collect();
        let m = crate::stats::descriptive::mean(&draws);
        let v = crate::stats::descriptive::variance(&draws, 1);
        assert!(m.abs() < 0.15);
        assert!((v - 4.0).abs() < 0.4);
    }

    fn fixture() -> (Table, Design) {
        let x: Vec<f64> = (0..30).map(|i| i as f64 / 3.0).collect();
        let table = Table::from_columns(vec![("x", ColumnData::from_f64(x))]).unwrap();
        let design = Design::encode(&table, &[Encoding::Numeric { column: "x".into() }]).unwrap();
        (table, design)
    }

    #[test]
    fn test_bayesian_least_squares_near_line() {
        let (table, design) = fixture();
        let observed: Vec<usize> = (0..25).collect();
        let missing: Vec<usize> = (25..30).collect();
        let y: Array1<f64> = observed
            .iter()
            .map(|&i| 2.0 * (i as f64 / 3.0) + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let task = ImputationTask {
            column: "y",
            column_type: ColumnType::Continuous,
            target: Target::Continuous(y),
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(5);
        let out = fit_predict(&BayesianLeastSquares, &task, &mut rng).unwrap();
        for (value, &row) in out.iter().zip(&missing) {
            let expected = 2.0 * (row as f64 / 3.0);
            assert!((value.as_f64().unwrap() - expected).abs() < 2.0);
        }
    }

    #[test]
    fn test_bayesian_logistic_emits_levels() {
        let (table, design) = fixture();
        let observed: Vec<usize> = (0..24).collect();
        let missing: Vec<usize> = (24..30).collect();
        let codes: Vec<usize> = observed.iter().map(|&i| usize::from(i % 3 != 0 && i > 8)).collect();
        let levels = vec![Value::Number(0.0), Value::Number(1.0)];
        let task = ImputationTask {
            column: "b",
            column_type: ColumnType::Binary,
            target: Target::Levels {
                codes,
                levels: levels.clone(),
            },
            observed_rows: &observed,
            missing_rows: &missing,
            design: &design,
            table: &table,
        };
        let mut rng = ChainRng::seed_from_u64(9);
        let strategy = BayesianBinaryLogistic { ridge: 0.01 };
        let out = fit_predict(&strategy, &task, &mut rng).unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|v| levels.contains(v)));
    }
}
