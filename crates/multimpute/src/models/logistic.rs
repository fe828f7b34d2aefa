//! Binary logistic regression fit by iteratively reweighted least squares.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::stats::linalg;

use super::design::{add_intercept, linear_predictor};
use super::{check_predict_width, check_rows, param_names, Design, FittedModel, ModelError, StatModel};

/// Probabilities are clamped away from 0 and 1 to keep weights positive.
const PROB_EPS: f64 = 1e-10;

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic regression with an optional L2 penalty on the slopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub fit_intercept: bool,
    pub max_iter: usize,
    pub tolerance: f64,
    /// L2 penalty; the intercept is never penalized.
    pub ridge: f64,
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            max_iter: 100,
            tolerance: 1e-8,
            ridge: 0.0,
        }
    }

    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    fn penalty_mask(&self, p: usize) -> Array1<f64> {
        let mut mask = Array1::from_elem(p, self.ridge);
        if self.fit_intercept && p > 0 {
            mask[0] = 0.0;
        }
        mask
    }

    fn objective(x: &Array2<f64>, y: &Array1<f64>, beta: &Array1<f64>, penalty: &Array1<f64>) -> f64 {
        let eta = x.dot(beta);
        let loglik: f64 = eta
            .iter()
            .zip(y.iter())
            .map(|(&e, &t)| {
                let p = sigmoid(e).clamp(PROB_EPS, 1.0 - PROB_EPS);
                t * p.ln() + (1.0 - t) * (1.0 - p).ln()
            })
            .sum();
        let pen: f64 = beta.iter().zip(penalty.iter()).map(|(b, l)| l * b * b).sum();
        loglik - 0.5 * pen
    }

    /// Newton-Raphson on the penalized log-likelihood with step halving.
    ///
    /// Returns the coefficients and the inverse penalized information matrix.
    pub(crate) fn fit_matrix(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>), ModelError> {
        let n = x.nrows();
        let p = x.ncols();
        if n <= p && self.ridge == 0.0 {
            return Err(ModelError::InsufficientData {
                available: n,
                required: p,
            });
        }

        let penalty = self.penalty_mask(p);
        let mut beta = Array1::zeros(p);
        let mut current = Self::objective(x, y, &beta, &penalty);

        for _ in 0..self.max_iter {
            let (gradient, information) = Self::score(x, y, &beta, &penalty);
            let l = linalg::cholesky(&information).ok_or(ModelError::Singular)?;
            let step = linalg::cholesky_solve(&l, &gradient);
            if step.iter().any(|s| !s.is_finite()) {
                return Err(ModelError::NoConvergence {
                    iterations: self.max_iter,
                });
            }

            let mut scale = 1.0;
            let mut candidate = &beta + &step;
            let mut value = Self::objective(x, y, &candidate, &penalty);
            while value < current && scale > 1e-6 {
                scale *= 0.5;
                candidate = &beta + &(&step * scale);
                value = Self::objective(x, y, &candidate, &penalty);
            }

            let change = step.iter().fold(0.0_f64, |acc, s| acc.max((s * scale).abs()));
            beta = candidate;
            current = value;

            if change < self.tolerance {
                let (_, information) = Self::score(x, y, &beta, &penalty);
                let covariance = linalg::spd_inverse(&information).ok_or(ModelError::Singular)?;
                return Ok((beta, covariance));
            }
        }

        Err(ModelError::NoConvergence {
            iterations: self.max_iter,
        })
    }

    /// Gradient and negative Hessian of the penalized log-likelihood.
    fn score(
        x: &Array2<f64>,
        y: &Array1<f64>,
        beta: &Array1<f64>,
        penalty: &Array1<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let probs = x.dot(beta).mapv(|e| sigmoid(e).clamp(PROB_EPS, 1.0 - PROB_EPS));
        let weights = probs.mapv(|p| p * (1.0 - p));
        let gradient = x.t().dot(&(y - &probs)) - &(penalty * beta);

        let mut weighted = x.clone();
        for (mut row, w) in weighted.rows_mut().into_iter().zip(weights.iter()) {
            row *= *w;
        }
        let mut information = x.t().dot(&weighted);
        for (j, l) in penalty.iter().enumerate() {
            information[[j, j]] += l;
        }
        (gradient, information)
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`LogisticRegression::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedLogisticRegression {
    names: Vec<String>,
    params: Array1<f64>,
    covariance: Array2<f64>,
    fit_intercept: bool,
}

impl FittedLogisticRegression {
    /// Predicted probabilities of the positive class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let width = self.params.len() - usize::from(self.fit_intercept);
        check_predict_width(x, width)?;
        Ok(linear_predictor(x, &self.params, self.fit_intercept).mapv(sigmoid))
    }
}

impl StatModel for LogisticRegression {
    type Fitted = FittedLogisticRegression;

    fn fit(&self, design: &Design, target: &Array1<f64>) -> Result<Self::Fitted, ModelError> {
        check_rows(design, target)?;
        if target.iter().any(|&t| t != 0.0 && t != 1.0) {
            return Err(ModelError::Shape(
                "logistic target must be coded 0/1".to_string(),
            ));
        }
        let x = if self.fit_intercept {
            add_intercept(&design.matrix)
        } else {
            design.matrix.clone()
        };
        let (params, covariance) = self.fit_matrix(&x, target)?;
        Ok(FittedLogisticRegression {
            names: param_names(design, self.fit_intercept),
            params,
            covariance,
            fit_intercept: self.fit_intercept,
        })
    }
}

impl FittedModel for FittedLogisticRegression {
    fn param_names(&self) -> &[String] {
        &self.names
    }

    fn params(&self) -> &Array1<f64> {
        &self.params
    }

    fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    fn residual_df(&self) -> Option<f64> {
        None
    }

    /// Predicted probabilities.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.predict_proba(x)
    }
}
