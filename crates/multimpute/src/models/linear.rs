//! Ordinary least squares.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::stats::linalg;

use super::design::{add_intercept, linear_predictor};
use super::{check_predict_width, check_rows, param_names, Design, FittedModel, ModelError, StatModel};

/// OLS regression solved through the Cholesky factor of `X'X`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self { fit_intercept: true }
    }

    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fit on a raw matrix (intercept column already added if wanted).
    pub(crate) fn fit_matrix(
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<LeastSquaresFit, ModelError> {
        let n = x.nrows();
        let p = x.ncols();
        if n <= p {
            return Err(ModelError::InsufficientData {
                available: n,
                required: p,
            });
        }

        let xtx = x.t().dot(x);
        let xty = x.t().dot(y);
        let l = linalg::cholesky(&xtx).ok_or(ModelError::Singular)?;
        let beta = linalg::cholesky_solve(&l, &xty);
        let xtx_inv = linalg::spd_inverse(&xtx).ok_or(ModelError::Singular)?;

        let fitted = x.dot(&beta);
        let residuals = y - &fitted;
        let ssr = residuals.dot(&residuals);
        let df = (n - p) as f64;

        Ok(LeastSquaresFit {
            beta,
            xtx_inv,
            fitted,
            residuals,
            ssr,
            sigma2: ssr / df,
            df,
        })
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw pieces of a least squares fit shared with the imputation strategies.
#[derive(Debug, Clone)]
pub(crate) struct LeastSquaresFit {
    pub beta: Array1<f64>,
    pub xtx_inv: Array2<f64>,
    pub fitted: Array1<f64>,
    pub residuals: Array1<f64>,
    pub ssr: f64,
    pub sigma2: f64,
    pub df: f64,
}

/// Result of [`LinearRegression::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedLinearRegression {
    names: Vec<String>,
    params: Array1<f64>,
    covariance: Array2<f64>,
    sigma2: f64,
    df: f64,
    r_squared: f64,
    fit_intercept: bool,
}

impl FittedLinearRegression {
    /// Residual variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }
}

impl StatModel for LinearRegression {
    type Fitted = FittedLinearRegression;

    fn fit(&self, design: &Design, target: &Array1<f64>) -> Result<Self::Fitted, ModelError> {
        check_rows(design, target)?;
        let x = if self.fit_intercept {
            add_intercept(&design.matrix)
        } else {
            design.matrix.clone()
        };
        let fit = Self::fit_matrix(&x, target)?;

        let mean = target.mean().unwrap_or(0.0);
        let sst: f64 = target.iter().map(|v| (v - mean).powi(2)).sum();
        let r_squared = if sst > 0.0 { 1.0 - fit.ssr / sst } else { 0.0 };

        Ok(FittedLinearRegression {
            names: param_names(design, self.fit_intercept),
            covariance: &fit.xtx_inv * fit.sigma2,
            params: fit.beta,
            sigma2: fit.sigma2,
            df: fit.df,
            r_squared,
            fit_intercept: self.fit_intercept,
        })
    }
}

impl FittedModel for FittedLinearRegression {
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
        Some(self.df)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let width = self.params.len() - usize::from(self.fit_intercept);
        check_predict_width(x, width)?;
        Ok(linear_predictor(x, &self.params, self.fit_intercept))
    }
}
