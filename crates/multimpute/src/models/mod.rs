//! Statistical models used by imputation strategies and downstream analysis.
//!
//! [`StatModel`] fits on a [`Design`] (predictors without intercept) and a
//! numeric target; the resulting [`FittedModel`] exposes everything Rubin's
//! rules need: parameter names, estimates and their covariance.

pub mod design;
mod linear;
mod logistic;
mod multinomial;

pub use design::{Design, Encoding};
pub use linear::{FittedLinearRegression, LinearRegression};
pub use logistic::{FittedLogisticRegression, LogisticRegression};
pub use multinomial::{FittedMultinomialLogit, MultinomialLogit};

pub(crate) use linear::LeastSquaresFit;
pub(crate) use logistic::sigmoid;

use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::error::ImputeError;

/// Name used for the intercept parameter.
pub const INTERCEPT: &str = "const";

/// Errors raised while fitting or applying a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("need more than {required} rows to fit, got {available}")]
    InsufficientData { available: usize, required: usize },

    #[error("normal equations are singular")]
    Singular,

    #[error("no convergence after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("shape mismatch: {0}")]
    Shape(String),
}

impl From<ModelError> for ImputeError {
    fn from(err: ModelError) -> Self {
        ImputeError::Model(err.to_string())
    }
}

/// A model that can be fit to a design matrix and a target.
pub trait StatModel {
    type Fitted: FittedModel;

    fn fit(&self, design: &Design, target: &Array1<f64>) -> Result<Self::Fitted, ModelError>;
}

/// A fitted model exposing its estimates for pooling.
pub trait FittedModel {
    /// Parameter names, intercept first when present.
    fn param_names(&self) -> &[String];

    /// Point estimates in [`FittedModel::param_names`] order.
    fn params(&self) -> &Array1<f64>;

    /// Estimated covariance of the parameters.
    fn covariance(&self) -> &Array2<f64>;

    /// Complete-data residual degrees of freedom, if the model has one.
    fn residual_df(&self) -> Option<f64>;

    /// Predictions for a design matrix laid out like the fitting design.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Standard errors from the covariance diagonal.
    fn std_errors(&self) -> Array1<f64> {
        self.covariance().diag().mapv(f64::sqrt)
    }
}

fn check_rows(design: &Design, target: &Array1<f64>) -> Result<(), ModelError> {
    if design.n_rows() != target.len() {
        return Err(ModelError::Shape(format!(
            "design has {} rows but target has {}",
            design.n_rows(),
            target.len()
        )));
    }
    Ok(())
}

fn param_names(design: &Design, intercept: bool) -> Vec<String> {
    let mut names = Vec::with_capacity(design.n_cols() + 1);
    if intercept {
        names.push(INTERCEPT.to_string());
    }
    names.extend(design.names.iter().cloned());
    names
}

fn check_predict_width(x: &Array2<f64>, expected: usize) -> Result<(), ModelError> {
    if x.ncols() != expected {
        return Err(ModelError::Shape(format!(
            "expected {} predictor columns, got {}",
            expected,
            x.ncols()
        )));
    }
    Ok(())
}
