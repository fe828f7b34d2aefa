//! Multinomial logistic regression with the first class as reference.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::stats::linalg;

use super::design::add_intercept;
use super::{check_predict_width, ModelError};

const PROB_EPS: f64 = 1e-12;

/// Softmax regression over `n_classes` classes, fit by damped Newton steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialLogit {
    pub max_iter: usize,
    pub tolerance: f64,
    /// L2 penalty on slopes (intercepts are not penalized).
    pub ridge: f64,
}

impl MultinomialLogit {
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-8,
            ridge: 0.0,
        }
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit class codes `0..n_classes` on predictors `x` (an intercept is added).
    pub fn fit(
        &self,
        x: &Array2<f64>,
        codes: &[usize],
        n_classes: usize,
    ) -> Result<FittedMultinomialLogit, ModelError> {
        if x.nrows() != codes.len() {
            return Err(ModelError::Shape(format!(
                "design has {} rows but target has {}",
                x.nrows(),
                codes.len()
            )));
        }
        if n_classes < 2 {
            return Err(ModelError::Shape(format!(
                "need at least 2 classes, got {}",
                n_classes
            )));
        }
        if let Some(&bad) = codes.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::Shape(format!(
                "class code {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let x1 = add_intercept(x);
        let n = x1.nrows();
        let p = x1.ncols();
        let k = n_classes - 1;
        if n <= p && self.ridge == 0.0 {
            return Err(ModelError::InsufficientData {
                available: n,
                required: p,
            });
        }

        let mut beta = Array1::zeros(k * p);
        let mut current = self.objective(&x1, codes, &beta, k);

        for _ in 0..self.max_iter {
            let (gradient, information) = self.score(&x1, codes, &beta, k);
            let l = linalg::cholesky(&information).ok_or(ModelError::Singular)?;
            let step = linalg::cholesky_solve(&l, &gradient);
            if step.iter().any(|s| !s.is_finite()) {
                return Err(ModelError::NoConvergence {
                    iterations: self.max_iter,
                });
            }

            let mut scale = 1.0;
            let mut candidate = &beta + &step;
            let mut value = self.objective(&x1, codes, &candidate, k);
            while value < current && scale > 1e-6 {
                scale *= 0.5;
                candidate = &beta + &(&step * scale);
                value = self.objective(&x1, codes, &candidate, k);
            }

            let change = step.iter().fold(0.0_f64, |acc, s| acc.max((s * scale).abs()));
            beta = candidate;
            current = value;

            if change < self.tolerance {
                let coefficients = Array2::from_shape_vec((k, p), beta.to_vec())
                    .map_err(|e| ModelError::Shape(e.to_string()))?;
                return Ok(FittedMultinomialLogit {
                    coefficients,
                    n_classes,
                });
            }
        }

        Err(ModelError::NoConvergence {
            iterations: self.max_iter,
        })
    }

    fn probabilities(x1: &Array2<f64>, beta: &Array1<f64>, k: usize) -> Array2<f64> {
        let p = x1.ncols();
        let n = x1.nrows();
        let mut probs = Array2::zeros((n, k + 1));
        for i in 0..n {
            let row = x1.row(i);
            let etas: Vec<f64> = (0..k)
                .map(|c| row.dot(&beta.slice(ndarray::s![c * p..(c + 1) * p])))
                .collect();
            let max = etas.iter().fold(0.0_f64, |acc, &e| acc.max(e));
            let denom = (-max).exp() + etas.iter().map(|e| (e - max).exp()).sum::<f64>();
            probs[[i, 0]] = (-max).exp() / denom;
            for (c, e) in etas.iter().enumerate() {
                probs[[i, c + 1]] = (e - max).exp() / denom;
            }
        }
        probs
    }

    fn penalty(&self, index: usize, p: usize) -> f64 {
        if index % p == 0 { 0.0 } else { self.ridge }
    }

    fn objective(&self, x1: &Array2<f64>, codes: &[usize], beta: &Array1<f64>, k: usize) -> f64 {
        let p = x1.ncols();
        let probs = Self::probabilities(x1, beta, k);
        let loglik: f64 = codes
            .iter()
            .enumerate()
            .map(|(i, &c)| probs[[i, c]].max(PROB_EPS).ln())
            .sum();
        let pen: f64 = beta
            .iter()
            .enumerate()
            .map(|(idx, b)| self.penalty(idx, p) * b * b)
            .sum();
        loglik - 0.5 * pen
    }

    fn score(
        &self,
        x1: &Array2<f64>,
        codes: &[usize],
        beta: &Array1<f64>,
        k: usize,
    ) -> (Array1<f64>, Array2<f64>) {
        let p = x1.ncols();
        let probs = Self::probabilities(x1, beta, k);
        let mut gradient = Array1::zeros(k * p);
        let mut information = Array2::zeros((k * p, k * p));

        for (i, &code) in codes.iter().enumerate() {
            let row = x1.row(i);
            for a in 0..k {
                let pa = probs[[i, a + 1]];
                let indicator = if code == a + 1 { 1.0 } else { 0.0 };
                for j in 0..p {
                    gradient[a * p + j] += row[j] * (indicator - pa);
                }
                for b in 0..k {
                    let pb = probs[[i, b + 1]];
                    let w = if a == b { pa * (1.0 - pa) } else { -pa * pb };
                    for j in 0..p {
                        for l in 0..p {
                            information[[a * p + j, b * p + l]] += w * row[j] * row[l];
                        }
                    }
                }
            }
        }

        for idx in 0..k * p {
            let l = self.penalty(idx, p);
            gradient[idx] -= l * beta[idx];
            information[[idx, idx]] += l;
        }
        (gradient, information)
    }
}

impl Default for MultinomialLogit {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`MultinomialLogit::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedMultinomialLogit {
    /// One row per non-reference class; intercept in column 0.
    coefficients: Array2<f64>,
    n_classes: usize,
}

impl FittedMultinomialLogit {
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Class probabilities, one row per observation.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_predict_width(x, self.coefficients.ncols() - 1)?;
        let x1 = add_intercept(x);
        let beta = Array1::from_iter(self.coefficients.iter().copied());
        Ok(MultinomialLogit::probabilities(&x1, &beta, self.n_classes - 1))
    }

    /// Most probable class per observation.
    pub fn predict_class(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (c, &p)| {
                        if p > best.1 { (c, p) } else { best }
                    })
                    .0
            })
            .collect())
    }
}
