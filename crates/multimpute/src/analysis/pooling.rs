//! Rubin's-rules pooling of estimates from multiply imputed datasets.

use std::fmt;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ImputeError, Result};
use crate::models::FittedModel;
use crate::stats::distributions::{students_t_quantile, two_sided_p_value};

/// Pooled inference for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledEstimate {
    /// Mean of the per-dataset estimates (q̄).
    pub estimate: f64,
    /// Within-imputation variance (W).
    pub within: f64,
    /// Between-imputation variance (B).
    pub between: f64,
    /// Total variance (T).
    pub total: f64,
    pub std_error: f64,
    pub t: f64,
    /// Degrees of freedom; infinite when the datasets agree exactly and no
    /// complete-data df is known (serialized as `null`).
    pub df: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Relative increase in variance due to nonresponse.
    pub riv: f64,
    /// Proportion of total variance due to missingness.
    pub lambda: f64,
    /// Fraction of missing information.
    pub fmi: f64,
}

/// Pooled results for every parameter of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledReport {
    pub estimates: IndexMap<String, PooledEstimate>,
    /// Number of pooled datasets.
    pub n: usize,
    /// Significance level of the confidence intervals.
    pub alpha: f64,
}

impl PooledReport {
    pub fn get(&self, name: &str) -> Option<&PooledEstimate> {
        self.estimates.get(name)
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.estimates.keys().map(String::as_str).collect()
    }
}

impl fmt::Display for PooledReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = (1.0 - self.alpha) * 100.0;
        writeln!(
            f,
            "Pooled estimates over {} imputations ({:.0}% CI)",
            self.n, level
        )?;
        let width = self
            .estimates
            .keys()
            .map(|k| k.len())
            .max()
            .unwrap_or(4)
            .max(4);
        writeln!(
            f,
            "{:<width$} {:>12} {:>10} {:>8} {:>9} {:>8} {:>12} {:>12} {:>6}",
            "term", "estimate", "std.err", "t", "df", "p", "lower", "upper", "fmi",
        )?;
        for (name, e) in &self.estimates {
            let df = if e.df.is_finite() {
                format!("{:.2}", e.df)
            } else {
                "inf".to_string()
            };
            writeln!(
                f,
                "{:<width$} {:>12.5} {:>10.5} {:>8.3} {:>9} {:>8.4} {:>12.5} {:>12.5} {:>6.3}",
                name, e.estimate, e.std_error, e.t, df, e.p_value, e.ci_lower, e.ci_upper, e.fmi,
            )?;
        }
        Ok(())
    }
}

/// Applies Rubin's rules with the Barnard–Rubin small-sample df correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pooler {
    alpha: f64,
}

impl Default for Pooler {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl Pooler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Significance level for confidence intervals, in (0, 1).
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Pool fitted models, one per imputed dataset.
    pub fn pool<'m, M>(&self, models: impl IntoIterator<Item = &'m M>) -> Result<PooledReport>
    where
        M: FittedModel + ?Sized + 'm,
    {
        let models: Vec<&M> = models.into_iter().collect();
        let first = models.first().ok_or_else(|| {
            ImputeError::Pooling("at least 2 fitted models are required, got 0".to_string())
        })?;
        let names = first.param_names().to_vec();

        for (i, model) in models.iter().enumerate().skip(1) {
            if model.param_names() != names.as_slice() {
                return Err(ImputeError::Pooling(format!(
                    "model {} has parameters {:?}, expected {:?}",
                    i + 1,
                    model.param_names(),
                    names
                )));
            }
        }

        let estimates: Vec<Array1<f64>> = models.iter().map(|m| m.params().clone()).collect();
        let covariances: Vec<Array2<f64>> =
            models.iter().map(|m| m.covariance().clone()).collect();

        // Complete-data df only when every model reports one; the smallest is used
        let residual_df = models
            .iter()
            .map(|m| m.residual_df())
            .collect::<Option<Vec<f64>>>()
            .and_then(|dfs| dfs.into_iter().reduce(f64::min));

        self.pool_estimates(&names, &estimates, &covariances, residual_df)
    }

    /// Pool raw estimate vectors and their covariance matrices.
    pub fn pool_estimates(
        &self,
        names: &[String],
        estimates: &[Array1<f64>],
        covariances: &[Array2<f64>],
        residual_df: Option<f64>,
    ) -> Result<PooledReport> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ImputeError::Pooling(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        let n = estimates.len();
        if n < 2 {
            return Err(ImputeError::Pooling(format!(
                "at least 2 fitted models are required, got {}",
                n
            )));
        }
        if covariances.len() != n {
            return Err(ImputeError::Pooling(format!(
                "{} estimate vectors but {} covariance matrices",
                n,
                covariances.len()
            )));
        }
        let p = names.len();
        for (i, (est, cov)) in estimates.iter().zip(covariances).enumerate() {
            if est.len() != p {
                return Err(ImputeError::Pooling(format!(
                    "model {} has {} estimates, expected {}",
                    i + 1,
                    est.len(),
                    p
                )));
            }
            if cov.dim() != (p, p) {
                return Err(ImputeError::Pooling(format!(
                    "model {} covariance is {}x{}, expected {}x{}",
                    i + 1,
                    cov.nrows(),
                    cov.ncols(),
                    p,
                    p
                )));
            }
        }
        if let Some(df) = residual_df {
            if !(df > 0.0) {
                return Err(ImputeError::Pooling(format!(
                    "complete-data degrees of freedom must be positive, got {}",
                    df
                )));
            }
        }

        let nf = n as f64;
        let mut pooled = IndexMap::with_capacity(p);
        for (k, name) in names.iter().enumerate() {
            let q: Vec<f64> = estimates.iter().map(|e| e[k]).collect();
            let u: Vec<f64> = covariances.iter().map(|c| c[[k, k]]).collect();
            let estimate = self.combine(&q, &u, nf, residual_df);
            pooled.insert(name.clone(), estimate);
        }

        debug!(n, params = p, "pooled estimates with Rubin's rules");
        Ok(PooledReport {
            estimates: pooled,
            n,
            alpha: self.alpha,
        })
    }

    fn combine(&self, q: &[f64], u: &[f64], n: f64, residual_df: Option<f64>) -> PooledEstimate {
        let qbar = q.iter().sum::<f64>() / n;
        let within = u.iter().sum::<f64>() / n;
        let between = q.iter().map(|v| (v - qbar).powi(2)).sum::<f64>() / (n - 1.0);
        let inflated = (1.0 + 1.0 / n) * between;
        let total = within + inflated;

        let riv = if within > 0.0 {
            inflated / within
        } else if inflated > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let lambda = if total > 0.0 { inflated / total } else { 0.0 };

        let df_old = if lambda > 0.0 {
            (n - 1.0) / (lambda * lambda)
        } else {
            f64::INFINITY
        };
        let df = match residual_df {
            Some(df_com) => {
                let df_obs = (df_com + 1.0) / (df_com + 3.0) * df_com * (1.0 - lambda);
                if df_old.is_infinite() {
                    df_obs
                } else {
                    df_old * df_obs / (df_old + df_obs)
                }
            }
            None => df_old,
        };

        let fmi = if riv.is_infinite() {
            1.0
        } else {
            (riv + 2.0 / (df + 3.0)) / (riv + 1.0)
        };

        let std_error = total.sqrt();
        let t = qbar / std_error;
        let crit = students_t_quantile(1.0 - self.alpha / 2.0, df);

        PooledEstimate {
            estimate: qbar,
            within,
            between,
            total,
            std_error,
            t,
            df,
            p_value: two_sided_p_value(t, df),
            ci_lower: qbar - crit * std_error,
            ci_upper: qbar + crit * std_error,
            riv,
            lambda,
            fmi,
        }
    }
}

/// Pool fitted models at the 5% level.
pub fn pool<'m, M>(models: impl IntoIterator<Item = &'m M>) -> Result<PooledReport>
where
    M: FittedModel + ?Sized + 'm,
{
    Pooler::new().pool(models)
}
