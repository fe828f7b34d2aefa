//! Strategies that use row order (or a time column) instead of predictors.

use crate::stats::linalg;
use crate::table::{Table, Value};

use ndarray::{Array1, Array2};

use super::{
    ChainRng, FittedStrategy, ImputationTask, Strategy, StrategyError, StrategyKind,
    StrategyOptions,
};

// ============================================================================
// Carry forward / backward
// ============================================================================

/// Last observation carried forward; leading gaps take the next observation.
#[derive(Debug, Clone, Copy)]
pub struct CarryForward;

/// Next observation carried backward; trailing gaps take the previous observation.
#[derive(Debug, Clone, Copy)]
pub struct CarryBackward;

struct Carry {
    forward: bool,
    observed: Vec<(usize, Value)>,
}

impl Carry {
    fn fit(forward: bool, task: &ImputationTask<'_>) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let observed = task
            .observed_rows
            .iter()
            .copied()
            .zip(task.target.values())
            .collect();
        Ok(Box::new(Carry { forward, observed }))
    }

    fn previous(&self, row: usize) -> Option<&Value> {
        let idx = self.observed.partition_point(|(r, _)| *r < row);
        idx.checked_sub(1).map(|i| &self.observed[i].1)
    }

    fn next(&self, row: usize) -> Option<&Value> {
        let idx = self.observed.partition_point(|(r, _)| *r < row);
        self.observed.get(idx).map(|(_, v)| v)
    }
}

impl FittedStrategy for Carry {
    fn predict(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        task.missing_rows
            .iter()
            .map(|&row| {
                let value = if self.forward {
                    self.previous(row).or_else(|| self.next(row))
                } else {
                    self.next(row).or_else(|| self.previous(row))
                };
                value
                    .cloned()
                    .ok_or(StrategyError::InsufficientData {
                        available: 0,
                        required: 0,
                    })
            })
            .collect()
    }
}

impl Strategy for CarryForward {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Locf
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        Carry::fit(true, task)
    }
}

impl Strategy for CarryBackward {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Nocb
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        Carry::fit(false, task)
    }
}

// ============================================================================
// Interpolation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationMethod {
    /// Straight lines between neighbouring observations, by row position.
    Linear,
    /// Local polynomial through the `order + 1` nearest observations.
    Polynomial { order: usize },
    /// Natural cubic spline through all observations.
    Spline,
    /// Linear in the values of a numeric time column.
    Time { column: String },
}

#[derive(Debug, Clone)]
pub struct Interpolate {
    method: InterpolationMethod,
}

impl Interpolate {
    pub fn new(method: InterpolationMethod) -> Self {
        Self { method }
    }

    pub fn from_options(strategy: &str, options: &StrategyOptions) -> Result<Self, StrategyError> {
        let method = options
            .choice(strategy, "method", &["linear", "polynomial", "spline", "time"])?
            .unwrap_or_else(|| "linear".to_string());
        let order = options.positive_usize(strategy, "order")?;
        let time_column = options.string(strategy, "time_column")?;

        let method = match method.as_str() {
            "polynomial" => InterpolationMethod::Polynomial {
                order: order.unwrap_or(2),
            },
            "spline" => InterpolationMethod::Spline,
            "time" => InterpolationMethod::Time {
                column: time_column.ok_or_else(|| StrategyError::InvalidOption {
                    strategy: strategy.to_string(),
                    key: "time_column".to_string(),
                    message: "required when method is 'time'".to_string(),
                })?,
            },
            _ => InterpolationMethod::Linear,
        };
        Ok(Self::new(method))
    }

    /// Positions of the given rows on the interpolation axis.
    fn axis(&self, task: &ImputationTask<'_>, rows: &[usize]) -> Result<Vec<f64>, StrategyError> {
        match &self.method {
            InterpolationMethod::Time { column } => {
                let data = task.table.column(column).ok_or_else(|| {
                    StrategyError::Degenerate(format!("unknown time column '{}'", column))
                })?;
                rows.iter()
                    .map(|&r| {
                        data.get_f64(r).ok_or_else(|| {
                            StrategyError::Degenerate(format!(
                                "time column '{}' has no numeric value at row {}",
                                column, r
                            ))
                        })
                    })
                    .collect()
            }
            _ => Ok(rows.iter().map(|&r| r as f64).collect()),
        }
    }
}

impl Strategy for Interpolate {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Interpolate
    }

    fn validate(&self, table: &Table) -> Result<(), StrategyError> {
        let InterpolationMethod::Time { column } = &self.method else {
            return Ok(());
        };
        let invalid = |message: String| StrategyError::InvalidOption {
            strategy: StrategyKind::Interpolate.name().to_string(),
            key: "time_column".to_string(),
            message,
        };
        match table.column(column) {
            None => Err(invalid(format!("unknown column '{}'", column))),
            Some(data) if !data.is_numeric() => {
                Err(invalid(format!("column '{}' is not numeric", column)))
            }
            Some(_) => Ok(()),
        }
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let values = task.continuous_target()?;
        let xs = self.axis(task, task.observed_rows)?;

        let mut points: Vec<(f64, f64)> = xs.into_iter().zip(values.iter().copied()).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        // Repeated positions keep their first observation
        points.dedup_by(|a, b| a.0 == b.0);

        let spline = match self.method {
            InterpolationMethod::Spline if points.len() >= 3 => Some(natural_spline(&points)?),
            _ => None,
        };

        Ok(Box::new(FittedInterpolation {
            method: self.clone(),
            points,
            spline,
        }))
    }
}

struct FittedInterpolation {
    method: Interpolate,
    points: Vec<(f64, f64)>,
    spline: Option<Vec<f64>>,
}

impl FittedInterpolation {
    fn evaluate(&self, x: f64) -> f64 {
        let pts = &self.points;
        let first = pts[0];
        let last = pts[pts.len() - 1];
        // Edge gaps take the nearest observation
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        match (&self.method.method, &self.spline) {
            (InterpolationMethod::Polynomial { order }, _) => lagrange(pts, x, *order),
            (InterpolationMethod::Spline, Some(second)) => spline_at(pts, second, x),
            _ => linear(pts, x),
        }
    }
}

impl FittedStrategy for FittedInterpolation {
    fn predict(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        let xs = self.method.axis(task, task.missing_rows)?;
        Ok(xs.into_iter().map(|x| Value::Number(self.evaluate(x))).collect())
    }
}

/// Index `i` with `pts[i].0 <= x < pts[i + 1].0`; `x` must be inside the range.
fn segment(pts: &[(f64, f64)], x: f64) -> usize {
    pts.partition_point(|p| p.0 <= x).saturating_sub(1).min(pts.len() - 2)
}

fn linear(pts: &[(f64, f64)], x: f64) -> f64 {
    let i = segment(pts, x);
    let (x0, y0) = pts[i];
    let (x1, y1) = pts[i + 1];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn lagrange(pts: &[(f64, f64)], x: f64, order: usize) -> f64 {
    let mut nearest: Vec<&(f64, f64)> = pts.iter().collect();
    nearest.sort_by(|a, b| (a.0 - x).abs().total_cmp(&(b.0 - x).abs()));
    nearest.truncate(order + 1);

    nearest
        .iter()
        .enumerate()
        .map(|(i, &&(xi, yi))| {
            let basis: f64 = nearest
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, &&(xj, _))| (x - xj) / (xi - xj))
                .product();
            yi * basis
        })
        .sum()
}

/// Second derivatives of the natural cubic spline through `pts`.
fn natural_spline(pts: &[(f64, f64)]) -> Result<Vec<f64>, StrategyError> {
    let n = pts.len();
    let interior = n - 2;
    let h: Vec<f64> = pts.windows(2).map(|w| w[1].0 - w[0].0).collect();

    let mut a = Array2::zeros((interior, interior));
    let mut rhs = Array1::zeros(interior);
    for k in 0..interior {
        let i = k + 1;
        a[[k, k]] = 2.0 * (h[i - 1] + h[i]);
        if k > 0 {
            a[[k, k - 1]] = h[i - 1];
        }
        if k + 1 < interior {
            a[[k, k + 1]] = h[i];
        }
        rhs[k] = 6.0 * ((pts[i + 1].1 - pts[i].1) / h[i] - (pts[i].1 - pts[i - 1].1) / h[i - 1]);
    }

    let inner = linalg::solve_spd(&a, &rhs).ok_or(StrategyError::SingularMatrix)?;
    let mut second = vec![0.0; n];
    for (k, v) in inner.iter().enumerate() {
        second[k + 1] = *v;
    }
    Ok(second)
}

fn spline_at(pts: &[(f64, f64)], second: &[f64], x: f64) -> f64 {
    let i = segment(pts, x);
    let (x0, y0) = pts[i];
    let (x1, y1) = pts[i + 1];
    let h = x1 - x0;
    let a = (x1 - x) / h;
    let b = (x - x0) / h;
    a * y0 + b * y1 + ((a.powi(3) - a) * second[i] + (b.powi(3) - b) * second[i + 1]) * h * h / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Design;
    use crate::schema::ColumnType;
    use crate::strategy::{fit_predict, Target};
    use crate::table::{ColumnData, Table};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;

    fn run(
        strategy: &dyn Strategy,
        table: &Table,
        target: Target,
        observed: &[usize],
        missing: &[usize],
    ) -> Vec<Value> {
        let design = Design::empty(table.n_rows());
        let task = ImputationTask {
            column: "y",
            column_type: ColumnType::Continuous,
            target,
            observed_rows: observed,
            missing_rows: missing,
            design: &design,
            table,
        };
        let mut rng = ChainRng::seed_from_u64(0);
        fit_predict(strategy, &task, &mut rng).unwrap()
    }

    fn numbers(values: Vec<Value>) -> Vec<f64> {
        values.iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn test_locf_and_nocb() {
        let table = Table::new(6);
        // observed at rows 1 and 4
        let target = Target::Continuous(array![10.0, 40.0]);
        let observed = [1, 4];
        let missing = [0, 2, 3, 5];
        let forward = numbers(run(&CarryForward, &table, target.clone(), &observed, &missing));
        assert_eq!(forward, vec![10.0, 10.0, 10.0, 40.0]);
        let backward = numbers(run(&CarryBackward, &table, target, &observed, &missing));
        assert_eq!(backward, vec![10.0, 40.0, 40.0, 40.0]);
    }

    #[test]
    fn test_linear_interpolation() {
        let table = Table::new(6);
        let target = Target::Continuous(array![0.0, 30.0, 50.0]);
        let strategy = Interpolate::new(InterpolationMethod::Linear);
        let out = numbers(run(&strategy, &table, target, &[1, 4, 5], &[0, 2, 3]));
        assert_eq!(out, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_time_interpolation_uses_time_column() {
        let table = Table::from_columns(vec![(
            "t",
            ColumnData::from_f64(vec![0.0, 1.0, 4.0]),
        )])
        .unwrap();
        let target = Target::Continuous(array![0.0, 8.0]);
        let strategy = Interpolate::new(InterpolationMethod::Time { column: "t".into() });
        let out = numbers(run(&strategy, &table, target, &[0, 2], &[1]));
        assert_abs_diff_eq!(out[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polynomial_recovers_quadratic() {
        let table = Table::new(6);
        // y = x^2 at rows 0, 1, 3, 5
        let target = Target::Continuous(array![0.0, 1.0, 9.0, 25.0]);
        let strategy = Interpolate::new(InterpolationMethod::Polynomial { order: 2 });
        let out = numbers(run(&strategy, &table, target, &[0, 1, 3, 5], &[2, 4]));
        assert_abs_diff_eq!(out[0], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[1], 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spline_is_exact_for_lines() {
        let table = Table::new(5);
        let target = Target::Continuous(array![1.0, 3.0, 7.0, 9.0]);
        let strategy = Interpolate::new(InterpolationMethod::Spline);
        let out = numbers(run(&strategy, &table, target, &[0, 1, 3, 4], &[2]));
        assert_abs_diff_eq!(out[0], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_time_method_requires_column() {
        let options = StrategyOptions::new().with("method", "time");
        assert!(Interpolate::from_options("interpolate", &options).is_err());
    }
}
