//! Strategies that ignore predictors and summarize the observed values.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;

use crate::schema::ColumnDescriptor;
use crate::stats::descriptive;
use crate::table::{sorted_distinct, Value};

use super::{
    ChainRng, FittedStrategy, ImputationTask, Strategy, StrategyError, StrategyKind,
    StrategyOptions,
};

/// A single value repeated for every missing row.
struct Fill(Value);

impl FittedStrategy for Fill {
    fn predict(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(vec![self.0.clone(); task.missing_rows.len()])
    }
}

/// Uniform draws from a fixed pool of values.
struct DrawFrom(Vec<Value>);

impl FittedStrategy for DrawFrom {
    fn predict(&self, task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        if self.0.is_empty() {
            return Err(StrategyError::InsufficientData {
                available: 0,
                required: 0,
            });
        }
        Ok(task
            .missing_rows
            .iter()
            .map(|_| self.0[rng.gen_range(0..self.0.len())].clone())
            .collect())
    }
}

// ============================================================================
// Mean / median
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Mean;

impl Strategy for Mean {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mean
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let values = task.continuous_target()?.to_vec();
        Ok(Box::new(Fill(Value::Number(descriptive::mean(&values)))))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Median;

impl Strategy for Median {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Median
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let values = task.continuous_target()?.to_vec();
        Ok(Box::new(Fill(Value::Number(descriptive::median(&values)))))
    }
}

// ============================================================================
// Mode
// ============================================================================

/// Tie handling when several values share the highest count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFill {
    First,
    Last,
    Random,
}

#[derive(Debug, Clone)]
pub struct Mode {
    fill: ModeFill,
}

impl Mode {
    pub fn new(fill: ModeFill) -> Self {
        Self { fill }
    }

    pub fn from_options(strategy: &str, options: &StrategyOptions) -> Result<Self, StrategyError> {
        let fill = match options
            .choice(strategy, "fill_strategy", &["first", "last", "random"])?
            .as_deref()
        {
            Some("last") => ModeFill::Last,
            Some("random") => ModeFill::Random,
            _ => ModeFill::First,
        };
        Ok(Self::new(fill))
    }
}

/// Most frequent values in sorted order.
pub(crate) fn modes(values: &[Value]) -> Vec<Value> {
    let distinct = sorted_distinct(values.to_vec());
    let counts: Vec<usize> = distinct
        .iter()
        .map(|d| values.iter().filter(|v| v.total_cmp(d).is_eq()).count())
        .collect();
    let max = counts.iter().copied().max().unwrap_or(0);
    distinct
        .into_iter()
        .zip(counts)
        .filter(|(_, c)| *c == max)
        .map(|(v, _)| v)
        .collect()
}

impl Strategy for Mode {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mode
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let mut modes = modes(&task.target.values());
        let fitted: Box<dyn FittedStrategy> = match self.fill {
            ModeFill::First => Box::new(Fill(modes.swap_remove(0))),
            ModeFill::Last => Box::new(Fill(modes.pop().ok_or(StrategyError::InsufficientData {
                available: 0,
                required: 0,
            })?)),
            ModeFill::Random => Box::new(DrawFrom(modes)),
        };
        Ok(fitted)
    }
}

// ============================================================================
// Random draws
// ============================================================================

/// Uniform draw among the distinct observed values.
#[derive(Debug, Clone, Copy)]
pub struct RandomDraw;

impl Strategy for RandomDraw {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        Ok(Box::new(DrawFrom(sorted_distinct(task.target.values()))))
    }
}

/// Normal draws matching the observed mean and standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct Norm;

struct FittedNorm {
    normal: Normal<f64>,
}

impl Strategy for Norm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Norm
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let values = task.continuous_target()?.to_vec();
        let mean = descriptive::mean(&values);
        let sd = descriptive::std_dev(&values, 0);
        let normal = Normal::new(mean, sd)
            .map_err(|e| StrategyError::Degenerate(format!("normal({}, {}): {}", mean, sd, e)))?;
        Ok(Box::new(FittedNorm { normal }))
    }
}

impl FittedStrategy for FittedNorm {
    fn predict(&self, task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(task
            .missing_rows
            .iter()
            .map(|_| Value::Number(self.normal.sample(rng)))
            .collect())
    }
}

/// Draw levels with their observed proportions.
#[derive(Debug, Clone, Copy)]
pub struct CategoricalDraw;

struct FittedCategorical {
    levels: Vec<Value>,
    weights: WeightedIndex<usize>,
}

impl Strategy for CategoricalDraw {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Categorical
    }

    fn fit(&self, task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        task.require_observed(1)?;
        let (codes, levels) = task.level_target()?;
        let counts = descriptive::level_counts(codes, levels.len());
        let weights = WeightedIndex::new(&counts)
            .map_err(|e| StrategyError::Degenerate(format!("level weights: {}", e)))?;
        Ok(Box::new(FittedCategorical {
            levels: levels.to_vec(),
            weights,
        }))
    }
}

impl FittedStrategy for FittedCategorical {
    fn predict(&self, task: &ImputationTask<'_>, rng: &mut ChainRng) -> Result<Vec<Value>, StrategyError> {
        Ok(task
            .missing_rows
            .iter()
            .map(|_| self.levels[self.weights.sample(rng)].clone())
            .collect())
    }
}

// ============================================================================
// Constant
// ============================================================================

/// A user-supplied fill value; the only strategy that needs no observed data.
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn from_options(
        strategy: &str,
        descriptor: &ColumnDescriptor,
        options: &StrategyOptions,
    ) -> Result<Self, StrategyError> {
        let value = options
            .cell_value(strategy, "fill_value")?
            .ok_or_else(|| StrategyError::InvalidOption {
                strategy: strategy.to_string(),
                key: "fill_value".to_string(),
                message: "required".to_string(),
            })?;
        if descriptor.numeric != value.as_f64().is_some() {
            return Err(StrategyError::InvalidOption {
                strategy: strategy.to_string(),
                key: "fill_value".to_string(),
                message: format!(
                    "{} does not match the storage of column '{}'",
                    value, descriptor.name
                ),
            });
        }
        Ok(Self { value })
    }
}

impl Strategy for Constant {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Constant
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn fit(&self, _task: &ImputationTask<'_>, _rng: &mut ChainRng) -> Result<Box<dyn FittedStrategy>, StrategyError> {
        Ok(Box::new(Fill(self.value.clone())))
    }
}
