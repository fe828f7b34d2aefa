//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multimpute: multiple imputation by chained equations
#[derive(Parser)]
#[command(name = "multimpute")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize missingness patterns of a data file
    Patterns {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Impute a data file n times and write the completed tables
    Impute {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of imputed datasets
        #[arg(short = 'n', long)]
        n: Option<usize>,

        /// Iterations per chain
        #[arg(short = 'k', long)]
        iterations: Option<usize>,

        /// Strategy for every incomplete column (e.g. "pmm", "default predictive")
        #[arg(short, long)]
        strategy: Option<String>,

        /// JSON configuration file; command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Run chains in parallel
        #[arg(long)]
        parallel: bool,

        /// Directory for the completed tables (default: next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Impute, fit a regression on every completed table and pool the estimates
    Pool {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Response column
        #[arg(short, long)]
        response: String,

        /// Predictor columns
        #[arg(short, long, num_args = 1.., value_delimiter = ',', required = true)]
        predictors: Vec<String>,

        /// Analysis model
        #[arg(short, long, default_value = "linear")]
        model: ModelChoice,

        /// Number of imputed datasets
        #[arg(short = 'n', long)]
        n: Option<usize>,

        /// JSON configuration file for the imputation
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Significance level for confidence intervals
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use csv, tsv, or json.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Analysis model fit on each completed table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelChoice {
    /// Ordinary least squares
    #[default]
    Linear,
    /// Logistic regression on a binary response
    Logistic,
}

impl std::str::FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" | "ols" => Ok(ModelChoice::Linear),
            "logistic" | "logit" => Ok(ModelChoice::Logistic),
            _ => Err(format!("Unknown model: {}. Use linear or logistic.", s)),
        }
    }
}

impl std::fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelChoice::Linear => write!(f, "linear"),
            ModelChoice::Logistic => write!(f, "logistic"),
        }
    }
}
