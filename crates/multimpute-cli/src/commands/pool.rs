//! Pool command - fit a regression on every imputed table and combine the fits.

use std::path::PathBuf;

use colored::Colorize;
use multimpute::{MiLinearRegression, MiLogisticRegression, PooledReport};

use crate::cli::ModelChoice;

pub struct PoolArgs {
    pub file: PathBuf,
    pub response: String,
    pub predictors: Vec<String>,
    pub model: ModelChoice,
    pub n: Option<usize>,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub alpha: f64,
    pub json: bool,
}

pub fn run(args: PoolArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let table = super::load_table(&args.file)?;

    let mut config = super::load_config(args.config.as_ref())?.with_verbose(verbose);
    if let Some(n) = args.n {
        config = config.with_n(n);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let predictors: Vec<&str> = args.predictors.iter().map(String::as_str).collect();
    let report: PooledReport = match args.model {
        ModelChoice::Linear => {
            MiLinearRegression::new(config)
                .with_alpha(args.alpha)
                .fit(&table, &args.response, &predictors)?
                .report
        }
        ModelChoice::Logistic => {
            MiLogisticRegression::new(config)
                .with_alpha(args.alpha)
                .fit(&table, &args.response, &predictors)?
                .report
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} ~ {} ({} model)",
        "Pooled fit".cyan().bold(),
        args.response.white().bold(),
        args.predictors.join(" + "),
        args.model
    );
    println!();
    print!("{}", report);

    let high_fmi: Vec<&str> = report
        .estimates
        .iter()
        .filter(|(_, e)| e.fmi > 0.5)
        .map(|(name, _)| name.as_str())
        .collect();
    if !high_fmi.is_empty() {
        println!();
        println!(
            "{} high fraction of missing information for {}; consider more imputations",
            "Note:".yellow().bold(),
            high_fmi.join(", ")
        );
    }

    Ok(())
}
