//! Impute command - produce n completed copies of a data file.

use std::path::{Path, PathBuf};

use colored::Colorize;
use multimpute::{Imputation, ImputationOutput, MultipleImputer, StrategyKind, TableWriter};

use crate::cli::OutputFormat;

pub struct ImputeArgs {
    pub file: PathBuf,
    pub n: Option<usize>,
    pub iterations: Option<usize>,
    pub strategy: Option<String>,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
}

pub fn run(args: ImputeArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let table = super::load_table(&args.file)?;

    let mut config = super::load_config(args.config.as_ref())?;
    if let Some(n) = args.n {
        config = config.with_n(n);
    }
    if let Some(iterations) = args.iterations {
        config = config.with_iterations(iterations);
    }
    if let Some(name) = &args.strategy {
        let kind: StrategyKind = name.parse()?;
        config = config.with_strategy(kind);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if args.parallel {
        config = config.with_parallel(true);
    }
    config = config.with_verbose(verbose);

    println!(
        "{} {} ({} missing cells)",
        "Imputing".cyan().bold(),
        args.file.display().to_string().white(),
        table.total_missing()
    );

    let imputer = MultipleImputer::new(config);
    let plan = imputer.plan(&table)?;
    if verbose {
        println!();
        println!("{}", "Plan:".yellow().bold());
        for column in &plan.columns {
            println!(
                "  {:20} {:24} <- {}",
                column.name(),
                column.kind.to_string(),
                if column.descriptor.predictors.is_empty() || !column.uses_predictors() {
                    "-".to_string()
                } else {
                    column.descriptor.predictors.join(", ")
                }
            );
        }
        println!();
    }

    let output = imputer.impute(&table)?;

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => args
            .file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&output_dir)?;

    let stem = args
        .file
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    let base_seed = output.base_seed();
    let written = match output {
        ImputationOutput::Eager(set) => {
            for imputation in &set {
                write_imputation(imputation, &output_dir, &stem, args.format)?;
            }
            set.len()
        }
        // Each table is written as soon as its chain finishes
        ImputationOutput::Lazy(lazy) => {
            let mut count = 0;
            for imputation in lazy.iter() {
                write_imputation(&imputation?, &output_dir, &stem, args.format)?;
                count += 1;
            }
            count
        }
    };

    println!();
    println!(
        "{} {} imputations (base seed {})",
        "Done:".green().bold(),
        written,
        base_seed.to_string().white()
    );

    Ok(())
}

fn write_imputation(
    imputation: &Imputation,
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = output_dir.join(format!(
        "{}.imputed.{}.{}",
        stem,
        imputation.index,
        format.extension()
    ));
    match format {
        OutputFormat::Csv => TableWriter::new().write_path(&imputation.table, &path)?,
        OutputFormat::Tsv => TableWriter::new()
            .with_delimiter(b'\t')
            .write_path(&imputation.table, &path)?,
        OutputFormat::Json => {
            std::fs::write(&path, serde_json::to_string_pretty(imputation)?)?;
        }
    }
    println!("  {} {}", "wrote".green(), path.display());
    Ok(path)
}
