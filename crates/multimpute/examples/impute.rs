//! Example: Multiply impute a data file and pool a regression over the results.
//!
//! Usage:
//!   cargo run --example impute -- <file_path> [response] [predictor,...]
//!
//! Example:
//!   cargo run --example impute -- test_data/health_survey.csv cholesterol age_group,bmi

use std::env;
use std::path::Path;

use multimpute::patterns::md_pattern;
use multimpute::{
    ImputerConfig, MiLinearRegression, MissingnessAnalyzer, MultipleImputer, Parser, ParserConfig,
    StrategyKind,
};

fn main() -> multimpute::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --example impute -- <file_path> [response] [predictor,...]");
        eprintln!("\nExample:");
        eprintln!("  cargo run --example impute -- test_data/health_survey.csv cholesterol age_group,bmi");
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if !path.exists() {
        eprintln!("Error: File not found: {}", path.display());
        std::process::exit(1);
    }

    let separator = "=".repeat(80);
    println!("{}", separator);
    println!("Multiple imputation: {}", path.display());
    println!("{}", separator);
    println!();

    let parser = Parser::with_config(ParserConfig::default().with_index_column("id"));
    let (table, source) = parser.parse_file(path)?;

    println!("## Source");
    println!("  Format: {}", source.format);
    println!("  Rows: {}", source.row_count);
    println!("  Columns: {}", source.column_count);
    println!("  Missing cells: {}", source.missing_cells);
    println!();

    let schema = MissingnessAnalyzer::new().analyze(&table);
    println!("## Columns");
    for column in &schema.columns {
        println!(
            "  {:16} {:12} missing={:<3} ({:.1}%)",
            column.name,
            column.column_type.to_string(),
            column.missing_count,
            column.missing_percentage()
        );
    }
    println!();

    let patterns = md_pattern(&table);
    println!("## {} missingness patterns", patterns.patterns.len());
    for pattern in &patterns.patterns {
        let cells: Vec<String> = pattern.observed.iter().map(|o| o.to_string()).collect();
        println!("  {:>4}  {}", pattern.count, cells.join(" "));
    }
    println!();

    let config = ImputerConfig::new()
        .with_n(5)
        .with_iterations(10)
        .with_seed(2024)
        .with_column_strategy("bmi", StrategyKind::Pmm)
        .with_column_strategy("cholesterol", StrategyKind::Pmm)
        .with_diagnostics(true);

    let set = MultipleImputer::new(config.clone()).impute_eager(&table)?;
    println!("## Imputations (base seed {})", set.base_seed);
    for imputation in &set {
        let iterations = imputation.trace.as_ref().map(|t| t.iterations).unwrap_or(0);
        println!(
            "  #{}  seed={:<20}  iterations={}  remaining missing={}",
            imputation.index,
            imputation.seed,
            iterations,
            imputation.table.total_missing()
        );
    }
    println!();

    if let Some(response) = args.get(2) {
        let predictors: Vec<&str> = args
            .get(3)
            .map(|p| p.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let result = MiLinearRegression::new(config).fit(&table, response, &predictors)?;
        println!("## {} ~ {}", response, predictors.join(" + "));
        print!("{}", result.report);
    }

    Ok(())
}
