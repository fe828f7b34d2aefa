//! Patterns command - summarize missingness of a data file.

use std::path::PathBuf;

use colored::Colorize;
use multimpute::patterns::{flux, md_pattern};
use multimpute::MissingnessAnalyzer;

pub fn run(file: PathBuf, json_output: bool, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let table = super::load_table(&file)?;
    let schema = MissingnessAnalyzer::new().analyze(&table);
    let patterns = md_pattern(&table);
    let flux = flux(&table);

    if json_output {
        let report = serde_json::json!({
            "file": file.display().to_string(),
            "schema": schema,
            "patterns": patterns,
            "flux": flux,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} ({} rows, {} columns)",
        "Missingness in".cyan().bold(),
        file.display().to_string().white(),
        table.n_rows(),
        table.n_cols()
    );
    println!();

    println!("{}", "Columns:".yellow().bold());
    println!(
        "  {:20} {:12} {:>8} {:>8} {:>8} {:>8}",
        "name", "type", "missing", "percent", "influx", "outflux"
    );
    for column in &schema.columns {
        let pct = column.missing_percentage();
        let pct_text = format!("{:.1}%", pct);
        let pct_colored = if column.missing_count == 0 {
            pct_text.green()
        } else if pct < 20.0 {
            pct_text.yellow()
        } else {
            pct_text.red()
        };
        let stats = flux.get(&column.name);
        println!(
            "  {:20} {:12} {:>8} {:>8} {:>8.3} {:>8.3}",
            column.name,
            column.column_type.to_string(),
            column.missing_count,
            pct_colored,
            stats.map(|s| s.influx).unwrap_or(0.0),
            stats.map(|s| s.outflux).unwrap_or(0.0),
        );
    }
    println!();

    println!(
        "{} {} distinct row patterns",
        "Patterns:".yellow().bold(),
        patterns.patterns.len()
    );
    if verbose {
        println!("  {:>6}  {}", "rows", patterns.columns.join(" "));
        for row in &patterns.patterns {
            let cells: Vec<String> = row
                .observed
                .iter()
                .zip(&patterns.columns)
                .map(|(o, c)| format!("{:^width$}", o, width = c.len()))
                .collect();
            println!("  {:>6}  {}  ({} missing)", row.count, cells.join(" "), row.nmis);
        }
    }
    println!();

    if schema.visit_order.is_empty() {
        println!("{}", "No missing values; nothing to impute.".green().bold());
    } else {
        println!(
            "Default visit order: {}",
            schema.visit_order.join(" -> ").cyan()
        );
    }

    Ok(())
}
