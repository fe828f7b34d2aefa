//! CLI command implementations.

pub mod impute;
pub mod patterns;
pub mod pool;

use std::path::{Path, PathBuf};

use multimpute::{ImputerConfig, Parser, Table};
use tracing::debug;

/// Load a data file, failing early with a readable message.
pub fn load_table(file: &Path) -> Result<Table, Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    let (table, source) = Parser::new().parse_file(file)?;
    debug!(
        format = %source.format,
        rows = source.row_count,
        columns = source.column_count,
        missing = source.missing_cells,
        "loaded table"
    );
    Ok(table)
}

/// Configuration from an optional JSON file, or the defaults.
pub fn load_config(config: Option<&PathBuf>) -> Result<ImputerConfig, Box<dyn std::error::Error>> {
    match config {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            Ok(ImputerConfig::from_json_file(path)?)
        }
        None => Ok(ImputerConfig::default()),
    }
}
