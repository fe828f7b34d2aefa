//! Metadata about a loaded data file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about the source data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    pub size_bytes: u64,
    /// Detected format (csv, tsv, etc.).
    pub format: String,
    /// Number of data rows (excluding header).
    pub row_count: usize,
    pub column_count: usize,
    /// Number of cells read as missing.
    pub missing_cells: usize,
    pub loaded_at: DateTime<Utc>,
}

impl SourceMetadata {
    pub fn new(path: PathBuf, hash: String, size_bytes: u64, format: String) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            row_count: 0,
            column_count: 0,
            missing_cells: 0,
            loaded_at: Utc::now(),
        }
    }

    /// Record the shape of the parsed table.
    pub fn with_shape(mut self, row_count: usize, column_count: usize, missing_cells: usize) -> Self {
        self.row_count = row_count;
        self.column_count = column_count;
        self.missing_cells = missing_cells;
        self
    }
}

/// Format name implied by a delimiter.
pub fn format_name(delimiter: u8) -> &'static str {
    match delimiter {
        b'\t' => "tsv",
        b',' => "csv",
        b';' => "csv-semicolon",
        b'|' => "psv",
        _ => "delimited",
    }
}
