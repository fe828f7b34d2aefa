//! CSV/TSV reader producing a [`Table`], with delimiter detection.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::source::{format_name, SourceMetadata};
use crate::error::{ImputeError, Result};
use crate::table::{ColumnData, Table};

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Delimiter to use (None = auto-detect).
    pub delimiter: Option<u8>,
    pub has_header: bool,
    /// Maximum rows to read (None = all).
    pub max_rows: Option<usize>,
    pub quote: u8,
    /// Column holding row labels; it becomes the table index instead of a column.
    pub index_column: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            max_rows: None,
            quote: b'"',
            index_column: None,
        }
    }
}

impl ParserConfig {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_index_column(mut self, column: impl Into<String>) -> Self {
        self.index_column = Some(column.into());
        self
    }
}

/// Check if a raw cell represents a missing value.
pub fn is_null_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("nil")
        || trimmed == "."
        || trimmed == "-"
}

/// Parses delimited files into tables.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a file and return the table and its metadata.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<(Table, SourceMetadata)> {
        let path = path.as_ref();
        let io_error = |e| ImputeError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut file = File::open(path).map_err(io_error)?;
        let size_bytes = file.metadata().map_err(io_error)?.len();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(io_error)?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let hash = format!("sha256:{:x}", hasher.finalize());

        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(&contents)?,
        };
        let table = self.parse_bytes(&contents, delimiter)?;

        debug!(
            path = %path.display(),
            rows = table.n_rows(),
            columns = table.n_cols(),
            "parsed input table"
        );

        let metadata = SourceMetadata::new(
            path.to_path_buf(),
            hash,
            size_bytes,
            format_name(delimiter).to_string(),
        )
        .with_shape(table.n_rows(), table.n_cols(), table.total_missing());

        Ok((table, metadata))
    }

    /// Parse in-memory text, detecting the delimiter unless configured.
    pub fn parse_str(&self, text: &str) -> Result<Table> {
        let bytes = text.as_bytes();
        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(bytes)?,
        };
        self.parse_bytes(bytes, delimiter)
    }

    fn parse_bytes(&self, bytes: &[u8], delimiter: u8) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.config.has_header)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(bytes);

        let mut headers: Vec<String> = if self.config.has_header {
            reader.headers()?.iter().map(|s| s.trim().to_string()).collect()
        } else {
            Vec::new()
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            if self.config.max_rows.is_some_and(|max| row_idx >= max) {
                break;
            }
            let record = result?;
            if headers.is_empty() {
                headers = (0..record.len()).map(|i| format!("column_{}", i + 1)).collect();
            }
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        if headers.is_empty() {
            return Err(ImputeError::EmptyData("No columns found".to_string()));
        }
        if rows.is_empty() {
            return Err(ImputeError::EmptyData("No data rows found".to_string()));
        }
        if let Some(dup) = headers
            .iter()
            .enumerate()
            .find(|(i, h)| headers[..*i].contains(h))
            .map(|(_, h)| h)
        {
            return Err(ImputeError::Parse {
                row: 0,
                column: 0,
                message: format!("duplicate column name '{}'", dup),
            });
        }

        let index_position = match &self.config.index_column {
            Some(name) => Some(headers.iter().position(|h| h == name).ok_or_else(|| {
                ImputeError::Configuration(format!("index column '{}' not found", name))
            })?),
            None => None,
        };

        let mut table = Table::new(rows.len());
        for (col, header) in headers.iter().enumerate() {
            if Some(col) == index_position {
                continue;
            }
            let cells: Vec<&str> = rows.iter().map(|r| r[col].as_str()).collect();
            table.add_column(header.clone(), column_from_cells(&cells))?;
        }

        if let Some(col) = index_position {
            let index = rows.iter().map(|r| r[col].trim().to_string()).collect();
            table = table.with_index(index)?;
        }
        Ok(table)
    }
}

/// A column is numeric when every non-null cell parses as a number.
fn column_from_cells(cells: &[&str]) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| {
            if is_null_value(cell) {
                Some(None)
            } else {
                cell.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
            }
        })
        .collect();

    match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::from_text(cells.iter().map(|cell| {
            if is_null_value(cell) {
                None
            } else {
                Some(cell.trim().to_string())
            }
        })),
    }
}

/// Detect the delimiter by analyzing the first few lines.
fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let reader = BufReader::new(bytes);
    let lines: Vec<String> = reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(ImputeError::EmptyData("No lines to analyze".to_string()));
    }

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let first_count = counts[0];
        if first_count == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first_count);
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let variance =
            counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64;

        // Consistent counts win; tab breaks ties
        let score = if consistent {
            first_count * 1000 + if delim == b'\t' { 100 } else { 0 }
        } else if variance < 1.0 {
            first_count * 100
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    Ok(best_delimiter)
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3\n4,5,6").unwrap(), b',');
        assert_eq!(detect_delimiter(b"a\tb\tc\n1\t2\t3").unwrap(), b'\t');
        assert_eq!(detect_delimiter(b"a;b\n\"1;5\";2").unwrap(), b';');
    }

    #[test]
    fn test_numeric_and_text_columns() {
        let table = Parser::new()
            .parse_str("age,income,gender\n30,NA,F\n,52000.5,M\n41,48000,\n")
            .unwrap();
        assert_eq!(table.n_rows(), 3);
        assert!(table.require("age").unwrap().is_numeric());
        assert!(table.require("income").unwrap().is_numeric());
        assert!(!table.require("gender").unwrap().is_numeric());
        assert!(table.is_missing(1, "age"));
        assert!(table.is_missing(0, "income"));
        assert!(table.is_missing(2, "gender"));
        assert_eq!(table.get(1, "income"), Some(Value::Number(52000.5)));
        assert_eq!(table.total_missing(), 3);
    }

    #[test]
    fn test_is_null_value() {
        for token in ["", " ", "NA", "na", "N/A", "NaN", "null", "None", ".", "-"] {
            assert!(is_null_value(token), "{:?}", token);
        }
        assert!(!is_null_value("0"));
        assert!(!is_null_value("value"));
    }

    #[test]
    fn test_index_column() {
        let parser = Parser::with_config(ParserConfig::default().with_index_column("id"));
        let table = parser.parse_str("id,x\nr1,1\nr2,\n").unwrap();
        assert_eq!(table.index(), ["r1".to_string(), "r2".to_string()]);
        assert!(!table.has_column("id"));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        assert!(Parser::new().parse_str("a,a\n1,2\n").is_err());
    }

    #[test]
    fn test_parse_file_metadata() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "x\ty\n1\t2\nNA\t4\n").unwrap();
        let (table, meta) = Parser::new().parse_file(file.path()).unwrap();
        assert_eq!(meta.format, "tsv");
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.missing_cells, 1);
        assert!(meta.hash.starts_with("sha256:"));
        assert_eq!(table.column_names(), vec!["x", "y"]);
    }
}
