//! Delimited writer for completed tables.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{ImputeError, Result};
use crate::table::Table;

/// Writes a [`Table`] as delimited text, index column first.
#[derive(Debug, Clone)]
pub struct TableWriter {
    delimiter: u8,
    missing: String,
    index_header: Option<String>,
}

impl Default for TableWriter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            missing: "NA".to_string(),
            index_header: None,
        }
    }
}

impl TableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Token written for missing cells.
    pub fn with_missing(mut self, token: impl Into<String>) -> Self {
        self.missing = token.into();
        self
    }

    /// Write the row index as a leading column under this header.
    pub fn with_index(mut self, header: impl Into<String>) -> Self {
        self.index_header = Some(header.into());
        self
    }

    pub fn write_path(&self, table: &Table, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ImputeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write_to(table, file)
    }

    pub fn write_to<W: Write>(&self, table: &Table, writer: W) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        let mut header: Vec<&str> = Vec::with_capacity(table.n_cols() + 1);
        if let Some(index) = &self.index_header {
            header.push(index);
        }
        header.extend(table.column_names());
        out.write_record(&header)?;

        let columns: Vec<_> = table.columns().map(|(_, data)| data).collect();
        for row in 0..table.n_rows() {
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            if self.index_header.is_some() {
                record.push(table.index()[row].clone());
            }
            for data in &columns {
                record.push(match data.get(row) {
                    Some(value) => value.to_string(),
                    None => self.missing.clone(),
                });
            }
            out.write_record(&record)?;
        }

        out.flush().map_err(|e| ImputeError::Csv(e.into()))?;
        Ok(())
    }

    /// Render to a string.
    pub fn render(&self, table: &Table) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_to(table, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ImputeError::Table(e.to_string()))
    }
}
