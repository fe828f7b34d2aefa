//! In-memory table with named, typed columns and explicit missing cells.

mod column;
mod value;

pub use column::ColumnData;
pub use value::{sorted_distinct, Value};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ImputeError, Result};

/// An ordered collection of equally long named columns.
///
/// Rows are never reordered; the row index travels with the table through
/// every transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index: Vec<String>,
    columns: IndexMap<String, ColumnData>,
}

impl Table {
    /// Create an empty table with `n_rows` rows and a default index.
    pub fn new(n_rows: usize) -> Self {
        Self {
            index: (0..n_rows).map(|i| i.to_string()).collect(),
            columns: IndexMap::new(),
        }
    }

    /// Create a table from named columns. All columns must have the same length.
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, ColumnData)>,
    ) -> Result<Self> {
        let mut iter = columns.into_iter().peekable();
        let n_rows = iter.peek().map(|(_, c)| c.len()).unwrap_or(0);
        let mut table = Table::new(n_rows);
        for (name, data) in iter {
            table.add_column(name, data)?;
        }
        Ok(table)
    }

    /// Replace the row index. Its length must match the row count.
    pub fn with_index(mut self, index: Vec<String>) -> Result<Self> {
        if index.len() != self.n_rows() {
            return Err(ImputeError::Table(format!(
                "index has {} labels but table has {} rows",
                index.len(),
                self.n_rows()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Append a column.
    pub fn add_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if data.len() != self.n_rows() {
            return Err(ImputeError::Table(format!(
                "column '{}' has {} rows, expected {}",
                name,
                data.len(),
                self.n_rows()
            )));
        }
        if self.columns.contains_key(&name) {
            return Err(ImputeError::Table(format!("duplicate column '{}'", name)));
        }
        self.columns.insert(name, data);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Row labels.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Zero-based position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.get(name)
    }

    /// Column lookup that reports unknown names as a table error.
    pub fn require(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .get(name)
            .ok_or_else(|| ImputeError::Table(format!("unknown column '{}'", name)))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut ColumnData> {
        self.columns
            .get_mut(name)
            .ok_or_else(|| ImputeError::Table(format!("unknown column '{}'", name)))
    }

    /// Iterate columns in table order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, row: usize, column: &str) -> Option<Value> {
        self.columns.get(column).and_then(|c| c.get(row))
    }

    pub fn set(&mut self, row: usize, column: &str, value: Value) -> Result<()> {
        self.column_mut(column)?.set(row, value)
    }

    pub fn is_missing(&self, row: usize, column: &str) -> bool {
        self.columns
            .get(column)
            .is_none_or(|c| c.is_missing(row))
    }

    /// Missing cells in one column.
    pub fn missing_count(&self, column: &str) -> usize {
        self.columns.get(column).map_or(0, |c| c.missing_count())
    }

    /// Missing cells across the whole table.
    pub fn total_missing(&self) -> usize {
        self.columns.values().map(|c| c.missing_count()).sum()
    }

    /// Row-major missing indicator matrix (`true` = missing).
    pub fn missing_matrix(&self) -> Vec<Vec<bool>> {
        (0..self.n_rows())
            .map(|row| self.columns.values().map(|c| c.is_missing(row)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("x", ColumnData::from_f64(vec![1.0, f64::NAN, 3.0])),
            ("g", ColumnData::from_text(vec![Some("a"), Some("b"), None])),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns() {
        let table = sample();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.column_names(), vec!["x", "g"]);
        assert_eq!(table.index(), &["0", "1", "2"]);
        assert_eq!(table.total_missing(), 2);
    }

    #[test]
    fn test_ragged_column_rejected() {
        let result = Table::from_columns(vec![
            ("x", ColumnData::from_f64(vec![1.0, 2.0])),
            ("y", ColumnData::from_f64(vec![1.0])),
        ]);
        assert!(matches!(result, Err(ImputeError::Table(_))));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut table = sample();
        assert!(table
            .add_column("x", ColumnData::from_f64(vec![0.0; 3]))
            .is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut table = sample();
        table.set(1, "x", Value::Number(2.0)).unwrap();
        assert_eq!(table.get(1, "x"), Some(Value::Number(2.0)));
        assert!(!table.is_missing(1, "x"));
        assert!(table.set(0, "missing", Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_with_index_length_checked() {
        let table = sample();
        assert!(table.clone().with_index(vec!["a".into()]).is_err());
        let table = table
            .with_index(vec!["r1".into(), "r2".into(), "r3".into()])
            .unwrap();
        assert_eq!(table.index()[2], "r3");
    }

    #[test]
    fn test_missing_matrix() {
        let table = sample();
        let m = table.missing_matrix();
        assert_eq!(m[1], vec![true, false]);
        assert_eq!(m[2], vec![false, true]);
    }
}
