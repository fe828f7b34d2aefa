//! Typed column storage with explicit missing cells.

use serde::{Deserialize, Serialize};

use crate::error::{ImputeError, Result};

use super::value::{sorted_distinct, Value};

/// Storage for one column. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// Build a numeric column from plain values, treating NaN as missing.
    pub fn from_f64(values: impl IntoIterator<Item = f64>) -> Self {
        ColumnData::Numeric(
            values
                .into_iter()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        )
    }

    /// Build a text column from optional strings.
    pub fn from_text<S: Into<String>>(values: impl IntoIterator<Item = Option<S>>) -> Self {
        ColumnData::Text(values.into_iter().map(|v| v.map(Into::into)).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this column stores numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v.get(row).is_none_or(|c| c.is_none()),
            ColumnData::Text(v) => v.get(row).is_none_or(|c| c.is_none()),
        }
    }

    /// Read a cell. `None` for missing cells and out-of-range rows.
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(Value::Number),
            ColumnData::Text(v) => v.get(row).cloned().flatten().map(Value::Text),
        }
    }

    /// Numeric cell read without allocation.
    pub fn get_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Numeric(v) => v.get(row).copied().flatten(),
            ColumnData::Text(_) => None,
        }
    }

    /// Write an observed value. The value kind must match the storage kind.
    pub fn set(&mut self, row: usize, value: Value) -> Result<()> {
        let len = self.len();
        if row >= len {
            return Err(ImputeError::Table(format!(
                "row {} out of range for column of length {}",
                row, len
            )));
        }
        match (self, value) {
            (ColumnData::Numeric(v), Value::Number(x)) => v[row] = Some(x),
            (ColumnData::Text(v), Value::Text(s)) => v[row] = Some(s),
            (ColumnData::Numeric(_), Value::Text(s)) => {
                return Err(ImputeError::Table(format!(
                    "cannot write text '{}' into a numeric column",
                    s
                )));
            }
            (ColumnData::Text(_), Value::Number(x)) => {
                return Err(ImputeError::Table(format!(
                    "cannot write number {} into a text column",
                    x
                )));
            }
        }
        Ok(())
    }

    /// Mark a cell as missing.
    pub fn clear(&mut self, row: usize) {
        match self {
            ColumnData::Numeric(v) => {
                if let Some(cell) = v.get_mut(row) {
                    *cell = None;
                }
            }
            ColumnData::Text(v) => {
                if let Some(cell) = v.get_mut(row) {
                    *cell = None;
                }
            }
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Row indices with missing cells, ascending.
    pub fn missing_rows(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_missing(i)).collect()
    }

    /// Row indices with observed cells, ascending.
    pub fn observed_rows(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| !self.is_missing(i)).collect()
    }

    /// Per-row missing indicator.
    pub fn missing_mask(&self) -> Vec<bool> {
        (0..self.len()).map(|i| self.is_missing(i)).collect()
    }

    /// All observed values in row order.
    pub fn observed_values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// Sorted distinct observed values.
    pub fn distinct_values(&self) -> Vec<Value> {
        sorted_distinct(self.observed_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f64_nan_is_missing() {
        let col = ColumnData::from_f64(vec![1.0, f64::NAN, 3.0]);
        assert_eq!(col.missing_count(), 1);
        assert_eq!(col.missing_rows(), vec![1]);
        assert_eq!(col.observed_rows(), vec![0, 2]);
    }

    #[test]
    fn test_set_kind_mismatch() {
        let mut col = ColumnData::from_text(vec![Some("a"), None]);
        assert!(col.set(1, Value::Number(1.0)).is_err());
        col.set(1, Value::from("b")).unwrap();
        assert_eq!(col.get(1), Some(Value::from("b")));
    }

    #[test]
    fn test_set_out_of_range() {
        let mut col = ColumnData::from_f64(vec![1.0]);
        assert!(col.set(3, Value::Number(2.0)).is_err());
    }

    #[test]
    fn test_distinct_values() {
        let col = ColumnData::from_f64(vec![2.0, 1.0, f64::NAN, 2.0]);
        assert_eq!(
            col.distinct_values(),
            vec![Value::Number(1.0), Value::Number(2.0)]
        );
    }
}
