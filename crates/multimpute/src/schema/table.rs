//! Table-level missingness schema.

use serde::{Deserialize, Serialize};

use super::column::ColumnDescriptor;

/// Descriptors for every column plus the default visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Descriptors in table order.
    pub columns: Vec<ColumnDescriptor>,
    /// Incomplete columns in ascending missing-count order.
    pub visit_order: Vec<String>,
    /// Number of rows in the analyzed table.
    pub n_rows: usize,
}

impl TableSchema {
    /// Create a table schema with the given columns and derive the visit order.
    pub fn with_columns(columns: Vec<ColumnDescriptor>, n_rows: usize) -> Self {
        let visit_order = default_visit_order(&columns);
        Self {
            columns,
            visit_order,
            n_rows,
        }
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Get all column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns with at least one missing cell.
    pub fn incomplete_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_complete())
    }

    /// Total missing cells.
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing_count).sum()
    }
}

/// Ascending missing count, ties by position; complete columns excluded.
fn default_visit_order(columns: &[ColumnDescriptor]) -> Vec<String> {
    let mut incomplete: Vec<&ColumnDescriptor> =
        columns.iter().filter(|c| !c.is_complete()).collect();
    incomplete.sort_by_key(|c| (c.missing_count, c.position));
    incomplete.into_iter().map(|c| c.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn descriptor(name: &str, position: usize, missing: usize) -> ColumnDescriptor {
        let mut d = ColumnDescriptor::new(name, position, ColumnType::Continuous, true);
        d.missing_count = missing;
        d.observed_count = 10 - missing;
        d
    }

    #[test]
    fn test_visit_order_ascending_missing() {
        let schema = TableSchema::with_columns(
            vec![
                descriptor("a", 0, 3),
                descriptor("b", 1, 0),
                descriptor("c", 2, 1),
                descriptor("d", 3, 3),
            ],
            10,
        );
        assert_eq!(schema.visit_order, vec!["c", "a", "d"]);
        assert_eq!(schema.total_missing(), 7);
        assert_eq!(schema.incomplete_columns().count(), 3);
    }
}
