//! Column type and missingness inference.

use tracing::debug;

use crate::error::{ImputeError, Result};
use crate::schema::{ColumnDescriptor, ColumnType, TableSchema};
use crate::table::{ColumnData, Table, Value};

/// Scans a table and describes each column's type and missingness.
#[derive(Debug, Clone)]
pub struct MissingnessAnalyzer {
    /// Maximum distinct integer values for a numeric column to count as categorical.
    categorical_threshold: usize,
}

impl MissingnessAnalyzer {
    /// Create a new analyzer with default settings.
    pub fn new() -> Self {
        Self {
            categorical_threshold: 5,
        }
    }

    /// Set the distinct-value threshold for integer-coded categorical columns.
    pub fn with_categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    /// Analyze every column and derive the default visit order.
    pub fn analyze(&self, table: &Table) -> TableSchema {
        let columns: Vec<ColumnDescriptor> = table
            .columns()
            .enumerate()
            .map(|(position, (name, data))| self.analyze_column(name, position, data))
            .collect();

        let schema = TableSchema::with_columns(columns, table.n_rows());
        debug!(
            columns = schema.columns.len(),
            incomplete = schema.visit_order.len(),
            missing = schema.total_missing(),
            "analyzed missingness"
        );
        schema
    }

    /// Describe a single column.
    pub fn analyze_column(&self, name: &str, position: usize, data: &ColumnData) -> ColumnDescriptor {
        let missing_count = data.missing_count();
        let observed_count = data.len() - missing_count;
        let distinct = data.distinct_values();
        let column_type = self.infer_type(data, &distinct, observed_count);

        let mut descriptor = ColumnDescriptor::new(name, position, column_type, data.is_numeric());
        descriptor.missing_count = missing_count;
        descriptor.observed_count = observed_count;
        if column_type.is_leveled() {
            descriptor.levels = distinct;
        }
        descriptor
    }

    /// Infer the declared type from observed values.
    fn infer_type(&self, data: &ColumnData, distinct: &[Value], observed_count: usize) -> ColumnType {
        match data {
            ColumnData::Text(_) => {
                if distinct.len() == 2 {
                    ColumnType::Binary
                } else {
                    ColumnType::Categorical
                }
            }
            ColumnData::Numeric(_) => {
                if observed_count == 0 {
                    return ColumnType::Continuous;
                }
                if distinct.len() == 2 {
                    return ColumnType::Binary;
                }
                let integral = distinct
                    .iter()
                    .filter_map(Value::as_f64)
                    .all(|v| v.fract() == 0.0);
                if integral
                    && distinct.len() <= self.categorical_threshold
                    && distinct.len() * 2 < observed_count
                {
                    ColumnType::Categorical
                } else {
                    ColumnType::Continuous
                }
            }
        }
    }

    /// Replace a descriptor's inferred type with an explicit declaration.
    pub fn override_type(
        descriptor: &mut ColumnDescriptor,
        data: &ColumnData,
        column_type: ColumnType,
    ) -> Result<()> {
        match column_type {
            ColumnType::Continuous => {
                if !descriptor.numeric {
                    return Err(ImputeError::Configuration(format!(
                        "column '{}' stores text and cannot be declared continuous",
                        descriptor.name
                    )));
                }
                descriptor.levels.clear();
            }
            ColumnType::Binary | ColumnType::Categorical => {
                let levels = data.distinct_values();
                if column_type == ColumnType::Binary && levels.len() > 2 {
                    return Err(ImputeError::Configuration(format!(
                        "column '{}' has {} observed levels and cannot be declared binary",
                        descriptor.name,
                        levels.len()
                    )));
                }
                descriptor.levels = levels;
            }
        }
        descriptor.column_type = column_type;
        Ok(())
    }
}

impl Default for MissingnessAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
