//! Per-column missingness descriptor.

use serde::{Deserialize, Serialize};

use crate::table::Value;

use super::types::ColumnType;

/// Everything the engine needs to know about one column before a chain runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Zero-based position in the table.
    pub position: usize,
    /// Declared (inferred or overridden) type.
    pub column_type: ColumnType,
    /// Whether the column stores numbers.
    pub numeric: bool,
    /// Number of missing cells.
    pub missing_count: usize,
    /// Number of observed cells.
    pub observed_count: usize,
    /// Sorted distinct observed values for binary/categorical columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<Value>,
    /// Strategy name bound during configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Resolved predictor columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predictors: Vec<String>,
}

impl ColumnDescriptor {
    /// Create a descriptor with counts only.
    pub fn new(
        name: impl Into<String>,
        position: usize,
        column_type: ColumnType,
        numeric: bool,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            column_type,
            numeric,
            missing_count: 0,
            observed_count: 0,
            levels: Vec::new(),
            strategy: None,
            predictors: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_count == 0
    }

    /// No observed values at all.
    pub fn is_fully_missing(&self) -> bool {
        self.observed_count == 0
    }

    /// Get the missing percentage.
    pub fn missing_percentage(&self) -> f64 {
        let total = self.missing_count + self.observed_count;
        if total == 0 {
            0.0
        } else {
            (self.missing_count as f64 / total as f64) * 100.0
        }
    }

    /// Code of a level, if the value is one of the observed levels.
    pub fn level_code(&self, value: &Value) -> Option<usize> {
        self.levels
            .iter()
            .position(|l| l.total_cmp(value) == std::cmp::Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_percentage() {
        let mut d = ColumnDescriptor::new("age", 0, ColumnType::Continuous, true);
        d.missing_count = 1;
        d.observed_count = 3;
        assert_eq!(d.missing_percentage(), 25.0);
        assert!(!d.is_complete());
        assert!(!d.is_fully_missing());
    }

    #[test]
    fn test_level_code() {
        let mut d = ColumnDescriptor::new("sex", 1, ColumnType::Binary, false);
        d.levels = vec![Value::from("F"), Value::from("M")];
        assert_eq!(d.level_code(&Value::from("M")), Some(1));
        assert_eq!(d.level_code(&Value::from("X")), None);
    }
}
