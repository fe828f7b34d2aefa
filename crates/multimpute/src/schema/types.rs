//! Core type definitions for schema representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared statistical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Real-valued measurements.
    Continuous,
    /// Exactly two levels.
    Binary,
    /// Unordered levels (text or low-cardinality integers).
    Categorical,
}

impl ColumnType {
    /// Returns true if values are drawn from a finite set of levels.
    pub fn is_leveled(&self) -> bool {
        matches!(self, ColumnType::Binary | ColumnType::Categorical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Continuous => "continuous",
            ColumnType::Binary => "binary",
            ColumnType::Categorical => "categorical",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continuous" | "numeric" => Ok(ColumnType::Continuous),
            "binary" => Ok(ColumnType::Binary),
            "categorical" | "multinomial" => Ok(ColumnType::Categorical),
            other => Err(format!("Unknown column type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_type() {
        assert_eq!("Binary".parse::<ColumnType>(), Ok(ColumnType::Binary));
        assert_eq!(
            "multinomial".parse::<ColumnType>(),
            Ok(ColumnType::Categorical)
        );
        assert!("ordinal".parse::<ColumnType>().is_err());
    }
}
