//! Schema types describing a table's missingness before imputation.

mod column;
mod table;
mod types;

pub use column::ColumnDescriptor;
pub use table::TableSchema;
pub use types::ColumnType;
