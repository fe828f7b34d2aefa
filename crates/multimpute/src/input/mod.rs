//! Reading and writing delimited tables.

mod parser;
mod source;
mod writer;

pub use parser::{is_null_value, Parser, ParserConfig};
pub use source::SourceMetadata;
pub use writer::TableWriter;
