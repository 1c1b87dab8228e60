//! Tabular data sources for the chart editor
//!
//! Raw content (delimited text, JSON rows or JSON columns) is normalized into
//! a column-oriented source and served to trace resolution through
//! [`ColumnRegistry`].

pub mod columns;
pub mod config;
pub mod document;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod raw;
pub mod registry;
pub mod session;
pub mod sniff;

use arrow::error::ArrowError;
use thiserror::Error;

use ce_core::{ResolveError, UnknownColumnError};

// Re-exports
pub use columns::ColumnSource;
pub use config::{FieldType, LoadConfig, NullConfig, ParseMode, ParseOptions, TableBacking};
pub use document::ChartDocument;
pub use model::{ArrowRowModel, RowModel, RowTable};
pub use normalize::{normalize_rows, rows_to_columns, Alignment};
pub use parse::{parse_rows, parse_table, RowRecord};
pub use raw::RawTable;
pub use registry::ColumnRegistry;
pub use session::{EditorSession, PlotPayload, UnknownColumnPolicy};
pub use sniff::{sniff_delimiter, Delimiter};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error(transparent)]
    UnknownColumn(#[from] UnknownColumnError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("No table is loaded")]
    NoTable,

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(ArrowError),

    #[error("Other error: {0}")]
    Other(String),
}

impl DataError {
    pub fn format(message: impl Into<String>) -> Self {
        DataError::Format(message.into())
    }
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<ArrowError> for DataError {
    fn from(error: ArrowError) -> Self {
        DataError::Arrow(error)
    }
}
