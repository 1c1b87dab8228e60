//! Core functionality for the chart editor backend
//!
//! This crate provides the value model, the trace model and the abstractions
//! shared between the data layer and the editing host.

pub mod events;
pub mod state;
pub mod trace;
pub mod value;

use thiserror::Error;

// Re-export commonly used types
pub use data::{ColumnOption, ColumnProvider};
pub use state::{ChartState, EditorViewState};
pub use trace::{resolve_traces, resolve_traces_collect, ResolveError, TraceDefinition, TraceField, SOURCE_SUFFIX};
pub use value::Scalar;

/// A column name that is not part of the table header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown column '{column}'")]
pub struct UnknownColumnError {
    pub column: String,
}

impl UnknownColumnError {
    pub fn new(column: impl Into<String>) -> Self {
        Self { column: column.into() }
    }
}

pub mod data {
    use std::sync::Arc;
    use serde::{Deserialize, Serialize};
    use crate::{Scalar, UnknownColumnError};

    /// One entry of the column picker offered to the chart editor
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ColumnOption {
        pub value: String,
        pub label: String,
    }

    impl ColumnOption {
        pub fn for_column(name: &str) -> Self {
            Self {
                value: name.to_string(),
                label: name.to_string(),
            }
        }
    }

    /// Trait for anything that can hand out whole columns by name
    pub trait ColumnProvider: Send + Sync {
        /// Ordered, unique column names
        fn header(&self) -> &[String];

        /// Values of a single column
        fn column(&self, name: &str) -> Result<Arc<Vec<Scalar>>, UnknownColumnError>;

        /// Picker options, one per header entry in header order
        fn options(&self) -> Vec<ColumnOption> {
            self.header().iter().map(|name| ColumnOption::for_column(name)).collect()
        }
    }
}
