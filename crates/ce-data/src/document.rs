//! Persisted chart documents
//!
//! A chart document stores the editor state (`data`, `layout`, `frames`) and
//! optionally the backing table under `dataSource`, so that reopening it does
//! not need the original raw file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ce_core::ChartState;

use crate::columns::ColumnSource;
use crate::raw::RawTable;
use crate::DataError;

/// MIME type of chart documents and notebook outputs
pub const MIME_TYPE: &str = "application/vnd.plotly-editor.v1+json";

/// What a file on disk holds, judged by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `.plotly` / `.plotly.json`
    Chart,
    /// `.json`: a chart document or a raw table, decided by content
    Json,
    /// `.csv`, `.tsv`, `.txt` and anything unrecognized
    Delimited,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.ends_with(".plotly") || name.ends_with(".plotly.json") {
            ContentKind::Chart
        } else if name.ends_with(".json") {
            ContentKind::Json
        } else {
            ContentKind::Delimited
        }
    }
}

/// A chart document as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChartDocument {
    #[serde(flatten)]
    pub chart: ChartState,

    /// Backing table, row- or column-oriented
    #[serde(rename = "dataSource", default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<Value>,
}

impl ChartDocument {
    pub fn new(chart: ChartState) -> Self {
        Self {
            chart,
            data_source: None,
        }
    }

    /// Whether a JSON value looks like a chart document rather than a table
    pub fn is_chart_document(value: &Value) -> bool {
        value
            .as_object()
            .map(|map| map.contains_key("data") || map.contains_key("layout"))
            .unwrap_or(false)
    }

    pub fn from_value(value: Value) -> Result<Self, DataError> {
        if !value.is_object() {
            return Err(DataError::format("chart document must be a JSON object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Extract a document from a notebook output bundle keyed by MIME type
    pub fn from_mime_bundle(bundle: &Value) -> Result<Self, DataError> {
        let payload = bundle
            .get(MIME_TYPE)
            .ok_or_else(|| DataError::format(format!("output bundle has no '{}' entry", MIME_TYPE)))?;
        Self::from_value(payload.clone())
    }

    /// The stored table, if any
    pub fn raw_table(&self) -> Option<Result<RawTable, DataError>> {
        self.data_source.as_ref().map(RawTable::from_json)
    }

    /// Store a table side by side with the chart
    pub fn set_data_source(&mut self, source: &ColumnSource) {
        self.data_source = Some(source.to_json());
    }

    pub fn to_json_string(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
