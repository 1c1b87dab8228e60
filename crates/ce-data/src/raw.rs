//! Raw table content as handed over by the host

use serde_json::Value;
use tracing::{debug, info};

use ce_core::Scalar;

use crate::columns::ColumnSource;
use crate::config::LoadConfig;
use crate::model::RowTable;
use crate::normalize::normalize_rows;
use crate::parse::{parse_table, RowRecord};
use crate::sniff::{sniff_delimiter, sniff_delimiter_within, Delimiter};
use crate::DataError;

/// Tabular content in whichever shape it arrived
#[derive(Debug, Clone, PartialEq)]
pub enum RawTable {
    /// Delimited text; the delimiter is sniffed when not given
    Delimited {
        text: String,
        delimiter: Option<Delimiter>,
    },
    /// Row records, e.g. a JSON array of objects
    Rows(Vec<RowRecord>),
    /// Already column-oriented, e.g. a JSON object of arrays
    Columns(ColumnSource),
}

impl RawTable {
    pub fn delimited(text: impl Into<String>) -> Self {
        RawTable::Delimited {
            text: text.into(),
            delimiter: None,
        }
    }

    /// Interpret parsed JSON: an array of objects is rows, an object of
    /// arrays is columns. Anything else is a format error.
    pub fn from_json(value: &Value) -> Result<Self, DataError> {
        match value {
            Value::Array(items) => {
                let rows = items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| match item {
                        Value::Object(map) => Ok(map
                            .iter()
                            .map(|(k, v)| (k.clone(), Scalar::from(v)))
                            .collect::<RowRecord>()),
                        other => Err(DataError::format(format!(
                            "row {} is not an object: {}",
                            idx,
                            kind_of(other)
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RawTable::Rows(rows))
            }
            Value::Object(map) => Ok(RawTable::Columns(ColumnSource::from_json_object(map)?)),
            other => Err(DataError::format(format!(
                "expected an array of rows or an object of columns, found {}",
                kind_of(other)
            ))),
        }
    }

    /// Interpret text content: JSON when it parses as JSON, delimited
    /// otherwise. Text that opens like JSON but does not parse (a header such
    /// as `[ms],value`) is still accepted as delimited when a delimiter can be
    /// sniffed; otherwise the JSON error is returned.
    pub fn from_text(text: impl Into<String>) -> Result<Self, DataError> {
        let text = text.into();
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Self::from_json(&value),
                Err(err) => {
                    if sniff_delimiter(&text).is_err() {
                        return Err(err.into());
                    }
                    debug!(error = %err, "text is not JSON, reading it as delimited");
                }
            }
        }
        Ok(Self::delimited(text))
    }

    /// Delimiter to use: the given one, then the configured one, then sniffed
    pub fn resolve_delimiter(
        text: &str,
        delimiter: Option<Delimiter>,
        config: &LoadConfig,
    ) -> Result<Delimiter, DataError> {
        match delimiter.or(config.delimiter) {
            Some(delimiter) => Ok(delimiter),
            None => sniff_delimiter_within(text, config.sniff_prefix),
        }
    }

    /// Sniff (if needed) and parse delimited content into a row table
    pub fn parse_delimited(
        text: &str,
        delimiter: Option<Delimiter>,
        config: &LoadConfig,
    ) -> Result<RowTable, DataError> {
        let delimiter = Self::resolve_delimiter(text, delimiter, config)?;
        debug!(%delimiter, "parsing delimited text");
        parse_table(text, delimiter, &config.parse)
    }

    /// Normalize to the column-oriented form
    pub fn into_column_source(self, config: &LoadConfig) -> Result<ColumnSource, DataError> {
        let source = match self {
            RawTable::Delimited { text, delimiter } => {
                let table = Self::parse_delimited(&text, delimiter, config)?;
                normalize_rows(&table.to_records(), config.alignment)
            }
            RawTable::Rows(rows) => normalize_rows(&rows, config.alignment),
            RawTable::Columns(columns) => columns,
        };
        info!(
            columns = source.column_count(),
            rows = source.row_count(),
            "normalized table"
        );
        Ok(source)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
