//! Row parsing for delimited text
//!
//! The first line is the header; every following line is a row. Fields are
//! typed one at a time, so a column may hold mixed types. Rows with the wrong
//! number of fields are kept: missing fields become [`Scalar::Absent`] and
//! surplus fields are dropped.

pub mod infer;

use ahash::AHashMap;
use csv::ReaderBuilder;
use indexmap::IndexMap;
use tracing::{debug, warn};

use ce_core::Scalar;

use crate::config::{FieldType, ParseMode, ParseOptions};
use crate::model::RowTable;
use crate::sniff::Delimiter;
use crate::DataError;

pub use infer::{coerce_field, infer_field};

/// One row keyed by column name, in header order
pub type RowRecord = IndexMap<String, Scalar>;

/// Delimited text split into a unique header and rows exactly as wide as it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawRecords {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Split delimited text into a header and rows without typing any field.
///
/// Repeated header names become unique. Short rows are padded with empty
/// fields and surplus fields are dropped; both are logged.
pub(crate) fn read_records(text: &str, delimiter: Delimiter) -> Result<RawRecords, DataError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header_record = match records.next() {
        Some(record) => record?,
        None => return Err(DataError::format("no header line")),
    };
    let header = unique_header(header_record.iter());
    let width = header.len();

    let mut rows = Vec::new();
    let mut short_rows = 0usize;
    let mut long_rows = 0usize;

    for (line, record) in records.enumerate() {
        let record = record?;
        if record.len() != width {
            debug!(row = line, fields = record.len(), expected = width, "malformed row");
            if record.len() < width {
                short_rows += 1;
            } else {
                long_rows += 1;
            }
        }

        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if short_rows > 0 || long_rows > 0 {
        warn!(
            short_rows,
            long_rows,
            "rows with mismatched field counts were padded or truncated"
        );
    }

    Ok(RawRecords { header, rows })
}

/// Parse delimited text into a row-indexed table
pub fn parse_table(text: &str, delimiter: Delimiter, options: &ParseOptions) -> Result<RowTable, DataError> {
    let RawRecords { header, rows } = read_records(text, delimiter)?;

    let declared: Vec<Option<FieldType>> = header
        .iter()
        .map(|name| options.declared_type(name))
        .collect();
    let explicit = matches!(options.mode, ParseMode::Explicit { .. });

    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&declared)
                .map(|(raw, declared)| match (explicit, declared) {
                    (false, _) => infer_field(raw, &options.null_config),
                    (true, Some(field_type)) => coerce_field(raw, *field_type, &options.null_config),
                    (true, None) => coerce_field(raw, FieldType::String, &options.null_config),
                })
                .collect()
        })
        .collect();

    RowTable::new(header, rows)
}

/// Parse delimited text into ordered row records
pub fn parse_rows(text: &str, delimiter: Delimiter, options: &ParseOptions) -> Result<Vec<RowRecord>, DataError> {
    Ok(parse_table(text, delimiter, options)?.to_records())
}

/// Keep header names unique by suffixing repeats with `.1`, `.2`, ...
fn unique_header<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: AHashMap<String, usize> = AHashMap::new();
    let mut header = Vec::new();

    for name in names {
        let mut candidate = name.to_string();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}.{}", name, count);
        }
        if candidate != name {
            debug!(original = name, renamed = %candidate, "duplicate column name");
        }
        seen.insert(candidate.clone(), 0);
        header.push(candidate);
    }

    header
}
