//! Row records to column-oriented sources

use serde::{Deserialize, Serialize};
use tracing::warn;

use ce_core::Scalar;

use crate::columns::ColumnSource;
use crate::parse::RowRecord;

/// How rows with missing keys are laid out in columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Append only the values a row has. Columns can end up with different
    /// lengths, and position `i` of two columns may come from different rows.
    #[default]
    Ragged,
    /// Fill missing keys with [`Scalar::Absent`] so that position `i` of
    /// every column comes from row `i`.
    Padded,
}

/// Normalize rows in first-seen column order without padding
pub fn rows_to_columns(rows: &[RowRecord]) -> ColumnSource {
    normalize_rows(rows, Alignment::Ragged)
}

/// Normalize rows into columns.
///
/// Columns appear in the order their keys are first seen. The result depends
/// only on the input rows.
pub fn normalize_rows(rows: &[RowRecord], alignment: Alignment) -> ColumnSource {
    let mut source = ColumnSource::new();

    for (row_idx, row) in rows.iter().enumerate() {
        for (key, value) in row {
            let column = source.column_mut(key);
            if alignment == Alignment::Padded {
                // Column first seen at this row: backfill earlier rows
                column.resize(row_idx, Scalar::Absent);
            }
            column.push(value.clone());
        }

        if alignment == Alignment::Padded {
            let width = row_idx + 1;
            for name in source.header() {
                let column = source.column_mut(&name);
                if column.len() < width {
                    column.resize(width, Scalar::Absent);
                }
            }
        }
    }

    if alignment == Alignment::Ragged && !source.is_rectangular() {
        warn!(
            rows = rows.len(),
            columns = source.column_count(),
            "row records have differing keys; column positions are not aligned by row"
        );
    }

    source
}
