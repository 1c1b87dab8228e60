//! Row-indexed table models
//!
//! Large delimited files are kept in row form and only split into columns
//! on demand. A [`RowModel`] gives the registry random access to cells
//! without committing to a storage layout.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::*;
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::{
    date32_to_datetime, date64_to_datetime, timestamp_ms_to_datetime, timestamp_ns_to_datetime,
    timestamp_s_to_datetime, timestamp_us_to_datetime,
};
use csv::WriterBuilder;
use tracing::info;

use ce_core::Scalar;

use crate::config::NullConfig;
use crate::parse::{read_records, RawRecords, RowRecord};
use crate::sniff::Delimiter;
use crate::DataError;

/// Rows sampled by Arrow when inferring a CSV schema
const ARROW_SCHEMA_SAMPLE_ROWS: usize = 5000;

/// Random access to a table stored row by row
pub trait RowModel: Send + Sync {
    /// Ordered, unique column names
    fn header(&self) -> &[String];

    /// Number of data rows
    fn row_count(&self) -> usize;

    /// Cell at `(row, column)`. Out-of-range positions read as absent.
    fn cell(&self, row: usize, column: usize) -> Scalar;

    fn column_count(&self) -> usize {
        self.header().len()
    }
}

/// Parsed delimited text, kept row-indexed
#[derive(Debug, Clone, PartialEq)]
pub struct RowTable {
    header: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl RowTable {
    /// Every row must be exactly as wide as the header
    pub fn new(header: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self, DataError> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != header.len()) {
            return Err(DataError::format(format!(
                "row {} has {} cells, header has {}",
                idx,
                row.len(),
                header.len()
            )));
        }
        Ok(Self { header, rows })
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Row records keyed by header name
    pub fn to_records(&self) -> Vec<RowRecord> {
        self.rows
            .iter()
            .map(|row| self.header.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

impl RowModel for RowTable {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: usize) -> Scalar {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or(Scalar::Absent)
    }
}

/// A table held in an Arrow record batch
#[derive(Debug, Clone)]
pub struct ArrowRowModel {
    header: Vec<String>,
    batch: RecordBatch,
}

impl ArrowRowModel {
    pub fn new(batch: RecordBatch) -> Self {
        let header = batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        Self { header, batch }
    }

    /// Read delimited text with Arrow's CSV reader and schema inference.
    ///
    /// Rows go through the same recovery as the row parser first: repeated
    /// header names are made unique and every row is padded or truncated to
    /// the header width. Fields matching `nulls` (and padded fields) load as
    /// nulls, so they read back as absent.
    pub fn from_csv(text: &str, delimiter: Delimiter, nulls: &NullConfig) -> Result<Self, DataError> {
        let records = read_records(text, delimiter)?;
        let rectangular = write_records(&records, delimiter)?;
        let null_regex = nulls
            .to_regex()
            .map_err(|e| DataError::format(format!("invalid null pattern: {}", e)))?;

        let format = Format::default()
            .with_header(true)
            .with_delimiter(delimiter.as_byte())
            .with_null_regex(null_regex);
        let (schema, sampled) = format.infer_schema(Cursor::new(rectangular.as_slice()), Some(ARROW_SCHEMA_SAMPLE_ROWS))?;
        let schema = Arc::new(schema);

        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(Cursor::new(rectangular.as_slice()))?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;

        info!(rows = batch.num_rows(), columns = batch.num_columns(), sampled, "loaded CSV into Arrow");
        Ok(Self::new(batch))
    }
}

fn write_records(records: &RawRecords, delimiter: Delimiter) -> Result<Vec<u8>, DataError> {
    let mut buffer = Vec::new();
    {
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(&mut buffer);
        writer.write_record(&records.header)?;
        for row in &records.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

impl RowModel for ArrowRowModel {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    fn cell(&self, row: usize, column: usize) -> Scalar {
        if row >= self.batch.num_rows() || column >= self.batch.num_columns() {
            return Scalar::Absent;
        }
        array_cell(self.batch.column(column).as_ref(), row)
    }
}

fn array_cell(array: &dyn Array, row: usize) -> Scalar {
    if array.is_null(row) {
        return Scalar::Absent;
    }

    let any = array.as_any();
    let cell = match array.data_type() {
        DataType::Boolean => any.downcast_ref::<BooleanArray>().map(|a| Scalar::Bool(a.value(row))),
        DataType::Int8 => any.downcast_ref::<Int8Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::Int16 => any.downcast_ref::<Int16Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| Scalar::Int(a.value(row))),
        DataType::UInt8 => any.downcast_ref::<UInt8Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::UInt16 => any.downcast_ref::<UInt16Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::UInt32 => any.downcast_ref::<UInt32Array>().map(|a| Scalar::Int(a.value(row) as i64)),
        DataType::UInt64 => any.downcast_ref::<UInt64Array>().map(|a| {
            let v = a.value(row);
            i64::try_from(v).map(Scalar::Int).unwrap_or(Scalar::Number(v as f64))
        }),
        DataType::Float32 => any.downcast_ref::<Float32Array>().map(|a| Scalar::Number(a.value(row) as f64)),
        DataType::Float64 => any.downcast_ref::<Float64Array>().map(|a| Scalar::Number(a.value(row))),
        DataType::Utf8 => any.downcast_ref::<StringArray>().map(|a| Scalar::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| Scalar::Text(a.value(row).to_string())),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| date32_to_datetime(a.value(row)))
            .map(Scalar::Date),
        DataType::Date64 => any
            .downcast_ref::<Date64Array>()
            .and_then(|a| date64_to_datetime(a.value(row)))
            .map(Scalar::Date),
        DataType::Timestamp(unit, _) => timestamp_cell(any, unit, row),
        _ => None,
    };

    // Types without a natural scalar form fall back to their display string
    cell.unwrap_or_else(|| {
        arrow::util::display::array_value_to_string(array, row)
            .map(Scalar::Text)
            .unwrap_or(Scalar::Absent)
    })
}

fn timestamp_cell(any: &dyn std::any::Any, unit: &TimeUnit, row: usize) -> Option<Scalar> {
    let datetime = match unit {
        TimeUnit::Second => any
            .downcast_ref::<TimestampSecondArray>()
            .and_then(|a| timestamp_s_to_datetime(a.value(row))),
        TimeUnit::Millisecond => any
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|a| timestamp_ms_to_datetime(a.value(row))),
        TimeUnit::Microsecond => any
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|a| timestamp_us_to_datetime(a.value(row))),
        TimeUnit::Nanosecond => any
            .downcast_ref::<TimestampNanosecondArray>()
            .and_then(|a| timestamp_ns_to_datetime(a.value(row))),
    };
    datetime.map(Scalar::Date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("score", DataType::Float64, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("day", DataType::Date32, true),
        ]));

        let mut ids = Int64Builder::new();
        let mut scores = Float64Builder::new();
        let mut names = StringBuilder::new();
        let mut days = Date32Builder::new();
        for i in 0..3i64 {
            ids.append_value(i);
            if i == 1 {
                scores.append_null();
            } else {
                scores.append_value(i as f64 * 1.5);
            }
            names.append_value(format!("n{}", i));
            days.append_value(19_000 + i as i32);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(ids.finish()),
            Arc::new(scores.finish()),
            Arc::new(names.finish()),
            Arc::new(days.finish()),
        ];
        RecordBatch::try_new(schema, columns).unwrap()
    }

    #[test]
    fn test_row_table_rejects_ragged_rows() {
        let err = RowTable::new(vec!["a".into(), "b".into()], vec![vec![Scalar::Int(1)]]).unwrap_err();
        assert!(matches!(err, DataError::Format(_)));
    }

    #[test]
    fn test_row_table_cells() {
        let table = RowTable::new(vec!["a".into()], vec![vec![Scalar::Int(1)], vec![Scalar::Int(2)]]).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 0), Scalar::Int(2));
        assert_eq!(table.cell(5, 0), Scalar::Absent);
        assert_eq!(table.to_records()[0]["a"], Scalar::Int(1));
    }

    #[test]
    fn test_arrow_cells() {
        let model = ArrowRowModel::new(sample_batch());

        assert_eq!(model.header(), &["id", "score", "name", "day"].map(String::from));
        assert_eq!(model.row_count(), 3);
        assert_eq!(model.cell(2, 0), Scalar::Int(2));
        assert_eq!(model.cell(0, 1), Scalar::Number(0.0));
        assert_eq!(model.cell(1, 1), Scalar::Absent);
        assert_eq!(model.cell(2, 2), Scalar::Text("n2".into()));
        assert_eq!(model.cell(0, 3).to_json(), serde_json::json!("2022-01-08"));
        assert_eq!(model.cell(0, 9), Scalar::Absent);
    }

    #[test]
    fn test_arrow_from_csv() {
        let model = ArrowRowModel::from_csv("x\ty\n1\t0.5\n2\t1.5\n", Delimiter::Tab, &NullConfig::default()).unwrap();

        assert_eq!(model.header(), &["x", "y"].map(String::from));
        assert_eq!(model.row_count(), 2);
        assert_eq!(model.cell(1, 0), Scalar::Int(2));
        assert_eq!(model.cell(1, 1), Scalar::Number(1.5));
    }

    #[test]
    fn test_arrow_from_csv_recovers_malformed_rows() {
        let text = "a,b,a\n1,2,3\n4\n5,6,7,8\n";
        let model = ArrowRowModel::from_csv(text, Delimiter::Comma, &NullConfig::default()).unwrap();

        assert_eq!(model.header(), &["a", "b", "a.1"].map(String::from));
        assert_eq!(model.row_count(), 3);
        assert_eq!(model.cell(1, 0), Scalar::Int(4));
        assert_eq!(model.cell(1, 1), Scalar::Absent);
        assert_eq!(model.cell(1, 2), Scalar::Absent);
        assert_eq!(model.cell(2, 2), Scalar::Int(7));
    }

    #[test]
    fn test_arrow_from_csv_null_tokens() {
        let text = "v,w\n1,x\nNA,y\n3,null\n";

        let model = ArrowRowModel::from_csv(text, Delimiter::Comma, &NullConfig::default()).unwrap();
        assert_eq!(model.cell(0, 0), Scalar::Int(1));
        assert_eq!(model.cell(1, 0), Scalar::Absent);
        assert_eq!(model.cell(2, 1), Scalar::Absent);

        let model = ArrowRowModel::from_csv(text, Delimiter::Comma, &NullConfig::empty_only()).unwrap();
        assert_eq!(model.cell(1, 0), Scalar::Text("NA".into()));
        assert_eq!(model.cell(2, 1), Scalar::Text("null".into()));
    }
}
