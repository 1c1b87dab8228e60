//! Column-oriented data sources

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use ce_core::Scalar;

use crate::parse::RowRecord;
use crate::DataError;

/// Column name to ordered values, in header order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSource {
    columns: IndexMap<String, Vec<Scalar>>,
}

impl ColumnSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered column names
    pub fn header(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&[Scalar]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Values for `name`, creating an empty column on first sight
    pub fn column_mut(&mut self, name: &str) -> &mut Vec<Scalar> {
        if let Some(idx) = self.columns.get_index_of(name) {
            return &mut self.columns[idx];
        }
        self.columns.entry(name.to_string()).or_default()
    }

    /// Insert or replace a whole column, keeping its header position
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Scalar>) {
        self.columns.insert(name.into(), values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Scalar])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Length of the longest column
    pub fn row_count(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether every column has the same length
    pub fn is_rectangular(&self) -> bool {
        let mut lengths = self.columns.values().map(Vec::len);
        match lengths.next() {
            Some(first) => lengths.all(|len| len == first),
            None => true,
        }
    }

    /// Consume into the underlying ordered map
    pub fn into_columns(self) -> IndexMap<String, Vec<Scalar>> {
        self.columns
    }

    /// Expand back into rows, one record per position up to the longest
    /// column. Columns shorter than a position are left out of that record.
    pub fn to_rows(&self) -> Vec<RowRecord> {
        (0..self.row_count())
            .map(|idx| {
                self.columns
                    .iter()
                    .filter_map(|(name, values)| values.get(idx).map(|v| (name.clone(), v.clone())))
                    .collect()
            })
            .collect()
    }

    /// Build from a JSON object of arrays (`{"a": [1, 2], "b": [3, 4]}`)
    pub fn from_json_object(map: &Map<String, Value>) -> Result<Self, DataError> {
        let mut source = Self::new();
        for (name, values) in map {
            let Value::Array(values) = values else {
                return Err(DataError::format(format!("column '{}' is not an array", name)));
            };
            source.insert(name.clone(), values.iter().map(Scalar::from).collect());
        }
        Ok(source)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl FromIterator<(String, Vec<Scalar>)> for ColumnSource {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Scalar>)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl Serialize for ColumnSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}
