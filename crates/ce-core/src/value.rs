//! Scalar cell values shared by tables and traces

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A single table cell.
///
/// `Absent` marks a missing or null cell. It is kept explicit so that short
/// rows and null tokens never shift positional alignment between columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Absent,
    Bool(bool),
    Int(i64),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl Scalar {
    /// Convert into the JSON form handed to the plotting renderer
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Absent => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            // Non-finite numbers have no JSON form
            Scalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Date(d) => Value::String(format_date(d)),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Dates render the way plotting libraries accept them: a bare day when the
/// time part is midnight, otherwise a space separated timestamp.
fn format_date(value: &NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else if value.nanosecond() == 0 {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Absent => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Date(d) => f.write_str(&format_date(d)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Absent,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Absent),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Scalar::Text(s),
            other => Scalar::from(&other),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Render a column of cells as a JSON array
pub fn scalars_to_json(values: &[Scalar]) -> Value {
    Value::Array(values.iter().map(Scalar::to_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        assert_eq!(Scalar::from(&json!(null)), Scalar::Absent);
        assert_eq!(Scalar::from(&json!(3)), Scalar::Int(3));
        assert_eq!(Scalar::from(&json!(2.5)), Scalar::Number(2.5));
        assert_eq!(Scalar::from(&json!("a")), Scalar::Text("a".into()));
        assert_eq!(Scalar::from(&json!([1, 2])), Scalar::Text("[1,2]".into()));
    }

    #[test]
    fn test_date_rendering() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let midnight = Scalar::Date(day.and_hms_opt(0, 0, 0).unwrap());
        let afternoon = Scalar::Date(day.and_hms_opt(13, 5, 9).unwrap());

        assert_eq!(midnight.to_json(), json!("2024-03-01"));
        assert_eq!(afternoon.to_json(), json!("2024-03-01 13:05:09"));
    }

    #[test]
    fn test_non_finite_number_is_null() {
        assert_eq!(Scalar::Number(f64::NAN).to_json(), Value::Null);
        assert_eq!(scalars_to_json(&[Scalar::Int(1), Scalar::Absent]), json!([1, null]));
    }
}
