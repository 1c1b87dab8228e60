//! Per-field typing of raw delimited values

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use ce_core::Scalar;

use crate::config::{FieldType, NullConfig};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Type a field by trying boolean, integer, number and date literals in that
/// order, falling back to the raw string.
pub fn infer_field(raw: &str, nulls: &NullConfig) -> Scalar {
    if nulls.is_null(raw) {
        return Scalar::Absent;
    }

    let value = raw.trim();
    parse_bool_literal(value)
        .map(Scalar::Bool)
        .or_else(|| value.parse::<i64>().ok().map(Scalar::Int))
        .or_else(|| parse_number(value).map(Scalar::Number))
        .or_else(|| parse_date(value).map(Scalar::Date))
        .unwrap_or_else(|| Scalar::Text(raw.to_string()))
}

/// Type a field with a declared type. Values that do not fit become absent.
pub fn coerce_field(raw: &str, field_type: FieldType, nulls: &NullConfig) -> Scalar {
    if nulls.is_null(raw) {
        return Scalar::Absent;
    }

    let value = raw.trim();
    let typed = match field_type {
        FieldType::Boolean => parse_bool_loose(value).map(Scalar::Bool),
        FieldType::Integer => value.parse::<i64>().ok().map(Scalar::Int),
        FieldType::Number => parse_number(value).map(Scalar::Number),
        FieldType::Date => parse_date(value).map(Scalar::Date),
        FieldType::String => Some(Scalar::Text(raw.to_string())),
    };
    typed.unwrap_or(Scalar::Absent)
}

fn parse_bool_literal(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Declared boolean columns also accept numeric and yes/no spellings
fn parse_bool_loose(value: &str) -> Option<bool> {
    parse_bool_literal(value).or_else(|| match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "y" => Some(true),
        "0" | "no" | "n" => Some(false),
        _ => None,
    })
}

/// Finite decimal literals only; `inf` and `NaN` stay strings
fn parse_number(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDateTime> {
    // Cheap reject before trying every format
    if value.len() < 8 || !value.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
