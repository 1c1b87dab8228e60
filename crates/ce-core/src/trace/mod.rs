//! Chart trace definitions
//!
//! A trace is an ordered set of fields. Each field either carries its value
//! directly or names a table column that feeds it. On disk the second form
//! follows the plotting library's convention of a sibling key ending in
//! [`SOURCE_SUFFIX`], e.g. `"xsrc": "time"` feeds `"x"`. In memory the pair is
//! folded into one [`TraceField::Sourced`] entry so that a reference can never
//! drift apart from the field it populates.

mod resolver;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use resolver::{resolve_traces, resolve_traces_collect, ResolveError};

/// Key suffix that marks a column reference in persisted traces
pub const SOURCE_SUFFIX: &str = "src";

/// A column reference together with the values it last resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedField {
    /// Persisted key holding the column name (`xsrc` for field `x`)
    pub source_key: String,
    /// Referenced column
    pub column: String,
    /// Values from the last resolution, or whatever the document carried
    pub values: Option<Value>,
}

/// A single trace field
#[derive(Debug, Clone, PartialEq)]
pub enum TraceField {
    /// Value supplied directly by the editor
    Direct(Value),
    /// Value pulled from a table column
    Sourced(SourcedField),
}

impl TraceField {
    /// Current value of the field, resolved or not
    pub fn value(&self) -> Option<&Value> {
        match self {
            TraceField::Direct(value) => Some(value),
            TraceField::Sourced(sourced) => sourced.values.as_ref(),
        }
    }

    /// Referenced column, if this field is sourced
    pub fn column(&self) -> Option<&str> {
        match self {
            TraceField::Direct(_) => None,
            TraceField::Sourced(sourced) => Some(&sourced.column),
        }
    }
}

/// One chart trace, keyed by field name in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceDefinition {
    fields: IndexMap<String, TraceField>,
}

impl TraceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a persisted JSON object using the default suffix
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self::from_map_with_suffix(map, SOURCE_SUFFIX)
    }

    /// Build from a persisted JSON object.
    ///
    /// A key `<name><suffix>` whose value is a string becomes a column
    /// reference for `<name>`, regardless of whether `<name>` appears before
    /// or after it. Any value already stored under `<name>` is kept until the
    /// next resolution overwrites it.
    pub fn from_map_with_suffix(map: Map<String, Value>, suffix: &str) -> Self {
        let mut fields: IndexMap<String, TraceField> = IndexMap::with_capacity(map.len());

        for (key, value) in map {
            let reference = match (key.strip_suffix(suffix), &value) {
                (Some(base), Value::String(column)) if !base.is_empty() && !suffix.is_empty() => {
                    Some((base.to_string(), column.clone()))
                }
                _ => None,
            };

            if let Some((base, column)) = reference {
                match fields.get_mut(&base) {
                    Some(field) => {
                        let prior = match field {
                            TraceField::Direct(prior) => Some(std::mem::take(prior)),
                            TraceField::Sourced(sourced) => sourced.values.take(),
                        };
                        *field = TraceField::Sourced(SourcedField {
                            source_key: key,
                            column,
                            values: prior,
                        });
                    }
                    None => {
                        fields.insert(
                            base,
                            TraceField::Sourced(SourcedField {
                                source_key: key,
                                column,
                                values: None,
                            }),
                        );
                    }
                }
                continue;
            }

            match fields.get_mut(&key) {
                Some(TraceField::Sourced(sourced)) => sourced.values = Some(value),
                Some(field) => *field = TraceField::Direct(value),
                None => {
                    fields.insert(key, TraceField::Direct(value));
                }
            }
        }

        Self { fields }
    }

    /// Build from a persisted JSON value; `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    /// Persisted JSON form. A sourced field emits its value key (when it has
    /// a value) immediately followed by its source key.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() * 2);
        for (name, field) in &self.fields {
            match field {
                TraceField::Direct(value) => {
                    map.insert(name.clone(), value.clone());
                }
                TraceField::Sourced(sourced) => {
                    if let Some(values) = &sourced.values {
                        map.insert(name.clone(), values.clone());
                    }
                    map.insert(sourced.source_key.clone(), Value::String(sourced.column.clone()));
                }
            }
        }
        Value::Object(map)
    }

    pub fn field(&self, name: &str) -> Option<&TraceField> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &TraceField)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut TraceField)> {
        self.fields.iter_mut()
    }

    /// `(field, column)` pairs for every column reference
    pub fn sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(name, field)| field.column().map(|column| (name.as_str(), column)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a literal value, replacing any column reference for that field
    pub fn set_direct(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), TraceField::Direct(value));
    }

    /// Point a field at a column, keeping the field's position if it exists
    pub fn set_source(&mut self, name: impl Into<String>, column: impl Into<String>) {
        let name = name.into();
        let source_key = format!("{}{}", name, SOURCE_SUFFIX);
        let prior = self.fields.get(&name).and_then(|f| f.value().cloned());
        self.fields.insert(
            name,
            TraceField::Sourced(SourcedField {
                source_key,
                column: column.into(),
                values: prior,
            }),
        );
    }

    /// Drop a column reference but keep the field's current value
    pub fn detach_source(&mut self, name: &str) -> bool {
        match self.fields.get_mut(name) {
            Some(field @ TraceField::Sourced(_)) => {
                let value = field.value().cloned().unwrap_or(Value::Null);
                *field = TraceField::Direct(value);
                true
            }
            _ => false,
        }
    }

    /// Give the trace a `uid` if it does not have one yet; returns whether one was assigned
    pub fn ensure_uid(&mut self) -> bool {
        let has_uid = matches!(
            self.fields.get("uid"),
            Some(TraceField::Direct(Value::String(uid))) if !uid.is_empty()
        );
        if has_uid {
            return false;
        }
        self.fields.insert(
            "uid".to_string(),
            TraceField::Direct(Value::String(Uuid::new_v4().to_string())),
        );
        true
    }
}

impl Serialize for TraceDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TraceDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(D::Error::custom(format!(
                "trace definition must be an object, found {}",
                other
            ))),
        }
    }
}
