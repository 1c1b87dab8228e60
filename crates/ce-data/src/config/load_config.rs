//! Configuration for loading tabular content

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;
use crate::normalize::Alignment;
use crate::sniff::{Delimiter, DEFAULT_SNIFF_PREFIX};
use crate::DataError;

/// Declared type for a column in explicit parse mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Integer,
    Number,
    Date,
    String,
}

/// How field values are typed while parsing delimited text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParseMode {
    /// Infer each field independently
    #[default]
    Auto,
    /// Use declared types; unlisted columns are kept as strings
    Explicit { types: HashMap<String, FieldType> },
}

/// Row storage behind delimited tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableBacking {
    /// Rows typed field by field with the configured parse options
    #[default]
    Rows,
    /// An Arrow record batch with a schema inferred per column. Honors the
    /// null tokens but not explicit parse mode.
    Arrow,
}

/// Options for the row parser
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParseOptions {
    pub mode: ParseMode,

    /// Tokens that parse to the absent marker
    pub null_config: NullConfig,
}

impl ParseOptions {
    /// Explicit mode with the given column types
    pub fn explicit<I, K>(types: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldType)>,
        K: Into<String>,
    {
        Self {
            mode: ParseMode::Explicit {
                types: types.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            },
            null_config: NullConfig::default(),
        }
    }

    /// Declared type for a column, if explicit mode lists it
    pub fn declared_type(&self, column: &str) -> Option<FieldType> {
        match &self.mode {
            ParseMode::Auto => None,
            ParseMode::Explicit { types } => types.get(column).copied(),
        }
    }
}

/// Configuration for turning raw content into a column registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Characters of the first line inspected when sniffing the delimiter
    pub sniff_prefix: usize,

    /// Skip sniffing and use this delimiter
    pub delimiter: Option<Delimiter>,

    /// Row parser options
    pub parse: ParseOptions,

    /// Delimited tables with more rows than this are served lazily
    pub lazy_row_threshold: usize,

    /// How row records with missing keys become columns
    pub alignment: Alignment,

    /// Storage used for delimited tables
    pub backing: TableBacking,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            sniff_prefix: DEFAULT_SNIFF_PREFIX,
            delimiter: None,
            parse: ParseOptions::default(),
            lazy_row_threshold: 50_000,
            alignment: Alignment::default(),
            backing: TableBacking::default(),
        }
    }
}

impl LoadConfig {
    /// Read a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declared type for a column, if explicit mode lists it
    pub fn declared_type(&self, column: &str) -> Option<FieldType> {
        self.parse.declared_type(column)
    }
}
