//! Field delimiter detection for delimited text

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::DataError;

/// Number of characters inspected when no explicit limit is configured
pub const DEFAULT_SNIFF_PREFIX: usize = 250;

/// One or more non-delimiter characters followed by a delimiter
static DELIMITER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^,\t]+([,\t])").expect("delimiter pattern is valid")
});

/// Supported field delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            ',' => Some(Delimiter::Comma),
            '\t' => Some(Delimiter::Tab),
            _ => None,
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => f.write_str("comma"),
            Delimiter::Tab => f.write_str("tab"),
        }
    }
}

/// Guess the delimiter from the first line of `text`, looking at no more
/// than [`DEFAULT_SNIFF_PREFIX`] characters.
pub fn sniff_delimiter(text: &str) -> Result<Delimiter, DataError> {
    sniff_delimiter_within(text, DEFAULT_SNIFF_PREFIX)
}

/// Guess the delimiter from the first line of `text`, looking at no more
/// than `prefix_chars` characters.
///
/// Single-column text has no delimiter and is rejected rather than parsed
/// as one bogus column.
pub fn sniff_delimiter_within(text: &str, prefix_chars: usize) -> Result<Delimiter, DataError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let end = text
        .char_indices()
        .nth(prefix_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let first_line = text[..end].lines().next().unwrap_or("");

    DELIMITER_PATTERN
        .captures(first_line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .and_then(Delimiter::from_char)
        .ok_or_else(|| {
            DataError::format(format!(
                "no comma or tab delimiter found in the first line ({:?})",
                truncate(first_line, 40)
            ))
        })
}

fn truncate(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
