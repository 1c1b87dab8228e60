//! Null token handling for delimited text

use regex::Regex;
use serde::{Serialize, Deserialize};

/// Null token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Tokens that parse to the absent marker
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "NA".to_string(),
                "N/A".to_string(),
                "null".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Only the empty field counts as null
    pub fn empty_only() -> Self {
        Self {
            patterns: vec![String::new()],
            ..Self::default()
        }
    }

    /// Check if a raw field should parse to the absent marker
    pub fn is_null(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace {
            value.trim()
        } else {
            value
        };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// The same tokens as one anchored regex, for readers that take a null
    /// pattern instead of a predicate. The empty field always matches.
    pub fn to_regex(&self) -> Result<Regex, regex::Error> {
        let mut alternatives: Vec<String> = self.patterns.iter().map(|p| regex::escape(p)).collect();
        if !self.patterns.iter().any(String::is_empty) {
            alternatives.push(String::new());
        }

        let flags = if self.case_sensitive { "" } else { "(?i)" };
        let pattern = if self.trim_whitespace {
            format!(r"{}^\s*(?:{})\s*$", flags, alternatives.join("|"))
        } else {
            format!("{}^(?:{})$", flags, alternatives.join("|"))
        };
        Regex::new(&pattern)
    }

    /// Add a null pattern
    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}
