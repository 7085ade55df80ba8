//! User-defined extraction fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel value for a field the model could not determine
pub const NOT_FOUND: &str = "NF";

/// One field to extract per species
///
/// An empty `validation_values` list means free text. For enumerated fields
/// the sentinel [`NOT_FOUND`] is always admissible in addition to the declared
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Unique field key
    pub name: String,

    /// What the model should look for
    #[serde(default)]
    pub description: String,

    /// Ordered admissible values; empty for free text
    #[serde(default)]
    pub validation_values: Vec<String>,
}

impl FieldSpec {
    /// Create a free-text field
    pub fn free_text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            validation_values: Vec::new(),
        }
    }

    /// Create an enumerated field
    pub fn enumerated<I, S>(name: impl Into<String>, description: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            validation_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the field restricts its values
    pub fn is_enumerated(&self) -> bool {
        !self.validation_values.is_empty()
    }

    /// Declared spelling of `value`, matched case-insensitively
    ///
    /// Returns `None` for values that are not admissible. Free-text fields
    /// accept any non-blank value (returned trimmed).
    pub fn canonical_value<'a>(&'a self, value: &'a str) -> Option<&'a str> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.eq_ignore_ascii_case(NOT_FOUND) {
            return Some(NOT_FOUND);
        }
        if !self.is_enumerated() {
            return Some(value);
        }
        let lowered = value.to_lowercase();
        self.validation_values
            .iter()
            .find(|v| v.to_lowercase() == lowered)
            .map(String::as_str)
    }

    /// Whether `value` is admissible for this field
    pub fn accepts(&self, value: &str) -> bool {
        self.canonical_value(value).is_some()
    }
}

/// A few-shot example rendered into extraction prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExample {
    /// Example input text
    pub input: String,

    /// Expected field values for the input
    pub output: BTreeMap<String, String>,

    /// Optional explanation of why the output is correct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn habitat() -> FieldSpec {
        FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"])
    }

    #[test]
    fn test_enum_match_is_case_insensitive() {
        let field = habitat();
        assert_eq!(field.canonical_value("forest"), Some("Forest"));
        assert_eq!(field.canonical_value("  WETLAND "), Some("Wetland"));
        assert_eq!(field.canonical_value("Desert"), None);
    }

    #[test]
    fn test_not_found_is_always_admissible() {
        assert!(habitat().accepts("NF"));
        assert!(habitat().accepts("nf"));
        assert!(FieldSpec::free_text("diet", "").accepts("NF"));
    }

    #[test]
    fn test_free_text_trims() {
        let field = FieldSpec::free_text("diet", "What it eats");
        assert_eq!(field.canonical_value("  insects "), Some("insects"));
        assert_eq!(field.canonical_value("   "), None);
    }
}
