//! Automated re-extraction checks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taxtract_domain::{RecordId, NOT_FOUND};

/// Comparison result for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Found value equals the expected one (case-insensitive)
    Match,
    /// Found value differs
    Mismatch,
    /// The re-extraction returned "NF" where a value was expected
    NotFound,
}

/// One field of an automated check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCheck {
    /// Field name
    pub field: String,
    /// Value under test
    pub expected: String,
    /// Value found by the re-extraction
    pub found: String,
    /// Outcome
    pub outcome: CheckOutcome,
}

/// Automated verification of one record
///
/// Kept beside the verification ledger; never changes a record's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCheck {
    /// Record that was checked
    pub record_ref: RecordId,
    /// Per-field comparison, empty if the check could not run
    pub fields: Vec<FieldCheck>,
    /// Every field matched
    pub overall_match: bool,
    /// Why the check could not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Notes from the re-extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Check time (Unix seconds)
    pub checked_at: u64,
}

impl AutoCheck {
    /// A check that could not be carried out
    pub fn failed(record_ref: RecordId, error: impl Into<String>) -> Self {
        Self {
            record_ref,
            fields: Vec::new(),
            overall_match: false,
            error: Some(error.into()),
            notes: None,
            checked_at: taxtract_domain::unix_now(),
        }
    }
}

/// Compare one value pair
pub fn compare_value(expected: &str, found: &str) -> CheckOutcome {
    if found.trim().to_lowercase() == expected.trim().to_lowercase() {
        CheckOutcome::Match
    } else if found.trim().eq_ignore_ascii_case(NOT_FOUND) {
        CheckOutcome::NotFound
    } else {
        CheckOutcome::Mismatch
    }
}

/// Compare every expected field; missing found values count as "NF"
pub fn compare_values(
    expected: &BTreeMap<String, String>,
    found: &BTreeMap<String, String>,
) -> (Vec<FieldCheck>, bool) {
    let checks: Vec<FieldCheck> = expected
        .iter()
        .map(|(field, expected_value)| {
            let found_value = found.get(field).map(String::as_str).unwrap_or(NOT_FOUND);
            FieldCheck {
                field: field.clone(),
                expected: expected_value.clone(),
                found: found_value.to_string(),
                outcome: compare_value(expected_value, found_value),
            }
        })
        .collect();
    let overall = checks.iter().all(|c| c.outcome == CheckOutcome::Match);
    (checks, overall)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_value() {
        assert_eq!(compare_value("Forest", "forest"), CheckOutcome::Match);
        assert_eq!(compare_value("NF", "nf"), CheckOutcome::Match);
        assert_eq!(compare_value("Forest", "NF"), CheckOutcome::NotFound);
        assert_eq!(compare_value("Forest", "Wetland"), CheckOutcome::Mismatch);
    }

    #[test]
    fn test_compare_values_overall() {
        let expected = BTreeMap::from([
            ("habitat".to_string(), "Forest".to_string()),
            ("diet".to_string(), "insects".to_string()),
        ]);
        let found = BTreeMap::from([("habitat".to_string(), "FOREST".to_string())]);

        let (checks, overall) = compare_values(&expected, &found);

        assert!(!overall);
        let diet = checks.iter().find(|c| c.field == "diet").unwrap();
        assert_eq!(diet.found, "NF");
        assert_eq!(diet.outcome, CheckOutcome::NotFound);

        let (_, overall) = compare_values(&expected, &expected);
        assert!(overall);
    }
}
