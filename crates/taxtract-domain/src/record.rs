//! Extraction records

use crate::ids::{ContextId, RecordId};
use crate::schema::{FieldSpec, NOT_FOUND};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one extraction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordStatus {
    /// The model answered and the answer was validated
    Extracted,
    /// No usable answer; all fields are "NF"
    Failed {
        /// Why the record failed
        reason: String,
    },
}

/// A returned value that was not admissible for its field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Field name
    pub field: String,
    /// Value the model returned
    pub returned: String,
}

/// One validated answer for one (species, context unit) pair
///
/// Immutable once created. Manual corrections live in the verification
/// ledger, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Record identifier
    pub id: RecordId,

    /// Canonical species name
    pub species_ref: String,

    /// Originating context unit; `None` if the context could not be built
    pub context_ref: Option<ContextId>,

    /// 1-indexed page number
    pub page_number: u32,

    /// Exactly one value per declared field
    pub field_values: BTreeMap<String, String>,

    /// Extracted or failed
    pub status: RecordStatus,

    /// Raw model output, kept for inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_model_output: Option<String>,

    /// Free-form notes returned by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Inadmissible values that were replaced by "NF"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrepancies: Vec<Discrepancy>,

    /// Gateway attempts spent on the request
    pub attempts: u32,

    /// Creation time (Unix seconds)
    pub timestamp: u64,
}

impl ExtractionRecord {
    /// Build a failed record with every field set to "NF"
    pub fn failed(
        species_ref: impl Into<String>,
        context_ref: Option<ContextId>,
        page_number: u32,
        fields: &[FieldSpec],
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            species_ref: species_ref.into(),
            context_ref,
            page_number,
            field_values: not_found_values(fields),
            status: RecordStatus::Failed { reason: reason.into() },
            raw_model_output: None,
            notes: None,
            discrepancies: Vec::new(),
            attempts: 0,
            timestamp: crate::unix_now(),
        }
    }

    /// Whether the record holds a validated answer
    pub fn is_extracted(&self) -> bool {
        matches!(self.status, RecordStatus::Extracted)
    }

    /// Value of a field, if declared
    pub fn value(&self, field: &str) -> Option<&str> {
        self.field_values.get(field).map(String::as_str)
    }
}

/// Map every declared field to "NF"
pub fn not_found_values(fields: &[FieldSpec]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|f| (f.name.clone(), NOT_FOUND.to_string()))
        .collect()
}
