//! Manual verification overlay

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Review status of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Not reviewed yet
    #[default]
    Unconfirmed,
    /// Reviewer accepted the extracted values
    Confirmed,
    /// Reviewer replaced some values
    Corrected,
}

impl VerificationStatus {
    /// Confirmed and corrected are final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Unconfirmed)
    }
}

/// Review state attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationState {
    /// Record under review
    pub record_ref: RecordId,

    /// Current status
    pub status: VerificationStatus,

    /// Corrected field values, when status is `Corrected`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_values: Option<BTreeMap<String, String>>,

    /// Last transition (Unix seconds)
    pub updated_at: u64,
}

impl VerificationState {
    /// Initial state for a fresh record
    pub fn unconfirmed(record_ref: RecordId) -> Self {
        Self {
            record_ref,
            status: VerificationStatus::Unconfirmed,
            corrected_values: None,
            updated_at: crate::unix_now(),
        }
    }
}
