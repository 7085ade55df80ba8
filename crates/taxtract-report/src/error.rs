//! Error types for the report layer

use taxtract_domain::{RecordId, VerificationStatus};
use thiserror::Error;

/// Verification ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No record with this id in the run
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordId),

    /// The record was already confirmed or corrected
    #[error("Record {record} is already {status:?}; verification decisions are final")]
    AlreadyFinal {
        /// Record id
        record: RecordId,
        /// Current terminal status
        status: VerificationStatus,
    },

    /// The correction does not fit the schema
    #[error("Invalid correction: {0}")]
    InvalidCorrection(String),
}

/// Report loading, saving and lookup errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// File I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The file was written by an incompatible version
    #[error("Unsupported report format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// No record matches the given id or prefix
    #[error("No record matches '{0}'")]
    RecordNotFound(String),

    /// More than one record matches the given prefix
    #[error("Record prefix '{0}' is ambiguous")]
    AmbiguousRecord(String),

    /// Verification failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
