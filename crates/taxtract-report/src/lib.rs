//! Taxtract Reporting
//!
//! Result aggregation, the run report, the manual verification ledger and
//! automated comparison checks.

#![warn(missing_docs)]

pub mod aggregator;
pub mod comparison;
pub mod error;
pub mod ledger;
pub mod report;

pub use aggregator::ResultAggregator;
pub use comparison::{compare_value, compare_values, AutoCheck, CheckOutcome, FieldCheck};
pub use error::{LedgerError, ReportError};
pub use ledger::VerificationLedger;
pub use report::{
    ErrorEntry, RecordView, RejectedName, ReportHeader, RunReport, RunStats, RunStatus, Stage, REPORT_FORMAT_VERSION,
};
