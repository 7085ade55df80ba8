//! The run report
//!
//! A self-contained, serializable record of one run: configuration snapshot,
//! species list, context units, extraction records, verification overlay,
//! statistics and error log. It is the durable artifact of a run and the
//! input of every review command.

use crate::comparison::AutoCheck;
use crate::error::ReportError;
use crate::ledger::VerificationLedger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use taxtract_domain::{
    CanonicalSpecies, ContextId, ContextUnit, ExtractionRecord, FieldSpec, RecordId, RunId, VerificationState,
};
use tracing::info;

/// Format version written by this build
pub const REPORT_FORMAT_VERSION: u32 = 1;

/// Whether the run processed everything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every context unit was processed
    Complete,
    /// The run stopped early; records present are still valid
    Incomplete {
        /// Why the run stopped
        reason: String,
    },
}

/// Pipeline stage an error entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Field definition checks
    Schema,
    /// Name normalization and hierarchy resolution
    Resolution,
    /// Taxonomic filter lookups
    Filter,
    /// Context building
    Context,
    /// Model calls
    Llm,
    /// Response validation
    Validation,
    /// Automated verification
    Audit,
}

/// One entry of the error log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// When it happened (Unix seconds)
    pub timestamp: u64,
    /// Stage
    pub stage: Stage,
    /// Affected species, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    /// Affected context unit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_ref: Option<ContextId>,
    /// Short error kind
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorEntry {
    /// Create an entry stamped with the current time
    pub fn new(stage: Stage, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: taxtract_domain::unix_now(),
            stage,
            species: None,
            context_ref: None,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Attach the affected species
    pub fn for_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Attach the affected context unit
    pub fn for_context(mut self, context: Option<ContextId>) -> Self {
        self.context_ref = context;
        self
    }
}

/// A raw name the normalizer rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedName {
    /// Verbatim recognizer text
    pub raw_text: String,
    /// Page of the mention
    pub page_number: u32,
    /// Rejection reason
    pub reason: String,
}

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Canonical species retained
    pub species: usize,
    /// Context units built
    pub context_units: usize,
    /// Gateway calls (one per context unit processed)
    pub llm_requests: u64,
    /// Backend attempts, retries included
    pub llm_attempts: u64,
    /// Prompt tokens reported by the backend
    pub input_tokens: u64,
    /// Completion tokens reported by the backend
    pub output_tokens: u64,
    /// Records with a validated answer
    pub extracted_records: usize,
    /// Records that fell back to "NF"
    pub failed_records: usize,
    /// Inadmissible values replaced by "NF"
    pub discrepancies: usize,
    /// Wall-clock runtime in seconds
    pub runtime_secs: f64,
    /// Per field, how often each value was extracted
    pub value_counts: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Run-level data fixed when the run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    /// Run identifier
    pub run_id: RunId,
    /// Document the run processed
    pub document_name: String,
    /// Project configuration as used by the run
    pub config: serde_json::Value,
    /// Declared fields, used to validate corrections
    pub fields: Vec<FieldSpec>,
    /// Start time (Unix seconds)
    pub started_at: u64,
}

/// Original values, verification state and effective values of one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView<'a> {
    /// The immutable record
    pub record: &'a ExtractionRecord,
    /// Its verification state
    pub verification: Option<&'a VerificationState>,
    /// Original values with any correction applied
    pub effective_values: BTreeMap<String, String>,
    /// Context the record was extracted from
    pub context: Option<&'a ContextUnit>,
}

/// Complete result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Report format version
    pub format_version: u32,
    /// Run identity, configuration and start time
    #[serde(flatten)]
    pub header: ReportHeader,
    /// End time (Unix seconds)
    pub finished_at: u64,
    /// Complete or incomplete
    pub status: RunStatus,
    /// Canonical species after filtering
    pub species: Vec<CanonicalSpecies>,
    /// Species removed by the taxonomic filter
    #[serde(default)]
    pub excluded_species: Vec<String>,
    /// Recognizer names that could not be normalized
    #[serde(default)]
    pub rejected_names: Vec<RejectedName>,
    /// Every context unit built
    pub contexts: Vec<ContextUnit>,
    /// Species name to its context units, in document order
    pub context_index: BTreeMap<String, Vec<ContextId>>,
    /// Units not processed because the run stopped
    #[serde(default)]
    pub skipped_contexts: Vec<ContextId>,
    /// Extraction records in processing order
    pub records: Vec<ExtractionRecord>,
    /// Manual verification overlay
    pub verification: VerificationLedger,
    /// Automated verification results
    #[serde(default)]
    pub auto_checks: Vec<AutoCheck>,
    /// Statistics
    pub stats: RunStats,
    /// Non-fatal and fatal errors, in order
    #[serde(default)]
    pub error_log: Vec<ErrorEntry>,
}

impl RunReport {
    /// Whether every unit was processed
    pub fn is_complete(&self) -> bool {
        matches!(self.status, RunStatus::Complete)
    }

    /// Declared fields of the run
    pub fn fields(&self) -> &[FieldSpec] {
        &self.header.fields
    }

    /// Context unit by id
    pub fn context(&self, id: ContextId) -> Option<&ContextUnit> {
        self.contexts.iter().find(|c| c.id == id)
    }

    /// Context units of a species in document order
    pub fn contexts_for(&self, species: &str) -> Vec<&ContextUnit> {
        self.context_index
            .get(species)
            .map(|ids| ids.iter().filter_map(|id| self.context(*id)).collect())
            .unwrap_or_default()
    }

    /// Records of a species
    pub fn records_for<'a>(&'a self, species: &'a str) -> impl Iterator<Item = &'a ExtractionRecord> + 'a {
        self.records.iter().filter(move |r| r.species_ref == species)
    }

    /// Find a record by full id, unique id prefix or short id
    pub fn find_record(&self, id_or_prefix: &str) -> Result<&ExtractionRecord, ReportError> {
        let needle = id_or_prefix.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ReportError::RecordNotFound(id_or_prefix.to_string()));
        }
        if let Ok(id) = RecordId::parse(&needle) {
            return self
                .records
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| ReportError::RecordNotFound(id_or_prefix.to_string()));
        }
        let compact = needle.replace('-', "");
        let mut matches = self
            .records
            .iter()
            .filter(|r| {
                let id = r.id.to_string().replace('-', "");
                id.starts_with(&compact) || id.ends_with(&compact)
            });
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record),
            (Some(_), Some(_)) => Err(ReportError::AmbiguousRecord(id_or_prefix.to_string())),
            (None, _) => Err(ReportError::RecordNotFound(id_or_prefix.to_string())),
        }
    }

    /// Original, verification and effective view of a record
    pub fn view<'a>(&'a self, record: &'a ExtractionRecord) -> RecordView<'a> {
        RecordView {
            record,
            verification: self.verification.state(record.id),
            effective_values: self.verification.effective_values(record),
            context: record.context_ref.and_then(|id| self.context(id)),
        }
    }

    /// Confirm a record by id or prefix
    pub fn confirm(&mut self, id_or_prefix: &str) -> Result<RecordId, ReportError> {
        let id = self.find_record(id_or_prefix)?.id;
        self.verification.confirm(id)?;
        Ok(id)
    }

    /// Correct a record by id or prefix
    pub fn correct(
        &mut self,
        id_or_prefix: &str,
        values: BTreeMap<String, String>,
    ) -> Result<RecordId, ReportError> {
        let id = self.find_record(id_or_prefix)?.id;
        self.verification.correct(id, values, &self.header.fields)?;
        Ok(id)
    }

    /// Store automated checks, replacing earlier checks of the same records
    pub fn add_auto_checks(&mut self, checks: Vec<AutoCheck>) {
        for check in checks {
            self.auto_checks.retain(|c| c.record_ref != check.record_ref);
            self.auto_checks.push(check);
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved run report");
        Ok(())
    }

    /// Read a report written by [`RunReport::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a report from JSON
    pub fn from_json(text: &str) -> Result<Self, ReportError> {
        let report: RunReport = serde_json::from_str(text)?;
        if report.format_version != REPORT_FORMAT_VERSION {
            return Err(ReportError::UnsupportedVersion {
                found: report.format_version,
                expected: REPORT_FORMAT_VERSION,
            });
        }
        Ok(report)
    }
}
