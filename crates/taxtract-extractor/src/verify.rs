//! Automated verification by re-extraction
//!
//! Each record's context unit is sent to the model again and the fresh
//! answer is compared field by field with the record's effective values.
//! Results are stored beside the verification ledger and never change a
//! record's verification status.

use crate::parser::ResponseValidator;
use crate::prompt::ExtractionRequestBuilder;
use crate::schema::SchemaCompiler;
use futures_util::stream::{self, StreamExt};
use taxtract_domain::{ExtractionRecord, PromptExample, RecordId};
use taxtract_llm::{LlmBackend, LlmGateway};
use taxtract_report::{compare_values, AutoCheck, ErrorEntry, RunReport, Stage};
use tracing::{info, warn};

/// Counts of one audit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    /// Records checked
    pub checked: usize,
    /// Records whose fields all matched
    pub matched: usize,
    /// Records with at least one differing field
    pub mismatched: usize,
    /// Records that could not be checked
    pub errors: usize,
}

/// Re-extracts records and compares the answers
pub struct AutoVerifier<B> {
    gateway: LlmGateway<B>,
    examples: Vec<PromptExample>,
    concurrency: usize,
}

impl<B: LlmBackend> AutoVerifier<B> {
    /// Create a verifier sending one request at a time
    pub fn new(gateway: LlmGateway<B>) -> Self {
        Self {
            gateway,
            examples: Vec::new(),
            concurrency: 1,
        }
    }

    /// Render these few-shot examples into the prompts
    pub fn with_examples(mut self, examples: Vec<PromptExample>) -> Self {
        self.examples = examples;
        self
    }

    /// Requests in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Check the given records, or every record when `records` is `None`
    ///
    /// Checks are added to the report, replacing earlier checks of the same
    /// records. Records without a context unit are reported as errors.
    pub async fn audit(&self, report: &mut RunReport, records: Option<&[RecordId]>) -> AuditSummary {
        let current: &RunReport = report;
        let selected: Vec<&ExtractionRecord> = current
            .records
            .iter()
            .filter(|r| records.is_none_or(|ids| ids.contains(&r.id)))
            .collect();

        let checks: Vec<AutoCheck> = match SchemaCompiler::new().compile(current.fields(), &self.examples) {
            Ok(schema) => {
                let requests = ExtractionRequestBuilder::new(schema.clone());
                let validator = ResponseValidator::new(schema);
                stream::iter(selected)
                    .map(|record| self.check(current, record, &requests, &validator))
                    .buffered(self.concurrency)
                    .collect()
                    .await
            }
            Err(e) => selected
                .iter()
                .map(|r| AutoCheck::failed(r.id, format!("schema error: {}", e)))
                .collect(),
        };

        let mut summary = AuditSummary::default();
        for check in &checks {
            summary.checked += 1;
            match (&check.error, check.overall_match) {
                (Some(error), _) => {
                    summary.errors += 1;
                    report.error_log.push(ErrorEntry::new(Stage::Audit, "check_failed", error.clone()));
                }
                (None, true) => summary.matched += 1,
                (None, false) => summary.mismatched += 1,
            }
        }
        info!(
            checked = summary.checked,
            matched = summary.matched,
            mismatched = summary.mismatched,
            errors = summary.errors,
            "Audit finished"
        );

        report.add_auto_checks(checks);
        summary
    }

    async fn check(
        &self,
        report: &RunReport,
        record: &ExtractionRecord,
        requests: &ExtractionRequestBuilder,
        validator: &ResponseValidator,
    ) -> AutoCheck {
        let Some(unit) = record.context_ref.and_then(|id| report.context(id)) else {
            return AutoCheck::failed(record.id, "record has no context unit");
        };

        let request = requests.build(&record.species_ref, unit);
        let response = match self.gateway.invoke(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(record = %record.id, error = %e, "Re-extraction failed");
                return AutoCheck::failed(record.id, e.to_string());
            }
        };
        let answer = match validator.validate(&response.text) {
            Ok(answer) => answer,
            Err(e) => return AutoCheck::failed(record.id, format!("invalid response: {}", e)),
        };

        let expected = report.verification.effective_values(record);
        let (fields, overall_match) = compare_values(&expected, &answer.field_values);
        AutoCheck {
            record_ref: record.id,
            fields,
            overall_match,
            error: None,
            notes: answer.notes,
            checked_at: taxtract_domain::unix_now(),
        }
    }
}
