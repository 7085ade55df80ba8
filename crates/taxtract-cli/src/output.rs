//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use serde_json::json;
use taxtract_domain::{CanonicalSpecies, ExtractionRecord, FilterStatus, RecordStatus, VerificationStatus};
use taxtract_extractor::{AuditSummary, CompiledSchema, Identification};
use taxtract_report::{AutoCheck, CheckOutcome, ErrorEntry, RecordView, RunReport, RunStatus, Stage};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self { format, color_enabled }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Summary printed after a run.
    pub fn run_summary(&self, report: &RunReport, path: &str) -> Result<String> {
        let stats = &report.stats;
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "run_id": report.header.run_id.to_string(),
                "report": path,
                "status": report.status,
                "stats": stats,
            }))?),
            OutputFormat::Quiet => Ok(path.to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Run", "Species", "Contexts", "Extracted", "Failed", "Requests", "Tokens", "Time"]);
                builder.push_record([
                    report.header.run_id.short(),
                    stats.species.to_string(),
                    stats.context_units.to_string(),
                    stats.extracted_records.to_string(),
                    stats.failed_records.to_string(),
                    format!("{} ({} attempts)", stats.llm_requests, stats.llm_attempts),
                    format!("{} in / {} out", stats.input_tokens, stats.output_tokens),
                    format!("{:.1}s", stats.runtime_secs),
                ]);

                let mut out = vec![self.table(builder)];
                if let Some(values) = self.value_counts(report) {
                    out.push(values);
                }
                out.push(match &report.status {
                    RunStatus::Complete => self.success(&format!("Report saved to {}", path)),
                    RunStatus::Incomplete { reason } => {
                        self.warning(&format!("Run incomplete ({}); report saved to {}", reason, path))
                    }
                });
                if !report.error_log.is_empty() {
                    out.push(self.info(&format!(
                        "{} entries in the error log; see `taxtract show {} --errors`",
                        report.error_log.len(),
                        path
                    )));
                }
                Ok(out.join("\n"))
            }
        }
    }

    fn value_counts(&self, report: &RunReport) -> Option<String> {
        if report.stats.value_counts.is_empty() {
            return None;
        }
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value", "Records"]);
        for (field, counts) in &report.stats.value_counts {
            for (value, count) in counts {
                builder.push_record([field.clone(), value.clone(), count.to_string()]);
            }
        }
        Some(self.table(builder))
    }

    /// Identified, excluded and rejected names.
    pub fn species(&self, identification: &Identification) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "species": identification.species,
                "excluded": identification.excluded,
                "rejected": identification.rejected.iter().map(|r| json!({
                    "raw_text": r.raw_text,
                    "page_number": r.page_number,
                    "reason": r.reason.to_string(),
                })).collect::<Vec<_>>(),
                "lookup_errors": identification.lookup_errors.iter().map(|e| json!({
                    "name": e.name,
                    "message": e.message,
                })).collect::<Vec<_>>(),
            }))?),
            OutputFormat::Quiet => Ok(identification
                .species
                .iter()
                .map(|s| s.canonical_name.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if identification.species.is_empty() {
                    return Ok(self.colorize("No species found.", "yellow"));
                }
                let mut out = vec![self.species_table(&identification.species)];
                if !identification.excluded.is_empty() {
                    out.push(self.info(&format!("Outside the target group: {}", identification.excluded.join(", "))));
                }
                for rejected in &identification.rejected {
                    out.push(self.warning(&format!(
                        "Rejected '{}' on page {}: {}",
                        rejected.raw_text, rejected.page_number, rejected.reason
                    )));
                }
                for error in &identification.lookup_errors {
                    out.push(self.warning(&format!("Lookup failed for {}: {}", error.name, error.message)));
                }
                Ok(out.join("\n"))
            }
        }
    }

    fn species_table(&self, species: &[CanonicalSpecies]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Species", "Rank", "Aliases", "Pages", "Mentions", "Filter"]);
        for entry in species {
            let pages: Vec<String> = entry.pages().iter().map(u32::to_string).collect();
            builder.push_record([
                entry.canonical_name.clone(),
                entry.rank.to_string(),
                entry.aliases.join(", "),
                pages.join(", "),
                entry.mention_list.len().to_string(),
                filter_label(entry.filter_status).to_string(),
            ]);
        }
        self.table(builder)
    }

    /// Compiled schema and, optionally, the rendered prompt blocks.
    pub fn schema(&self, schema: &CompiledSchema, with_prompt: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "fields": schema.fields(),
                "fields_block": with_prompt.then(|| schema.fields_block()),
                "examples_block": with_prompt.then(|| schema.examples_block()),
            }))?),
            OutputFormat::Quiet => Ok(schema.fields().iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Description", "Values"]);
                for field in schema.fields() {
                    let values = if field.is_enumerated() {
                        field.validation_values.join(", ")
                    } else {
                        "(free text)".to_string()
                    };
                    builder.push_record([field.name.clone(), field.description.clone(), values]);
                }
                let mut out = vec![self.table(builder), self.success("Schema is valid")];
                if with_prompt {
                    out.push(String::new());
                    out.push(schema.fields_block().to_string());
                    out.push(String::new());
                    out.push(schema.examples_block().to_string());
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Records of a report with their effective values.
    pub fn records(&self, report: &RunReport, records: &[&ExtractionRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let views: Vec<serde_json::Value> = records.iter().map(|r| view_json(&report.view(r))).collect();
                Ok(serde_json::to_string_pretty(&views)?)
            }
            OutputFormat::Quiet => Ok(records.iter().map(|r| r.id.to_string()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                if records.is_empty() {
                    return Ok(self.colorize("No records found.", "yellow"));
                }
                let fields = report.fields();
                let mut header = vec!["ID".to_string(), "Species".to_string(), "Page".to_string()];
                header.extend(fields.iter().map(|f| f.name.clone()));
                header.push("Status".to_string());
                header.push("Verification".to_string());

                let mut builder = Builder::default();
                builder.push_record(header);
                for record in records {
                    let view = report.view(record);
                    let mut row = vec![record.id.short(), record.species_ref.clone(), record.page_number.to_string()];
                    row.extend(fields.iter().map(|f| view.effective_values.get(&f.name).cloned().unwrap_or_default()));
                    row.push(status_label(&record.status).to_string());
                    row.push(verification_label(&view).to_string());
                    builder.push_record(row);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// One record in full: original values, review state, context.
    pub fn record_view(&self, report: &RunReport, view: &RecordView<'_>) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&view_json(view))?),
            OutputFormat::Quiet => Ok(view.record.id.to_string()),
            OutputFormat::Table => {
                let record = view.record;
                let corrected = view.verification.and_then(|v| v.corrected_values.as_ref());

                let mut builder = Builder::default();
                builder.push_record(["Field", "Extracted", "Corrected", "Effective"]);
                for field in report.fields() {
                    builder.push_record([
                        field.name.clone(),
                        record.value(&field.name).unwrap_or_default().to_string(),
                        corrected.and_then(|c| c.get(&field.name)).cloned().unwrap_or_default(),
                        view.effective_values.get(&field.name).cloned().unwrap_or_default(),
                    ]);
                }

                let mut out = vec![
                    format!("{} {}", self.colorize("Record", "cyan"), record.id),
                    format!("Species: {} (page {})", record.species_ref, record.page_number),
                    format!("Status: {} after {} attempt(s)", status_label(&record.status), record.attempts),
                    format!("Verification: {}", verification_label(view)),
                    self.table(builder),
                ];
                if let RecordStatus::Failed { reason } = &record.status {
                    out.push(self.error(reason));
                }
                for discrepancy in &record.discrepancies {
                    out.push(self.warning(&format!(
                        "'{}' returned for {} is not admissible",
                        discrepancy.returned, discrepancy.field
                    )));
                }
                if let Some(notes) = &record.notes {
                    out.push(format!("Notes: {}", notes));
                }
                if let Some(check) = report.auto_checks.iter().find(|c| c.record_ref == record.id) {
                    out.push(self.check_line(check));
                }
                match view.context {
                    Some(context) => {
                        out.push(self.colorize(&format!("Context ({}, page {}):", context.modality, context.page_number), "cyan"));
                        match (context.text(), context.image()) {
                            (Some(text), _) => out.push(text.to_string()),
                            (None, Some(image)) => out.push(image.uri.clone()),
                            (None, None) => {}
                        }
                    }
                    None => out.push(self.info("No context unit was built for this record")),
                }
                if let Some(raw) = &record.raw_model_output {
                    out.push(self.colorize("Model output:", "cyan"));
                    out.push(raw.clone());
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// The error log of a report.
    pub fn error_log(&self, entries: &[ErrorEntry]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
            OutputFormat::Quiet => Ok(entries.iter().map(|e| e.kind.as_str()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                if entries.is_empty() {
                    return Ok(self.success("Error log is empty"));
                }
                let mut builder = Builder::default();
                builder.push_record(["Stage", "Kind", "Species", "Message"]);
                for entry in entries {
                    builder.push_record([
                        stage_label(entry.stage).to_string(),
                        entry.kind.clone(),
                        entry.species.clone().unwrap_or_default(),
                        entry.message.clone(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Result of an audit.
    pub fn audit(&self, summary: &AuditSummary, checks: &[&AutoCheck]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "checked": summary.checked,
                "matched": summary.matched,
                "mismatched": summary.mismatched,
                "errors": summary.errors,
                "checks": checks,
            }))?),
            OutputFormat::Quiet => Ok(checks
                .iter()
                .filter(|c| !c.overall_match)
                .map(|c| c.record_ref.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Record", "Field", "Expected", "Found", "Outcome"]);
                for check in checks {
                    if let Some(error) = &check.error {
                        builder.push_record([check.record_ref.short(), String::new(), String::new(), String::new(), error.clone()]);
                    }
                    for field in &check.fields {
                        builder.push_record([
                            check.record_ref.short(),
                            field.field.clone(),
                            field.expected.clone(),
                            field.found.clone(),
                            outcome_label(field.outcome).to_string(),
                        ]);
                    }
                }
                let line = format!(
                    "Checked {}: {} matched, {} mismatched, {} could not be checked",
                    summary.checked, summary.matched, summary.mismatched, summary.errors
                );
                let status = if summary.mismatched + summary.errors == 0 {
                    self.success(&line)
                } else {
                    self.warning(&line)
                };
                Ok(format!("{}\n{}", self.table(builder), status))
            }
        }
    }

    fn check_line(&self, check: &AutoCheck) -> String {
        match (&check.error, check.overall_match) {
            (Some(error), _) => self.warning(&format!("Audit could not run: {}", error)),
            (None, true) => self.success("Audit: all fields matched"),
            (None, false) => {
                let differing: Vec<&str> = check
                    .fields
                    .iter()
                    .filter(|f| f.outcome != CheckOutcome::Match)
                    .map(|f| f.field.as_str())
                    .collect();
                self.warning(&format!("Audit: differs in {}", differing.join(", ")))
            }
        }
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn view_json(view: &RecordView<'_>) -> serde_json::Value {
    json!({
        "record": view.record,
        "verification": view.verification,
        "effective_values": view.effective_values,
        "context": view.context,
    })
}

fn status_label(status: &RecordStatus) -> &'static str {
    match status {
        RecordStatus::Extracted => "extracted",
        RecordStatus::Failed { .. } => "failed",
    }
}

fn verification_label(view: &RecordView<'_>) -> &'static str {
    match view.verification.map(|v| v.status).unwrap_or_default() {
        VerificationStatus::Unconfirmed => "unconfirmed",
        VerificationStatus::Confirmed => "confirmed",
        VerificationStatus::Corrected => "corrected",
    }
}

fn filter_label(status: FilterStatus) -> &'static str {
    match status {
        FilterStatus::NotApplied => "-",
        FilterStatus::Verified => "verified",
        FilterStatus::Unverified => "unverified",
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Schema => "schema",
        Stage::Resolution => "resolution",
        Stage::Filter => "filter",
        Stage::Context => "context",
        Stage::Llm => "llm",
        Stage::Validation => "validation",
        Stage::Audit => "audit",
    }
}

fn outcome_label(outcome: CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Match => "match",
        CheckOutcome::Mismatch => "mismatch",
        CheckOutcome::NotFound => "not found",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use taxtract_domain::{FieldSpec, OccurrencePolicy, RunId};
    use taxtract_report::{ReportHeader, ResultAggregator};

    fn report() -> RunReport {
        let fields = vec![FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"])];
        let header = ReportHeader {
            run_id: RunId::new(),
            document_name: "toads.pdf".to_string(),
            config: serde_json::Value::Null,
            fields: fields.clone(),
            started_at: 0,
        };
        let mut aggregator = ResultAggregator::new(header, OccurrencePolicy::All);
        let mut record = ExtractionRecord::failed("Bufo bufo", None, 1, &fields, "");
        record.status = RecordStatus::Extracted;
        record.field_values = BTreeMap::from([("habitat".to_string(), "Forest".to_string())]);
        aggregator.add_record(record);
        aggregator.finish(RunStatus::Complete)
    }

    #[test]
    fn test_records_table() {
        let report = report();
        let records: Vec<&ExtractionRecord> = report.records.iter().collect();
        let output = Formatter::new(OutputFormat::Table, false).records(&report, &records).unwrap();
        assert!(output.contains("Bufo bufo"));
        assert!(output.contains("Forest"));
        assert!(output.contains("unconfirmed"));
    }

    #[test]
    fn test_records_json_shows_effective_values() {
        let mut report = report();
        let id = report.records[0].id;
        report
            .correct(&id.to_string(), BTreeMap::from([("habitat".to_string(), "wetland".to_string())]))
            .unwrap();

        let records: Vec<&ExtractionRecord> = report.records.iter().collect();
        let output = Formatter::new(OutputFormat::Json, false).records(&report, &records).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["effective_values"]["habitat"], "Wetland");
        assert_eq!(parsed[0]["record"]["field_values"]["habitat"], "Forest");
    }

    #[test]
    fn test_quiet_format_prints_ids() {
        let report = report();
        let records: Vec<&ExtractionRecord> = report.records.iter().collect();
        let output = Formatter::new(OutputFormat::Quiet, false).records(&report, &records).unwrap();
        assert_eq!(output, report.records[0].id.to_string());
    }

    #[test]
    fn test_messages_without_color() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("done"), "✓ done");
        assert_eq!(formatter.warning("careful"), "⚠ careful");
    }
}
