//! Collects run results into a [`RunReport`]
//!
//! Single writer: the pipeline's collecting loop is the only caller, and it
//! appends in context-unit order.

use crate::ledger::VerificationLedger;
use crate::report::{
    ErrorEntry, RejectedName, ReportHeader, RunReport, RunStats, RunStatus, REPORT_FORMAT_VERSION,
};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use taxtract_domain::{unix_now, CanonicalSpecies, ContextId, ContextUnit, ExtractionRecord, OccurrencePolicy};
use tracing::{debug, info};

/// Accumulates species, contexts, records, usage and errors of one run
#[derive(Debug)]
pub struct ResultAggregator {
    header: ReportHeader,
    policy: OccurrencePolicy,
    species: Vec<CanonicalSpecies>,
    excluded: Vec<String>,
    rejected: Vec<RejectedName>,
    contexts: Vec<ContextUnit>,
    index: BTreeMap<String, Vec<ContextId>>,
    records: Vec<ExtractionRecord>,
    species_with_record: HashSet<String>,
    skipped: Vec<ContextId>,
    errors: Vec<ErrorEntry>,
    stats: RunStats,
    started: Instant,
}

impl ResultAggregator {
    /// Start collecting for a run
    pub fn new(header: ReportHeader, policy: OccurrencePolicy) -> Self {
        Self {
            header,
            policy,
            species: Vec::new(),
            excluded: Vec::new(),
            rejected: Vec::new(),
            contexts: Vec::new(),
            index: BTreeMap::new(),
            records: Vec::new(),
            species_with_record: HashSet::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    /// Record the identification outcome
    pub fn set_species(
        &mut self,
        species: Vec<CanonicalSpecies>,
        excluded: Vec<String>,
        rejected: Vec<RejectedName>,
    ) {
        self.species = species;
        self.excluded = excluded;
        self.rejected = rejected;
    }

    /// Register a built context unit
    pub fn add_context(&mut self, unit: ContextUnit) {
        self.index
            .entry(unit.species_ref.clone())
            .or_default()
            .push(unit.id);
        self.contexts.push(unit);
    }

    /// Append a record; returns false if the occurrence policy drops it
    pub fn add_record(&mut self, record: ExtractionRecord) -> bool {
        if self.policy == OccurrencePolicy::FirstOnly && self.species_with_record.contains(&record.species_ref) {
            debug!(species = %record.species_ref, "Dropping record beyond first occurrence");
            return false;
        }
        self.species_with_record.insert(record.species_ref.clone());
        self.records.push(record);
        true
    }

    /// Account for one gateway call
    pub fn record_usage(&mut self, attempts: u32, input_tokens: u64, output_tokens: u64) {
        self.stats.llm_requests += 1;
        self.stats.llm_attempts += u64::from(attempts);
        self.stats.input_tokens += input_tokens;
        self.stats.output_tokens += output_tokens;
    }

    /// Append to the error log
    pub fn log_error(&mut self, entry: ErrorEntry) {
        self.errors.push(entry);
    }

    /// Mark a unit as not processed
    pub fn mark_skipped(&mut self, context: ContextId) {
        self.skipped.push(context);
    }

    /// Records collected so far
    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    /// Build the report
    pub fn finish(self, status: RunStatus) -> RunReport {
        let mut stats = self.stats;
        stats.species = self.species.len();
        stats.context_units = self.contexts.len();
        stats.extracted_records = self.records.iter().filter(|r| r.is_extracted()).count();
        stats.failed_records = self.records.len() - stats.extracted_records;
        stats.discrepancies = self.records.iter().map(|r| r.discrepancies.len()).sum();
        stats.runtime_secs = self.started.elapsed().as_secs_f64();
        stats.value_counts = value_counts(&self.records);

        info!(
            run = %self.header.run_id,
            records = self.records.len(),
            failed = stats.failed_records,
            status = ?status,
            "Run finished"
        );

        let verification = VerificationLedger::for_records(&self.records);
        RunReport {
            format_version: REPORT_FORMAT_VERSION,
            header: self.header,
            finished_at: unix_now(),
            status,
            species: self.species,
            excluded_species: self.excluded,
            rejected_names: self.rejected,
            contexts: self.contexts,
            context_index: self.index,
            skipped_contexts: self.skipped,
            records: self.records,
            verification,
            auto_checks: Vec::new(),
            stats,
            error_log: self.errors,
        }
    }
}

fn value_counts(records: &[ExtractionRecord]) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for record in records {
        for (field, value) in &record.field_values {
            *counts
                .entry(field.clone())
                .or_default()
                .entry(value.clone())
                .or_insert(0) += 1;
        }
    }
    counts
}
