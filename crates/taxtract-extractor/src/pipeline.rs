//! End-to-end extraction run

use crate::config::ProjectConfig;
use crate::context::ContextBuilder;
use crate::error::PipelineError;
use crate::parser::ResponseValidator;
use crate::prompt::ExtractionRequestBuilder;
use crate::schema::{CompiledSchema, SchemaCompiler};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use taxtract_domain::traits::{PageSource, RankLookup};
use taxtract_domain::{
    unix_now, CanonicalSpecies, ContextUnit, ExtractionRecord, OccurrencePolicy, RawMention, RecordId,
    RecordStatus, RunId,
};
use taxtract_llm::{AnyBackend, Invocation, LlmBackend, LlmGateway};
use taxtract_report::{ErrorEntry, RejectedName, ReportHeader, ResultAggregator, RunReport, RunStatus, Stage};
use taxtract_resolver::{
    FilterLookupError, HierarchyResolver, NameNormalizer, RejectedMention, ResolutionError, TaxonomicFilter,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Species identification result
#[derive(Debug, Clone, Default)]
pub struct Identification {
    /// Species to extract, ordered by first mention
    pub species: Vec<CanonicalSpecies>,
    /// Species the taxonomic filter excluded
    pub excluded: Vec<String>,
    /// Raw names that did not normalize
    pub rejected: Vec<RejectedMention>,
    /// Failed classification lookups
    pub lookup_errors: Vec<FilterLookupError>,
}

enum UnitOutcome<'a> {
    Skipped(&'a ContextUnit),
    Done(&'a ContextUnit, Invocation),
}

/// Runs identification, context building, extraction and aggregation
pub struct Pipeline<B, L> {
    config: ProjectConfig,
    gateway: LlmGateway<B>,
    resolver: HierarchyResolver,
    filter: TaxonomicFilter<L>,
    cancel: CancellationToken,
}

impl<L: RankLookup> Pipeline<AnyBackend, L> {
    /// Pipeline using the backend named in the configuration
    pub fn from_config(config: ProjectConfig, lookup: L) -> Result<Self, PipelineError> {
        let backend = AnyBackend::from_settings(&config.llm).map_err(|e| PipelineError::Config(e.to_string()))?;
        Self::new(config, backend, lookup)
    }
}

impl<B: LlmBackend, L: RankLookup> Pipeline<B, L> {
    /// Create a pipeline; run and model settings are validated here
    pub fn new(config: ProjectConfig, backend: B, lookup: L) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        let normalizer = NameNormalizer::new().allow_genus_only(config.run.allow_genus_only);
        Ok(Self {
            gateway: LlmGateway::new(backend, config.run.retry_policy()),
            resolver: HierarchyResolver::new(normalizer),
            filter: TaxonomicFilter::new(lookup, config.run.target_group.clone()),
            cancel: CancellationToken::new(),
            config,
        })
    }

    /// Use an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run before the next unit starts
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Project configuration
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Model gateway
    pub fn gateway(&self) -> &LlmGateway<B> {
        &self.gateway
    }

    /// Resolve recognized names into the species list and apply the filter
    pub async fn identify(&self, mentions: &[RawMention]) -> Result<Identification, ResolutionError> {
        let resolution = self.resolver.resolve_raw(mentions)?;
        let filtered = self.filter.apply(resolution.species).await;
        Ok(Identification {
            species: filtered.retained,
            excluded: filtered.excluded,
            rejected: resolution.rejected,
            lookup_errors: filtered.errors,
        })
    }

    /// Run the whole pipeline over one document
    ///
    /// Returns the complete report, or `PipelineError::Aborted` with an
    /// incomplete partial report when the schema is invalid, identification
    /// yields nothing usable or the backend fails fatally. A cancelled run returns `Ok` with a
    /// report marked incomplete.
    pub async fn run<S: PageSource + ?Sized>(
        &self,
        document_name: &str,
        mentions: &[RawMention],
        source: &S,
    ) -> Result<RunReport, PipelineError> {
        let policy = self.config.run.occurrence_policy;
        let mut header = ReportHeader {
            run_id: RunId::new(),
            document_name: document_name.to_string(),
            config: self.config.snapshot(),
            fields: Vec::new(),
            started_at: unix_now(),
        };

        let schema = match SchemaCompiler::new().compile(&self.config.fields, &self.config.examples) {
            Ok(schema) => schema,
            Err(e) => {
                error!(run = %header.run_id, error = %e, "Schema rejected");
                let mut aggregator = ResultAggregator::new(header, policy);
                aggregator.log_error(ErrorEntry::new(Stage::Schema, "invalid_schema", e.to_string()));
                let reason = format!("invalid schema: {}", e);
                let report = aggregator.finish(RunStatus::Incomplete { reason: reason.clone() });
                return Err(PipelineError::Aborted {
                    reason,
                    report: Box::new(report),
                });
            }
        };
        header.fields = schema.fields().to_vec();
        info!(run = %header.run_id, document = document_name, mentions = mentions.len(), "Starting run");

        let mut aggregator = ResultAggregator::new(header, policy);

        let identification = match self.identify(mentions).await {
            Ok(identification) => identification,
            Err(e) => {
                error!(error = %e, "Identification failed");
                aggregator.log_error(ErrorEntry::new(Stage::Resolution, "no_valid_names", e.to_string()));
                let reason = format!("identification failed: {}", e);
                let report = aggregator.finish(RunStatus::Incomplete { reason: reason.clone() });
                return Err(PipelineError::Aborted {
                    reason,
                    report: Box::new(report),
                });
            }
        };

        for lookup_error in &identification.lookup_errors {
            aggregator.log_error(
                ErrorEntry::new(Stage::Filter, "lookup_failed", lookup_error.message.clone())
                    .for_species(lookup_error.name.clone()),
            );
        }
        let rejected = identification
            .rejected
            .iter()
            .map(|r| RejectedName {
                raw_text: r.raw_text.clone(),
                page_number: r.page_number,
                reason: r.reason.to_string(),
            })
            .collect();
        aggregator.set_species(identification.species.clone(), identification.excluded, rejected);

        let units = self.build_contexts(&identification.species, source, &schema, &mut aggregator);
        info!(species = identification.species.len(), units = units.len(), "Context units built");

        let status = self.extract_all(&units, &schema, &mut aggregator).await;
        match status {
            Ok(status) => Ok(aggregator.finish(status)),
            Err(reason) => {
                let report = aggregator.finish(RunStatus::Incomplete { reason: reason.clone() });
                Err(PipelineError::Aborted {
                    reason,
                    report: Box::new(report),
                })
            }
        }
    }

    fn build_contexts<S: PageSource + ?Sized>(
        &self,
        species: &[CanonicalSpecies],
        source: &S,
        schema: &CompiledSchema,
        aggregator: &mut ResultAggregator,
    ) -> Vec<ContextUnit> {
        let builder = ContextBuilder::from_settings(&self.config.run);
        let policy = self.config.run.occurrence_policy;

        let mut units = Vec::new();
        for entry in species {
            let set = builder.build(entry, source);

            // Under first-only, failures only become records if no unit was built
            let recorded_failures = match policy {
                OccurrencePolicy::All => set.failures.len(),
                OccurrencePolicy::FirstOnly if set.units.is_empty() => 1,
                OccurrencePolicy::FirstOnly => 0,
            };
            for (i, failure) in set.failures.iter().enumerate() {
                aggregator.log_error(
                    ErrorEntry::new(Stage::Context, failure.error.kind(), failure.error.to_string())
                        .for_species(failure.species.clone()),
                );
                if i < recorded_failures {
                    aggregator.add_record(ExtractionRecord::failed(
                        failure.species.clone(),
                        None,
                        failure.error.page(),
                        schema.fields(),
                        failure.error.to_string(),
                    ));
                }
            }

            for unit in set.units {
                aggregator.add_context(unit.clone());
                units.push(unit);
            }
        }
        units
    }

    /// Send every unit through the gateway; `Err` carries an abort reason
    async fn extract_all(
        &self,
        units: &[ContextUnit],
        schema: &Arc<CompiledSchema>,
        aggregator: &mut ResultAggregator,
    ) -> Result<RunStatus, String> {
        let requests = ExtractionRequestBuilder::new(schema.clone());
        let validator = ResponseValidator::new(schema.clone());
        let concurrency = self.config.run.max_concurrent_requests.max(1);

        let mut outcomes = stream::iter(units)
            .map(|unit| {
                let requests = &requests;
                async move {
                    if self.cancel.is_cancelled() {
                        return UnitOutcome::Skipped(unit);
                    }
                    let request = requests.build(&unit.species_ref, unit);
                    debug!(species = %unit.species_ref, page = unit.page_number, "Requesting extraction");
                    UnitOutcome::Done(unit, self.gateway.invoke_counted(&request).await)
                }
            })
            .buffered(concurrency);

        let mut committed = 0;
        let mut skipped = 0;
        let mut abort = None;
        while let Some(outcome) = outcomes.next().await {
            committed += 1;
            match outcome {
                UnitOutcome::Skipped(unit) => {
                    aggregator.mark_skipped(unit.id);
                    skipped += 1;
                }
                UnitOutcome::Done(unit, invocation) => {
                    if let Some(reason) = commit(unit, invocation, &validator, schema, aggregator) {
                        abort = Some(reason);
                        break;
                    }
                }
            }
        }
        drop(outcomes);

        if let Some(reason) = abort {
            for unit in &units[committed..] {
                aggregator.mark_skipped(unit.id);
            }
            return Err(reason);
        }
        if skipped > 0 {
            warn!(skipped, "Run cancelled before all units were processed");
            return Ok(RunStatus::Incomplete {
                reason: format!("cancelled; {} of {} context units skipped", skipped, units.len()),
            });
        }
        Ok(RunStatus::Complete)
    }
}

/// Turn one gateway outcome into a record; returns an abort reason on fatal errors
fn commit(
    unit: &ContextUnit,
    invocation: Invocation,
    validator: &ResponseValidator,
    schema: &CompiledSchema,
    aggregator: &mut ResultAggregator,
) -> Option<String> {
    let Invocation { result, attempts } = invocation;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            aggregator.record_usage(attempts, 0, 0);
            aggregator.log_error(
                ErrorEntry::new(Stage::Llm, e.kind().to_string(), e.to_string())
                    .for_species(unit.species_ref.clone())
                    .for_context(Some(unit.id)),
            );
            let mut record = ExtractionRecord::failed(
                unit.species_ref.clone(),
                Some(unit.id),
                unit.page_number,
                schema.fields(),
                e.to_string(),
            );
            record.attempts = attempts;
            aggregator.add_record(record);

            if e.is_fatal() {
                error!(error = %e, "Fatal model error, aborting run");
                return Some(format!("fatal model error: {}", e));
            }
            warn!(species = %unit.species_ref, error = %e, "Extraction failed, recorded as NF");
            return None;
        }
    };
    aggregator.record_usage(attempts, response.input_tokens, response.output_tokens);

    let record = match validator.validate(&response.text) {
        Ok(answer) => {
            for discrepancy in &answer.discrepancies {
                aggregator.log_error(
                    ErrorEntry::new(
                        Stage::Validation,
                        "inadmissible_value",
                        format!("'{}' is not admissible for '{}'", discrepancy.returned, discrepancy.field),
                    )
                    .for_species(unit.species_ref.clone())
                    .for_context(Some(unit.id)),
                );
            }
            ExtractionRecord {
                id: RecordId::new(),
                species_ref: unit.species_ref.clone(),
                context_ref: Some(unit.id),
                page_number: unit.page_number,
                field_values: answer.field_values,
                status: RecordStatus::Extracted,
                raw_model_output: Some(response.text),
                notes: answer.notes,
                discrepancies: answer.discrepancies,
                attempts,
                timestamp: unix_now(),
            }
        }
        Err(e) => {
            warn!(species = %unit.species_ref, error = %e, "Invalid model output, recorded as NF");
            aggregator.log_error(
                ErrorEntry::new(Stage::Validation, "invalid_response", e.to_string())
                    .for_species(unit.species_ref.clone())
                    .for_context(Some(unit.id)),
            );
            let mut record = ExtractionRecord::failed(
                unit.species_ref.clone(),
                Some(unit.id),
                unit.page_number,
                schema.fields(),
                format!("invalid response: {}", e),
            );
            record.raw_model_output = Some(response.text);
            record.attempts = attempts;
            record
        }
    };
    aggregator.add_record(record);
    None
}
