//! Audit command implementation.

use crate::cli::AuditArgs;
use crate::config::load_project;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use taxtract_domain::RecordId;
use taxtract_extractor::AutoVerifier;
use taxtract_llm::{AnyBackend, LlmGateway};
use taxtract_report::{AutoCheck, RunReport};

/// Execute the audit command.
pub async fn execute_audit(args: AuditArgs, formatter: &Formatter) -> Result<()> {
    let project = load_project(&args.project)?;
    let mut report = RunReport::load(&args.report)?;

    let selected: Option<Vec<RecordId>> = if args.records.is_empty() {
        None
    } else {
        Some(
            args.records
                .iter()
                .map(|id| report.find_record(id).map(|r| r.id))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )
    };

    let backend = AnyBackend::from_settings(&project.llm).map_err(|e| CliError::Config(e.to_string()))?;
    let verifier = AutoVerifier::new(LlmGateway::new(backend, project.run.retry_policy()))
        .with_examples(project.examples.clone())
        .with_concurrency(project.run.max_concurrent_requests);

    let summary = verifier.audit(&mut report, selected.as_deref()).await;
    report.save(&args.report)?;

    let checks: Vec<&AutoCheck> = report
        .auto_checks
        .iter()
        .filter(|c| selected.as_ref().is_none_or(|ids| ids.contains(&c.record_ref)))
        .collect();
    println!("{}", formatter.audit(&summary, &checks)?);
    Ok(())
}
