//! Run command implementation.

use crate::cli::{PresetArg, RunArgs};
use crate::config::{load_project, Config};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::{Path, PathBuf};
use taxtract_extractor::{DocumentBundle, Pipeline, PipelineError, RunSettings};
use taxtract_report::RunReport;
use tracing::warn;

/// Execute the run command.
pub async fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let mut project = load_project(&args.project)?;
    if let Some(preset) = args.preset {
        project.run = apply_preset(&project.run, preset);
    }
    if let Some(model) = args.model {
        project.llm.model = model;
    }
    let project_name = project.project_name.clone();

    let bundle = DocumentBundle::load(&args.bundle)?;
    let pipeline = Pipeline::from_config(project, bundle.rank_lookup())?;

    let token = pipeline.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the requests in flight");
            token.cancel();
        }
    });
    let outcome = pipeline.run(&bundle.document_name, &bundle.mentions, &bundle).await;
    interrupt.abort();

    match outcome {
        Ok(report) => {
            let path = report_path(args.output.as_deref(), config, &project_name, &report);
            report.save(&path)?;
            println!("{}", formatter.run_summary(&report, &path.display().to_string())?);
            Ok(())
        }
        Err(PipelineError::Aborted { reason, report }) => {
            let path = report_path(args.output.as_deref(), config, &project_name, &report);
            report.save(&path)?;
            Err(CliError::Aborted { reason, path })
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace timing, window and occurrence settings, keeping what the project
/// says about modality and the target group.
fn apply_preset(current: &RunSettings, preset: PresetArg) -> RunSettings {
    let base = match preset {
        PresetArg::Default => RunSettings::default(),
        PresetArg::Thorough => RunSettings::thorough(),
        PresetArg::Quick => RunSettings::quick(),
    };
    RunSettings {
        modality: current.modality,
        target_group: current.target_group.clone(),
        allow_genus_only: current.allow_genus_only,
        ..base
    }
}

fn report_path(output: Option<&Path>, config: &Config, project_name: &str, report: &RunReport) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => config
            .reports_dir()
            .join(format!("{}-{}.json", file_stem(project_name), report.header.run_id.short())),
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c.to_ascii_lowercase() } else { '-' })
        .collect();
    if stem.is_empty() {
        "run".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxtract_domain::{Modality, OccurrencePolicy, TargetGroup};

    #[test]
    fn test_preset_keeps_modality_and_target() {
        let current = RunSettings {
            modality: Modality::Image,
            target_group: Some(TargetGroup {
                name: "Amphibia".to_string(),
                rank: None,
            }),
            ..RunSettings::default()
        };

        let quick = apply_preset(&current, PresetArg::Quick);
        assert_eq!(quick.modality, Modality::Image);
        assert_eq!(quick.target_group, current.target_group);
        assert_eq!(quick.max_concurrent_requests, RunSettings::quick().max_concurrent_requests);

        let thorough = apply_preset(&current, PresetArg::Thorough);
        assert_eq!(thorough.occurrence_policy, OccurrencePolicy::All);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Amphibians of Europe"), "amphibians-of-europe");
        assert_eq!(file_stem("toads_2024"), "toads_2024");
        assert_eq!(file_stem("  "), "run");
    }
}
