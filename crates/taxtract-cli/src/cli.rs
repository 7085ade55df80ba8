//! CLI command definitions and argument parsing.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Taxtract - Extract structured species data from documents with an LLM.
#[derive(Debug, Parser)]
#[command(name = "taxtract")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// CLI settings file (default: <config dir>/taxtract/config.toml)
    #[arg(long, global = true, env = "TAXTRACT_CONFIG")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (ids only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract fields for every species in a document bundle
    Run(RunArgs),

    /// Resolve and filter the names of a bundle without calling the model
    Species(SpeciesArgs),

    /// Check a project's field definitions and show the compiled schema
    Schema(SchemaArgs),

    /// Show the records of a saved report
    Show(ShowArgs),

    /// Accept a record's extracted values
    Confirm(ConfirmArgs),

    /// Replace some of a record's values
    Correct(CorrectArgs),

    /// Re-extract records and compare the answers
    Audit(AuditArgs),
}

/// Run settings preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Every occurrence, wide windows, patient retries
    Thorough,
    /// Narrow windows, few retries, parallel requests
    Quick,
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Project configuration (TOML)
    #[arg(short, long)]
    pub project: PathBuf,

    /// Document bundle (JSON)
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Where to write the report (default: <reports dir>/<project>-<run>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Replace the project's run settings with a preset
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Override the model name
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for the species command.
#[derive(Debug, Parser)]
pub struct SpeciesArgs {
    /// Project configuration (TOML)
    #[arg(short, long)]
    pub project: PathBuf,

    /// Document bundle (JSON)
    #[arg(short, long)]
    pub bundle: PathBuf,
}

/// Arguments for the schema command.
#[derive(Debug, Parser)]
pub struct SchemaArgs {
    /// Project configuration (TOML)
    #[arg(short, long)]
    pub project: PathBuf,

    /// Print the prompt blocks rendered from the schema
    #[arg(long)]
    pub prompt: bool,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Saved run report (JSON)
    pub report: PathBuf,

    /// Show one record in full (id, prefix or short id)
    #[arg(short, long, conflicts_with = "species")]
    pub record: Option<String>,

    /// Only records of this species
    #[arg(short, long)]
    pub species: Option<String>,

    /// Print the error log after the records
    #[arg(long)]
    pub errors: bool,
}

/// Arguments for the confirm command.
#[derive(Debug, Parser)]
pub struct ConfirmArgs {
    /// Saved run report (JSON)
    pub report: PathBuf,

    /// Records to confirm (id, prefix or short id)
    #[arg(required = true)]
    pub records: Vec<String>,
}

/// Arguments for the correct command.
#[derive(Debug, Parser)]
pub struct CorrectArgs {
    /// Saved run report (JSON)
    pub report: PathBuf,

    /// Record to correct (id, prefix or short id)
    pub record: String,

    /// Corrected values as field=value
    #[arg(required = true)]
    pub values: Vec<String>,
}

/// Arguments for the audit command.
#[derive(Debug, Parser)]
pub struct AuditArgs {
    /// Saved run report (JSON)
    pub report: PathBuf,

    /// Project configuration (TOML) with the model settings
    #[arg(short, long)]
    pub project: PathBuf,

    /// Only these records (default: all)
    #[arg(short, long = "record")]
    pub records: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "taxtract", "run", "-p", "project.toml", "-b", "bundle.json", "--preset", "quick", "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.project, PathBuf::from("project.toml"));
                assert_eq!(args.bundle, PathBuf::from("bundle.json"));
                assert_eq!(args.preset, Some(PresetArg::Quick));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_correct_values() {
        let cli = Cli::parse_from([
            "taxtract", "--format", "json", "correct", "report.json", "0a1b2c3d", "habitat=Wetland", "diet=insects",
        ]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        match cli.command {
            Command::Correct(args) => {
                assert_eq!(args.record, "0a1b2c3d");
                assert_eq!(args.values, vec!["habitat=Wetland", "diet=insects"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_confirm_needs_a_record() {
        assert!(Cli::try_parse_from(["taxtract", "confirm", "report.json"]).is_err());
    }

    #[test]
    fn test_show_record_conflicts_with_species() {
        let result = Cli::try_parse_from(["taxtract", "show", "r.json", "--record", "ab", "--species", "Bufo bufo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_audit_records() {
        let cli = Cli::parse_from(["taxtract", "audit", "r.json", "-p", "p.toml", "-r", "ab", "-r", "cd"]);
        match cli.command {
            Command::Audit(args) => assert_eq!(args.records, vec!["ab", "cd"]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
