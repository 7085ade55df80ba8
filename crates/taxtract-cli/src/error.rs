//! Error types for the CLI application.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] taxtract_extractor::PipelineError),

    /// Field definitions are unusable
    #[error("Schema error: {0}")]
    Schema(#[from] taxtract_extractor::SchemaError),

    /// Names could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(#[from] taxtract_resolver::ResolutionError),

    /// Report error
    #[error("Report error: {0}")]
    Report(#[from] taxtract_report::ReportError),

    /// The run stopped; the partial report was saved
    #[error("Run aborted: {reason} (partial report saved to {})", path.display())]
    Aborted {
        /// Why the run stopped
        reason: String,
        /// Where the partial report went
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
