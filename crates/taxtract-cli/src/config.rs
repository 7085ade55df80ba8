//! Configuration management for the CLI.
//!
//! These are user preferences of the command-line tool, not project
//! settings. Projects live in their own TOML files passed with `--project`.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taxtract_extractor::ProjectConfig;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Directory for reports when `run` gets no `--output`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| CliError::Config("Could not find config directory".into()))?;
        Ok(dir.join("taxtract").join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Directory where `run` writes reports by default.
    pub fn reports_dir(&self) -> PathBuf {
        self.settings.reports_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            reports_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

impl From<crate::cli::CliFormat> for OutputFormat {
    fn from(format: crate::cli::CliFormat) -> Self {
        match format {
            crate::cli::CliFormat::Table => OutputFormat::Table,
            crate::cli::CliFormat::Json => OutputFormat::Json,
            crate::cli::CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}

/// Read and validate a project file.
pub fn load_project(path: &Path) -> Result<ProjectConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
    let project = ProjectConfig::from_toml(&contents).map_err(CliError::Config)?;
    project.validate().map_err(CliError::Config)?;
    Ok(project)
}
