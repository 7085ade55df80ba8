//! Project configuration
//!
//! A project is the set of fields to extract plus the settings of a run. It
//! is stored as TOML; every key except `project_name` and `fields` has a
//! default.
//!
//! ```toml
//! project_name = "amphibians"
//!
//! [run]
//! modality = "text"
//! occurrence_policy = "first_only"
//! context_after = 250
//!
//! [llm]
//! provider = "ollama"
//! model = "llama3.2"
//!
//! [[fields]]
//! name = "habitat"
//! description = "Main habitat"
//! validation_values = ["Forest", "Wetland"]
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use taxtract_domain::{FieldSpec, Modality, OccurrencePolicy, PromptExample, TargetGroup};
use taxtract_llm::{LlmSettings, RetryPolicy};

/// Settings that shape one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Text windows or page images
    pub modality: Modality,

    /// First occurrence only, or every occurrence
    pub occurrence_policy: OccurrencePolicy,

    /// Restrict species to a taxonomic group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group: Option<TargetGroup>,

    /// Accept genus-only names as species
    pub allow_genus_only: bool,

    /// Maximum attempts per model request
    pub max_attempts: u32,

    /// Characters of context before a mention
    pub context_before: usize,

    /// Characters of context after a mention
    pub context_after: usize,

    /// Timeout of a single model request (seconds)
    pub request_timeout_secs: u64,

    /// First retry delay (milliseconds)
    pub backoff_base_ms: u64,

    /// Retry delay cap (milliseconds)
    pub backoff_max_ms: u64,

    /// Model requests in flight at once
    pub max_concurrent_requests: usize,
}

impl Default for RunSettings {
    /// Sequential run with a short trailing window
    fn default() -> Self {
        Self {
            modality: Modality::Text,
            occurrence_policy: OccurrencePolicy::FirstOnly,
            target_group: None,
            allow_genus_only: false,
            max_attempts: 3,
            context_before: 0,
            context_after: 250,
            request_timeout_secs: 120,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            max_concurrent_requests: 1,
        }
    }
}

impl RunSettings {
    /// Thorough preset: every occurrence, wide windows, patient retries
    pub fn thorough() -> Self {
        Self {
            occurrence_policy: OccurrencePolicy::All,
            max_attempts: 5,
            context_before: 500,
            context_after: 1_000,
            request_timeout_secs: 300,
            backoff_max_ms: 60_000,
            ..Self::default()
        }
    }

    /// Quick preset: first occurrence, narrow windows, parallel requests
    pub fn quick() -> Self {
        Self {
            max_attempts: 2,
            context_before: 0,
            context_after: 150,
            request_timeout_secs: 60,
            backoff_base_ms: 500,
            backoff_max_ms: 5_000,
            max_concurrent_requests: 4,
            ..Self::default()
        }
    }

    /// Gateway retry policy for these settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("run.max_attempts must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("run.request_timeout_secs must be greater than 0".to_string());
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err("run.backoff_base_ms cannot exceed run.backoff_max_ms".to_string());
        }
        if self.max_concurrent_requests == 0 {
            return Err("run.max_concurrent_requests must be greater than 0".to_string());
        }
        if self.modality == Modality::Text && self.context_before == 0 && self.context_after == 0 {
            return Err("text runs need a context window (context_before or context_after)".to_string());
        }
        if let Some(group) = &self.target_group {
            if group.name.trim().is_empty() {
                return Err("run.target_group.name must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// A complete project: fields, examples, run and model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used in report file names
    pub project_name: String,

    /// Run settings
    #[serde(default)]
    pub run: RunSettings,

    /// Model settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Fields to extract per species
    #[serde(default)]
    pub fields: Vec<FieldSpec>,

    /// Few-shot examples
    #[serde(default)]
    pub examples: Vec<PromptExample>,
}

impl ProjectConfig {
    /// Empty project with default settings
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            run: RunSettings::default(),
            llm: LlmSettings::default(),
            fields: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the run settings
    pub fn with_run(mut self, run: RunSettings) -> Self {
        self.run = run;
        self
    }

    /// Validate run and model settings
    ///
    /// Field definitions are checked separately by the schema compiler.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_name.trim().is_empty() {
            return Err("project_name must not be empty".to_string());
        }
        self.run.validate()?;
        self.llm.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// JSON snapshot stored in the run report
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
