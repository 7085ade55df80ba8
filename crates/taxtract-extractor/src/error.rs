//! Error types for the extraction pipeline

use taxtract_report::{ReportError, RunReport};
use thiserror::Error;

/// The field definitions cannot be used for a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No field was declared
    #[error("at least one field must be declared")]
    NoFields,

    /// A field has a blank name
    #[error("field #{index} has an empty name")]
    EmptyFieldName {
        /// Position in the declaration list (1-based)
        index: usize,
    },

    /// Two fields share a name
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    /// An enumerated field lists a blank value
    #[error("field '{field}' declares an empty validation value")]
    EmptyValue {
        /// Field name
        field: String,
    },

    /// An enumerated field lists the same value twice (ignoring case)
    #[error("field '{field}' declares '{value}' more than once")]
    DuplicateValue {
        /// Field name
        field: String,
        /// Repeated value
        value: String,
    },

    /// A few-shot example refers to an undeclared field
    #[error("example #{example} refers to unknown field '{field}'")]
    UnknownExampleField {
        /// Example position (1-based)
        example: usize,
        /// Undeclared field name
        field: String,
    },

    /// A few-shot example uses a value the field does not admit
    #[error("example #{example} gives '{value}' for '{field}', which is not admissible")]
    InvalidExampleValue {
        /// Example position (1-based)
        example: usize,
        /// Field name
        field: String,
        /// Offending value
        value: String,
    },
}

/// A context unit could not be built for one occurrence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextBuildError {
    /// The page has no text
    #[error("no text available for page {page}")]
    MissingPageText {
        /// Page number
        page: u32,
    },

    /// The page has no rendered image
    #[error("no image available for page {page}")]
    MissingPageImage {
        /// Page number
        page: u32,
    },

    /// The mention offsets do not fit the page text
    #[error("offsets {start}..{end} lie outside page {page} ({len} chars)")]
    OffsetsOutOfRange {
        /// Page number
        page: u32,
        /// Mention start
        start: usize,
        /// Mention end
        end: usize,
        /// Page length in characters
        len: usize,
    },

    /// The window holds only whitespace
    #[error("context window on page {page} is blank")]
    BlankWindow {
        /// Page number
        page: u32,
    },
}

impl ContextBuildError {
    /// Page the failure refers to
    pub fn page(&self) -> u32 {
        match self {
            ContextBuildError::MissingPageText { page }
            | ContextBuildError::MissingPageImage { page }
            | ContextBuildError::OffsetsOutOfRange { page, .. }
            | ContextBuildError::BlankWindow { page } => *page,
        }
    }

    /// Short machine-readable kind for the error log
    pub fn kind(&self) -> &'static str {
        match self {
            ContextBuildError::MissingPageText { .. } => "missing_page_text",
            ContextBuildError::MissingPageImage { .. } => "missing_page_image",
            ContextBuildError::OffsetsOutOfRange { .. } => "offsets_out_of_range",
            ContextBuildError::BlankWindow { .. } => "blank_window",
        }
    }
}

/// Model output that cannot be read as an answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing that looks like JSON
    #[error("response contains no JSON")]
    NoJson,

    /// JSON syntax error
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Valid JSON of the wrong shape
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::Malformed(e.to_string())
    }
}

/// Run-level failures
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid project configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run stopped early; the partial report is marked incomplete
    #[error("Run aborted: {reason}")]
    Aborted {
        /// Why the run stopped
        reason: String,
        /// Everything collected up to the abort
        report: Box<RunReport>,
    },

    /// Report handling failed
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Document input could not be read
    #[error("Source error: {0}")]
    Source(String),
}

impl PipelineError {
    /// Partial report of an aborted run
    pub fn partial_report(&self) -> Option<&RunReport> {
        match self {
            PipelineError::Aborted { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Source(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Source(e.to_string())
    }
}
