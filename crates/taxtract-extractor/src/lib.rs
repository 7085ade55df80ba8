//! Taxtract Extractor
//!
//! Guided extraction of user-defined fields for every species named in a
//! document.
//!
//! # Architecture
//!
//! ```text
//! RawMentions → HierarchyResolver → TaxonomicFilter → ContextBuilder
//!     → ExtractionRequestBuilder → LlmGateway → ResponseValidator
//!     → ResultAggregator → RunReport
//! ```
//!
//! The schema is compiled once per run, before any model call. Per-unit
//! failures (missing pages, exhausted retries, unreadable answers) become
//! records with every field set to "NF"; only schema errors, unusable name
//! input and fatal backend errors stop a run.
//!
//! # Example Usage
//!
//! ```no_run
//! use taxtract_domain::FieldSpec;
//! use taxtract_extractor::{DocumentBundle, Pipeline, ProjectConfig};
//! use taxtract_llm::MockBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = DocumentBundle::from_json(r#"{
//!     "document_name": "toads.pdf",
//!     "pages": [{ "number": 1, "text": "Bufo bufo lives in damp woodland." }],
//!     "mentions": [{ "raw_text": "Bufo bufo", "page_number": 1, "start_offset": 0, "end_offset": 9 }]
//! }"#)?;
//!
//! let config = ProjectConfig::new("toads")
//!     .with_field(FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"]));
//! let backend = MockBackend::new(r#"[{"species":"Bufo bufo","data":{"habitat":"Forest"}}]"#);
//!
//! let pipeline = Pipeline::new(config, backend, bundle.rank_lookup())?;
//! let report = pipeline.run(&bundle.document_name, &bundle.mentions, &bundle).await?;
//!
//! println!("{} records", report.records.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod parser;
mod pipeline;
mod prompt;
mod schema;
mod source;
mod verify;


pub use config::{ProjectConfig, RunSettings};
pub use context::{normalize_for_prompt, ContextBuilder, ContextFailure, ContextSet};
pub use error::{ContextBuildError, PipelineError, SchemaError, ValidationError};
pub use parser::{ResponseValidator, ValidatedAnswer};
pub use pipeline::{Identification, Pipeline};
pub use prompt::ExtractionRequestBuilder;
pub use schema::{CompiledSchema, SchemaCompiler};
pub use source::{BundlePage, DocumentBundle};
pub use verify::{AuditSummary, AutoVerifier};
