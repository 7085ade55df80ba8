//! Taxtract Domain Layer
//!
//! Core data model for species-level fact extraction from scientific documents.
//! Every other crate in the workspace depends on these types; this crate only
//! depends on `uuid` (identifiers) and `serde` (the run report is a
//! self-contained serialized artifact).
//!
//! ## Key Concepts
//!
//! - **NameMention**: a normalized scientific-name occurrence with page provenance
//! - **CanonicalSpecies**: a deduplicated, hierarchy-resolved species entry
//! - **FieldSpec**: one user-defined field to extract per species
//! - **ContextUnit**: the text window or page image handed to the model
//! - **ExtractionRecord**: one validated model answer, immutable once created
//! - **VerificationState**: the manual-review overlay on a record
//!
//! ## Collaborators
//!
//! Page rendering and taxonomic lookups are external; their contracts are the
//! traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod ids;
pub mod mention;
pub mod record;
pub mod schema;
pub mod species;
pub mod taxonomy;
pub mod traits;
pub mod verification;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-exports for convenience
pub use context::{ContextPayload, ContextUnit, ImageRef, Modality, OccurrencePolicy, TextSpan};
pub use ids::{ContextId, RecordId, RunId};
pub use mention::{NameMention, Rank, RawMention};
pub use record::{Discrepancy, ExtractionRecord, RecordStatus};
pub use schema::{FieldSpec, PromptExample, NOT_FOUND};
pub use species::{CanonicalSpecies, FilterStatus};
pub use taxonomy::{ClassificationPath, LookupOutcome, RankedName, TargetGroup};
pub use verification::{VerificationState, VerificationStatus};

/// Current time in seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
