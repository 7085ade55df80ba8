//! Contracts for external collaborators
//!
//! Page rendering and taxonomic verification live outside this workspace.
//! The pipeline only sees them through these traits.

use crate::context::ImageRef;
use crate::taxonomy::LookupOutcome;
use std::fmt::Display;
use std::future::Future;

/// Access to the pages of one document
pub trait PageSource: Send + Sync {
    /// Text of a page (1-indexed), if the page exists and has text
    fn page_text(&self, page_number: u32) -> Option<String>;

    /// Rendered image of a page (1-indexed), if available
    fn page_image(&self, page_number: u32) -> Option<ImageRef>;
}

/// Taxonomic classification lookup
pub trait RankLookup: Send + Sync {
    /// Error type for lookup failures
    type Error: Display + Send;

    /// Classify a canonical name
    fn classify(&self, name: &str) -> impl Future<Output = Result<LookupOutcome, Self::Error>> + Send;
}
