//! Error types for name resolution and taxonomic filtering

use thiserror::Error;

/// Why a single raw name was not turned into a mention
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing left after normalization
    #[error("name is empty after normalization")]
    Empty,

    /// Only a genus, and genus-only names are not allowed
    #[error("genus-only name '{0}'")]
    GenusOnly(String),

    /// Leading token is not a usable genus
    #[error("'{0}' does not start with a genus")]
    NotAName(String),
}

/// Identification could not produce a single species
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Names were supplied but none survived normalization
    #[error("none of the {supplied} recognized names could be normalized")]
    NoValidNames {
        /// Non-empty raw names supplied
        supplied: usize,
    },
}

/// A classification lookup failed for one species
///
/// Never fatal: the species is kept as unverified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("classification lookup for '{name}' failed: {message}")]
pub struct FilterLookupError {
    /// Canonical name that was looked up
    pub name: String,
    /// Lookup error message
    pub message: String,
}
