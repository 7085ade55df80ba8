//! Taxtract Species Resolution
//!
//! Turns the name recognizer's raw mentions into a canonical, deduplicated,
//! hierarchy-aware species list and optionally restricts it to a taxonomic
//! group.
//!
//! # Pipeline
//!
//! 1. [`NameNormalizer`] canonicalizes each raw name
//! 2. [`HierarchyResolver`] folds nested names ("prefer the most specific")
//! 3. [`TaxonomicFilter`] keeps species inside the target group
//!
//! # Examples
//!
//! ```
//! use taxtract_domain::RawMention;
//! use taxtract_resolver::HierarchyResolver;
//!
//! let raws = vec![
//!     RawMention::new("Falco peregrinus", 1, 10, 26),
//!     RawMention::new("Falco peregrinus ssp. pelegrinoides", 2, 4, 39),
//! ];
//! let resolution = HierarchyResolver::default().resolve_raw(&raws).unwrap();
//! assert_eq!(resolution.species.len(), 1);
//! assert_eq!(resolution.species[0].canonical_name, "Falco peregrinus pelegrinoides");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod lookup;
pub mod normalize;

pub use error::{FilterLookupError, RejectReason, ResolutionError};
pub use filter::{FilterOutcome, TaxonomicFilter};
pub use hierarchy::{flatten_mentions, HierarchyResolver, RejectedMention, Resolution};
pub use lookup::StaticRankLookup;
pub use normalize::NameNormalizer;
