//! Canonical species entries

use crate::mention::{NameMention, Rank};
use serde::{Deserialize, Serialize};

/// Outcome of the optional taxonomic group filter for one species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    /// No target group was configured
    #[default]
    NotApplied,
    /// The lookup placed the species inside the target group
    Verified,
    /// The lookup failed, found nothing, or was ambiguous; kept for manual follow-up
    Unverified,
}

/// A deduplicated, hierarchy-resolved species
///
/// `canonical_name` is unique within a resolution result. Less specific names
/// nested inside it (e.g. the binomial of a trinomial) are listed in `aliases`
/// and their mentions are part of `mention_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSpecies {
    /// Most specific normalized name of the nesting chain
    pub canonical_name: String,

    /// Rank of the canonical name
    pub rank: Rank,

    /// Nearest absorbed ancestor name, by name only
    pub parent_name: Option<String>,

    /// Absorbed less specific names
    #[serde(default)]
    pub aliases: Vec<String>,

    /// All mentions in document order, aliases included
    pub mention_list: Vec<NameMention>,

    /// Taxonomic filter outcome
    #[serde(default)]
    pub filter_status: FilterStatus,
}

impl CanonicalSpecies {
    /// Distinct pages the species is mentioned on, ascending
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.mention_list.iter().map(|m| m.page_number).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// First mention in document order
    pub fn first_mention(&self) -> Option<&NameMention> {
        self.mention_list.first()
    }

    /// Whether `name` is the canonical name or one of its aliases
    pub fn answers_to(&self, name: &str) -> bool {
        self.canonical_name == name || self.aliases.iter().any(|a| a == name)
    }
}
