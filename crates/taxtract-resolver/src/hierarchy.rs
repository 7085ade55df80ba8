//! Hierarchy-aware deduplication of name mentions
//!
//! Candidates (one per distinct normalized name) live in an arena; each
//! candidate points at its nearest existing token-prefix ancestor by index.
//! Only leaves of that forest become canonical species. Every ancestor is
//! absorbed, as an alias with all of its mentions, into each leaf below it.

use crate::error::{RejectReason, ResolutionError};
use crate::normalize::NameNormalizer;
use std::collections::{HashMap, HashSet};
use taxtract_domain::{CanonicalSpecies, FilterStatus, NameMention, Rank, RawMention};
use tracing::{debug, info, warn};

/// A raw mention the normalizer refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedMention {
    /// Verbatim recognizer text
    pub raw_text: String,
    /// Page of the mention
    pub page_number: u32,
    /// Why it was rejected
    pub reason: RejectReason,
}

/// Outcome of resolving a list of raw mentions
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Canonical species ordered by first mention
    pub species: Vec<CanonicalSpecies>,
    /// Mentions that did not survive normalization
    pub rejected: Vec<RejectedMention>,
}

#[derive(Debug)]
struct Candidate {
    name: String,
    rank: Rank,
    mentions: Vec<NameMention>,
    parent: Option<usize>,
    has_children: bool,
}

/// Builds the canonical species list
#[derive(Debug, Clone, Default)]
pub struct HierarchyResolver {
    normalizer: NameNormalizer,
}

impl HierarchyResolver {
    /// Create a resolver using `normalizer` for raw input
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    /// Normalize and resolve recognizer output
    ///
    /// Raw mentions with empty text are skipped. Fails only when names were
    /// supplied and none of them could be normalized.
    pub fn resolve_raw(&self, raws: &[RawMention]) -> Result<Resolution, ResolutionError> {
        let supplied: Vec<&RawMention> = raws.iter().filter(|r| !r.raw_text.trim().is_empty()).collect();

        let mut mentions = Vec::with_capacity(supplied.len());
        let mut rejected = Vec::new();
        for raw in &supplied {
            match self.normalizer.normalize(raw) {
                Ok(mention) => mentions.push(mention),
                Err(reason) => {
                    debug!(raw = %raw.raw_text, page = raw.page_number, %reason, "Rejected name");
                    rejected.push(RejectedMention {
                        raw_text: raw.raw_text.clone(),
                        page_number: raw.page_number,
                        reason,
                    });
                }
            }
        }

        if mentions.is_empty() && !supplied.is_empty() {
            warn!(supplied = supplied.len(), "No recognized name survived normalization");
            return Err(ResolutionError::NoValidNames {
                supplied: supplied.len(),
            });
        }

        let species = self.resolve(mentions);
        info!(
            mentions = supplied.len() - rejected.len(),
            rejected = rejected.len(),
            species = species.len(),
            "Resolved species list"
        );
        Ok(Resolution { species, rejected })
    }

    /// Collapse normalized mentions into canonical species
    ///
    /// Idempotent: resolving the flattened mentions of the output again yields
    /// the same output.
    pub fn resolve(&self, mentions: Vec<NameMention>) -> Vec<CanonicalSpecies> {
        let mentions = dedupe_and_sort(mentions);

        let mut arena: Vec<Candidate> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for mention in mentions {
            match index.get(&mention.normalized_text) {
                Some(&idx) => arena[idx].mentions.push(mention),
                None => {
                    index.insert(mention.normalized_text.clone(), arena.len());
                    arena.push(Candidate {
                        name: mention.normalized_text.clone(),
                        rank: mention.rank,
                        mentions: vec![mention],
                        parent: None,
                        has_children: false,
                    });
                }
            }
        }

        for idx in 0..arena.len() {
            let parent = nearest_ancestor(&arena[idx].name, &index);
            arena[idx].parent = parent;
            if let Some(parent) = parent {
                arena[parent].has_children = true;
            }
        }

        let mut species: Vec<CanonicalSpecies> = arena
            .iter()
            .filter(|c| !c.has_children)
            .map(|leaf| absorb_ancestors(leaf, &arena))
            .collect();

        species.sort_by(|a, b| {
            let first = |s: &CanonicalSpecies| s.first_mention().map(NameMention::position);
            first(a)
                .cmp(&first(b))
                .then_with(|| a.canonical_name.cmp(&b.canonical_name))
        });
        species
    }
}

/// Longest strict token prefix of `name` that is itself a candidate
fn nearest_ancestor(name: &str, index: &HashMap<String, usize>) -> Option<usize> {
    let tokens: Vec<&str> = name.split(' ').collect();
    (1..tokens.len())
        .rev()
        .find_map(|len| index.get(&tokens[..len].join(" ")).copied())
}

fn absorb_ancestors(leaf: &Candidate, arena: &[Candidate]) -> CanonicalSpecies {
    let mut aliases = Vec::new();
    let mut mention_list = leaf.mentions.clone();

    let mut cursor = leaf.parent;
    while let Some(idx) = cursor {
        let ancestor = &arena[idx];
        aliases.push(ancestor.name.clone());
        mention_list.extend(ancestor.mentions.iter().cloned());
        cursor = ancestor.parent;
    }
    mention_list.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.normalized_text.cmp(&b.normalized_text))
    });

    CanonicalSpecies {
        canonical_name: leaf.name.clone(),
        rank: leaf.rank,
        parent_name: leaf.parent.map(|idx| arena[idx].name.clone()),
        aliases,
        mention_list,
        filter_status: FilterStatus::NotApplied,
    }
}

fn dedupe_and_sort(mentions: Vec<NameMention>) -> Vec<NameMention> {
    let mut seen: HashSet<(u32, usize, usize, String)> = HashSet::new();
    let mut unique: Vec<NameMention> = mentions
        .into_iter()
        .filter(|m| {
            seen.insert((
                m.page_number,
                m.start_offset,
                m.end_offset,
                m.normalized_text.clone(),
            ))
        })
        .collect();
    unique.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.normalized_text.cmp(&b.normalized_text))
    });
    unique
}

/// Every mention of a species list, deduplicated, in document order
pub fn flatten_mentions(species: &[CanonicalSpecies]) -> Vec<NameMention> {
    dedupe_and_sort(species.iter().flat_map(|s| s.mention_list.iter().cloned()).collect())
}
