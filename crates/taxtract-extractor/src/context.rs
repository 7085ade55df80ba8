//! Context units for extraction requests
//!
//! Text runs cut a window of `before` / `after` characters around every
//! mention, clipped to its page. Windows of one species that overlap on the
//! same page are merged into a single unit. Image runs produce one unit per
//! page the species is mentioned on.

use crate::config::RunSettings;
use crate::error::ContextBuildError;
use std::collections::BTreeMap;
use taxtract_domain::traits::PageSource;
use taxtract_domain::{
    CanonicalSpecies, ContextId, ContextPayload, ContextUnit, Modality, OccurrencePolicy, TextSpan,
};
use tracing::{debug, warn};

/// An occurrence that could not be turned into a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFailure {
    /// Canonical species name
    pub species: String,
    /// What went wrong
    pub error: ContextBuildError,
}

/// Units and failures for one species
#[derive(Debug, Clone, Default)]
pub struct ContextSet {
    /// Units in document order
    pub units: Vec<ContextUnit>,
    /// Occurrences that failed, in document order
    pub failures: Vec<ContextFailure>,
}

/// Builds context units from a page source
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    modality: Modality,
    policy: OccurrencePolicy,
    before: usize,
    after: usize,
}

impl ContextBuilder {
    /// Builder with the default window (0 before, 250 after)
    pub fn new(modality: Modality, policy: OccurrencePolicy) -> Self {
        let defaults = RunSettings::default();
        Self {
            modality,
            policy,
            before: defaults.context_before,
            after: defaults.context_after,
        }
    }

    /// Builder configured from run settings
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(settings.modality, settings.occurrence_policy)
            .with_window(settings.context_before, settings.context_after)
    }

    /// Set the window size in characters
    pub fn with_window(mut self, before: usize, after: usize) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Build the units of one species
    ///
    /// Under the first-only policy building stops at the first occurrence
    /// that yields a unit; failures before it are still reported.
    pub fn build<S: PageSource + ?Sized>(&self, species: &CanonicalSpecies, source: &S) -> ContextSet {
        let occurrences = match self.modality {
            Modality::Text => self.text_occurrences(species, source),
            Modality::Image => image_occurrences(species, source),
        };

        let mut set = ContextSet::default();
        for occurrence in occurrences {
            match occurrence {
                Ok(unit) => {
                    set.units.push(unit);
                    if self.policy == OccurrencePolicy::FirstOnly {
                        break;
                    }
                }
                Err(error) => {
                    warn!(species = %species.canonical_name, %error, "Context unit not built");
                    set.failures.push(ContextFailure {
                        species: species.canonical_name.clone(),
                        error,
                    });
                }
            }
        }

        debug!(
            species = %species.canonical_name,
            units = set.units.len(),
            failures = set.failures.len(),
            "Context built"
        );
        set
    }

    fn text_occurrences<S: PageSource + ?Sized>(
        &self,
        species: &CanonicalSpecies,
        source: &S,
    ) -> Vec<Result<ContextUnit, ContextBuildError>> {
        let mut by_page: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
        for mention in &species.mention_list {
            by_page
                .entry(mention.page_number)
                .or_default()
                .push((mention.start_offset, mention.end_offset));
        }

        let mut occurrences = Vec::new();
        for (page, mut offsets) in by_page {
            let Some(text) = source.page_text(page) else {
                occurrences.push(Err(ContextBuildError::MissingPageText { page }));
                continue;
            };
            let chars: Vec<char> = text.chars().collect();
            offsets.sort_unstable();

            let mut windows: Vec<TextSpan> = Vec::new();
            for (start, end) in offsets {
                if start >= end || end > chars.len() {
                    occurrences.push(Err(ContextBuildError::OffsetsOutOfRange {
                        page,
                        start,
                        end,
                        len: chars.len(),
                    }));
                    continue;
                }
                let window = TextSpan {
                    start: start.saturating_sub(self.before),
                    end: end.saturating_add(self.after).min(chars.len()),
                };
                match windows.last_mut() {
                    Some(last) if last.overlaps(&window) => *last = last.union(&window),
                    _ => windows.push(window),
                }
            }

            for span in windows {
                let raw: String = chars[span.start..span.end].iter().collect();
                let normalized = normalize_for_prompt(&raw);
                if normalized.is_empty() {
                    occurrences.push(Err(ContextBuildError::BlankWindow { page }));
                    continue;
                }
                occurrences.push(Ok(ContextUnit {
                    id: ContextId::new(),
                    species_ref: species.canonical_name.clone(),
                    page_number: page,
                    modality: Modality::Text,
                    payload: ContextPayload::Text(normalized),
                    span: Some(span),
                }));
            }
        }
        occurrences
    }
}

fn image_occurrences<S: PageSource + ?Sized>(
    species: &CanonicalSpecies,
    source: &S,
) -> Vec<Result<ContextUnit, ContextBuildError>> {
    species
        .pages()
        .into_iter()
        .map(|page| {
            let image = source
                .page_image(page)
                .ok_or(ContextBuildError::MissingPageImage { page })?;
            Ok(ContextUnit {
                id: ContextId::new(),
                species_ref: species.canonical_name.clone(),
                page_number: page,
                modality: Modality::Image,
                payload: ContextPayload::Image(image),
                span: None,
            })
        })
        .collect()
}

/// Clean extracted page text for a prompt
///
/// Words split across lines with a hyphen are joined, runs of spaces and
/// tabs collapse to one space, lines are trimmed, and blank lines collapse
/// into a single paragraph break.
pub fn normalize_for_prompt(text: &str) -> String {
    let joined = join_hyphenated_breaks(text);

    let mut out = String::with_capacity(joined.len());
    let mut pending_break = false;
    for line in joined.split('\n') {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_break = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_break = false;
    }
    out
}

fn join_hyphenated_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' {
            let mut j = i + 1;
            let mut newline = false;
            while j < chars.len() && chars[j].is_whitespace() {
                newline |= chars[j] == '\n';
                j += 1;
            }
            if newline {
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use taxtract_domain::{FilterStatus, ImageRef, NameMention, Rank};

    #[derive(Default)]
    struct Pages {
        text: HashMap<u32, String>,
        images: HashMap<u32, ImageRef>,
    }

    impl PageSource for Pages {
        fn page_text(&self, page_number: u32) -> Option<String> {
            self.text.get(&page_number).cloned()
        }

        fn page_image(&self, page_number: u32) -> Option<ImageRef> {
            self.images.get(&page_number).cloned()
        }
    }

    fn mention(page: u32, start: usize, end: usize) -> NameMention {
        NameMention {
            raw_text: "Bufo bufo".to_string(),
            normalized_text: "Bufo bufo".to_string(),
            rank: Rank::Species,
            page_number: page,
            start_offset: start,
            end_offset: end,
            source_confidence: None,
        }
    }

    fn species(mentions: Vec<NameMention>) -> CanonicalSpecies {
        CanonicalSpecies {
            canonical_name: "Bufo bufo".to_string(),
            rank: Rank::Species,
            parent_name: None,
            aliases: vec![],
            mention_list: mentions,
            filter_status: FilterStatus::NotApplied,
        }
    }

    fn page_text() -> String {
        // "Bufo bufo" at 0..9 and 40..49
        let text = "Bufo bufo lives in damp woodland areas. Bufo bufo eats insects and worms.";
        assert_eq!(text.chars().skip(40).take(9).collect::<String>(), "Bufo bufo");
        text.to_string()
    }

    #[test]
    fn test_window_clipped_to_page() {
        let pages = Pages {
            text: HashMap::from([(1, page_text())]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Text, OccurrencePolicy::All).with_window(100, 10);

        let set = builder.build(&species(vec![mention(1, 0, 9)]), &pages);

        assert_eq!(set.units.len(), 1);
        assert_eq!(set.units[0].span, Some(TextSpan { start: 0, end: 19 }));
        assert_eq!(set.units[0].text(), Some("Bufo bufo lives in"));
    }

    #[test]
    fn test_overlapping_windows_merge() {
        let pages = Pages {
            text: HashMap::from([(1, page_text())]),
            ..Default::default()
        };
        let species = species(vec![mention(1, 0, 9), mention(1, 40, 49)]);

        let wide = ContextBuilder::new(Modality::Text, OccurrencePolicy::All).with_window(0, 40);
        let set = wide.build(&species, &pages);
        assert_eq!(set.units.len(), 1);
        assert_eq!(set.units[0].span, Some(TextSpan { start: 0, end: 73 }));

        let narrow = ContextBuilder::new(Modality::Text, OccurrencePolicy::All).with_window(0, 5);
        assert_eq!(narrow.build(&species, &pages).units.len(), 2);
    }

    #[test]
    fn test_windows_never_span_pages() {
        let pages = Pages {
            text: HashMap::from([(1, page_text()), (2, "Bufo bufo again.".to_string())]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Text, OccurrencePolicy::All).with_window(500, 500);

        let set = builder.build(&species(vec![mention(1, 40, 49), mention(2, 0, 9)]), &pages);

        assert_eq!(set.units.len(), 2);
        assert_eq!(set.units[1].page_number, 2);
        assert_eq!(set.units[1].text(), Some("Bufo bufo again."));
    }

    #[test]
    fn test_first_only_skips_failed_occurrences() {
        let pages = Pages {
            text: HashMap::from([(2, page_text())]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Text, OccurrencePolicy::FirstOnly).with_window(0, 5);

        let set = builder.build(
            &species(vec![mention(1, 0, 9), mention(2, 0, 9), mention(2, 40, 49)]),
            &pages,
        );

        assert_eq!(set.units.len(), 1);
        assert_eq!(set.units[0].page_number, 2);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].error, ContextBuildError::MissingPageText { page: 1 });
    }

    #[test]
    fn test_offsets_outside_page() {
        let pages = Pages {
            text: HashMap::from([(1, "short".to_string())]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Text, OccurrencePolicy::All);

        let set = builder.build(&species(vec![mention(1, 2, 40)]), &pages);

        assert!(set.units.is_empty());
        assert!(matches!(
            set.failures[0].error,
            ContextBuildError::OffsetsOutOfRange { page: 1, len: 5, .. }
        ));
    }

    #[test]
    fn test_blank_window() {
        let pages = Pages {
            text: HashMap::from([(1, "         ".to_string())]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Text, OccurrencePolicy::All);

        let set = builder.build(&species(vec![mention(1, 0, 4)]), &pages);

        assert_eq!(set.failures[0].error, ContextBuildError::BlankWindow { page: 1 });
    }

    #[test]
    fn test_image_units_one_per_page() {
        let image = |page: u32| ImageRef {
            uri: format!("pages/{}.png", page),
            mime_type: "image/png".to_string(),
        };
        let pages = Pages {
            images: HashMap::from([(1, image(1)), (3, image(3))]),
            ..Default::default()
        };
        let builder = ContextBuilder::new(Modality::Image, OccurrencePolicy::All);

        let set = builder.build(
            &species(vec![mention(1, 0, 9), mention(1, 40, 49), mention(2, 0, 9), mention(3, 0, 9)]),
            &pages,
        );

        assert_eq!(set.units.len(), 2);
        assert_eq!(set.units[0].image(), Some(&image(1)));
        assert_eq!(set.units[1].page_number, 3);
        assert!(set.units[1].span.is_none());
        assert_eq!(set.failures[0].error, ContextBuildError::MissingPageImage { page: 2 });
    }

    #[test]
    fn test_normalize_for_prompt() {
        let text = "  The com-\n  mon toad\tis   found\n\n\n\nin  Europe.  \n It  hibernates.";
        assert_eq!(
            normalize_for_prompt(text),
            "The common toad is found\n\nin Europe.\nIt hibernates."
        );
        assert_eq!(normalize_for_prompt("well-known"), "well-known");
        assert_eq!(normalize_for_prompt(" \n\t\n "), "");
    }
}
