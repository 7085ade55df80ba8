//! Scientific-name normalization
//!
//! Turns recognizer output such as `"Bufo bufo (Linnaeus, 1758)"`,
//! `"FALCO PEREGRINUS"` or `"Poa annua var.\nreptans"` into the comparison
//! form `Genus epithet [infraspecific]` and reads the rank off the name.

use crate::error::RejectReason;
use taxtract_domain::{NameMention, Rank, RawMention};

/// Rank qualifiers and the rank they introduce
const QUALIFIERS: &[(&str, Rank)] = &[
    ("ssp.", Rank::Subspecies),
    ("ssp", Rank::Subspecies),
    ("subsp.", Rank::Subspecies),
    ("subsp", Rank::Subspecies),
    ("var.", Rank::Variety),
    ("var", Rank::Variety),
    ("f.", Rank::Form),
    ("fo.", Rank::Form),
    ("forma", Rank::Form),
];

/// Abbreviations that end a name ("Bufo cf. bufo", "Bufo sp.")
const STOP_ABBREVIATIONS: &[&str] = &["cf.", "aff.", "sp.", "spp.", "nr.", "s.l.", "s.str."];

/// Nomenclatural remarks and lowercase author particles that end a name,
/// matched with or without a trailing period ("comb. nov.", "sensu lato",
/// "de Witte")
const STOP_WORDS: &[&str] = &[
    "comb", "nov", "nom", "nud", "stat", "syn", "emend", "auct", "sensu", "non", "nec", "ex", "et",
    "in", "de", "da", "du", "van", "von", "der", "le", "la",
];

/// Most epithets kept after the genus
const MAX_EPITHETS: usize = 2;

/// Normalizes raw names for comparison
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    allow_genus_only: bool,
}

impl NameNormalizer {
    /// Create a normalizer that rejects genus-only names
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept single-token (genus-only) names
    pub fn allow_genus_only(mut self, allow: bool) -> Self {
        self.allow_genus_only = allow;
        self
    }

    /// Normalize one recognizer mention
    pub fn normalize(&self, raw: &RawMention) -> Result<NameMention, RejectReason> {
        let (normalized_text, rank) = self.normalize_name(&raw.raw_text)?;
        Ok(NameMention {
            raw_text: raw.raw_text.clone(),
            normalized_text,
            rank,
            page_number: raw.page_number,
            start_offset: raw.start_offset,
            end_offset: raw.end_offset,
            source_confidence: raw.source_confidence,
        })
    }

    /// Normalize a name string, returning the comparison text and its rank
    pub fn normalize_name(&self, raw: &str) -> Result<(String, Rank), RejectReason> {
        let joined = join_hyphenated_breaks(raw);
        let shouting = is_all_uppercase(&joined);

        let mut tokens = joined.split_whitespace();

        let genus = tokens
            .by_ref()
            .map(strip_enclosing)
            .find(|t| !t.is_empty())
            .ok_or(RejectReason::Empty)?;
        let genus = strip_trailing_period(genus);
        if genus.chars().count() < 2 || !genus.chars().all(char::is_alphabetic) {
            return Err(RejectReason::NotAName(genus.to_string()));
        }
        let genus = capitalize(genus);

        let mut epithets: Vec<String> = Vec::new();
        let mut qualified_rank: Option<Rank> = None;

        let mut tokens = tokens.enumerate().peekable();
        while let Some((position, token)) = tokens.next() {
            if position == 0 && is_subgenus(token) {
                continue;
            }
            let cleaned = strip_enclosing(token);
            if cleaned.is_empty() {
                break;
            }
            let lowered = cleaned.to_lowercase();

            if let Some(rank) = qualifier_rank(&lowered) {
                if epithets.len() == 1 && qualified_rank.is_none() {
                    qualified_rank = Some(rank);
                    continue;
                }
                break;
            }
            if STOP_ABBREVIATIONS.contains(&lowered.as_str()) || is_stop_word(&lowered) {
                break;
            }

            let ends_sentence = cleaned.ends_with('.');
            // Past the species epithet a period-terminated word followed by
            // more text is an abbreviation, not an epithet
            if ends_sentence && !epithets.is_empty() && tokens.peek().is_some() {
                break;
            }
            let word = strip_trailing_period(cleaned);
            if !is_epithet(word, shouting) {
                break;
            }
            epithets.push(word.to_lowercase());

            if ends_sentence || epithets.len() == MAX_EPITHETS || token_ends_name(token) {
                break;
            }
        }

        if epithets.is_empty() {
            if self.allow_genus_only {
                return Ok((genus, Rank::Genus));
            }
            return Err(RejectReason::GenusOnly(genus));
        }

        let rank = match qualified_rank {
            Some(rank) if epithets.len() == 2 => rank,
            _ => Rank::from_token_count(epithets.len() + 1),
        };

        let mut normalized = genus;
        for epithet in &epithets {
            normalized.push(' ');
            normalized.push_str(epithet);
        }
        Ok((normalized, rank))
    }
}

/// Remove hyphenated line breaks ("sapi-\nens") and soft hyphens
fn join_hyphenated_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().filter(|&c| c != '\u{00AD}').collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t' || chars[j] == '\r') {
                j += 1;
            }
            if j < chars.len() && chars[j] == '\n' {
                j += 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn is_enclosing(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | '"' | '\'' | ',' | ';' | ':' | '*' | '\u{201C}'
            | '\u{201D}' | '\u{2018}' | '\u{2019}'
    )
}

fn strip_enclosing(token: &str) -> &str {
    token.trim_matches(is_enclosing)
}

fn strip_trailing_period(token: &str) -> &str {
    token.strip_suffix('.').unwrap_or(token)
}

/// A closing bracket or separator after the word means the name stops there
fn token_ends_name(token: &str) -> bool {
    token.ends_with(|c: char| matches!(c, ')' | ']' | ',' | ';' | ':'))
}

fn is_subgenus(token: &str) -> bool {
    let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return false;
    };
    let mut chars = inner.chars();
    matches!(chars.next(), Some(c) if c.is_uppercase())
        && inner.chars().count() > 1
        && chars.all(char::is_lowercase)
}

fn is_stop_word(lowered: &str) -> bool {
    lowered.starts_with("d'")
        || lowered.starts_with("d\u{2019}")
        || STOP_WORDS.contains(&strip_trailing_period(lowered))
}

fn qualifier_rank(lowered: &str) -> Option<Rank> {
    QUALIFIERS
        .iter()
        .find(|(q, _)| *q == lowered)
        .map(|(_, rank)| *rank)
}

fn is_epithet(word: &str, shouting: bool) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let starts_right = if shouting { first.is_alphabetic() } else { first.is_lowercase() };
    starts_right
        && word.chars().count() > 1
        && word.chars().all(|c| c.is_alphabetic() || c == '-')
        && !word.ends_with('-')
        && (shouting || word.chars().all(|c| !c.is_uppercase()))
}

fn is_all_uppercase(text: &str) -> bool {
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> Result<(String, Rank), RejectReason> {
        NameNormalizer::new().normalize_name(raw)
    }

    fn name(raw: &str) -> String {
        norm(raw).unwrap().0
    }

    #[test]
    fn test_plain_binomial() {
        assert_eq!(norm("Bufo bufo").unwrap(), ("Bufo bufo".to_string(), Rank::Species));
    }

    #[test]
    fn test_whitespace_and_line_breaks_collapse() {
        assert_eq!(name("  Bufo \n  bufo  "), "Bufo bufo");
        assert_eq!(name("Homo sapi-\nens"), "Homo sapiens");
        assert_eq!(name("Homo sapi- \r\n  ens"), "Homo sapiens");
    }

    #[test]
    fn test_casing() {
        assert_eq!(name("FALCO PEREGRINUS"), "Falco peregrinus");
        assert_eq!(name("falco peregrinus"), "Falco peregrinus");
    }

    #[test]
    fn test_authorship_is_dropped() {
        assert_eq!(name("Bufo bufo (Linnaeus, 1758)"), "Bufo bufo");
        assert_eq!(name("Bufo bufo L."), "Bufo bufo");
        assert_eq!(name("Parus major Linnaeus 1758"), "Parus major");
    }

    #[test]
    fn test_enclosing_punctuation() {
        assert_eq!(name("(Bufo bufo)"), "Bufo bufo");
        assert_eq!(name("\"Bufo bufo\","), "Bufo bufo");
        assert_eq!(name("Bufo bufo."), "Bufo bufo");
    }

    #[test]
    fn test_qualifiers_set_rank() {
        assert_eq!(
            norm("Falco peregrinus ssp. pelegrinoides").unwrap(),
            ("Falco peregrinus pelegrinoides".to_string(), Rank::Subspecies)
        );
        assert_eq!(
            norm("Poa annua var. reptans").unwrap(),
            ("Poa annua reptans".to_string(), Rank::Variety)
        );
        assert_eq!(
            norm("Quercus robur f. fastigiata").unwrap(),
            ("Quercus robur fastigiata".to_string(), Rank::Form)
        );
        assert_eq!(
            norm("Falco peregrinus subsp. pelegrinoides").unwrap().1,
            Rank::Subspecies
        );
    }

    #[test]
    fn test_third_epithet_is_subspecies() {
        assert_eq!(
            norm("Falco peregrinus pelegrinoides").unwrap(),
            ("Falco peregrinus pelegrinoides".to_string(), Rank::Subspecies)
        );
    }

    #[test]
    fn test_dangling_qualifier_ignored() {
        assert_eq!(norm("Poa annua var.").unwrap(), ("Poa annua".to_string(), Rank::Species));
    }

    #[test]
    fn test_subgenus_skipped() {
        assert_eq!(name("Bufo (Bufo) bufo"), "Bufo bufo");
    }

    #[test]
    fn test_open_nomenclature_stops() {
        assert_eq!(name("Bufo bufo cf. spinosus"), "Bufo bufo");
        assert!(matches!(norm("Bufo sp."), Err(RejectReason::GenusOnly(_))));
    }

    #[test]
    fn test_nomenclatural_remarks_stop() {
        for raw in [
            "Bufo bufo comb. nov.",
            "Bufo bufo nom. nud.",
            "Bufo bufo syn. nov.",
            "Bufo bufo stat. nov.",
            "Bufo bufo emend. Smith",
            "Bufo bufo auct.",
            "Bufo bufo auct. non Linnaeus",
            "Bufo bufo sensu lato",
            "Bufo bufo sensu stricto",
            "Bufo bufo non Laurenti",
            "Bufo bufo Laurenti ex Gray",
            "BUFO BUFO COMB. NOV.",
        ] {
            assert_eq!(norm(raw).unwrap(), ("Bufo bufo".to_string(), Rank::Species), "{}", raw);
        }
    }

    #[test]
    fn test_author_particles_stop() {
        for raw in [
            "Bufo bufo de Witte, 1930",
            "Bufo bufo van Kampen",
            "Bufo bufo von Tschudi 1838",
            "Bufo bufo da Silva",
            "Bufo bufo du Bois",
            "Bufo bufo le Conte",
            "Bufo bufo d'Orbigny",
            "Bufo bufo d\u{2019}Orbigny",
        ] {
            assert_eq!(norm(raw).unwrap(), ("Bufo bufo".to_string(), Rank::Species), "{}", raw);
        }
    }

    #[test]
    fn test_abbreviation_is_not_an_epithet() {
        assert_eq!(name("Bufo bufo xyz. nov."), "Bufo bufo");
        assert_eq!(
            norm("Falco peregrinus pelegrinoides.").unwrap(),
            ("Falco peregrinus pelegrinoides".to_string(), Rank::Subspecies)
        );
    }

    #[test]
    fn test_hyphenated_epithet() {
        assert_eq!(name("Aster novae-angliae"), "Aster novae-angliae");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(norm(""), Err(RejectReason::Empty));
        assert_eq!(norm("  ( ) "), Err(RejectReason::Empty));
        assert_eq!(norm("Bufo"), Err(RejectReason::GenusOnly("Bufo".to_string())));
        assert!(matches!(norm("1758 bufo"), Err(RejectReason::NotAName(_))));
    }

    #[test]
    fn test_genus_only_allowed() {
        let normalizer = NameNormalizer::new().allow_genus_only(true);
        assert_eq!(
            normalizer.normalize_name("Bufo").unwrap(),
            ("Bufo".to_string(), Rank::Genus)
        );
    }

    #[test]
    fn test_normalize_keeps_provenance() {
        let raw = RawMention {
            raw_text: "Bufo bufo (L.)".to_string(),
            page_number: 4,
            start_offset: 10,
            end_offset: 24,
            source_confidence: Some(0.9),
        };
        let mention = NameNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(mention.raw_text, "Bufo bufo (L.)");
        assert_eq!(mention.normalized_text, "Bufo bufo");
        assert_eq!(mention.page_number, 4);
        assert_eq!((mention.start_offset, mention.end_offset), (10, 24));
        assert_eq!(mention.source_confidence, Some(0.9));
    }

    #[test]
    fn test_normalization_is_stable() {
        for raw in ["Bufo bufo", "FALCO PEREGRINUS PELEGRINOIDES", "Homo sapi-\nens (L.)"] {
            let once = name(raw);
            assert_eq!(name(&once), once);
        }
    }
}
