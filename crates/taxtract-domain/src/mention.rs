//! Scientific-name mentions and taxonomic ranks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank of a scientific name as far as it can be read off the name itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Uninomial (genus only)
    Genus,
    /// Binomial "Genus species"
    Species,
    /// Trinomial, with or without an `ssp.`/`subsp.` qualifier
    Subspecies,
    /// Trinomial with a `var.` qualifier
    Variety,
    /// Trinomial with an `f.`/`forma` qualifier
    Form,
}

impl Rank {
    /// Get the rank name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Subspecies => "subspecies",
            Rank::Variety => "variety",
            Rank::Form => "form",
        }
    }

    /// Rank implied by the number of name tokens when no qualifier is present
    pub fn from_token_count(count: usize) -> Self {
        match count {
            0 | 1 => Rank::Genus,
            2 => Rank::Species,
            _ => Rank::Subspecies,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name occurrence as returned by the external name-recognition service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMention {
    /// Verbatim text found in the document
    pub raw_text: String,

    /// 1-indexed page number
    pub page_number: u32,

    /// Start offset (characters) within the page text
    pub start_offset: usize,

    /// End offset (characters, exclusive) within the page text
    pub end_offset: usize,

    /// Recognizer confidence, if it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_confidence: Option<f64>,
}

impl RawMention {
    /// Create a raw mention without a confidence score
    pub fn new(raw_text: impl Into<String>, page_number: u32, start_offset: usize, end_offset: usize) -> Self {
        Self {
            raw_text: raw_text.into(),
            page_number,
            start_offset,
            end_offset,
            source_confidence: None,
        }
    }
}

/// A normalized name occurrence; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameMention {
    /// Verbatim text found in the document
    pub raw_text: String,

    /// Comparison form ("Genus species [infraspecific]")
    pub normalized_text: String,

    /// Rank read off the name
    pub rank: Rank,

    /// 1-indexed page number
    pub page_number: u32,

    /// Start offset (characters) within the page text
    pub start_offset: usize,

    /// End offset (characters, exclusive) within the page text
    pub end_offset: usize,

    /// Recognizer confidence, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_confidence: Option<f64>,
}

impl NameMention {
    /// Tokens of the normalized name
    pub fn tokens(&self) -> Vec<&str> {
        self.normalized_text.split_whitespace().collect()
    }

    /// Document position used for ordering and deduplication
    pub fn position(&self) -> (u32, usize, usize) {
        (self.page_number, self.start_offset, self.end_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_from_token_count() {
        assert_eq!(Rank::from_token_count(1), Rank::Genus);
        assert_eq!(Rank::from_token_count(2), Rank::Species);
        assert_eq!(Rank::from_token_count(3), Rank::Subspecies);
    }

    #[test]
    fn test_raw_mention_confidence_is_optional() {
        let json = r#"{"raw_text":"Bufo bufo","page_number":1,"start_offset":0,"end_offset":9}"#;
        let mention: RawMention = serde_json::from_str(json).unwrap();
        assert_eq!(mention.source_confidence, None);
        assert_eq!(mention, RawMention::new("Bufo bufo", 1, 0, 9));
    }
}
