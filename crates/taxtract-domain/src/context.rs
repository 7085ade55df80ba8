//! Context units handed to the model

use crate::ids::ContextId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the model sees a text window or a page image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text window around each mention
    #[default]
    Text,
    /// Rendered page image, one per page
    Image,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

/// Which occurrences of a species produce records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrencePolicy {
    /// Only the first occurrence in document order
    #[default]
    FirstOnly,
    /// Every occurrence
    All,
}

/// Reference to a rendered page image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// File path or URI of the image
    pub uri: String,

    /// MIME type, e.g. `image/png`
    pub mime_type: String,
}

/// Character offsets of a text window within its page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl TextSpan {
    /// Whether two spans share at least one character or touch
    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Smallest span covering both
    pub fn union(&self, other: &TextSpan) -> TextSpan {
        TextSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Payload of a context unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ContextPayload {
    /// Normalized text window
    Text(String),
    /// Page image reference
    Image(ImageRef),
}

/// One unit of input for one extraction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextUnit {
    /// Unit identifier
    pub id: ContextId,

    /// Canonical name of the species the unit belongs to
    pub species_ref: String,

    /// 1-indexed page number
    pub page_number: u32,

    /// Text or image
    pub modality: Modality,

    /// Window text or image reference
    pub payload: ContextPayload,

    /// Window offsets; `None` for image units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TextSpan>,
}

impl ContextUnit {
    /// Window text, if this is a text unit
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            ContextPayload::Text(text) => Some(text),
            ContextPayload::Image(_) => None,
        }
    }

    /// Image reference, if this is an image unit
    pub fn image(&self) -> Option<&ImageRef> {
        match &self.payload {
            ContextPayload::Image(image) => Some(image),
            ContextPayload::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap_and_union() {
        let a = TextSpan { start: 0, end: 10 };
        let b = TextSpan { start: 8, end: 20 };
        let c = TextSpan { start: 30, end: 40 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.union(&b), TextSpan { start: 0, end: 20 });
    }

    #[test]
    fn test_payload_accessors() {
        let unit = ContextUnit {
            id: ContextId::new(),
            species_ref: "Bufo bufo".to_string(),
            page_number: 2,
            modality: Modality::Text,
            payload: ContextPayload::Text("Bufo bufo lives in ponds".to_string()),
            span: Some(TextSpan { start: 0, end: 24 }),
        };
        assert_eq!(unit.text(), Some("Bufo bufo lives in ponds"));
        assert!(unit.image().is_none());
    }
}
