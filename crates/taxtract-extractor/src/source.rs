//! Document bundles
//!
//! Text extraction, page rendering and name recognition happen outside this
//! workspace. Their output reaches the pipeline as a JSON bundle:
//!
//! ```json
//! {
//!   "document_name": "toads.pdf",
//!   "pages": [
//!     { "number": 1, "text": "Bufo bufo lives in damp woodland.", "image": "pages/1.png" }
//!   ],
//!   "mentions": [
//!     { "raw_text": "Bufo bufo", "page_number": 1, "start_offset": 0, "end_offset": 9 }
//!   ],
//!   "classifications": {
//!     "Bufo bufo": [[{ "rank": "class", "name": "Amphibia" }]]
//!   }
//! }
//! ```
//!
//! Relative image paths are resolved against the bundle's directory.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use taxtract_domain::traits::PageSource;
use taxtract_domain::{ClassificationPath, ImageRef, RawMention};
use taxtract_resolver::StaticRankLookup;
use tracing::info;

/// One page of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePage {
    /// 1-indexed page number
    pub number: u32,

    /// Extracted page text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Path or URI of the rendered page image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Pages, recognized names and optional classifications of one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentBundle {
    /// Name of the source document
    pub document_name: String,

    /// Pages
    #[serde(default)]
    pub pages: Vec<BundlePage>,

    /// Name recognizer output in document order
    #[serde(default)]
    pub mentions: Vec<RawMention>,

    /// Classification paths per name, for the taxonomic filter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifications: BTreeMap<String, Vec<ClassificationPath>>,
}

impl DocumentBundle {
    /// Parse a bundle from JSON
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let bundle: Self = serde_json::from_str(text)?;
        bundle.check()?;
        Ok(bundle)
    }

    /// Load a bundle file, resolving image paths against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Source(format!("{}: {}", path.display(), e)))?;
        let mut bundle = Self::from_json(&text)?;

        if let Some(dir) = path.parent() {
            for page in &mut bundle.pages {
                if let Some(image) = &mut page.image {
                    if !image.contains("://") && Path::new(image.as_str()).is_relative() {
                        *image = dir.join(image.as_str()).to_string_lossy().into_owned();
                    }
                }
            }
        }

        info!(
            document = %bundle.document_name,
            pages = bundle.pages.len(),
            mentions = bundle.mentions.len(),
            "Loaded document bundle"
        );
        Ok(bundle)
    }

    /// Page by number
    pub fn page(&self, number: u32) -> Option<&BundlePage> {
        self.pages.iter().find(|p| p.number == number)
    }

    /// Classification table for the taxonomic filter
    pub fn rank_lookup(&self) -> StaticRankLookup {
        self.classifications
            .iter()
            .flat_map(|(name, paths)| paths.iter().map(move |path| (name.clone(), path.clone())))
            .collect()
    }

    fn check(&self) -> Result<(), PipelineError> {
        if let Some(page) = self.pages.iter().find(|p| p.number == 0) {
            return Err(PipelineError::Source(format!(
                "page numbers are 1-indexed, found page {}",
                page.number
            )));
        }
        let mut numbers: Vec<u32> = self.pages.iter().map(|p| p.number).collect();
        numbers.sort_unstable();
        if let Some(pair) = numbers.windows(2).find(|w| w[0] == w[1]) {
            return Err(PipelineError::Source(format!("page {} listed twice", pair[0])));
        }
        Ok(())
    }
}

impl PageSource for DocumentBundle {
    fn page_text(&self, page_number: u32) -> Option<String> {
        self.page(page_number)
            .and_then(|p| p.text.clone())
            .filter(|t| !t.trim().is_empty())
    }

    fn page_image(&self, page_number: u32) -> Option<ImageRef> {
        let uri = self.page(page_number)?.image.clone()?;
        Some(ImageRef {
            mime_type: mime_type_for(&uri).to_string(),
            uri,
        })
    }
}

fn mime_type_for(uri: &str) -> &'static str {
    let extension = uri.rsplit('.').next().unwrap_or_default().to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxtract_domain::LookupOutcome;

    const BUNDLE: &str = r#"{
        "document_name": "toads.pdf",
        "pages": [
            { "number": 1, "text": "Bufo bufo lives in damp woodland.", "image": "pages/1.png" },
            { "number": 2, "image": "https://example.org/2.jpg" }
        ],
        "mentions": [
            { "raw_text": "Bufo bufo", "page_number": 1, "start_offset": 0, "end_offset": 9 }
        ],
        "classifications": {
            "Bufo bufo": [[{ "rank": "class", "name": "Amphibia" }]]
        }
    }"#;

    #[test]
    fn test_bundle_page_source() {
        let bundle = DocumentBundle::from_json(BUNDLE).unwrap();

        assert_eq!(bundle.page_text(1).as_deref(), Some("Bufo bufo lives in damp woodland."));
        assert!(bundle.page_text(2).is_none());
        assert!(bundle.page_text(3).is_none());

        let image = bundle.page_image(2).unwrap();
        assert_eq!(image.uri, "https://example.org/2.jpg");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(bundle.page_image(1).unwrap().mime_type, "image/png");
    }

    #[test]
    fn test_bundle_rank_lookup() {
        let bundle = DocumentBundle::from_json(BUNDLE).unwrap();
        let lookup = bundle.rank_lookup();
        assert!(matches!(lookup.outcome("bufo bufo"), LookupOutcome::Found(_)));
        assert_eq!(lookup.outcome("Rana temporaria"), LookupOutcome::NotFound);
    }

    #[test]
    fn test_invalid_pages_rejected() {
        let zero = r#"{"document_name": "x", "pages": [{"number": 0}]}"#;
        assert!(DocumentBundle::from_json(zero).is_err());

        let twice = r#"{"document_name": "x", "pages": [{"number": 1}, {"number": 1}]}"#;
        assert!(DocumentBundle::from_json(twice).is_err());
    }

    #[test]
    fn test_load_resolves_image_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, BUNDLE).unwrap();

        let bundle = DocumentBundle::load(&path).unwrap();

        let image = bundle.page_image(1).unwrap();
        assert_eq!(Path::new(&image.uri), dir.path().join("pages/1.png"));
        assert_eq!(bundle.page_image(2).unwrap().uri, "https://example.org/2.jpg");
    }
}
