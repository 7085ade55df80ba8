//! In-memory classification table

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use taxtract_domain::traits::RankLookup;
use taxtract_domain::{ClassificationPath, LookupOutcome};

/// Rank lookup backed by a fixed table
///
/// A name with one path is found, with several paths ambiguous, and absent
/// names are not found. Names compare case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticRankLookup {
    table: HashMap<String, Vec<ClassificationPath>>,
}

impl StaticRankLookup {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a classification path for `name`
    pub fn insert(&mut self, name: impl Into<String>, path: ClassificationPath) {
        self.table
            .entry(name.into().to_lowercase())
            .or_default()
            .push(path);
    }

    /// Number of names in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Look a name up synchronously
    pub fn outcome(&self, name: &str) -> LookupOutcome {
        let key = name.trim().to_lowercase();
        let found = self
            .table
            .get(&key)
            .or_else(|| self.table.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v));
        match found.map(Vec::as_slice) {
            None | Some([]) => LookupOutcome::NotFound,
            Some([path]) => LookupOutcome::Found(path.clone()),
            Some(_) => LookupOutcome::Ambiguous,
        }
    }
}

impl FromIterator<(String, ClassificationPath)> for StaticRankLookup {
    fn from_iter<I: IntoIterator<Item = (String, ClassificationPath)>>(iter: I) -> Self {
        let mut lookup = Self::new();
        for (name, path) in iter {
            lookup.insert(name, path);
        }
        lookup
    }
}

impl RankLookup for StaticRankLookup {
    type Error = Infallible;

    async fn classify(&self, name: &str) -> Result<LookupOutcome, Self::Error> {
        Ok(self.outcome(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxtract_domain::RankedName;

    fn path(class: &str) -> ClassificationPath {
        ClassificationPath(vec![RankedName::new("kingdom", "Animalia"), RankedName::new("class", class)])
    }

    #[test]
    fn test_outcomes() {
        let mut lookup = StaticRankLookup::new();
        lookup.insert("Bufo bufo", path("Amphibia"));
        lookup.insert("Morus alba", path("Aves"));
        lookup.insert("Morus alba", path("Magnoliopsida"));

        assert_eq!(lookup.outcome("bufo bufo"), LookupOutcome::Found(path("Amphibia")));
        assert_eq!(lookup.outcome("Morus alba"), LookupOutcome::Ambiguous);
        assert_eq!(lookup.outcome("Rana temporaria"), LookupOutcome::NotFound);
    }

    #[test]
    fn test_table_deserializes_from_json() {
        let json = r#"{"Bufo bufo": [[{"rank": "class", "name": "Amphibia"}]]}"#;
        let lookup: StaticRankLookup = serde_json::from_str(json).unwrap();
        assert_eq!(lookup.len(), 1);
        assert!(matches!(lookup.outcome("Bufo bufo"), LookupOutcome::Found(_)));
    }
}
