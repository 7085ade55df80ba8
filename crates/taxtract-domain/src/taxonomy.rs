//! Classification paths returned by taxonomic lookups

use serde::{Deserialize, Serialize};

/// One level of a classification, e.g. `("class", "Amphibia")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedName {
    /// Rank label as reported by the lookup (kingdom, phylum, class, ...)
    pub rank: String,
    /// Taxon name at that rank
    pub name: String,
}

impl RankedName {
    /// Create a ranked name
    pub fn new(rank: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            rank: rank.into(),
            name: name.into(),
        }
    }
}

/// Ordered path from the root of the classification to the species
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationPath(pub Vec<RankedName>);

impl ClassificationPath {
    /// Whether the target group appears in the path
    ///
    /// Names and ranks compare case-insensitively. When the target carries a
    /// rank only entries at that rank count.
    pub fn contains(&self, target: &TargetGroup) -> bool {
        self.0.iter().any(|entry| {
            entry.name.eq_ignore_ascii_case(target.name.trim())
                && target
                    .rank
                    .as_deref()
                    .is_none_or(|rank| entry.rank.eq_ignore_ascii_case(rank.trim()))
        })
    }
}

/// Result of a classification lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "path", rename_all = "snake_case")]
pub enum LookupOutcome {
    /// A single classification was found
    Found(ClassificationPath),
    /// The name is unknown to the lookup
    NotFound,
    /// Several classifications matched
    Ambiguous,
}

/// Taxonomic group a run is restricted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Group name, e.g. `Aves`
    pub name: String,
    /// Optional rank the name must appear at, e.g. `class`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bufo_path() -> ClassificationPath {
        ClassificationPath(vec![
            RankedName::new("kingdom", "Animalia"),
            RankedName::new("class", "Amphibia"),
            RankedName::new("family", "Bufonidae"),
        ])
    }

    #[test]
    fn test_contains_case_insensitive() {
        let target = TargetGroup { name: "amphibia".into(), rank: None };
        assert!(bufo_path().contains(&target));
    }

    #[test]
    fn test_contains_restricted_to_rank() {
        let at_class = TargetGroup { name: "Amphibia".into(), rank: Some("Class".into()) };
        let at_order = TargetGroup { name: "Amphibia".into(), rank: Some("order".into()) };
        assert!(bufo_path().contains(&at_class));
        assert!(!bufo_path().contains(&at_order));
    }

    #[test]
    fn test_missing_group() {
        let target = TargetGroup { name: "Aves".into(), rank: None };
        assert!(!bufo_path().contains(&target));
    }
}
