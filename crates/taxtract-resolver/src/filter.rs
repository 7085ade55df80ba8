//! Optional restriction of the species list to a taxonomic group

use crate::error::FilterLookupError;
use taxtract_domain::traits::RankLookup;
use taxtract_domain::{CanonicalSpecies, FilterStatus, LookupOutcome, TargetGroup};
use tracing::{debug, info, warn};

/// Result of applying the filter
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Species kept, in input order
    pub retained: Vec<CanonicalSpecies>,
    /// Canonical names placed outside the target group
    pub excluded: Vec<String>,
    /// Lookup failures; the affected species are retained as unverified
    pub errors: Vec<FilterLookupError>,
}

/// Filters species through a rank-lookup collaborator
#[derive(Debug, Clone)]
pub struct TaxonomicFilter<L> {
    lookup: L,
    target: Option<TargetGroup>,
}

impl<L: RankLookup> TaxonomicFilter<L> {
    /// Create a filter; `None` leaves every species untouched
    pub fn new(lookup: L, target: Option<TargetGroup>) -> Self {
        Self { lookup, target }
    }

    /// Configured target group
    pub fn target(&self) -> Option<&TargetGroup> {
        self.target.as_ref()
    }

    /// Apply the filter
    ///
    /// Species inside the group are `verified`; species the lookup cannot
    /// place (not found, ambiguous, or failing) stay as `unverified`. Only a
    /// classification that positively lacks the group excludes a species.
    pub async fn apply(&self, species: Vec<CanonicalSpecies>) -> FilterOutcome {
        let Some(target) = &self.target else {
            return FilterOutcome {
                retained: species,
                ..Default::default()
            };
        };

        let mut outcome = FilterOutcome::default();
        for mut entry in species {
            match self.lookup.classify(&entry.canonical_name).await {
                Ok(LookupOutcome::Found(path)) if path.contains(target) => {
                    debug!(species = %entry.canonical_name, "Species inside target group");
                    entry.filter_status = FilterStatus::Verified;
                    outcome.retained.push(entry);
                }
                Ok(LookupOutcome::Found(_)) => {
                    debug!(species = %entry.canonical_name, group = %target.name, "Species excluded");
                    outcome.excluded.push(entry.canonical_name);
                }
                Ok(LookupOutcome::NotFound) | Ok(LookupOutcome::Ambiguous) => {
                    entry.filter_status = FilterStatus::Unverified;
                    outcome.retained.push(entry);
                }
                Err(e) => {
                    let error = FilterLookupError {
                        name: entry.canonical_name.clone(),
                        message: e.to_string(),
                    };
                    warn!(%error, "Keeping species as unverified");
                    outcome.errors.push(error);
                    entry.filter_status = FilterStatus::Unverified;
                    outcome.retained.push(entry);
                }
            }
        }

        info!(
            group = %target.name,
            retained = outcome.retained.len(),
            excluded = outcome.excluded.len(),
            lookup_errors = outcome.errors.len(),
            "Applied taxonomic filter"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticRankLookup;
    use taxtract_domain::{ClassificationPath, Rank, RankedName};

    fn species(name: &str) -> CanonicalSpecies {
        CanonicalSpecies {
            canonical_name: name.to_string(),
            rank: Rank::Species,
            parent_name: None,
            aliases: vec![],
            mention_list: vec![],
            filter_status: FilterStatus::NotApplied,
        }
    }

    fn lookup() -> StaticRankLookup {
        let mut lookup = StaticRankLookup::new();
        lookup.insert(
            "Falco peregrinus",
            ClassificationPath(vec![RankedName::new("class", "Aves"), RankedName::new("family", "Falconidae")]),
        );
        lookup.insert(
            "Bufo bufo",
            ClassificationPath(vec![RankedName::new("class", "Amphibia"), RankedName::new("family", "Bufonidae")]),
        );
        lookup
    }

    fn birds() -> Option<TargetGroup> {
        Some(TargetGroup {
            name: "aves".to_string(),
            rank: None,
        })
    }

    struct FailingLookup;

    impl RankLookup for FailingLookup {
        type Error = String;

        async fn classify(&self, _name: &str) -> Result<LookupOutcome, Self::Error> {
            Err("service unavailable".to_string())
        }
    }

    #[tokio::test]
    async fn test_no_target_keeps_everything() {
        let filter = TaxonomicFilter::new(lookup(), None);
        let outcome = filter.apply(vec![species("Bufo bufo")]).await;
        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.retained[0].filter_status, FilterStatus::NotApplied);
    }

    #[tokio::test]
    async fn test_filter_by_group() {
        let filter = TaxonomicFilter::new(lookup(), birds());
        let outcome = filter
            .apply(vec![species("Falco peregrinus"), species("Bufo bufo"), species("Unknown thing")])
            .await;

        let kept: Vec<(&str, FilterStatus)> = outcome
            .retained
            .iter()
            .map(|s| (s.canonical_name.as_str(), s.filter_status))
            .collect();
        assert_eq!(
            kept,
            vec![
                ("Falco peregrinus", FilterStatus::Verified),
                ("Unknown thing", FilterStatus::Unverified)
            ]
        );
        assert_eq!(outcome.excluded, vec!["Bufo bufo".to_string()]);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_rank_restriction() {
        let target = Some(TargetGroup {
            name: "Aves".to_string(),
            rank: Some("family".to_string()),
        });
        let filter = TaxonomicFilter::new(lookup(), target);
        let outcome = filter.apply(vec![species("Falco peregrinus")]).await;
        assert!(outcome.retained.is_empty());
        assert_eq!(outcome.excluded.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_fatal() {
        let filter = TaxonomicFilter::new(FailingLookup, birds());
        let outcome = filter.apply(vec![species("Falco peregrinus")]).await;

        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.retained[0].filter_status, FilterStatus::Unverified);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].name, "Falco peregrinus");
        assert!(outcome.errors[0].message.contains("unavailable"));
    }
}
