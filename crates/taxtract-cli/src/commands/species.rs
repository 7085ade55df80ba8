//! Species command implementation.

use crate::cli::SpeciesArgs;
use crate::config::load_project;
use crate::error::Result;
use crate::output::Formatter;
use taxtract_extractor::{DocumentBundle, Identification};
use taxtract_resolver::{HierarchyResolver, NameNormalizer, TaxonomicFilter};

/// Execute the species command.
///
/// Resolves the bundle's names with the project's normalization and filter
/// settings. No model is called.
pub async fn execute_species(args: SpeciesArgs, formatter: &Formatter) -> Result<()> {
    let project = load_project(&args.project)?;
    let bundle = DocumentBundle::load(&args.bundle)?;

    let normalizer = NameNormalizer::new().allow_genus_only(project.run.allow_genus_only);
    let resolution = HierarchyResolver::new(normalizer).resolve_raw(&bundle.mentions)?;
    let filtered = TaxonomicFilter::new(bundle.rank_lookup(), project.run.target_group.clone())
        .apply(resolution.species)
        .await;

    let identification = Identification {
        species: filtered.retained,
        excluded: filtered.excluded,
        rejected: resolution.rejected,
        lookup_errors: filtered.errors,
    };
    println!("{}", formatter.species(&identification)?);
    Ok(())
}
