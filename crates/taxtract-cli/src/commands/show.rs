//! Show command implementation.

use crate::cli::ShowArgs;
use crate::error::Result;
use crate::output::Formatter;
use taxtract_domain::ExtractionRecord;
use taxtract_report::RunReport;

/// Execute the show command.
pub async fn execute_show(args: ShowArgs, formatter: &Formatter) -> Result<()> {
    let report = RunReport::load(&args.report)?;

    if let Some(id) = &args.record {
        let record = report.find_record(id)?;
        println!("{}", formatter.record_view(&report, &report.view(record))?);
    } else {
        let records = select_records(&report, args.species.as_deref());
        println!("{}", formatter.records(&report, &records)?);
    }

    if args.errors {
        println!("{}", formatter.error_log(&report.error_log)?);
    }
    Ok(())
}

/// Records of one species (any of its names, ignoring case), or all records.
fn select_records<'a>(report: &'a RunReport, species: Option<&str>) -> Vec<&'a ExtractionRecord> {
    let Some(name) = species.map(str::trim) else {
        return report.records.iter().collect();
    };
    let canonical = report
        .species
        .iter()
        .find(|s| {
            s.answers_to(name)
                || s.canonical_name.eq_ignore_ascii_case(name)
                || s.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
        .map(|s| s.canonical_name.as_str());
    report
        .records
        .iter()
        .filter(|r| match canonical {
            Some(canonical) => r.species_ref == canonical,
            None => r.species_ref.eq_ignore_ascii_case(name),
        })
        .collect()
}
