//! Confirm and correct command implementations.

use crate::cli::{ConfirmArgs, CorrectArgs};
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::collections::BTreeMap;
use taxtract_domain::RecordId;
use taxtract_report::RunReport;

/// Execute the confirm command.
///
/// Either every record is confirmed and the report saved, or nothing is
/// written.
pub async fn execute_confirm(args: ConfirmArgs, formatter: &Formatter) -> Result<()> {
    let mut report = RunReport::load(&args.report)?;
    let confirmed = args
        .records
        .iter()
        .map(|id| report.confirm(id))
        .collect::<std::result::Result<Vec<RecordId>, _>>()?;
    report.save(&args.report)?;

    for id in &confirmed {
        match formatter.format() {
            OutputFormat::Quiet => println!("{}", id),
            _ => println!("{}", formatter.success(&format!("Confirmed record {}", id.short()))),
        }
    }
    Ok(())
}

/// Execute the correct command.
pub async fn execute_correct(args: CorrectArgs, formatter: &Formatter) -> Result<()> {
    let values = parse_values(&args.values)?;
    let mut report = RunReport::load(&args.report)?;
    let id = report.correct(&args.record, values)?;
    report.save(&args.report)?;

    match formatter.format() {
        OutputFormat::Quiet => println!("{}", id),
        _ => {
            let record = report.find_record(&id.to_string())?;
            println!("{}", formatter.success(&format!("Corrected record {}", id.short())));
            println!("{}", formatter.records(&report, &[record])?);
        }
    }
    Ok(())
}

/// Parse `field=value` pairs; the value may contain further `=`.
fn parse_values(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for pair in pairs {
        let (field, value) = pair.split_once('=').ok_or_else(|| {
            CliError::InvalidInput(format!("Invalid correction '{}'. Expected 'field=value'", pair))
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(CliError::InvalidInput(format!("Missing field name in '{}'", pair)));
        }
        if values.insert(field.to_string(), value.trim().to_string()).is_some() {
            return Err(CliError::InvalidInput(format!("Field '{}' given twice", field)));
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_values() {
        let values = parse_values(&strings(&["habitat=Wetland", "diet = insects, worms"])).unwrap();
        assert_eq!(values["habitat"], "Wetland");
        assert_eq!(values["diet"], "insects, worms");
    }

    #[test]
    fn test_parse_value_with_equals_sign() {
        let values = parse_values(&strings(&["note=a=b"])).unwrap();
        assert_eq!(values["note"], "a=b");
    }

    #[test]
    fn test_parse_values_invalid() {
        assert!(parse_values(&strings(&["habitat"])).is_err());
        assert!(parse_values(&strings(&["=Wetland"])).is_err());
        assert!(parse_values(&strings(&["habitat=A", "habitat=B"])).is_err());
    }
}
