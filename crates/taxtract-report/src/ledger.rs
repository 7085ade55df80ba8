//! Manual verification overlay
//!
//! Each record starts `unconfirmed` and moves exactly once, to `confirmed` or
//! to `corrected`. The original record is never touched; corrections are
//! stored beside it and merged only when computing effective values.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taxtract_domain::{unix_now, ExtractionRecord, FieldSpec, RecordId, VerificationState, VerificationStatus};
use tracing::info;

/// Verification states keyed by record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationLedger {
    states: BTreeMap<RecordId, VerificationState>,
}

impl VerificationLedger {
    /// Ledger with every record unconfirmed
    pub fn for_records(records: &[ExtractionRecord]) -> Self {
        Self {
            states: records
                .iter()
                .map(|r| (r.id, VerificationState::unconfirmed(r.id)))
                .collect(),
        }
    }

    /// State of one record
    pub fn state(&self, record: RecordId) -> Option<&VerificationState> {
        self.states.get(&record)
    }

    /// All states in record-id order
    pub fn states(&self) -> impl Iterator<Item = &VerificationState> {
        self.states.values()
    }

    /// Accept the extracted values of a record
    pub fn confirm(&mut self, record: RecordId) -> Result<&VerificationState, LedgerError> {
        let state = self.open_state(record)?;
        state.status = VerificationStatus::Confirmed;
        state.updated_at = unix_now();
        info!(%record, "Record confirmed");
        Ok(state)
    }

    /// Replace some values of a record
    ///
    /// Every corrected field must be declared and, for enumerated fields,
    /// the value must be admissible; it is stored in its declared spelling.
    pub fn correct(
        &mut self,
        record: RecordId,
        values: BTreeMap<String, String>,
        fields: &[FieldSpec],
    ) -> Result<&VerificationState, LedgerError> {
        let values = validate_correction(values, fields)?;
        let state = self.open_state(record)?;
        state.status = VerificationStatus::Corrected;
        state.corrected_values = Some(values);
        state.updated_at = unix_now();
        info!(%record, "Record corrected");
        Ok(state)
    }

    /// Values of a record with any correction applied
    pub fn effective_values(&self, record: &ExtractionRecord) -> BTreeMap<String, String> {
        let mut values = record.field_values.clone();
        if let Some(corrections) = self
            .states
            .get(&record.id)
            .and_then(|s| s.corrected_values.as_ref())
        {
            for (field, value) in corrections {
                values.insert(field.clone(), value.clone());
            }
        }
        values
    }

    /// Number of records per status
    pub fn counts(&self) -> BTreeMap<VerificationStatus, usize> {
        let mut counts = BTreeMap::new();
        for state in self.states.values() {
            *counts.entry(state.status).or_insert(0) += 1;
        }
        counts
    }

    fn open_state(&mut self, record: RecordId) -> Result<&mut VerificationState, LedgerError> {
        let state = self
            .states
            .get_mut(&record)
            .ok_or(LedgerError::UnknownRecord(record))?;
        if state.status.is_terminal() {
            return Err(LedgerError::AlreadyFinal {
                record,
                status: state.status,
            });
        }
        Ok(state)
    }
}

fn validate_correction(
    values: BTreeMap<String, String>,
    fields: &[FieldSpec],
) -> Result<BTreeMap<String, String>, LedgerError> {
    if values.is_empty() {
        return Err(LedgerError::InvalidCorrection("no values given".to_string()));
    }
    values
        .into_iter()
        .map(|(name, value)| {
            let field = fields
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| LedgerError::InvalidCorrection(format!("unknown field '{}'", name)))?;
            let canonical = field.canonical_value(&value).ok_or_else(|| {
                LedgerError::InvalidCorrection(format!(
                    "'{}' is not an admissible value for '{}'",
                    value, name
                ))
            })?;
            Ok((name, canonical.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxtract_domain::RecordStatus;

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"]),
            FieldSpec::free_text("diet", "What it eats"),
        ]
    }

    fn record() -> ExtractionRecord {
        ExtractionRecord {
            id: RecordId::new(),
            species_ref: "Bufo bufo".to_string(),
            context_ref: None,
            page_number: 1,
            field_values: BTreeMap::from([
                ("habitat".to_string(), "Forest".to_string()),
                ("diet".to_string(), "insects".to_string()),
            ]),
            status: RecordStatus::Extracted,
            raw_model_output: None,
            notes: None,
            discrepancies: vec![],
            attempts: 1,
            timestamp: 0,
        }
    }

    fn correction(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_new_records_are_unconfirmed() {
        let record = record();
        let ledger = VerificationLedger::for_records(std::slice::from_ref(&record));
        assert_eq!(ledger.state(record.id).unwrap().status, VerificationStatus::Unconfirmed);
    }

    #[test]
    fn test_confirm_is_terminal() {
        let record = record();
        let mut ledger = VerificationLedger::for_records(std::slice::from_ref(&record));

        ledger.confirm(record.id).unwrap();
        let second = ledger.correct(record.id, correction(&[("habitat", "Wetland")]), &fields());

        assert!(matches!(second, Err(LedgerError::AlreadyFinal { .. })));
        assert!(matches!(ledger.confirm(record.id), Err(LedgerError::AlreadyFinal { .. })));
        let state = ledger.state(record.id).unwrap();
        assert_eq!(state.status, VerificationStatus::Confirmed);
        assert!(state.corrected_values.is_none());
    }

    #[test]
    fn test_correct_overlays_without_touching_record() {
        let record = record();
        let mut ledger = VerificationLedger::for_records(std::slice::from_ref(&record));

        ledger
            .correct(record.id, correction(&[("habitat", "wetland")]), &fields())
            .unwrap();

        assert_eq!(record.value("habitat"), Some("Forest"));
        let effective = ledger.effective_values(&record);
        assert_eq!(effective["habitat"], "Wetland");
        assert_eq!(effective["diet"], "insects");

        let again = ledger.correct(record.id, correction(&[("habitat", "Forest")]), &fields());
        assert!(matches!(again, Err(LedgerError::AlreadyFinal { .. })));
        assert_eq!(ledger.effective_values(&record)["habitat"], "Wetland");
    }

    #[test]
    fn test_invalid_corrections_rejected() {
        let record = record();
        let mut ledger = VerificationLedger::for_records(std::slice::from_ref(&record));

        let unknown = ledger.correct(record.id, correction(&[("color", "green")]), &fields());
        assert!(matches!(unknown, Err(LedgerError::InvalidCorrection(_))));

        let bad_value = ledger.correct(record.id, correction(&[("habitat", "Desert")]), &fields());
        assert!(matches!(bad_value, Err(LedgerError::InvalidCorrection(_))));

        let empty = ledger.correct(record.id, BTreeMap::new(), &fields());
        assert!(matches!(empty, Err(LedgerError::InvalidCorrection(_))));

        // Rejected corrections leave the record open
        assert_eq!(ledger.state(record.id).unwrap().status, VerificationStatus::Unconfirmed);
        ledger.correct(record.id, correction(&[("habitat", "NF")]), &fields()).unwrap();
    }

    #[test]
    fn test_unknown_record() {
        let mut ledger = VerificationLedger::default();
        let id = RecordId::new();
        assert_eq!(ledger.confirm(id).unwrap_err(), LedgerError::UnknownRecord(id));
    }

    #[test]
    fn test_counts() {
        let records = vec![record(), record(), record()];
        let mut ledger = VerificationLedger::for_records(&records);
        ledger.confirm(records[0].id).unwrap();
        ledger
            .correct(records[1].id, correction(&[("diet", "worms")]), &fields())
            .unwrap();

        let counts = ledger.counts();
        assert_eq!(counts[&VerificationStatus::Unconfirmed], 1);
        assert_eq!(counts[&VerificationStatus::Confirmed], 1);
        assert_eq!(counts[&VerificationStatus::Corrected], 1);
    }
}
