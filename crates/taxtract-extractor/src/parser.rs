//! Validation of model output against the schema

use crate::error::ValidationError;
use crate::schema::CompiledSchema;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use taxtract_domain::{Discrepancy, NOT_FOUND};
use tracing::warn;

/// A model answer reduced to one admissible value per field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnswer {
    /// Exactly one value per declared field
    pub field_values: BTreeMap<String, String>,
    /// Notes returned by the model
    pub notes: Option<String>,
    /// Inadmissible values that were replaced by "NF"
    pub discrepancies: Vec<Discrepancy>,
}

/// Checks raw model output against a compiled schema
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    schema: Arc<CompiledSchema>,
}

impl ResponseValidator {
    /// Create a validator
    pub fn new(schema: Arc<CompiledSchema>) -> Self {
        Self { schema }
    }

    /// Validate one raw answer
    ///
    /// Accepts bare JSON or JSON inside a markdown fence, as a one-element
    /// list or a single object, with the fields under `data` or at the top
    /// level. Missing, null and blank values become "NF"; so do values an
    /// enumerated field does not admit, which are also reported as
    /// discrepancies.
    pub fn validate(&self, raw: &str) -> Result<ValidatedAnswer, ValidationError> {
        let json: Value = serde_json::from_str(extract_json(raw)?)?;
        let object = answer_object(&json)?;

        let data = match object.get("data") {
            Some(Value::Object(data)) => data,
            Some(Value::Null) | None => object,
            Some(other) => {
                return Err(ValidationError::UnexpectedShape(format!(
                    "\"data\" is {}, not an object",
                    type_name(other)
                )))
            }
        };

        let mut field_values = BTreeMap::new();
        let mut discrepancies = Vec::new();
        for field in self.schema.fields() {
            let returned = lookup(data, &field.name).and_then(scalar_text);
            let value = match returned.as_deref().map(str::trim) {
                None | Some("") => NOT_FOUND.to_string(),
                Some(text) => match field.canonical_value(text) {
                    Some(canonical) => canonical.to_string(),
                    None => {
                        warn!(field = %field.name, returned = text, "Inadmissible value replaced by NF");
                        discrepancies.push(Discrepancy {
                            field: field.name.clone(),
                            returned: text.to_string(),
                        });
                        NOT_FOUND.to_string()
                    }
                },
            };
            field_values.insert(field.name.clone(), value);
        }

        let notes = object
            .get("notes")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(ValidatedAnswer {
            field_values,
            notes,
            discrepancies,
        })
    }
}

/// Extract JSON from response, handling markdown code blocks and chatter
fn extract_json(response: &str) -> Result<&str, ValidationError> {
    let mut text = response.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Skip the info string ("json") on the opening line
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    if text.starts_with('[') || text.starts_with('{') {
        return Ok(text);
    }

    let start = text.find(['[', '{']).ok_or(ValidationError::NoJson)?;
    let end = text.rfind([']', '}']).ok_or(ValidationError::NoJson)?;
    if end < start {
        return Err(ValidationError::NoJson);
    }
    Ok(&text[start..=end])
}

fn answer_object(json: &Value) -> Result<&Map<String, Value>, ValidationError> {
    match json {
        Value::Object(object) => Ok(object),
        Value::Array(items) => {
            if items.len() > 1 {
                warn!(items = items.len(), "Expected one answer object, using the first");
            }
            match items.first() {
                Some(Value::Object(object)) => Ok(object),
                Some(other) => Err(ValidationError::UnexpectedShape(format!(
                    "list holds {}, not an object",
                    type_name(other)
                ))),
                None => Err(ValidationError::UnexpectedShape("empty list".to_string())),
            }
        }
        other => Err(ValidationError::UnexpectedShape(format!(
            "top level is {}",
            type_name(other)
        ))),
    }
}

fn lookup<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    data.get(field).or_else(|| {
        data.iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(scalar_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
