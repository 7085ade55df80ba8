//! Field definitions compiled into prompt fragments

use crate::error::SchemaError;
use std::collections::HashSet;
use std::sync::Arc;
use taxtract_domain::{FieldSpec, PromptExample, NOT_FOUND};
use tracing::debug;

const SCHEMA_HEADER: &str = "The \"data\" object must contain exactly these keys:";
const NO_EXAMPLES: &str = "No examples provided.";
const EXAMPLE_SEPARATOR: &str = "\n\n---\n\n";

/// Validated schema shared by every request of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema {
    fields: Vec<FieldSpec>,
    fields_block: String,
    examples_block: String,
}

impl CompiledSchema {
    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Prompt block describing the expected keys
    pub fn fields_block(&self) -> &str {
        &self.fields_block
    }

    /// Prompt block with the few-shot examples
    pub fn examples_block(&self) -> &str {
        &self.examples_block
    }
}

/// Validates field definitions and examples before any model call
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCompiler;

impl SchemaCompiler {
    /// Create a compiler
    pub fn new() -> Self {
        Self
    }

    /// Validate and compile
    ///
    /// Field names and enumeration values are trimmed. "NF" is admissible
    /// for every enumerated field without being declared.
    pub fn compile(
        &self,
        fields: &[FieldSpec],
        examples: &[PromptExample],
    ) -> Result<Arc<CompiledSchema>, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::NoFields);
        }

        let mut names = HashSet::new();
        let mut compiled = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let name = field.name.trim();
            if name.is_empty() {
                return Err(SchemaError::EmptyFieldName { index: i + 1 });
            }
            if !names.insert(name.to_string()) {
                return Err(SchemaError::DuplicateField(name.to_string()));
            }
            compiled.push(FieldSpec {
                name: name.to_string(),
                description: field.description.trim().to_string(),
                validation_values: compile_values(name, &field.validation_values)?,
            });
        }

        for (i, example) in examples.iter().enumerate() {
            for (key, value) in &example.output {
                let field = compiled
                    .iter()
                    .find(|f| f.name == key.trim())
                    .ok_or_else(|| SchemaError::UnknownExampleField {
                        example: i + 1,
                        field: key.clone(),
                    })?;
                if !field.accepts(value) {
                    return Err(SchemaError::InvalidExampleValue {
                        example: i + 1,
                        field: field.name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        debug!(fields = compiled.len(), examples = examples.len(), "Schema compiled");
        Ok(Arc::new(CompiledSchema {
            fields_block: render_fields(&compiled),
            examples_block: render_examples(examples),
            fields: compiled,
        }))
    }
}

fn compile_values(field: &str, values: &[String]) -> Result<Vec<String>, SchemaError> {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            return Err(SchemaError::EmptyValue {
                field: field.to_string(),
            });
        }
        if !seen.insert(value.to_lowercase()) {
            return Err(SchemaError::DuplicateValue {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        compiled.push(value.to_string());
    }
    Ok(compiled)
}

fn render_fields(fields: &[FieldSpec]) -> String {
    let mut block = String::from(SCHEMA_HEADER);
    for field in fields {
        block.push_str(&format!("\n- \"{}\": {}", field.name, field.description));
        if field.is_enumerated() {
            let mut values: Vec<String> = field.validation_values.iter().map(|v| format!("\"{}\"", v)).collect();
            if !field.validation_values.iter().any(|v| v.eq_ignore_ascii_case(NOT_FOUND)) {
                values.push(format!("\"{}\"", NOT_FOUND));
            }
            block.push_str(&format!(" The value MUST be one of [{}].", values.join(", ")));
        }
    }
    block
}

fn render_examples(examples: &[PromptExample]) -> String {
    if examples.is_empty() {
        return NO_EXAMPLES.to_string();
    }
    examples
        .iter()
        .map(|example| {
            let output = serde_json::to_string_pretty(&example.output).unwrap_or_default();
            let mut text = format!("Input:\n{}\nOutput:\n{}", example.input.trim(), output);
            if let Some(explainer) = example.explainer.as_deref().filter(|e| !e.trim().is_empty()) {
                text.push_str(&format!("\nExplainer:\n{}", explainer.trim()));
            }
            text
        })
        .collect::<Vec<_>>()
        .join(EXAMPLE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"]),
            FieldSpec::free_text("diet", "What it eats"),
        ]
    }

    fn example(pairs: &[(&str, &str)]) -> PromptExample {
        PromptExample {
            input: "Bufo bufo breeds in ponds.".to_string(),
            output: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            explainer: Some("Ponds are wetland.".to_string()),
        }
    }

    #[test]
    fn test_compile_valid_schema() {
        let schema = SchemaCompiler::new().compile(&fields(), &[]).unwrap();

        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field("habitat").unwrap().is_enumerated());
        assert!(schema.fields_block().contains("\"habitat\": Main habitat"));
        assert!(schema.fields_block().contains("[\"Forest\", \"Wetland\", \"NF\"]"));
        assert!(schema.fields_block().contains("\"diet\": What it eats"));
        assert_eq!(schema.examples_block(), NO_EXAMPLES);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let fields = vec![FieldSpec::free_text("diet", ""), FieldSpec::free_text(" diet ", "")];
        let result = SchemaCompiler::new().compile(&fields, &[]);
        assert_eq!(result.unwrap_err(), SchemaError::DuplicateField("diet".to_string()));
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert_eq!(SchemaCompiler::new().compile(&[], &[]).unwrap_err(), SchemaError::NoFields);
    }

    #[test]
    fn test_empty_field_name_rejected() {
        let fields = vec![FieldSpec::free_text("diet", ""), FieldSpec::free_text("  ", "")];
        let result = SchemaCompiler::new().compile(&fields, &[]);
        assert_eq!(result.unwrap_err(), SchemaError::EmptyFieldName { index: 2 });
    }

    #[test]
    fn test_bad_validation_values_rejected() {
        let duplicate = vec![FieldSpec::enumerated("habitat", "", ["Forest", "forest"])];
        assert!(matches!(
            SchemaCompiler::new().compile(&duplicate, &[]),
            Err(SchemaError::DuplicateValue { .. })
        ));

        let blank = vec![FieldSpec::enumerated("habitat", "", ["Forest", " "])];
        assert!(matches!(
            SchemaCompiler::new().compile(&blank, &[]),
            Err(SchemaError::EmptyValue { .. })
        ));
    }

    #[test]
    fn test_examples_checked_against_fields() {
        let unknown = example(&[("color", "green")]);
        assert!(matches!(
            SchemaCompiler::new().compile(&fields(), &[unknown]),
            Err(SchemaError::UnknownExampleField { example: 1, .. })
        ));

        let inadmissible = example(&[("habitat", "Desert")]);
        assert!(matches!(
            SchemaCompiler::new().compile(&fields(), &[inadmissible]),
            Err(SchemaError::InvalidExampleValue { .. })
        ));
    }

    #[test]
    fn test_examples_block_rendering() {
        let examples = vec![
            example(&[("habitat", "Wetland"), ("diet", "NF")]),
            PromptExample {
                input: "Rana temporaria eats slugs.".to_string(),
                output: BTreeMap::from([("diet".to_string(), "slugs".to_string())]),
                explainer: None,
            },
        ];
        let schema = SchemaCompiler::new().compile(&fields(), &examples).unwrap();
        let block = schema.examples_block();

        assert!(block.starts_with("Input:\nBufo bufo breeds in ponds."));
        assert!(block.contains("\"habitat\": \"Wetland\""));
        assert!(block.contains("Explainer:\nPonds are wetland."));
        assert_eq!(block.matches(EXAMPLE_SEPARATOR).count(), 1);
        assert_eq!(block.matches("Explainer:").count(), 1);
    }
}
