//! Prompt composition for extraction requests

use crate::schema::CompiledSchema;
use std::sync::Arc;
use taxtract_domain::{ContextPayload, ContextUnit};
use taxtract_llm::LlmRequest;

const TEXT_ROLE: &str = "You extract scientific data about one species from a passage of a document. \
Be precise and report only what the passage states.";

const IMAGE_ROLE: &str = "You extract scientific data about one species from an image of a document page. \
Be precise and report only what the page shows.";

const IMAGE_TASK: &str = "Read the attached page image, including running text, tables and figure captions, \
and extract the fields below.";

const OUTPUT_RULES: &str = r#"Answer with a JSON list holding exactly one object and nothing else:
[
  {
    "species": "<species name>",
    "data": { ... },
    "notes": "<remarks on ambiguities or missing data>"
  }
]

Rules:
1. Every key listed above must appear in "data", even when its value is "NF".
2. Use the exact string "NF" for any value the source does not state, and for species that are only mentioned in passing.
3. Never guess or infer a value.
4. For fields with a list of allowed values, answer with one of those values.
5. "notes" explains ambiguities or why a value is "NF"; it never carries data values.
6. Output valid JSON only."#;

/// Composes one request per context unit
#[derive(Debug, Clone)]
pub struct ExtractionRequestBuilder {
    schema: Arc<CompiledSchema>,
}

impl ExtractionRequestBuilder {
    /// Create a builder over a compiled schema
    pub fn new(schema: Arc<CompiledSchema>) -> Self {
        Self { schema }
    }

    /// Schema the builder renders
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Request for `unit`, asking about `species`
    pub fn build(&self, species: &str, unit: &ContextUnit) -> LlmRequest {
        match &unit.payload {
            ContextPayload::Text(text) => LlmRequest::text(self.text_prompt(species, text)),
            ContextPayload::Image(image) => LlmRequest::with_image(self.image_prompt(species), image.clone()),
        }
    }

    fn text_prompt(&self, species: &str, text: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(TEXT_ROLE);
        prompt.push_str("\n\n");
        prompt.push_str(&format!(
            "Species: {}\nExtract the fields below for this species from the following passage.\n",
            species
        ));
        prompt.push_str("---\n");
        prompt.push_str(text);
        prompt.push_str("\n---\n\n");
        self.push_common(&mut prompt);
        prompt
    }

    fn image_prompt(&self, species: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(IMAGE_ROLE);
        prompt.push_str("\n\n");
        prompt.push_str(&format!("Species: {}\n{}\n\n", species, IMAGE_TASK));
        self.push_common(&mut prompt);
        prompt
    }

    fn push_common(&self, prompt: &mut String) {
        prompt.push_str("Examples:\n");
        prompt.push_str(self.schema.examples_block());
        prompt.push_str("\n\n");
        prompt.push_str(self.schema.fields_block());
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_RULES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCompiler;
    use taxtract_domain::{ContextId, FieldSpec, ImageRef, Modality, TextSpan};

    fn builder() -> ExtractionRequestBuilder {
        let fields = vec![FieldSpec::enumerated("habitat", "Main habitat", ["Forest", "Wetland"])];
        ExtractionRequestBuilder::new(SchemaCompiler::new().compile(&fields, &[]).unwrap())
    }

    fn unit(payload: ContextPayload) -> ContextUnit {
        ContextUnit {
            id: ContextId::new(),
            species_ref: "Bufo bufo".to_string(),
            page_number: 1,
            modality: match payload {
                ContextPayload::Text(_) => Modality::Text,
                ContextPayload::Image(_) => Modality::Image,
            },
            payload,
            span: Some(TextSpan { start: 0, end: 10 }),
        }
    }

    #[test]
    fn test_text_request() {
        let request = builder().build(
            "Bufo bufo",
            &unit(ContextPayload::Text("Bufo bufo lives in woodland.".to_string())),
        );

        assert!(request.images.is_empty());
        assert!(request.json_mode);
        assert!(request.prompt.contains("Species: Bufo bufo"));
        assert!(request.prompt.contains("---\nBufo bufo lives in woodland.\n---"));
        assert!(request.prompt.contains("\"habitat\": Main habitat"));
        assert!(request.prompt.contains("No examples provided."));
    }

    #[test]
    fn test_image_request() {
        let image = ImageRef {
            uri: "pages/1.png".to_string(),
            mime_type: "image/png".to_string(),
        };
        let request = builder().build("Bufo bufo", &unit(ContextPayload::Image(image.clone())));

        assert_eq!(request.images, vec![image]);
        assert!(request.prompt.contains("page image"));
        assert!(!request.prompt.contains("---\n"));
        assert!(request.prompt.contains("\"habitat\": Main habitat"));
    }
}
