//! Gemini Backend
//!
//! Calls the `generateContent` endpoint of the Google Generative Language API.
//! The API key is taken from the environment when the backend is built and is
//! never written to reports.

use crate::http::{build_client, encode_image, status_error, transport_error};
use crate::ollama::DEFAULT_TEMPERATURE;
use crate::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Environment variable holding the API key unless configured otherwise
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini backend
#[derive(Clone)]
pub struct GeminiBackend {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiBackend {
    /// Create a backend with an explicit API key
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Fatal("Gemini API key is empty".to_string()));
        }
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            temperature: DEFAULT_TEMPERATURE,
            client: build_client()?,
        })
    }

    /// Create a backend reading the API key from environment variable `var`
    pub fn from_env(endpoint: impl Into<String>, model: impl Into<String>, var: &str) -> Result<Self, LlmError> {
        let key = std::env::var(var)
            .map_err(|_| LlmError::Fatal(format!("Environment variable {} is not set", var)))?;
        Self::new(endpoint, model, key)
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn build_body(&self, request: &LlmRequest) -> Result<GenerateRequest, LlmError> {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        for image in &request.images {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: encode_image(image).await?,
                },
            });
        }
        Ok(GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: request.json_mode.then_some("application/json"),
            },
        })
    }
}

fn into_response(parsed: GenerateResponse, model: &str) -> Result<LlmResponse, LlmError> {
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("Response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse(format!(
            "Empty candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    Ok(LlmResponse {
        text,
        input_tokens,
        output_tokens,
        model: parsed.model_version.unwrap_or_else(|| model.to_string()),
    })
}

impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        let body = self.build_body(request).await?;

        debug!(model = %self.model, images = request.images.len(), "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, &self.model).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        into_response(parsed, &self.model)
    }
}
