//! Ollama Backend
//!
//! Talks to a local Ollama server through its chat API. Page images are sent
//! base64-encoded in the message `images` list, so a vision model is needed
//! for the image modality.
//!
//! # Examples
//!
//! ```no_run
//! use taxtract_llm::OllamaBackend;
//!
//! let backend = OllamaBackend::new("http://localhost:11434", "llama3.2").unwrap();
//! ```

use crate::http::{build_client, encode_image, status_error, transport_error};
use crate::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Sampling temperature used for extraction
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Ollama chat backend
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    #[serde(default)]
    model: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaBackend {
    /// Create a backend for `model` served at `endpoint`
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            client: build_client()?,
        })
    }

    /// Create a backend on the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);

        let mut images = Vec::with_capacity(request.images.len());
        for image in &request.images {
            images.push(encode_image(image).await?);
        }

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt.clone(),
                images,
            }],
            stream: false,
            format: request.json_mode.then_some("json"),
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        debug!(model = %self.model, images = request.images.len(), "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, &self.model).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(LlmResponse {
            text: parsed.message.content,
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
            model: if parsed.model.is_empty() { self.model.clone() } else { parsed.model },
        })
    }
}

impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.chat(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.2").unwrap();
        assert_eq!(backend.endpoint, "http://localhost:11434");
        assert_eq!(backend.model, "llama3.2");
        assert_eq!(backend.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_ollama_backend_default_endpoint() {
        let backend = OllamaBackend::default_endpoint("mistral").unwrap().with_temperature(0.0);
        assert_eq!(backend.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(backend.temperature, 0.0);
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "llama3.2",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
                images: vec![],
            }],
            stream: false,
            format: Some("json"),
            options: ChatOptions { temperature: 0.1 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["messages"][0].get("images").is_none());
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_transient() {
        let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3.2").unwrap();
        let result = backend.invoke(&LlmRequest::text("test")).await;
        assert!(matches!(result, Err(LlmError::Transient(_))));
    }

    #[tokio::test]
    #[ignore] // Only run when Ollama is available
    async fn test_ollama_invoke_integration() {
        let backend = OllamaBackend::default_endpoint("llama3.2").unwrap();
        let response = backend
            .invoke(&LlmRequest::text("Reply with the JSON object {\"ok\": true}"))
            .await
            .unwrap();
        assert!(!response.text.is_empty());
    }
}
