//! Backend selection from configuration

use crate::gemini::{self, GeminiBackend};
use crate::ollama::{self, OllamaBackend};
use crate::{LlmBackend, LlmError, LlmRequest, LlmResponse, MockBackend};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Google Gemini API
    Gemini,
    /// Offline mock answering "{}" (every field "NF"), for dry runs
    Mock,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => write!(f, "ollama"),
            Provider::Gemini => write!(f, "gemini"),
            Provider::Mock => write!(f, "mock"),
        }
    }
}

/// LLM settings of a project
///
/// API keys are never stored here, only the name of the environment variable
/// holding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Backend to use
    #[serde(default)]
    pub provider: Provider,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key (Gemini)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_api_key_env() -> String {
    gemini::DEFAULT_API_KEY_ENV.to_string()
}

fn default_temperature() -> f32 {
    ollama::DEFAULT_TEMPERATURE
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            endpoint: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

impl LlmSettings {
    /// Check the settings for obvious mistakes
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("llm.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("llm.temperature must be between 0.0 and 2.0".to_string());
        }
        if self.provider == Provider::Gemini && self.api_key_env.trim().is_empty() {
            return Err("llm.api_key_env must name an environment variable".to_string());
        }
        Ok(())
    }
}

/// Runtime-selected backend
#[derive(Debug, Clone)]
pub enum AnyBackend {
    /// Scripted mock
    Mock(MockBackend),
    /// Ollama
    Ollama(OllamaBackend),
    /// Gemini
    Gemini(GeminiBackend),
}

impl AnyBackend {
    /// Build the configured backend; a missing API key is fatal
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        match settings.provider {
            Provider::Mock => Ok(AnyBackend::Mock(MockBackend::default())),
            Provider::Ollama => {
                let endpoint = settings.endpoint.as_deref().unwrap_or(ollama::DEFAULT_ENDPOINT);
                Ok(AnyBackend::Ollama(
                    OllamaBackend::new(endpoint, &settings.model)?.with_temperature(settings.temperature),
                ))
            }
            Provider::Gemini => {
                let endpoint = settings.endpoint.as_deref().unwrap_or(gemini::DEFAULT_ENDPOINT);
                Ok(AnyBackend::Gemini(
                    GeminiBackend::from_env(endpoint, &settings.model, &settings.api_key_env)?
                        .with_temperature(settings.temperature),
                ))
            }
        }
    }
}

impl LlmBackend for AnyBackend {
    fn name(&self) -> &str {
        match self {
            AnyBackend::Mock(b) => b.name(),
            AnyBackend::Ollama(b) => b.name(),
            AnyBackend::Gemini(b) => b.name(),
        }
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match self {
            AnyBackend::Mock(b) => b.invoke(request).await,
            AnyBackend::Ollama(b) => b.invoke(request).await,
            AnyBackend::Gemini(b) => b.invoke(request).await,
        }
    }
}
