//! Taxtract LLM Backend Layer
//!
//! A single request/response contract over every model backend, plus the
//! gateway that owns retries, backoff and per-request timeouts.
//!
//! # Backends
//!
//! - `MockBackend`: scripted responses for tests and dry runs
//! - `OllamaBackend`: local Ollama server
//! - `GeminiBackend`: Google Gemini API
//!
//! `AnyBackend` wraps the concrete backends for selection from configuration.
//!
//! # Examples
//!
//! ```
//! use taxtract_llm::{LlmBackend, LlmRequest, MockBackend};
//!
//! let backend = MockBackend::new(r#"{"species":"Bufo bufo","data":{}}"#);
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let response = rt.block_on(backend.invoke(&LlmRequest::text("prompt"))).unwrap();
//! assert!(response.text.contains("Bufo bufo"));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod gateway;
pub mod gemini;
mod http;
pub mod ollama;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use taxtract_domain::ImageRef;
use thiserror::Error;

pub use config::{AnyBackend, LlmSettings, Provider};
pub use gateway::{Invocation, LlmGateway, RetryPolicy};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

/// Errors returned by backends and the gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The backend asked us to slow down
    #[error("Rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited {
        /// Server-provided delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// Network failure, server error or timeout
    #[error("Transient error: {0}")]
    Transient(String),

    /// The backend answered with something unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication or configuration problem; the run cannot continue
    #[error("Fatal backend error: {0}")]
    Fatal(String),

    /// The retry ceiling was reached
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        last: Box<LlmError>,
    },
}

/// Error classification used for retry decisions and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    /// See [`LlmError::RateLimited`]
    RateLimited,
    /// See [`LlmError::Transient`]
    Transient,
    /// See [`LlmError::InvalidResponse`]
    InvalidResponse,
    /// See [`LlmError::Fatal`]
    Fatal,
    /// See [`LlmError::Exhausted`]
    Exhausted,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmErrorKind::RateLimited => "rate_limited",
            LlmErrorKind::Transient => "transient",
            LlmErrorKind::InvalidResponse => "invalid_response",
            LlmErrorKind::Fatal => "fatal",
            LlmErrorKind::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

impl LlmError {
    /// Classification of this error
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::RateLimited { .. } => LlmErrorKind::RateLimited,
            LlmError::Transient(_) => LlmErrorKind::Transient,
            LlmError::InvalidResponse(_) => LlmErrorKind::InvalidResponse,
            LlmError::Fatal(_) => LlmErrorKind::Fatal,
            LlmError::Exhausted { .. } => LlmErrorKind::Exhausted,
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. } | LlmError::Transient(_))
    }

    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, LlmError::Fatal(_))
    }
}

/// One model request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Full prompt text
    pub prompt: String,

    /// Page images sent alongside the prompt
    #[serde(default)]
    pub images: Vec<ImageRef>,

    /// Ask the backend for JSON output
    #[serde(default)]
    pub json_mode: bool,
}

impl LlmRequest {
    /// Text-only request in JSON mode
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            json_mode: true,
        }
    }

    /// Request with one page image in JSON mode
    pub fn with_image(prompt: impl Into<String>, image: ImageRef) -> Self {
        Self {
            prompt: prompt.into(),
            images: vec![image],
            json_mode: true,
        }
    }
}

/// One model answer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Raw text returned by the model
    pub text: String,

    /// Prompt tokens, if the backend reports them
    #[serde(default)]
    pub input_tokens: u64,

    /// Completion tokens, if the backend reports them
    #[serde(default)]
    pub output_tokens: u64,

    /// Model that produced the answer
    #[serde(default)]
    pub model: String,
}

impl LlmResponse {
    /// Response with text only
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A model backend with a single capability: answer one request
pub trait LlmBackend: Send + Sync {
    /// Backend name for logs and reports
    fn name(&self) -> &str;

    /// Send one request; no retries happen here
    fn invoke(&self, request: &LlmRequest) -> impl Future<Output = Result<LlmResponse, LlmError>> + Send;
}

/// Scripted backend for deterministic tests
///
/// Answers come from, in order: the scripted queue, the first keyed response
/// whose key occurs in the prompt, the default response.
///
/// # Examples
///
/// ```
/// use taxtract_llm::{LlmError, MockBackend};
///
/// let backend = MockBackend::new("{}");
/// backend.push_error(LlmError::RateLimited { retry_after: None });
/// backend.push_response(r#"{"data":{"habitat":"Forest"}}"#);
/// backend.add_response("Bufo bufo", r#"{"data":{"habitat":"Wetland"}}"#);
/// assert_eq!(backend.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    default_response: String,
    script: Arc<Mutex<VecDeque<Result<LlmResponse, LlmError>>>>,
    keyed: Arc<Mutex<Vec<(String, String)>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a mock answering `response` when nothing else matches
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            keyed: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a successful answer
    pub fn push_response(&self, text: impl Into<String>) {
        self.lock_script().push_back(Ok(LlmResponse::from_text(text)));
    }

    /// Queue a failure
    pub fn push_error(&self, error: LlmError) {
        self.lock_script().push_back(Err(error));
    }

    /// Answer `text` whenever the prompt contains `key`
    pub fn add_response(&self, key: impl Into<String>, text: impl Into<String>) {
        self.keyed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.into(), text.into()));
    }

    /// Number of invocations so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<LlmResponse, LlmError>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        if let Some(scripted) = self.lock_script().pop_front() {
            return scripted;
        }

        let keyed = self.keyed.lock().unwrap_or_else(PoisonError::into_inner);
        let text = keyed
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(LlmResponse {
            input_tokens: prompt.split_whitespace().count() as u64,
            output_tokens: text.split_whitespace().count() as u64,
            model: "mock".to_string(),
            text,
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.answer(&request.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_default() {
        let backend = MockBackend::new("Test response");
        let response = backend.invoke(&LlmRequest::text("any prompt")).await.unwrap();
        assert_eq!(response.text, "Test response");
        assert_eq!(response.model, "mock");
    }

    #[tokio::test]
    async fn test_mock_backend_script_before_keyed() {
        let backend = MockBackend::default();
        backend.add_response("hello", "world");
        backend.push_error(LlmError::Transient("boom".into()));

        let first = backend.invoke(&LlmRequest::text("hello")).await;
        assert_eq!(first, Err(LlmError::Transient("boom".into())));

        let second = backend.invoke(&LlmRequest::text("say hello")).await.unwrap();
        assert_eq!(second.text, "world");

        let third = backend.invoke(&LlmRequest::text("unknown")).await.unwrap();
        assert_eq!(third.text, "{}");
    }

    #[tokio::test]
    async fn test_mock_backend_call_count_and_prompts() {
        let backend = MockBackend::new("x");
        assert_eq!(backend.call_count(), 0);

        backend.invoke(&LlmRequest::text("one")).await.unwrap();
        backend.invoke(&LlmRequest::text("two")).await.unwrap();

        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.prompts(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_error_kinds() {
        assert!(LlmError::RateLimited { retry_after: None }.is_retryable());
        assert!(LlmError::Transient("x".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("x".into()).is_retryable());
        assert!(!LlmError::Fatal("x".into()).is_retryable());
        assert!(LlmError::Fatal("x".into()).is_fatal());

        let exhausted = LlmError::Exhausted {
            attempts: 3,
            last: Box::new(LlmError::Transient("x".into())),
        };
        assert_eq!(exhausted.kind(), LlmErrorKind::Exhausted);
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.to_string(), "Rate limited (retry after 5s)");
        assert_eq!(LlmError::RateLimited { retry_after: None }.to_string(), "Rate limited");
    }
}
