//! Shared HTTP plumbing for the network backends

use crate::LlmError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use taxtract_domain::ImageRef;

/// Build a client without a global timeout; the gateway enforces per-request timeouts
pub(crate) fn build_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| LlmError::Fatal(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport error to a retryable or fatal kind
pub(crate) fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_builder() {
        LlmError::Fatal(format!("Invalid request: {}", err))
    } else {
        LlmError::Transient(format!("Request failed: {}", err))
    }
}

/// Map a non-success response to an error kind
pub(crate) async fn status_error(response: Response, model: &str) -> LlmError {
    let status = response.status();
    let retry_after = parse_retry_after(&response);
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    classify_status(status, retry_after, &body, model)
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    model: &str,
) -> LlmError {
    let detail = format!("HTTP {}: {}", status, truncate(body, 300));
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Fatal(format!("Authentication failed ({})", detail))
        }
        StatusCode::NOT_FOUND => LlmError::Fatal(format!("Model not available: {} ({})", model, detail)),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            LlmError::InvalidResponse(format!("Request rejected ({})", detail))
        }
        // 5xx, 408 and anything unexpected
        _ => LlmError::Transient(detail),
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Read a page image and encode it as base64
pub(crate) async fn encode_image(image: &ImageRef) -> Result<String, LlmError> {
    let path = image.uri.strip_prefix("file://").unwrap_or(&image.uri);
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        LlmError::InvalidResponse(format!("Could not read page image '{}': {}", image.uri, e))
    })?;
    Ok(STANDARD.encode(bytes))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_status() {
        let rate = classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), "", "m");
        assert_eq!(rate, LlmError::RateLimited { retry_after: Some(Duration::from_secs(7)) });

        assert!(classify_status(StatusCode::UNAUTHORIZED, None, "", "m").is_fatal());
        assert!(classify_status(StatusCode::NOT_FOUND, None, "", "m").is_fatal());
        assert!(classify_status(StatusCode::BAD_GATEWAY, None, "", "m").is_retryable());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "", "m"),
            LlmError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("äöü", 2), "äö...");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_encode_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"png").unwrap();
        let image = ImageRef {
            uri: file.path().display().to_string(),
            mime_type: "image/png".to_string(),
        };
        assert_eq!(encode_image(&image).await.unwrap(), "cG5n");
    }

    #[tokio::test]
    async fn test_encode_missing_image() {
        let image = ImageRef {
            uri: "/nonexistent/page-1.png".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(matches!(encode_image(&image).await, Err(LlmError::InvalidResponse(_))));
    }
}
