//! Retrying gateway over any backend
//!
//! The gateway is the only place that retries. `RateLimited` and `Transient`
//! errors (a timed-out request counts as transient) are retried with
//! exponential backoff until `max_attempts` is reached; `InvalidResponse` and
//! `Fatal` come back immediately.

use crate::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry and timeout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per request, first attempt included
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles per attempt
    pub base_delay: Duration,

    /// Upper bound for every delay, server `Retry-After` hints included
    pub max_delay: Duration,

    /// Timeout of a single attempt
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, error: &LlmError) -> Duration {
        if let LlmError::RateLimited {
            retry_after: Some(retry_after),
        } = error
        {
            return (*retry_after).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Outcome of one gateway call with the number of attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Final answer or error
    pub result: Result<LlmResponse, LlmError>,
    /// Attempts made
    pub attempts: u32,
}

/// Uniform call contract with retry, backoff and timeout handling
#[derive(Debug, Clone)]
pub struct LlmGateway<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: LlmBackend> LlmGateway<B> {
    /// Create a gateway with the given policy
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying retryable failures
    pub async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.invoke_counted(request).await.result
    }

    /// Send a request and report how many attempts it took
    pub async fn invoke_counted(&self, request: &LlmRequest) -> Invocation {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(backend = self.backend.name(), attempt = attempts, "Invoking model");

            let outcome = match tokio::time::timeout(self.policy.request_timeout, self.backend.invoke(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LlmError::Transient(format!(
                    "Request timed out after {}s",
                    self.policy.request_timeout.as_secs_f32()
                ))),
            };

            let error = match outcome {
                Ok(response) => {
                    return Invocation {
                        result: Ok(response),
                        attempts,
                    }
                }
                Err(error) if !error.is_retryable() => {
                    return Invocation {
                        result: Err(error),
                        attempts,
                    }
                }
                Err(error) => error,
            };

            if attempts >= max_attempts {
                warn!(
                    backend = self.backend.name(),
                    attempts,
                    error = %error,
                    "Retry ceiling reached"
                );
                return Invocation {
                    result: Err(LlmError::Exhausted {
                        attempts,
                        last: Box::new(error),
                    }),
                    attempts,
                };
            }

            let delay = self.policy.delay_for(attempts, &error);
            warn!(
                backend = self.backend.name(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Model call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockBackend;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let backend = MockBackend::new("ok");
        backend.push_error(LlmError::RateLimited { retry_after: None });
        backend.push_error(LlmError::RateLimited { retry_after: None });
        let gateway = LlmGateway::new(backend.clone(), fast_policy(3));

        let invocation = gateway.invoke_counted(&LlmRequest::text("p")).await;

        assert_eq!(invocation.attempts, 3);
        assert_eq!(invocation.result.unwrap().text, "ok");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_always_transient_exhausts() {
        let backend = MockBackend::new("never returned");
        for _ in 0..5 {
            backend.push_error(LlmError::Transient("503".into()));
        }
        let gateway = LlmGateway::new(backend.clone(), fast_policy(3));

        let result = gateway.invoke(&LlmRequest::text("p")).await;

        match result {
            Err(LlmError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, LlmError::Transient("503".into()));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let backend = MockBackend::new("ok");
        backend.push_error(LlmError::InvalidResponse("garbage".into()));
        let gateway = LlmGateway::new(backend.clone(), fast_policy(3));

        let invocation = gateway.invoke_counted(&LlmRequest::text("p")).await;

        assert_eq!(invocation.attempts, 1);
        assert_eq!(invocation.result, Err(LlmError::InvalidResponse("garbage".into())));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let backend = MockBackend::new("ok");
        backend.push_error(LlmError::Transient("blip".into()));
        backend.push_error(LlmError::Fatal("bad key".into()));
        let gateway = LlmGateway::new(backend.clone(), fast_policy(5));

        let invocation = gateway.invoke_counted(&LlmRequest::text("p")).await;

        assert_eq!(invocation.attempts, 2);
        assert!(invocation.result.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_zero_attempts_means_one() {
        let backend = MockBackend::new("ok");
        let gateway = LlmGateway::new(backend.clone(), fast_policy(0));
        assert!(gateway.invoke(&LlmRequest::text("p")).await.is_ok());
        assert_eq!(backend.call_count(), 1);
    }

    struct SlowBackend;

    impl LlmBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn invoke(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LlmResponse::from_text("late"))
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let policy = RetryPolicy {
            request_timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let gateway = LlmGateway::new(SlowBackend, policy);

        match gateway.invoke(&LlmRequest::text("p")).await {
            Err(LlmError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, LlmError::Transient(_)));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        let err = LlmError::Transient("x".into());
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, &err), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4, &err), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40, &err), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_honours_retry_after() {
        let policy = RetryPolicy::default();
        let err = LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(7));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        let err = LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(30));
    }
}
