//! Generative text providers.
//!
//! The pipeline talks to models through the [`TextGenerator`] trait. The
//! built-in implementation is Google Gemini; [`MockTextGenerator`] replays
//! scripted responses for tests.

pub mod gemini;

use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub use crate::config::RetryConfig;
pub use gemini::GeminiProvider;

/// A model that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`. When `want_json` is set the provider is
    /// asked to answer with a JSON document.
    async fn generate(&self, prompt: &str, want_json: bool) -> Result<String, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries on `LlmError::RateLimited` (respects `retry_after_secs`),
/// `LlmError::Connection` and `LlmError::Timeout`. Permanent errors return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !is_retryable(&e) || attempt == config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| LlmError::Connection {
        message: "All retry attempts exhausted".to_string(),
    }))
}

/// Check if an error is retryable (transient).
fn is_retryable(err: &LlmError) -> bool {
    matches!(
        err,
        LlmError::RateLimited { .. } | LlmError::Connection { .. } | LlmError::Timeout { .. }
    )
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &LlmError) -> u64 {
    if let LlmError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs * 1000;
        let computed = compute_exponential_backoff(config, attempt);
        return server_ms.max(computed);
    }
    compute_exponential_backoff(config, attempt)
}

/// Pure exponential backoff with optional jitter of up to 25%.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        let jitter = (capped as f64 * 0.25 * rand::thread_rng().r#gen::<f64>()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Create the configured text generator.
///
/// Fails with `LlmError::AuthFailed` when no API key is available.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        other => Err(LlmError::ApiRequest {
            message: format!("Unsupported LLM provider '{other}'"),
        }),
    }
}

/// Scripted generator for tests: pops queued responses in order and records prompts.
///
/// When the queue is empty it returns the fallback response, or
/// `LlmError::EmptyResponse` if none is set.
pub struct MockTextGenerator {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator that always answers with `text`.
    pub fn with_response(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new()
        }
    }

    /// Queue a response for the next call.
    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Ok(text.into()));
    }

    /// Queue an error for the next call.
    pub fn queue_error(&self, err: LlmError) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Err(err));
    }

    /// Prompts received so far, with their `want_json` flag.
    pub fn prompts(&self) -> Vec<(String, bool)> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str, want_json: bool) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), want_json));
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            return self.fallback.clone().ok_or(LlmError::EmptyResponse);
        }
        responses.remove(0)
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&LlmError::RateLimited {
            retry_after_secs: 30
        }));
        assert!(is_retryable(&LlmError::Connection {
            message: "reset".into()
        }));
        assert!(is_retryable(&LlmError::Timeout { timeout_secs: 30 }));
        assert!(!is_retryable(&LlmError::AuthFailed {
            provider: "test".into()
        }));
        assert!(!is_retryable(&LlmError::ResponseParse {
            message: "bad json".into()
        }));
        assert!(!is_retryable(&LlmError::EmptyResponse));
    }

    #[test]
    fn test_compute_backoff_exponential() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 0), 1000);
        assert_eq!(compute_exponential_backoff(&config, 1), 2000);
        assert_eq!(compute_exponential_backoff(&config, 2), 4000);
    }

    #[test]
    fn test_compute_backoff_respects_cap() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 3000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 2), 3000);
    }

    #[test]
    fn test_compute_backoff_jitter_bounded() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60000,
            backoff_multiplier: 2.0,
            jitter: true,
        };
        for _ in 0..50 {
            let ms = compute_exponential_backoff(&config, 0);
            assert!((1000..=1250).contains(&ms));
        }
    }

    #[test]
    fn test_compute_backoff_rate_limit_uses_server_value() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(compute_backoff(&config, 0, &err), 30000);
    }

    #[tokio::test]
    async fn test_with_retry_permanent_error_no_retry() {
        let config = RetryConfig {
            max_retries: 3,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result = with_retry(&config, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(LlmError::AuthFailed {
                    provider: "test".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_error() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 1.0,
            jitter: false,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result = with_retry(&config, || {
            let cc = cc.clone();
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(LlmError::Connection {
                        message: "reset".into(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mock_generator_queue_then_fallback() {
        let mock = MockTextGenerator::with_response("fallback");
        mock.queue_response("first");
        assert_eq!(mock.generate("p1", true).await.unwrap(), "first");
        assert_eq!(mock.generate("p2", false).await.unwrap(), "fallback");
        assert_eq!(
            mock.prompts(),
            vec![("p1".to_string(), true), ("p2".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_mock_generator_empty_queue_errors() {
        let mock = MockTextGenerator::new();
        assert!(matches!(
            mock.generate("p", true).await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn test_create_generator_unknown_provider() {
        let config = LlmConfig {
            provider: "unknown".into(),
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }

    #[test]
    fn test_create_generator_gemini_with_key() {
        let config = LlmConfig {
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.model_name(), "gemini-2.0-flash-exp");
    }
}
