//! Google Gemini API provider implementation.
//!
//! Single-turn `generateContent` calls:
//! - Auth via `?key=API_KEY` query parameter
//! - `generationConfig.responseMimeType = application/json` when JSON output is wanted
//! - The answer is the first text part of the first candidate

use super::TextGenerator;
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration.
    ///
    /// Uses `config.api_key` if set, else the environment variable named by
    /// `config.api_key_env`. Returns `LlmError::AuthFailed` if neither is present.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!("Gemini (env var '{}' not set)", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Gemini provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build the JSON request body for a single-turn prompt.
    fn build_request_body(prompt: &str, want_json: bool) -> Value {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if want_json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }

    /// Extract the first candidate's first text part.
    fn parse_response(body: &Value) -> Result<String, LlmError> {
        let candidates = body["candidates"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'candidates' array in response".to_string(),
            })?;

        let text = candidates
            .first()
            .and_then(|c| c["content"]["parts"].as_array())
            .and_then(|parts| parts.first())
            .and_then(|part| part["text"].as_str())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    /// Map HTTP error status codes to appropriate `LlmError` variants.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => LlmError::RateLimited {
                retry_after_secs: 30,
            },
            500..=599 => LlmError::Connection {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    /// Build the endpoint URL for a Gemini API call.
    fn endpoint_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, self.model, method, self.api_key
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    async fn generate(&self, prompt: &str, want_json: bool) -> Result<String, LlmError> {
        let body = Self::build_request_body(prompt, want_json);
        let url = self.endpoint_url("generateContent");

        debug!(
            model = self.model.as_str(),
            prompt_chars = prompt.len(),
            want_json,
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else if e.is_connect() {
                    LlmError::Connection {
                        message: format!("Request to Gemini API failed: {}", e),
                    }
                } else {
                    LlmError::ApiRequest {
                        message: format!("Request to Gemini API failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        Self::parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
