//! Serper.dev search provider (Google organic results).

use super::SearchProvider;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::SearchResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";
const SOURCE_LABEL: &str = "Serper (Google)";

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    gl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hl: Option<&'static str>,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

pub struct SerperProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerperProvider {
    /// Create a provider from config. Fails when no API key is available.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SearchError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    fn build_request<'a>(query: &'a str, region: &str, limit: usize) -> SerperRequest<'a> {
        let gl = region.to_lowercase();
        // Language hint only for English-speaking regions.
        let hl = matches!(gl.as_str(), "us" | "gb").then_some("en");
        SerperRequest {
            q: query,
            gl,
            hl,
            num: limit,
        }
    }

    fn parse_response(body: &str) -> Result<Vec<SearchResult>, SearchError> {
        let parsed: SerperResponse =
            serde_json::from_str(body).map_err(|e| SearchError::ResponseParse {
                message: e.to_string(),
            })?;
        Ok(parsed
            .organic
            .into_iter()
            .filter(|o| !o.link.is_empty())
            .map(|o| SearchResult {
                url: o.link,
                title: o.title,
                snippet: o.snippet,
                source: Some(SOURCE_LABEL.to_string()),
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
    async fn search(
        &self,
        query: &str,
        region: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let request = Self::build_request(query, region, limit);
        debug!(query, gl = request.gl.as_str(), limit, "Serper search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SearchError::Request {
            message: format!("Failed to read response body: {}", e),
        })?;
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let mut results = Self::parse_response(&body)?;
        results.truncate(limit);
        Ok(results)
    }

    fn name(&self) -> &str {
        "SERPER"
    }
}
