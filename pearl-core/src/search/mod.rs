//! Web search providers.
//!
//! [`SearchProvider`] is the seam between the research pipeline and a
//! keyword search API. Serper (Google results) is built in;
//! [`MockSearchProvider`] serves scripted results for tests.

pub mod serper;
pub mod urls;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::SearchResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

pub use serper::SerperProvider;
pub use urls::{distinct_domains, domain_set, extract_domain, normalize_url};

/// Keyword search over the web.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query` in `region` (ISO country code), returning at most `limit` hits.
    async fn search(
        &self,
        query: &str,
        region: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;

    /// Provider label reported by the status endpoint.
    fn name(&self) -> &str;
}

/// Create the configured search provider.
pub fn create_search_provider(
    config: &SearchConfig,
) -> Result<Arc<dyn SearchProvider>, SearchError> {
    match config.provider.as_str() {
        "serper" => Ok(Arc::new(SerperProvider::new(config)?)),
        other => Err(SearchError::Request {
            message: format!("Unsupported search provider '{other}'"),
        }),
    }
}

/// One recorded call to [`MockSearchProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub region: String,
    pub limit: usize,
}

/// Scripted search provider. Unknown queries return no results.
#[derive(Default)]
pub struct MockSearchProvider {
    scripted: Mutex<HashMap<String, Vec<SearchResult>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<SearchCall>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `results`.
    pub fn with_results(self, query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query.into(), results);
        self
    }

    /// Make `query` fail with a request error.
    pub fn with_failure(self, query: impl Into<String>) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query.into());
        self
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.query).collect()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        region: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SearchCall {
                query: query.to_string(),
                region: region.to_string(),
                limit,
            });

        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(query)
        {
            return Err(SearchError::Request {
                message: format!("scripted failure for '{query}'"),
            });
        }

        let results = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned()
            .unwrap_or_default();
        Ok(results.into_iter().take(limit).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
