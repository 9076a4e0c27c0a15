//! Search fan-out: a fixed battery of queries per run, results merged and
//! deduplicated by normalized URL.

use crate::countries::Country;
use crate::pacing::Pacer;
use crate::search::{SearchProvider, normalize_url};
use crate::types::SearchResult;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Topic-mode templates. `{topic}` and `{focus}` are substituted.
pub const TOPIC_TEMPLATES: [&str; 5] = [
    "{topic} real estate {focus}",
    "{topic} inmobiliaria {focus}",
    "{topic} homeowners problems {focus}",
    "how to sell property fast {topic} {focus}",
    "marketing strategies for {topic} sellers {focus}",
];

/// Country-mode templates. `{name_en}`, `{name_es}` and `{year}` are substituted.
pub const COUNTRY_TEMPLATES: [&str; 8] = [
    "real estate marketing ideas {name_en} {year}",
    "best proptech startups for agents {name_en}",
    "faceless youtube content ideas for realtors {name_en}",
    "how to get real estate leads without cold calling {name_en}",
    "automated real estate lead generation {name_en}",
    "real estate instagram reels ideas {name_en}",
    "marketing inmobiliario tendencias {name_es} {year}",
    "captación de exclusivas inmobiliarias automatizada {name_es}",
];

/// Build the query battery in declared order.
///
/// A non-blank `topic` selects topic mode around `focus`; otherwise the
/// country templates are used.
pub fn build_queries(country: &Country, topic: Option<&str>, focus: &str, year: i32) -> Vec<String> {
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => TOPIC_TEMPLATES
            .iter()
            .map(|t| t.replace("{topic}", topic).replace("{focus}", focus))
            .collect(),
        None => COUNTRY_TEMPLATES
            .iter()
            .map(|t| {
                t.replace("{name_en}", country.name_en)
                    .replace("{name_es}", country.name_es)
                    .replace("{year}", &year.to_string())
            })
            .collect(),
    }
}

/// Keep the first occurrence of each normalized URL; drop empty URLs.
pub fn dedupe_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| {
            let key = normalize_url(&r.url);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Outcome of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    /// Deduplicated results in discovery order.
    pub results: Vec<SearchResult>,
    /// Hits before dedupe.
    pub raw_count: usize,
    /// Queries whose search call failed.
    pub failed_queries: Vec<String>,
}

/// Run every query in order, pausing between calls. Failing queries are
/// logged and skipped.
pub async fn fan_out(
    search: &dyn SearchProvider,
    queries: &[String],
    region: &str,
    limit: usize,
    pacer: &Pacer,
) -> FanOut {
    let mut all = Vec::new();
    let mut failed_queries = Vec::new();

    for (idx, query) in queries.iter().enumerate() {
        if idx > 0 {
            pacer.pause().await;
        }
        match search.search(query, region, limit).await {
            Ok(results) => {
                debug!(query = query.as_str(), hits = results.len(), "Fan-out query");
                all.extend(results);
            }
            Err(e) => {
                warn!(query = query.as_str(), error = %e, "Search failed; skipping query");
                failed_queries.push(query.clone());
            }
        }
    }

    let raw_count = all.len();
    let results = dedupe_results(all);
    info!(
        queries = queries.len(),
        raw = raw_count,
        unique = results.len(),
        failed = failed_queries.len(),
        "Fan-out finished"
    );
    FanOut {
        results,
        raw_count,
        failed_queries,
    }
}
