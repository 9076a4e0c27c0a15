//! URL normalization and domain helpers used by fan-out dedupe, verification
//! and the saturation check.

use std::collections::HashSet;
use url::Url;

/// Canonical form used to collapse URL variants: query string and fragment
/// stripped, trailing slashes removed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    trimmed[..end].trim_end_matches('/').to_string()
}

/// Hostname of `raw` without a leading `www.`; `None` for unparseable URLs.
pub fn extract_domain(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Set of distinct domains across `urls`, skipping unparseable entries.
pub fn domain_set<S: AsRef<str>>(urls: &[S]) -> HashSet<String> {
    urls.iter()
        .filter_map(|u| extract_domain(u.as_ref()))
        .collect()
}

/// Number of distinct domains across `urls`.
pub fn distinct_domains<S: AsRef<str>>(urls: &[S]) -> usize {
    domain_set(urls).len()
}
