//! Market saturation check for shortlisted ideas.
//!
//! Searches the focus market for each idea and sorts the result domains
//! into content platforms and direct competitors.

use crate::pacing::Pacer;
use crate::search::{SearchProvider, extract_domain};
use crate::types::{AlreadyCommon, IdeaCandidate, Saturation, SearchResult, WhoDoesIt};
use tracing::{debug, warn};

/// Domains counted as platforms rather than competitors.
pub const PLATFORM_DOMAINS: [&str; 10] = [
    "youtube.com",
    "eventbrite.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "tiktok.com",
    "twitter.com",
    "x.com",
    "reddit.com",
    "pinterest.com",
];

const MAX_PLATFORMS: usize = 3;
const MAX_COMPETITORS: usize = 5;
const RESULTS_PER_QUERY: usize = 10;

fn is_platform(domain: &str) -> bool {
    PLATFORM_DOMAINS
        .iter()
        .any(|p| domain == *p || domain.ends_with(&format!(".{p}")))
}

/// Classify result domains and score saturation.
///
/// Score is `min((platforms + 2 × competitors) × 10, 100)` over all distinct
/// domains; the report keeps at most 3 platforms and 5 competitors.
pub fn classify(results: &[SearchResult]) -> Saturation {
    let mut platforms: Vec<String> = Vec::new();
    let mut competitors: Vec<String> = Vec::new();

    for result in results {
        let Some(domain) = extract_domain(&result.url) else {
            continue;
        };
        if domain.contains("google") {
            continue;
        }
        let bucket = if is_platform(&domain) {
            &mut platforms
        } else {
            &mut competitors
        };
        if !bucket.contains(&domain) {
            bucket.push(domain);
        }
    }

    let raw = (platforms.len() + competitors.len() * 2) * 10;
    let already_common = match competitors.len() {
        n if n >= 5 => AlreadyCommon::Yes,
        n if n >= 2 => AlreadyCommon::No,
        _ => AlreadyCommon::Unknown,
    };
    platforms.truncate(MAX_PLATFORMS);
    competitors.truncate(MAX_COMPETITORS);

    Saturation {
        who_does_it: WhoDoesIt {
            platforms,
            competitors,
        },
        saturation_score: raw.min(100) as u8,
        already_common,
    }
}

/// Attach a saturation report to each idea, in order.
pub async fn check_all(
    search: &dyn SearchProvider,
    ideas: &mut [IdeaCandidate],
    focus: &str,
    region: &str,
    pacer: &Pacer,
) {
    let mut calls = 0usize;
    for idea in ideas.iter_mut() {
        let queries = [
            format!("{} real estate {}", idea.title, focus),
            format!("{} inmobiliaria {}", idea.title, focus),
        ];
        let mut combined = Vec::new();
        for query in &queries {
            if calls > 0 {
                pacer.pause().await;
            }
            calls += 1;
            match search.search(query, region, RESULTS_PER_QUERY).await {
                Ok(results) => combined.extend(results),
                Err(e) => warn!(query = query.as_str(), error = %e, "Saturation search failed"),
            }
        }
        let saturation = classify(&combined);
        debug!(
            title = idea.title.as_str(),
            score = saturation.saturation_score,
            "Saturation checked"
        );
        idea.saturation = Some(saturation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchProvider;

    fn hits(urls: &[&str]) -> Vec<SearchResult> {
        urls.iter().map(|u| SearchResult::new(*u, "", "")).collect()
    }

    #[test]
    fn test_classify_platforms_and_competitors() {
        let sat = classify(&hits(&[
            "https://www.youtube.com/watch?v=1",
            "https://m.facebook.com/p",
            "https://agency-one.com/a",
            "https://agency-two.com/b",
            "https://www.google.com/maps",
            "https://agency-one.com/c",
        ]));
        assert_eq!(sat.who_does_it.platforms, vec!["youtube.com", "m.facebook.com"]);
        assert_eq!(sat.who_does_it.competitors, vec!["agency-one.com", "agency-two.com"]);
        assert_eq!(sat.saturation_score, 60);
        assert_eq!(sat.already_common, AlreadyCommon::No);
    }

    #[test]
    fn test_classify_caps_and_yes() {
        let urls: Vec<String> = (0..7).map(|i| format!("https://c{i}.com")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let sat = classify(&hits(&refs));
        assert_eq!(sat.who_does_it.competitors.len(), 5);
        assert_eq!(sat.saturation_score, 100);
        assert_eq!(sat.already_common, AlreadyCommon::Yes);
    }

    #[test]
    fn test_classify_empty_unknown() {
        let sat = classify(&[]);
        assert_eq!(sat.saturation_score, 0);
        assert_eq!(sat.already_common, AlreadyCommon::Unknown);
    }

    #[test]
    fn test_x_com_not_matched_by_suffix_of_other_domains() {
        assert!(is_platform("x.com"));
        assert!(!is_platform("remax.com"));
    }

    #[tokio::test]
    async fn test_check_all_queries_focus_market() {
        let mock = MockSearchProvider::new().with_results(
            "Idea real estate Miami",
            hits(&["https://a.com", "https://b.com"]),
        );
        let mut ideas = vec![IdeaCandidate::new("Idea", 90, Vec::new())];
        check_all(&mock, &mut ideas, "Miami", "US", &Pacer::none()).await;
        assert_eq!(
            mock.queries(),
            vec![
                "Idea real estate Miami".to_string(),
                "Idea inmobiliaria Miami".to_string()
            ]
        );
        let sat = ideas[0].saturation.as_ref().unwrap();
        assert_eq!(sat.already_common, AlreadyCommon::No);
    }
}
