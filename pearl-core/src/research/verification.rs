//! Verification sweep: re-query the web per idea until its sources span
//! enough independent domains.
//!
//! Each idea moves through an explicit state machine:
//!
//! ```text
//! UNVERIFIED ──start──▶ VERIFYING ──succeed──▶ VERIFIED
//!     │                     └──────fail──────▶ VERIFICATION_FAILED
//!     └──────────────succeed──────────────────▶ VERIFIED
//! ```
//!
//! The direct `UNVERIFIED → VERIFIED` edge is taken when the synthesized
//! sources already span [`MIN_DISTINCT_DOMAINS`], without any search call.
//! An idea arriving in a state the machine cannot continue from is logged
//! and marked `VERIFICATION_FAILED`; the rest of the batch is still swept.

use crate::config::VerificationConfig;
use crate::error::ResearchError;
use crate::pacing::Pacer;
use crate::search::{SearchProvider, distinct_domains, domain_set, extract_domain};
use crate::types::{EvidenceItem, IdeaCandidate, ProofPack, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Distinct source domains an idea needs to count as verified. Synthesis,
/// the sweep and the shortlist all apply this one rule.
pub const MIN_DISTINCT_DOMAINS: usize = 2;

/// Summary written to ideas that fail verification, and recorded as a gap.
pub const FAILURE_MESSAGE: &str = "Need at least 2 independent verified domains.";

/// Query phrasings tried in order. `{title}` and `{market}` are substituted.
pub const DEFAULT_STRATEGIES: [&str; 3] = [
    "{title} real estate {market}",
    "\"{title}\" {market}",
    "{title} inmobiliaria {market}",
];

/// Verification status of one idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    Unverified,
    Verifying,
    Verified,
    VerificationFailed,
}

impl VerificationState {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationState::Unverified => "UNVERIFIED",
            VerificationState::Verifying => "VERIFYING",
            VerificationState::Verified => "VERIFIED",
            VerificationState::VerificationFailed => "VERIFICATION_FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VerificationState::Verified | VerificationState::VerificationFailed
        )
    }

    /// `UNVERIFIED → VERIFYING`.
    pub fn start(self) -> Result<Self, ResearchError> {
        match self {
            VerificationState::Unverified => Ok(VerificationState::Verifying),
            other => Err(other.invalid(VerificationState::Verifying)),
        }
    }

    /// `UNVERIFIED | VERIFYING → VERIFIED`.
    pub fn succeed(self) -> Result<Self, ResearchError> {
        match self {
            VerificationState::Unverified | VerificationState::Verifying => {
                Ok(VerificationState::Verified)
            }
            other => Err(other.invalid(VerificationState::Verified)),
        }
    }

    /// `VERIFYING → VERIFICATION_FAILED`.
    pub fn fail(self) -> Result<Self, ResearchError> {
        match self {
            VerificationState::Verifying => Ok(VerificationState::VerificationFailed),
            other => Err(other.invalid(VerificationState::VerificationFailed)),
        }
    }

    fn invalid(self, to: VerificationState) -> ResearchError {
        ResearchError::InvalidTransition {
            from: self.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub searches: usize,
    pub verified: usize,
    pub failed: usize,
}

/// Runs the verification sweep over a batch of ideas.
pub struct VerificationSweep {
    search: Arc<dyn SearchProvider>,
    config: VerificationConfig,
    strategies: Vec<String>,
    pacer: Pacer,
}

impl VerificationSweep {
    pub fn new(search: Arc<dyn SearchProvider>, config: VerificationConfig) -> Self {
        let pacer = Pacer::fixed(Duration::from_millis(config.delay_ms));
        Self {
            search,
            config,
            strategies: DEFAULT_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            pacer,
        }
    }

    /// Replace the query phrasings.
    pub fn with_strategies(mut self, strategies: Vec<String>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Sweep `ideas` strictly in order. `market` fills the `{market}`
    /// placeholder and `region` is passed to the search provider.
    pub async fn run(
        &self,
        ideas: &mut [IdeaCandidate],
        market: &str,
        region: &str,
    ) -> SweepStats {
        let mut stats = SweepStats::default();
        for idea in ideas.iter_mut() {
            if let Err(e) = self.verify_one(idea, market, region, &mut stats).await {
                warn!(
                    title = idea.title.as_str(),
                    state = %idea.verification,
                    error = %e,
                    "Skipping idea with inconsistent verification state"
                );
                mark_failed(idea);
            }
            match idea.verification {
                VerificationState::Verified => stats.verified += 1,
                VerificationState::VerificationFailed => stats.failed += 1,
                _ => {}
            }
        }
        info!(
            ideas = ideas.len(),
            searches = stats.searches,
            verified = stats.verified,
            failed = stats.failed,
            "Verification sweep finished"
        );
        stats
    }

    async fn verify_one(
        &self,
        idea: &mut IdeaCandidate,
        market: &str,
        region: &str,
        stats: &mut SweepStats,
    ) -> Result<(), ResearchError> {
        if idea.verification == VerificationState::VerificationFailed {
            return Ok(());
        }

        let threshold = MIN_DISTINCT_DOMAINS;
        let mut domains = domain_set(&idea.sources);
        let mut evidence = source_evidence(&idea.sources);

        if idea.verification != VerificationState::Verified && domains.len() < threshold {
            idea.verification = idea.verification.start()?;
            'strategies: for template in self.strategies.iter().take(self.config.max_attempts) {
                let query = render_strategy(template, &idea.title, market);
                if stats.searches > 0 {
                    self.pacer.pause().await;
                }
                stats.searches += 1;
                debug!(title = idea.title.as_str(), query = query.as_str(), "Verification query");

                let results = match self
                    .search
                    .search(&query, region, self.config.results_per_attempt)
                    .await
                {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(query = query.as_str(), error = %e, "Verification search failed");
                        Vec::new()
                    }
                };

                for result in results {
                    if let Some(item) = accept(&result, &mut domains) {
                        debug!(domain = item.domain.as_str(), url = item.url.as_str(), "Accepted evidence");
                        idea.sources.push(result.url.clone());
                        evidence.push(item);
                        if domains.len() >= threshold {
                            break 'strategies;
                        }
                    }
                }
            }
        }

        let gaps = if domains.len() >= threshold {
            if idea.verification != VerificationState::Verified {
                idea.verification = idea.verification.succeed()?;
            }
            Vec::new()
        } else {
            idea.verification = idea.verification.fail()?;
            idea.evidence_summary = FAILURE_MESSAGE.to_string();
            vec![FAILURE_MESSAGE.to_string()]
        };

        idea.verified = idea.verification == VerificationState::Verified;
        idea.evidence_count = idea.sources.len();
        idea.proof_pack = ProofPack {
            evidence_items: evidence,
            confidence_score: confidence(domains.len()),
            gaps,
        };
        debug!(
            title = idea.title.as_str(),
            state = %idea.verification,
            domains = domains.len(),
            "Verification result"
        );
        Ok(())
    }
}

fn mark_failed(idea: &mut IdeaCandidate) {
    idea.verification = VerificationState::VerificationFailed;
    idea.verified = false;
    idea.evidence_summary = FAILURE_MESSAGE.to_string();
    idea.evidence_count = idea.sources.len();
    idea.proof_pack = ProofPack {
        evidence_items: source_evidence(&idea.sources),
        confidence_score: confidence(distinct_domains(&idea.sources)),
        gaps: vec![FAILURE_MESSAGE.to_string()],
    };
}

/// Substitute `{title}` and `{market}` in a strategy template.
pub fn render_strategy(template: &str, title: &str, market: &str) -> String {
    template.replace("{title}", title).replace("{market}", market)
}

/// `min(25 × distinct domains, 100)`.
pub fn confidence(distinct_domains: usize) -> u8 {
    (distinct_domains.saturating_mul(25)).min(100) as u8
}

/// Accept a search hit only if it brings a domain not yet present.
fn accept(result: &SearchResult, domains: &mut HashSet<String>) -> Option<EvidenceItem> {
    let domain = extract_domain(&result.url)?;
    if !domains.insert(domain.clone()) {
        return None;
    }
    Some(EvidenceItem {
        url: result.url.clone(),
        title: result.title.clone(),
        domain,
        kind: "Verified".to_string(),
        snippet: result.snippet.clone(),
    })
}

/// One evidence item per distinct domain among the synthesized sources.
fn source_evidence(sources: &[String]) -> Vec<EvidenceItem> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter_map(|url| {
            let domain = extract_domain(url)?;
            seen.insert(domain.clone()).then(|| EvidenceItem {
                url: url.clone(),
                title: String::new(),
                domain,
                kind: "Source".to_string(),
                snippet: String::new(),
            })
        })
        .collect()
}
