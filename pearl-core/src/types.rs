//! Core type definitions for Pearl.
//!
//! Defines the data structures that flow through a research run: search
//! results, synthesized idea candidates, proof packs and saturation reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::research::verification::VerificationState;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            source: None,
        }
    }
}

/// Three-step cost/effort scale used by the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Low,
    Med,
    High,
}

impl Level {
    /// Parse the model's `LOW|MED|HIGH` token. Only the exact uppercase
    /// tokens are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Level::Low),
            "MED" => Some(Level::Med),
            "HIGH" => Some(Level::High),
            _ => None,
        }
    }

    /// Numeric friction/cost score: 1, 3 or 5.
    pub fn score(self) -> u8 {
        match self {
            Level::Low => 1,
            Level::Med => 3,
            Level::High => 5,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::Med => write!(f, "MED"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// Short-form video script outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacelessScript {
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cta: String,
}

/// One accepted piece of verification evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub url: String,
    pub title: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub snippet: String,
}

/// Evidence gathered for an idea by the verification sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPack {
    #[serde(default)]
    pub evidence_items: Vec<EvidenceItem>,
    #[serde(default)]
    pub confidence_score: u8,
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Whether a shortlisted idea is already common in the focus market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlreadyCommon {
    Yes,
    No,
    Unknown,
}

/// Who already does a shortlisted idea in the focus market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoDoesIt {
    pub platforms: Vec<String>,
    pub competitors: Vec<String>,
}

/// Saturation report attached to shortlisted ideas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Saturation {
    pub who_does_it: WhoDoesIt,
    pub saturation_score: u8,
    pub already_common: AlreadyCommon,
}

/// One synthesized idea, carried through verification, dedupe and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaCandidate {
    pub title: String,
    pub summary: String,
    pub why_pearl: String,
    /// 0 to 100.
    pub score: u8,
    pub execution_steps: Vec<String>,
    pub faceless_script: FacelessScript,
    pub monetization_options: Vec<String>,
    pub friction_notes: String,
    pub cost_notes: String,
    pub cost_level: Level,
    pub effort_level: Level,
    /// 0 to 10.
    pub faceless_fit: u8,
    pub tags: Vec<String>,
    /// Source URLs in discovery order.
    pub sources: Vec<String>,
    pub verified: bool,
    pub evidence_count: usize,
    pub evidence_summary: String,
    pub verification: VerificationState,
    pub proof_pack: ProofPack,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<Saturation>,
    pub created_at: DateTime<Utc>,
}

impl IdeaCandidate {
    /// Minimal candidate with neutral defaults, mostly useful for tests and fixtures.
    pub fn new(title: impl Into<String>, score: u8, sources: Vec<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            why_pearl: String::new(),
            score: score.min(100),
            execution_steps: Vec::new(),
            faceless_script: FacelessScript::default(),
            monetization_options: Vec::new(),
            friction_notes: String::new(),
            cost_notes: String::new(),
            cost_level: Level::Med,
            effort_level: Level::Med,
            faceless_fit: 5,
            tags: Vec::new(),
            evidence_count: sources.len(),
            sources,
            verified: false,
            evidence_summary: String::new(),
            verification: VerificationState::Unverified,
            proof_pack: ProofPack::default(),
            saturation: None,
            created_at: Utc::now(),
        }
    }

    /// Effort level as a 1/3/5 score.
    pub fn selling_friction(&self) -> u8 {
        self.effort_level.score()
    }

    /// Cost level as a 1/3/5 score.
    pub fn cost_score(&self) -> u8 {
        self.cost_level.score()
    }

    pub fn is_top_pick(&self) -> bool {
        self.score >= 80
    }

    /// First source URL, trimmed; empty when there are no sources.
    pub fn primary_source(&self) -> &str {
        self.sources.first().map(|s| s.trim()).unwrap_or("")
    }

    /// Content fingerprint used for deduplication.
    pub fn fingerprint(&self) -> String {
        crate::research::dedupe::fingerprint(&self.title, self.primary_source())
    }

    /// Short label derived from the faceless fit, kept for the `video_format` column.
    pub fn faceless_format(&self) -> &'static str {
        if self.faceless_fit > 7 { "High" } else { "Low" }
    }
}
