//! Idea synthesis: search context in, typed idea candidates out.

use super::extraction::extract_json;
use super::verification::{MIN_DISTINCT_DOMAINS, VerificationState};
use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::providers::{TextGenerator, with_retry};
use crate::search::distinct_domains;
use crate::types::{FacelessScript, IdeaCandidate, Level, ProofPack, SearchResult};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Default evidence summary for freshly synthesized ideas.
pub const DEFAULT_EVIDENCE_SUMMARY: &str = "Extracted from search";

/// Model output for one idea, as requested by the prompt.
#[derive(Debug, Deserialize)]
struct RawPearl {
    title_es: String,
    idea_summary: String,
    why_pearl: String,
    pearl_score: f64,
    execution_steps: Vec<String>,
    faceless_script: FacelessScript,
    monetization_options: Vec<String>,
    friction_notes: String,
    cost_notes: String,
    cost_level: String,
    effort_level: String,
    faceless_fit: f64,
    tags: Vec<String>,
    sources: Vec<String>,
    #[serde(default)]
    evidence_summary: Option<String>,
}

/// Render search results as `- [title](url): snippet` context lines.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("- [{}]({}): {}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the synthesis prompt for `target` (a topic or a country name).
pub fn build_prompt(target: &str, results: &[SearchResult]) -> String {
    let context = format_context(results);
    format!(
        r#"You are an elite real estate strategist for the market in {target}.
Find "Pearls" (Perlas): unique, high-leverage marketing or business ideas hidden in the search results below.

RULES:
1. NO HALLUCINATIONS: every idea must be backed by the provided text.
2. SOURCES: list only EXACT URLs taken from the input context.
3. VERIFICATION: set "verified": true ONLY if the sources span at least 2 DISTINCT domains.
4. LANGUAGE: write every text field in Spanish.

OUTPUT SCHEMA (JSON):
{{
  "title_es": "Short catchy title",
  "idea_summary": "2-4 line explanation",
  "why_pearl": "Bullets: why it is a gem",
  "pearl_score": number (0-100),
  "execution_steps": ["step 1", "step 2", "step 3"],
  "faceless_script": {{"hook": "", "body": "", "cta": ""}},
  "monetization_options": ["option 1", "option 2"],
  "friction_notes": "why friction is low, medium or high",
  "cost_notes": "time and money context",
  "cost_level": "LOW|MED|HIGH",
  "effort_level": "LOW|MED|HIGH",
  "faceless_fit": number (0-10),
  "tags": ["tag"],
  "sources": ["url1", "url2"],
  "verified": boolean
}}

INPUT CONTEXT:
{context}

Output a JSON array of objects matching the schema above."#
    )
}

/// Validate one array element and turn it into a candidate.
fn validate(item: &Value) -> Result<IdeaCandidate, String> {
    let raw: RawPearl = serde_json::from_value(item.clone()).map_err(|e| e.to_string())?;

    if !(0.0..=100.0).contains(&raw.pearl_score) {
        return Err(format!("pearl_score {} out of range", raw.pearl_score));
    }
    if !(0.0..=10.0).contains(&raw.faceless_fit) {
        return Err(format!("faceless_fit {} out of range", raw.faceless_fit));
    }
    let cost_level = Level::parse(&raw.cost_level)
        .ok_or_else(|| format!("invalid cost_level '{}'", raw.cost_level))?;
    let effort_level = Level::parse(&raw.effort_level)
        .ok_or_else(|| format!("invalid effort_level '{}'", raw.effort_level))?;

    let verification = if distinct_domains(&raw.sources) >= MIN_DISTINCT_DOMAINS {
        VerificationState::Verified
    } else {
        VerificationState::Unverified
    };

    Ok(IdeaCandidate {
        title: raw.title_es,
        summary: raw.idea_summary,
        why_pearl: raw.why_pearl,
        score: raw.pearl_score.round() as u8,
        execution_steps: raw.execution_steps,
        faceless_script: raw.faceless_script,
        monetization_options: raw.monetization_options,
        friction_notes: raw.friction_notes,
        cost_notes: raw.cost_notes,
        cost_level,
        effort_level,
        faceless_fit: raw.faceless_fit.round() as u8,
        tags: raw.tags,
        evidence_count: raw.sources.len(),
        sources: raw.sources,
        verified: verification == VerificationState::Verified,
        evidence_summary: raw
            .evidence_summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EVIDENCE_SUMMARY.to_string()),
        verification,
        proof_pack: ProofPack::default(),
        saturation: None,
        created_at: Utc::now(),
    })
}

/// Parse model text into candidates. Malformed text yields an empty list;
/// invalid elements are dropped.
pub fn parse_ideas(text: &str) -> Vec<IdeaCandidate> {
    let extracted = match extract_json(text) {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(error = %e, "Could not extract JSON from synthesis output");
            return Vec::new();
        }
    };

    let items = match extracted.json {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            warn!(kind = ?other, "Synthesis output is neither an array nor an object");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match validate(item) {
            Ok(idea) => Some(idea),
            Err(reason) => {
                warn!(index = idx, reason = reason.as_str(), "Dropping invalid idea");
                None
            }
        })
        .collect()
}

/// Turns search context into idea candidates with one model call.
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    retry: RetryConfig,
    context_budget: usize,
}

impl Synthesizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retry: RetryConfig,
        context_budget: usize,
    ) -> Self {
        Self {
            generator,
            retry,
            context_budget,
        }
    }

    /// Synthesize ideas for `target` from `results`.
    ///
    /// Only authentication failures are returned as errors; any other
    /// generation failure is logged and yields an empty list.
    pub async fn synthesize(
        &self,
        target: &str,
        results: &[SearchResult],
    ) -> Result<Vec<IdeaCandidate>, LlmError> {
        let context = &results[..results.len().min(self.context_budget)];
        if context.is_empty() {
            info!(subject = target, "No search context; skipping synthesis");
            return Ok(Vec::new());
        }

        let prompt = build_prompt(target, context);
        let generator = &self.generator;
        let text = match with_retry(&self.retry, || generator.generate(&prompt, true)).await {
            Ok(text) => text,
            Err(e @ LlmError::AuthFailed { .. }) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Synthesis generation failed");
                return Ok(Vec::new());
            }
        };

        let ideas = parse_ideas(&text);
        info!(
            subject = target,
            context = context.len(),
            ideas = ideas.len(),
            model = self.generator.model_name(),
            "Synthesized ideas"
        );
        Ok(ideas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockTextGenerator;
    use serde_json::json;

    fn pearl(title: &str, score: f64, sources: &[&str]) -> Value {
        json!({
            "title_es": title,
            "idea_summary": "Resumen",
            "why_pearl": "Porque sí",
            "pearl_score": score,
            "execution_steps": ["uno", "dos"],
            "faceless_script": {"hook": "h", "body": "b", "cta": "c"},
            "monetization_options": ["a", "b"],
            "friction_notes": "baja",
            "cost_notes": "poco",
            "cost_level": "LOW",
            "effort_level": "HIGH",
            "faceless_fit": 8,
            "tags": ["miami"],
            "sources": sources,
            "verified": true
        })
    }

    #[test]
    fn test_parse_valid_array() {
        let text = json!([pearl("Idea A", 85.0, &["https://a.com/1"])]).to_string();
        let ideas = parse_ideas(&text);
        assert_eq!(ideas.len(), 1);
        let idea = &ideas[0];
        assert_eq!(idea.title, "Idea A");
        assert_eq!(idea.score, 85);
        assert_eq!(idea.cost_score(), 1);
        assert_eq!(idea.selling_friction(), 5);
        assert!(idea.is_top_pick());
        assert_eq!(idea.evidence_count, 1);
        assert_eq!(idea.evidence_summary, DEFAULT_EVIDENCE_SUMMARY);
        // The model claimed verified, but one domain is not enough.
        assert!(!idea.verified);
        assert_eq!(idea.verification, VerificationState::Unverified);
    }

    #[test]
    fn test_parse_two_domains_provisionally_verified() {
        let text = json!([pearl("Idea", 50.0, &["https://a.com/1", "https://b.com/2"])]).to_string();
        let ideas = parse_ideas(&text);
        assert!(ideas[0].verified);
        assert_eq!(ideas[0].verification, VerificationState::Verified);
    }

    #[test]
    fn test_parse_single_object_as_array() {
        let text = pearl("Solo", 40.0, &[]).to_string();
        assert_eq!(parse_ideas(&text).len(), 1);
    }

    #[test]
    fn test_parse_rejects_non_canonical_levels() {
        let mut lower = pearl("Lower", 40.0, &[]);
        lower["cost_level"] = json!("low");
        let mut padded = pearl("Padded", 40.0, &[]);
        padded["effort_level"] = json!(" MED ");
        let text = json!([lower, padded, pearl("Exact", 40.0, &[])]).to_string();
        let ideas = parse_ideas(&text);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].title, "Exact");
    }

    #[test]
    fn test_parse_drops_invalid_elements() {
        let mut bad_score = pearl("Bad", 140.0, &[]);
        bad_score["pearl_score"] = json!(140);
        let mut bad_level = pearl("Bad level", 40.0, &[]);
        bad_level["cost_level"] = json!("CHEAP");
        let mut missing = pearl("Missing", 40.0, &[]);
        missing.as_object_mut().unwrap().remove("why_pearl");
        let text = json!([bad_score, bad_level, missing, pearl("Good", 40.0, &[])]).to_string();
        let ideas = parse_ideas(&text);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].title, "Good");
    }

    #[test]
    fn test_parse_fenced_equals_plain() {
        let plain = json!([pearl("Idea", 60.0, &["https://a.com"])]).to_string();
        let fenced = format!("```json\n{plain}\n```");
        let a = parse_ideas(&plain);
        let b = parse_ideas(&fenced);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].title, b[0].title);
        assert_eq!(a[0].sources, b[0].sources);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_ideas("the model refused").is_empty());
        assert!(parse_ideas("42").is_empty());
    }

    #[test]
    fn test_prompt_context_lines() {
        let results = vec![SearchResult::new("https://a.com", "Title A", "Snippet A")];
        let prompt = build_prompt("Miami", &results);
        assert!(prompt.contains("- [Title A](https://a.com): Snippet A"));
        assert!(prompt.contains("market in Miami"));
        assert!(prompt.contains("\"title_es\""));
    }

    #[tokio::test]
    async fn test_zero_context_makes_no_call() {
        let mock = Arc::new(MockTextGenerator::with_response("[]"));
        let synth = Synthesizer::new(mock.clone(), RetryConfig::default(), 75);
        let ideas = synth.synthesize("Miami", &[]).await.unwrap();
        assert!(ideas.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_context_budget_limits_prompt() {
        let mock = Arc::new(MockTextGenerator::with_response("[]"));
        let synth = Synthesizer::new(mock.clone(), RetryConfig::default(), 2);
        let results: Vec<_> = (0..5)
            .map(|i| SearchResult::new(format!("https://s{i}.com"), format!("T{i}"), ""))
            .collect();
        synth.synthesize("Miami", &results).await.unwrap();
        let (prompt, want_json) = &mock.prompts()[0];
        assert!(want_json);
        assert!(prompt.contains("https://s1.com"));
        assert!(!prompt.contains("https://s2.com"));
    }

    #[tokio::test]
    async fn test_generation_error_yields_empty() {
        let mock = Arc::new(MockTextGenerator::new());
        mock.queue_error(LlmError::ApiRequest {
            message: "HTTP 400".into(),
        });
        let synth = Synthesizer::new(mock, RetryConfig::default(), 75);
        let results = vec![SearchResult::new("https://a.com", "A", "")];
        assert!(synth.synthesize("Miami", &results).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_error_propagates() {
        let mock = Arc::new(MockTextGenerator::new());
        mock.queue_error(LlmError::AuthFailed {
            provider: "Gemini".into(),
        });
        let synth = Synthesizer::new(mock, RetryConfig::default(), 75);
        let results = vec![SearchResult::new("https://a.com", "A", "")];
        assert!(synth.synthesize("Miami", &results).await.is_err());
    }
}
