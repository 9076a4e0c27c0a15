//! Research engine: fan-out, synthesis and verification for one target.

use super::fanout::{self, FanOut};
use super::saturation;
use super::synthesis::Synthesizer;
use super::verification::{SweepStats, VerificationSweep};
use crate::config::{PearlConfig, ResearchConfig};
use crate::countries::Country;
use crate::error::Result;
use crate::pacing::Pacer;
use crate::providers::TextGenerator;
use crate::search::SearchProvider;
use crate::types::IdeaCandidate;
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Everything one research pass produced, in synthesis order.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutput {
    /// Name the model was asked to research.
    pub target: String,
    pub queries: Vec<String>,
    pub raw_results: usize,
    pub unique_results: usize,
    pub failed_queries: Vec<String>,
    pub ideas: Vec<IdeaCandidate>,
    pub sweep: SweepStats,
}

/// Drives the search → synthesize → verify stages.
pub struct ResearchEngine {
    search: Arc<dyn SearchProvider>,
    synthesizer: Synthesizer,
    sweep: VerificationSweep,
    config: ResearchConfig,
    fanout_pacer: Pacer,
    model: String,
}

impl ResearchEngine {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        generator: Arc<dyn TextGenerator>,
        config: &PearlConfig,
    ) -> Self {
        let model = generator.model_name().to_string();
        let synthesizer = Synthesizer::new(
            generator,
            config.retry.clone(),
            config.research.context_budget,
        );
        let sweep = VerificationSweep::new(Arc::clone(&search), config.verification.clone());
        let (min, max) = config.research.query_delay();
        Self {
            search,
            synthesizer,
            sweep,
            config: config.research.clone(),
            fanout_pacer: Pacer::between(min, max),
            model,
        }
    }

    /// Override the delays between fan-out and verification searches.
    pub fn with_pacing(mut self, fanout: Pacer, verification: Pacer) -> Self {
        self.fanout_pacer = fanout;
        self.sweep = self.sweep.with_pacer(verification);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Research a country, or a topic around the focus market when `topic`
    /// is non-blank.
    pub async fn research(&self, country: &Country, topic: Option<&str>) -> Result<ResearchOutput> {
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());
        let (target, market) = match topic {
            Some(topic) => (topic.to_string(), self.config.focus_market.clone()),
            None => (country.name_es.to_string(), country.name_en.to_string()),
        };
        let year = Utc::now().year();
        let queries = fanout::build_queries(country, topic, &self.config.focus_market, year);
        info!(
            country = country.code,
            subject = target.as_str(),
            queries = queries.len(),
            "Research started"
        );

        let FanOut {
            results,
            raw_count,
            failed_queries,
        } = fanout::fan_out(
            self.search.as_ref(),
            &queries,
            country.code,
            self.config.results_per_query,
            &self.fanout_pacer,
        )
        .await;

        let mut ideas = self.synthesizer.synthesize(&target, &results).await?;
        let sweep = self.sweep.run(&mut ideas, &market, country.code).await;

        info!(
            country = country.code,
            ideas = ideas.len(),
            verified = sweep.verified,
            "Research finished"
        );
        Ok(ResearchOutput {
            target,
            queries,
            raw_results: raw_count,
            unique_results: results.len(),
            failed_queries,
            ideas,
            sweep,
        })
    }

    /// Attach focus-market saturation reports to `ideas`.
    pub async fn check_saturation(&self, ideas: &mut [IdeaCandidate]) {
        saturation::check_all(
            self.search.as_ref(),
            ideas,
            &self.config.focus_market,
            &self.config.focus_region,
            &self.fanout_pacer,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countries;
    use crate::error::{LlmError, PearlError};
    use crate::providers::MockTextGenerator;
    use crate::search::MockSearchProvider;
    use crate::types::SearchResult;
    use serde_json::{Value, json};

    fn pearl(title: &str, score: u8, sources: &[&str]) -> Value {
        json!({
            "title_es": title,
            "idea_summary": "Resumen",
            "why_pearl": "Demanda clara",
            "pearl_score": score,
            "execution_steps": ["uno"],
            "faceless_script": {"hook": "h", "body": "b", "cta": "c"},
            "monetization_options": ["leads"],
            "friction_notes": "baja",
            "cost_notes": "poco",
            "cost_level": "LOW",
            "effort_level": "MED",
            "faceless_fit": 8,
            "tags": [],
            "sources": sources
        })
    }

    fn engine(search: Arc<MockSearchProvider>, generator: Arc<MockTextGenerator>) -> ResearchEngine {
        ResearchEngine::new(search, generator, &PearlConfig::default())
            .with_pacing(Pacer::none(), Pacer::none())
    }

    #[tokio::test]
    async fn test_country_mode_verifies_with_market_name() {
        let search = Arc::new(
            MockSearchProvider::new()
                .with_results(
                    "best proptech startups for agents Spain",
                    vec![SearchResult::new("https://a.com/1", "A", "snippet")],
                )
                .with_results(
                    "Idea real estate Spain",
                    vec![SearchResult::new("https://b.com/2", "B", "")],
                ),
        );
        let generator = Arc::new(MockTextGenerator::with_response(
            &json!([pearl("Idea", 70, &["https://a.com/1"])]).to_string(),
        ));
        let es = countries::find_by_code("ES").unwrap();
        let out = engine(Arc::clone(&search), generator).research(es, None).await.unwrap();

        assert_eq!(out.target, "España");
        assert_eq!(out.queries.len(), 8);
        assert_eq!(out.unique_results, 1);
        assert!(search.calls().iter().all(|c| c.region == "ES"));
        assert!(search.queries().contains(&"Idea real estate Spain".to_string()));
        assert_eq!(out.ideas.len(), 1);
        assert!(out.ideas[0].verified);
        assert_eq!(out.ideas[0].sources.len(), 2);
        assert_eq!(out.sweep.verified, 1);
    }

    #[tokio::test]
    async fn test_topic_mode_uses_focus_market() {
        let search = Arc::new(MockSearchProvider::new().with_results(
            "condo fees real estate Miami",
            vec![
                SearchResult::new("https://a.com/1", "A", ""),
                SearchResult::new("https://b.com/1", "B", ""),
            ],
        ));
        let generator = Arc::new(MockTextGenerator::with_response(
            &json!([pearl("Fee Checklist", 88, &["https://a.com/1", "https://b.com/1"])]).to_string(),
        ));
        let us = countries::find_by_code("US").unwrap();
        let out = engine(Arc::clone(&search), Arc::clone(&generator))
            .research(us, Some("condo fees"))
            .await
            .unwrap();

        assert_eq!(out.target, "condo fees");
        assert_eq!(out.queries.len(), 5);
        // Two distinct domains from synthesis: no verification searches.
        assert_eq!(out.sweep.searches, 0);
        assert_eq!(search.calls().len(), 5);
        assert!(out.ideas[0].verified);
        assert!(generator.prompts()[0].1);
    }

    #[tokio::test]
    async fn test_no_context_skips_model() {
        let search = Arc::new(MockSearchProvider::new());
        let generator = Arc::new(MockTextGenerator::new());
        let us = countries::find_by_code("US").unwrap();
        let out = engine(search, Arc::clone(&generator)).research(us, None).await.unwrap();
        assert!(out.ideas.is_empty());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let search = Arc::new(MockSearchProvider::new().with_results(
            "x real estate Miami",
            vec![SearchResult::new("https://a.com/1", "A", "")],
        ));
        let generator = Arc::new(MockTextGenerator::new());
        generator.queue_error(LlmError::AuthFailed {
            provider: "gemini".into(),
        });
        let us = countries::find_by_code("US").unwrap();
        let err = engine(search, generator).research(us, Some("x")).await.unwrap_err();
        assert!(matches!(err, PearlError::Llm(LlmError::AuthFailed { .. })));
    }
}
