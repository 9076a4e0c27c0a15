//! One full country run: research, dedupe against history, shortlist,
//! saturation check and persistence.

use super::dedupe;
use super::engine::ResearchEngine;
use super::ranking;
use crate::config::PearlConfig;
use crate::countries;
use crate::error::{PearlError, Result};
use crate::store::schema::{self, RunContext};
use crate::store::{BlobStore, Row, RowStore, cell_text};
use crate::types::IdeaCandidate;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counters reported for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub candidates: usize,
    pub verified: usize,
    pub duplicates: usize,
    pub written: usize,
}

/// Outcome of [`Pipeline::run_country`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    /// Spanish display name.
    pub country: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub stats: RunStats,
    /// Every candidate: ranked unique ideas first, then duplicates.
    pub ideas: Vec<IdeaCandidate>,
    /// Fingerprints of the persisted shortlist, in rank order.
    pub shortlist: Vec<String>,
    pub duration_secs: f64,
}

/// Blob key of a run's summary document.
pub fn summary_key(run_id: &str) -> String {
    format!("runs/{run_id}/pearls_summary.json")
}

pub struct Pipeline {
    engine: ResearchEngine,
    rows: Arc<dyn RowStore>,
    blobs: Arc<dyn BlobStore>,
    shortlist_size: usize,
    saturation_check: bool,
    run_type: String,
}

impl Pipeline {
    pub fn new(
        engine: ResearchEngine,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
        config: &PearlConfig,
    ) -> Self {
        Self {
            engine,
            rows,
            blobs,
            shortlist_size: config.research.shortlist_size,
            saturation_check: config.research.saturation_check,
            run_type: config.research.run_type.clone(),
        }
    }

    pub fn engine(&self) -> &ResearchEngine {
        &self.engine
    }

    /// Run the whole pipeline for `country_code`, optionally narrowed to `topic`.
    pub async fn run_country(&self, country_code: &str, topic: Option<&str>) -> Result<RunReport> {
        let started = Instant::now();
        let started_at = Utc::now();

        let code = country_code.trim();
        if code.is_empty() {
            return Err(PearlError::invalid_input("Missing country_code"));
        }
        let country = countries::find_by_code(code)
            .ok_or_else(|| PearlError::invalid_input("Invalid country_code"))?;
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());

        let existing = self.existing_fingerprints().await?;
        info!(
            country = country.code,
            topic = topic.unwrap_or(""),
            known = existing.len(),
            "Run started"
        );

        let research = self.engine.research(country, topic).await?;
        let candidates = research.ideas.len();
        let verified = research.ideas.iter().filter(|i| i.verified).count();

        let outcome = dedupe::partition(research.ideas, &existing);
        let mut unique = outcome.unique;
        ranking::rank(&mut unique);
        let mut shortlist = ranking::shortlist(&unique, self.shortlist_size);

        if self.saturation_check && !shortlist.is_empty() {
            self.engine.check_saturation(&mut shortlist).await;
            for picked in &shortlist {
                let fp = picked.fingerprint();
                if let Some(slot) = unique.iter_mut().find(|i| i.fingerprint() == fp) {
                    slot.saturation = picked.saturation.clone();
                }
            }
        }

        let ctx = RunContext {
            run_id: format!("RUN_DS_{}_{}", country.code, started_at.timestamp_millis()),
            country: country.name_es.to_string(),
            region: country.region.to_string(),
            run_type: self.run_type.clone(),
            topic: topic.map(str::to_string),
            model: self.engine.model_name().to_string(),
            started_at,
        };
        let stats = RunStats {
            candidates,
            verified,
            duplicates: outcome.duplicates.len(),
            written: shortlist.len(),
        };
        let duration_secs = started.elapsed().as_secs_f64();

        self.persist(&ctx, &shortlist, &stats, duration_secs).await?;

        info!(
            run_id = ctx.run_id.as_str(),
            candidates = stats.candidates,
            verified = stats.verified,
            duplicates = stats.duplicates,
            written = stats.written,
            "Run finished"
        );

        let shortlist_fps = shortlist.iter().map(IdeaCandidate::fingerprint).collect();
        let mut ideas = unique;
        ideas.extend(outcome.duplicates);
        Ok(RunReport {
            run_id: ctx.run_id,
            country: ctx.country,
            country_code: country.code.to_string(),
            topic: ctx.topic,
            stats,
            ideas,
            shortlist: shortlist_fps,
            duration_secs,
        })
    }

    async fn existing_fingerprints(&self) -> Result<HashSet<String>> {
        let column = self
            .rows
            .read_column(schema::IDEAS, "dedupe_fingerprint")
            .await?;
        Ok(column
            .iter()
            .map(cell_text)
            .filter(|fp| !fp.is_empty())
            .collect())
    }

    async fn persist(
        &self,
        ctx: &RunContext,
        shortlist: &[IdeaCandidate],
        stats: &RunStats,
        duration_secs: f64,
    ) -> Result<()> {
        self.rows
            .append_rows(
                schema::RUNS,
                vec![schema::runs_row(ctx, stats.written, stats.candidates, stats.verified)],
            )
            .await?;

        if !shortlist.is_empty() {
            let ranked = || shortlist.iter().enumerate().map(|(idx, idea)| (idx + 1, idea));

            let ideas: Vec<Row> = ranked().map(|(rank, idea)| schema::idea_row(ctx, rank, idea)).collect();
            self.rows.append_rows(schema::IDEAS, ideas).await?;

            let sources: Vec<Row> = ranked()
                .flat_map(|(rank, idea)| schema::source_rows(ctx, rank, idea))
                .collect();
            if !sources.is_empty() {
                self.rows.append_rows(schema::SOURCES, sources).await?;
            }

            let library: Vec<Row> = shortlist.iter().map(|idea| schema::library_row(ctx, idea)).collect();
            self.rows.append_rows(schema::LIBRARY_VIEW, library).await?;

            let index: Vec<Row> = ranked().map(|(rank, idea)| schema::index_row(ctx, rank, idea)).collect();
            self.rows.append_rows(schema::IDEA_INDEX, index).await?;
        }

        let top_picks = shortlist.iter().filter(|i| i.is_top_pick()).count();
        self.rows
            .append_rows(
                schema::COUNTRY_STATS,
                vec![schema::country_stats_row(
                    ctx,
                    stats.candidates,
                    stats.verified,
                    top_picks,
                    duration_secs,
                )],
            )
            .await?;

        let summary = json!({
            "runId": ctx.run_id,
            "date": ctx.started_at.to_rfc3339(),
            "country": ctx.country,
            "topic": ctx.topic,
            "stats": {
                "raw": stats.candidates,
                "verified": stats.verified,
                "duplicates": stats.duplicates,
                "written": stats.written,
            },
            "pearls": shortlist,
        });
        if let Err(e) = self.blobs.write_json(&summary_key(&ctx.run_id), &summary).await {
            warn!(run_id = ctx.run_id.as_str(), error = %e, "Could not write run summary");
        }
        Ok(())
    }
}
