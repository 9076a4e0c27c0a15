//! Table names, headers and row builders for persisted runs.

use super::Row;
use crate::types::IdeaCandidate;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

pub const RUNS: &str = "Runs";
pub const IDEAS: &str = "Ideas";
pub const LIBRARY_VIEW: &str = "LIBRARY_VIEW";
pub const COUNTRY_STATS: &str = "COUNTRY_STATS";
pub const SOURCES: &str = "Sources";
pub const IDEA_INDEX: &str = "IdeaIndex";

pub const RUNS_HEADER: [&str; 11] = [
    "run_id",
    "run_date",
    "country",
    "region",
    "run_type",
    "verified_count",
    "synthesized_included",
    "notes",
    "drive_folder_id",
    "sheet_id",
    "created_at",
];

pub const IDEAS_HEADER: [&str; 36] = [
    "run_id",
    "run_date",
    "country",
    "rank",
    "label",
    "model",
    "name",
    "who",
    "video_format",
    "why_viral",
    "data_inputs",
    "monetization",
    "miami_adapt",
    "starter_titles",
    "sources",
    "traction_evidence",
    "created_at",
    "b2_model",
    "faceless_score",
    "automation_score",
    "selling_friction",
    "cost_score",
    "miami_fit",
    "overall_score",
    "is_top_pick",
    "dedupe_fingerprint",
    "evidence_count",
    "evidence_summary",
    "execution_steps_json",
    "script_json",
    "monetization_json",
    "friction_notes",
    "cost_notes",
    "chat_md",
    "proof_pack_json",
    "miami_saturation_json",
];

pub const LIBRARY_VIEW_HEADER: [&str; 13] = [
    "overall_score",
    "country",
    "name",
    "why_viral",
    "why_pearl",
    "evidence_count",
    "sources",
    "chat_md",
    "miami_adapt",
    "run_date",
    "run_id",
    "proof_pack_json",
    "miami_saturation_json",
];

pub const COUNTRY_STATS_HEADER: [&str; 7] = [
    "run_id",
    "country",
    "run_date",
    "total_found",
    "verified_count",
    "top_pick_count",
    "duration_s",
];

pub const SOURCES_HEADER: [&str; 8] = [
    "run_id",
    "run_date",
    "country",
    "idea_rank",
    "source_url",
    "source_type",
    "note",
    "created_at",
];

pub const IDEA_INDEX_HEADER: [&str; 4] = ["fingerprint", "idea_id", "created_at", "evidence_count"];

/// Placeholder written to `miami_adapt` until an adaptation is generated.
pub const ADAPT_PLACEHOLDER: &str = "Medium";

/// Header of a known table.
pub fn header_for(table: &str) -> Option<&'static [&'static str]> {
    match table {
        RUNS => Some(&RUNS_HEADER),
        IDEAS => Some(&IDEAS_HEADER),
        LIBRARY_VIEW => Some(&LIBRARY_VIEW_HEADER),
        COUNTRY_STATS => Some(&COUNTRY_STATS_HEADER),
        SOURCES => Some(&SOURCES_HEADER),
        IDEA_INDEX => Some(&IDEA_INDEX_HEADER),
        _ => None,
    }
}

/// Per-run values shared by every row of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Country display name (Spanish).
    pub country: String,
    pub region: String,
    pub run_type: String,
    pub topic: Option<String>,
    pub model: String,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn run_date(&self) -> String {
        self.started_at.format("%Y-%m-%d").to_string()
    }

    fn created_at(&self) -> String {
        self.started_at.to_rfc3339()
    }

    fn idea_id(&self, rank: usize) -> String {
        format!("{}#{}", self.run_id, rank)
    }
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Value {
    Value::String(serde_json::to_string(value).unwrap_or_default())
}

/// One `Runs` row. The `country` cell holds the topic for topic runs.
pub fn runs_row(ctx: &RunContext, written: usize, candidates: usize, verified: usize) -> Row {
    vec![
        json!(ctx.run_id),
        json!(ctx.run_date()),
        json!(ctx.topic.as_deref().unwrap_or(&ctx.country)),
        json!(ctx.region),
        json!(ctx.run_type),
        json!(written),
        json!(candidates),
        json!(format!("Verified: {verified}")),
        json!(""),
        json!(""),
        json!(ctx.created_at()),
    ]
}

/// One `Ideas` row for the idea at 1-based `rank`.
pub fn idea_row(ctx: &RunContext, rank: usize, idea: &IdeaCandidate) -> Row {
    vec![
        json!(ctx.run_id),
        json!(ctx.run_date()),
        json!(ctx.country),
        json!(rank),
        json!("Pearl"),
        json!("B2C"),
        json!(idea.title),
        json!(ctx.topic.as_deref().unwrap_or("Unknown")),
        json!(idea.faceless_format()),
        json!(idea.why_pearl),
        json!(idea.summary),
        json!(idea.monetization_options.join(", ")),
        json!(ADAPT_PLACEHOLDER),
        json!("DeepSearch"),
        json!(idea.sources.join(", ")),
        json!("Verified"),
        json!(ctx.created_at()),
        json!(ctx.model),
        json!(idea.faceless_fit),
        json!(0),
        json!(idea.selling_friction()),
        json!(idea.cost_score()),
        json!(5),
        json!(idea.score),
        json!(idea.is_top_pick()),
        json!(idea.fingerprint()),
        json!(idea.evidence_count),
        json!(idea.evidence_summary),
        to_json_text(&idea.execution_steps),
        to_json_text(&idea.faceless_script),
        to_json_text(&idea.monetization_options),
        json!(idea.friction_notes),
        json!(idea.cost_notes),
        json!(""),
        to_json_text(&idea.proof_pack),
        idea.saturation
            .as_ref()
            .map(to_json_text)
            .unwrap_or_else(|| json!("")),
    ]
}

/// One `LIBRARY_VIEW` row.
pub fn library_row(ctx: &RunContext, idea: &IdeaCandidate) -> Row {
    vec![
        json!(idea.score),
        json!(ctx.country),
        json!(idea.title),
        json!(idea.why_pearl),
        json!(idea.summary),
        json!(idea.evidence_count),
        json!(idea.sources.join(", ")),
        json!(""),
        json!(""),
        json!(ctx.run_date()),
        json!(ctx.run_id),
        to_json_text(&idea.proof_pack),
        idea.saturation
            .as_ref()
            .map(to_json_text)
            .unwrap_or_else(|| json!("")),
    ]
}

/// One `Sources` row per source URL of the idea at `rank`.
pub fn source_rows(ctx: &RunContext, rank: usize, idea: &IdeaCandidate) -> Vec<Row> {
    idea.sources
        .iter()
        .map(|url| {
            vec![
                json!(ctx.run_id),
                json!(ctx.run_date()),
                json!(ctx.country),
                json!(rank),
                json!(url),
                json!("Web"),
                json!("Pearl Source"),
                json!(ctx.created_at()),
            ]
        })
        .collect()
}

/// One `IdeaIndex` row.
pub fn index_row(ctx: &RunContext, rank: usize, idea: &IdeaCandidate) -> Row {
    vec![
        json!(idea.fingerprint()),
        json!(ctx.idea_id(rank)),
        json!(ctx.created_at()),
        json!(idea.evidence_count),
    ]
}

/// One `COUNTRY_STATS` row.
pub fn country_stats_row(
    ctx: &RunContext,
    total_found: usize,
    verified_count: usize,
    top_pick_count: usize,
    duration_secs: f64,
) -> Row {
    vec![
        json!(ctx.run_id),
        json!(ctx.country),
        json!(ctx.run_date()),
        json!(total_found),
        json!(verified_count),
        json!(top_pick_count),
        json!((duration_secs * 10.0).round() / 10.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RunContext {
        RunContext {
            run_id: "RUN_DS_ES_1".into(),
            country: "España".into(),
            region: "ES".into(),
            run_type: "miami-mvp".into(),
            topic: None,
            model: "gemini-test".into(),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_rows_match_headers() {
        let ctx = ctx();
        let idea = IdeaCandidate::new(
            "Idea",
            85,
            vec!["https://a.com/1".into(), "https://b.com/2".into()],
        );
        assert_eq!(runs_row(&ctx, 1, 3, 1).len(), RUNS_HEADER.len());
        assert_eq!(idea_row(&ctx, 1, &idea).len(), IDEAS_HEADER.len());
        assert_eq!(library_row(&ctx, &idea).len(), LIBRARY_VIEW_HEADER.len());
        assert_eq!(index_row(&ctx, 1, &idea).len(), IDEA_INDEX_HEADER.len());
        assert_eq!(country_stats_row(&ctx, 3, 1, 1, 2.34).len(), COUNTRY_STATS_HEADER.len());
        let sources = source_rows(&ctx, 1, &idea);
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|r| r.len() == SOURCES_HEADER.len()));
    }

    #[test]
    fn test_idea_row_fingerprint_column() {
        let ctx = ctx();
        let idea = IdeaCandidate::new("Idea", 85, vec!["https://a.com/1".into()]);
        let row = idea_row(&ctx, 2, &idea);
        let col = IDEAS_HEADER.iter().position(|h| *h == "dedupe_fingerprint").unwrap();
        assert_eq!(row[col], json!(idea.fingerprint()));
        let top = IDEAS_HEADER.iter().position(|h| *h == "is_top_pick").unwrap();
        assert_eq!(row[top], json!(true));
        let who = IDEAS_HEADER.iter().position(|h| *h == "who").unwrap();
        assert_eq!(row[who], json!("Unknown"));
    }

    #[test]
    fn test_runs_row_labels_topic_runs() {
        let mut ctx = ctx();
        assert_eq!(runs_row(&ctx, 1, 3, 2)[2], json!("España"));
        ctx.topic = Some("condo fees".into());
        let row = runs_row(&ctx, 1, 3, 2);
        assert_eq!(row[2], json!("condo fees"));
        assert_eq!(row[7], json!("Verified: 2"));
    }

    #[test]
    fn test_index_row_idea_id() {
        let idea = IdeaCandidate::new("Idea", 10, Vec::new());
        let row = index_row(&ctx(), 3, &idea);
        assert_eq!(row[1], json!("RUN_DS_ES_1#3"));
    }

    #[test]
    fn test_header_for() {
        assert_eq!(header_for(IDEAS).map(|h| h.len()), Some(36));
        assert!(header_for("Nope").is_none());
    }
}
