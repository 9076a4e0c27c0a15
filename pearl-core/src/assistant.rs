//! Idea assistant: mentor-style explanations, focus-market adaptations and
//! experiment packs for persisted ideas.
//!
//! Chat and adaptation output is cached in the idea's row; a cache write
//! failure is logged and the fresh text is still returned.

use crate::compliance::enforce_compliance;
use crate::config::RetryConfig;
use crate::error::{PearlError, ResearchError, Result};
use crate::providers::{TextGenerator, with_retry};
use crate::research::extraction::extract_json;
use crate::store::schema::{self, ADAPT_PLACEHOLDER};
use crate::store::{FoundRow, RowStore};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cached chat text shorter than this is regenerated.
const CHAT_CACHE_MIN_CHARS: usize = 50;
/// Cached adaptation text shorter than this is regenerated.
const ADAPT_CACHE_MIN_CHARS: usize = 20;

/// Generated or cached Markdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantReply {
    pub markdown: String,
    pub cached: bool,
}

/// A completed, compliance-checked experiment pack.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentPack {
    pub pack: Value,
    /// One note per phrase the sanitizer replaced.
    pub modifications: Vec<String>,
}

pub struct IdeaAssistant {
    generator: Arc<dyn TextGenerator>,
    rows: Arc<dyn RowStore>,
    retry: RetryConfig,
    focus_market: String,
}

impl IdeaAssistant {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        rows: Arc<dyn RowStore>,
        retry: RetryConfig,
        focus_market: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            rows,
            retry,
            focus_market: focus_market.into(),
        }
    }

    async fn find_idea(&self, fingerprint: &str) -> Result<FoundRow> {
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return Err(PearlError::invalid_input("Missing fingerprint"));
        }
        self.rows
            .find_row(schema::IDEAS, "dedupe_fingerprint", fingerprint)
            .await?
            .ok_or_else(|| PearlError::not_found("Idea"))
    }

    async fn generate(&self, prompt: &str, want_json: bool) -> Result<String> {
        let generator = &self.generator;
        Ok(with_retry(&self.retry, || generator.generate(prompt, want_json)).await?)
    }

    async fn cache(&self, row: &FoundRow, column: &str, text: &str) {
        if let Err(e) = self
            .rows
            .update_cell(schema::IDEAS, row.index, column, Value::String(text.to_string()))
            .await
        {
            warn!(column, row = row.index, error = %e, "Could not cache generated text");
        }
    }

    /// Mentor-style Markdown explanation of a persisted idea.
    pub async fn chat(&self, fingerprint: &str) -> Result<AssistantReply> {
        let row = self.find_idea(fingerprint).await?;
        let cached = row.text("chat_md");
        if cached.chars().count() > CHAT_CACHE_MIN_CHARS {
            debug!(row = row.index, "Returning cached chat");
            return Ok(AssistantReply {
                markdown: cached,
                cached: true,
            });
        }

        let sources = split_sources(&row.text("sources"));
        let prompt = chat_prompt(&row.text("name"), &row.text("data_inputs"), &sources);
        let markdown = self.generate(&prompt, false).await?;
        self.cache(&row, "chat_md", &markdown).await;
        info!(row = row.index, chars = markdown.len(), "Generated idea chat");
        Ok(AssistantReply {
            markdown,
            cached: false,
        })
    }

    /// Focus-market adaptation of a persisted idea. Blank request fields fall
    /// back to the stored row.
    pub async fn adapt(
        &self,
        fingerprint: &str,
        title: &str,
        summary: &str,
        sources: &[String],
    ) -> Result<AssistantReply> {
        let row = self.find_idea(fingerprint).await?;
        let cached = row.text("miami_adapt");
        if cached.chars().count() > ADAPT_CACHE_MIN_CHARS && cached != ADAPT_PLACEHOLDER {
            debug!(row = row.index, "Returning cached adaptation");
            return Ok(AssistantReply {
                markdown: cached,
                cached: true,
            });
        }

        let title = non_blank(title).unwrap_or_else(|| row.text("name"));
        let summary = non_blank(summary).unwrap_or_else(|| row.text("data_inputs"));
        let sources = if sources.is_empty() {
            split_sources(&row.text("sources"))
        } else {
            sources.to_vec()
        };

        let prompt = adapt_prompt(&title, &summary, &sources, &self.focus_market);
        let markdown = self.generate(&prompt, false).await?;
        self.cache(&row, "miami_adapt", &markdown).await;
        info!(row = row.index, market = self.focus_market.as_str(), "Generated adaptation");
        Ok(AssistantReply {
            markdown,
            cached: false,
        })
    }

    /// Landing copy, scripts and tracking plan for testing an idea.
    pub async fn experiment_pack(
        &self,
        title: &str,
        summary: &str,
        country: &str,
        topic: Option<&str>,
    ) -> Result<ExperimentPack> {
        let (Some(title), Some(summary)) = (non_blank(title), non_blank(summary)) else {
            return Err(PearlError::invalid_input("Missing idea details"));
        };
        let pain_point = topic
            .and_then(non_blank)
            .unwrap_or_else(|| "Real Estate Sellers".to_string());

        let prompt = pack_prompt(&title, &summary, country, &pain_point);
        let text = self.generate(&prompt, true).await?;
        let raw = match extract_json(&text) {
            Ok(extracted) => extracted.json,
            Err(e) => {
                warn!(error = %e, "Experiment pack output was not JSON");
                return Err(ResearchError::PackGeneration.into());
            }
        };

        let (sanitized, modifications) = enforce_compliance(raw);
        let pack = complete_pack(&sanitized);
        info!(modifications = modifications.len(), "Generated experiment pack");
        Ok(ExperimentPack {
            pack,
            modifications,
        })
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn split_sources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn chat_prompt(title: &str, summary: &str, sources: &[String]) -> String {
    format!(
        r#"ACT AS: Friendly, elite real estate mentor.
GOAL: Explain this idea in a detailed, conversational chat style, in SPANISH.

INPUT IDEA:
- Title: {title}
- Summary: {summary}
- Sources: {sources}

OUTPUT INSTRUCTION:
Write as if chatting directly with the agent. No generic AI introductions; start directly.
Warm, expert tone. Allow 1-2 paragraphs per section where needed, not just dry bullets.

STRUCTURE (Markdown):

# {title}

## ¿De qué trata? 💡
(Explain the concept clearly in 1-2 paragraphs.)

## ¿Por qué es una Perla? 💎
(Explain the hidden value.)

## Paso a Paso 🚀
(How to execute it. Bullets, each step explained.)

## Guion para Redes (30-60s) 🎬
**Hook**: ...
**Cuerpo**: ...
**CTA**: ...

## Dinero y Fricción 💰
(Monetization and effort, honestly.)

## Ángulo Miami 🌴
(Specific advice for South Florida.)

## Fuentes 🔗
(List the sources provided.)

TONE: Conversational, detailed, mentor-like."#,
        sources = sources.join(", "),
    )
}

fn adapt_prompt(title: &str, summary: &str, sources: &[String], market: &str) -> String {
    format!(
        r#"ACT AS: Real estate marketing strategist for Spanish-speaking sellers in {market}.
GOAL: Adapt this idea to the {market} market, in SPANISH, as Markdown.

INPUT IDEA:
- Title: {title}
- Summary: {summary}
- Sources: {sources}

STRUCTURE (Markdown):

# {title}: versión {market}

## Encaje local
(Which local seller problems this idea addresses.)

## Cómo ejecutarlo en {market}
(Concrete, numbered steps with local channels.)

## Riesgos y cumplimiento
(Licensing, Fair Housing and advertising limits to respect.)

## Primer experimento
(One small test with a measurable goal.)

No promises of results, prices or timelines."#,
        sources = sources.join(", "),
    )
}

fn pack_prompt(title: &str, summary: &str, country: &str, pain_point: &str) -> String {
    format!(
        r#"ROLE: Elite real estate marketing strategist for Miami Spanish-speaking sellers.
OUTPUT: ONLY valid JSON. No markdown, no explanations.

CREATE an experiment pack for:
- Title: {title}
- Summary: {summary}
- Market: {country}
- Pain point: {pain_point}

EXACT JSON STRUCTURE:
{{
  "landing_copy": {{
    "headlines": ["...", "...", "..."],
    "bullets": ["...", "...", "...", "...", "..."],
    "faq": [{{"q": "...", "a": "..."}}],
    "cta": "..."
  }},
  "shorts_scripts": [{{"title": "...", "hook": "...", "body": "...", "cta": "...", "caption": "..."}}],
  "whatsapp_scripts": {{
    "first_contact": "...",
    "follow_up_24h": "...",
    "follow_up_72h": "..."
  }},
  "distribution_checklist": ["Paso 1", "Paso 2", "Paso 3", "Paso 4", "Paso 5"],
  "metrics_tracker": {{
    "goal": "...",
    "target_optins": 10,
    "target_convos": 3,
    "target_citas": 1,
    "weak_signal": "...",
    "iterate_if": "..."
  }},
  "iteration_plan": {{
    "if_low_optins": "...",
    "if_low_convos": "...",
    "if_no_citas": "...",
    "kill_criteria": "..."
  }},
  "compliance_block": "PENDING"
}}

Use 5 FAQ entries and 3 short scripts.
PROHIBIDO: garantizado, seguro, 72h, mejor precio, asesoría legal/fiscal directa.
IDIOMA: Español profesional."#
    )
}

/// Exactly `len` items: extra items are dropped, missing ones are filled by
/// cycling through `defaults` from the current length.
fn ensure_array(value: Option<&Value>, defaults: &[Value], len: usize) -> Value {
    let mut items = value.and_then(Value::as_array).cloned().unwrap_or_default();
    items.truncate(len);
    while items.len() < len && !defaults.is_empty() {
        items.push(defaults[items.len() % defaults.len()].clone());
    }
    Value::Array(items)
}

/// First non-empty string among `keys` of `obj`, else `default`.
fn text_or(obj: Option<&Value>, keys: &[&str], default: &str) -> Value {
    let found = keys.iter().find_map(|k| {
        obj.and_then(|o| o.get(*k))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    });
    Value::String(found.unwrap_or(default).to_string())
}

/// Fill every section of a pack so clients never see missing fields.
pub fn complete_pack(pack: &Value) -> Value {
    let landing = pack.get("landing_copy");
    let whatsapp = pack.get("whatsapp_scripts");
    let metrics = pack.get("metrics_tracker");

    let iteration_plan = match pack.get("iteration_plan") {
        Some(plan @ Value::Object(_)) => plan.clone(),
        _ => json!({
            "if_low_optins": "Revisar headlines y CTA",
            "if_low_convos": "Revisar WhatsApp scripts",
            "if_no_citas": "Calificar mejor los leads",
            "kill_criteria": "Sin ninguna cita después de 2 semanas",
        }),
    };

    let mut out = Map::new();
    out.insert(
        "landing_copy".into(),
        json!({
            "headlines": ensure_array(
                landing.and_then(|l| l.get("headlines")),
                &[json!("Headline 1"), json!("Headline 2"), json!("Headline 3")],
                3,
            ),
            "bullets": ensure_array(landing.and_then(|l| l.get("bullets")), &[json!("Beneficio clave")], 5),
            "faq": ensure_array(
                landing.and_then(|l| l.get("faq")),
                &[json!({"q": "Pregunta", "a": "Respuesta"})],
                5,
            ),
            "cta": text_or(landing, &["cta"], "Contactar ahora"),
        }),
    );
    out.insert(
        "shorts_scripts".into(),
        ensure_array(
            pack.get("shorts_scripts"),
            &[json!({"title": "Video", "hook": "Hook", "body": "Body", "cta": "CTA", "caption": "Caption"})],
            3,
        ),
    );
    out.insert(
        "whatsapp_scripts".into(),
        json!({
            "first_reply": text_or(whatsapp, &["first_contact", "first_reply"], "Hola, gracias por tu interés..."),
            "followup_24h": text_or(whatsapp, &["follow_up_24h", "followup_24h"], "Hola, seguimiento día 1..."),
            "followup_72h": text_or(whatsapp, &["follow_up_72h", "followup_72h"], "Hola, seguimiento día 3..."),
        }),
    );
    out.insert(
        "distribution_checklist".into(),
        ensure_array(pack.get("distribution_checklist"), &[json!("Paso de distribución")], 5),
    );
    out.insert(
        "metrics_tracker".into(),
        json!({
            "goal": text_or(metrics, &["goal"], "Generar leads cualificados"),
            "target_optins": 10,
            "target_convos": 3,
            "target_citas": 1,
            "weak_signal": text_or(metrics, &["weak_signal"], "Menos de 5 opt-ins en 48h"),
            "iterate_if": text_or(metrics, &["iterate_if"], "Cambiar copy de headlines"),
        }),
    );
    out.insert("iteration_plan".into(), iteration_plan);
    out.insert(
        "compliance_block".into(),
        pack.get("compliance_block").cloned().unwrap_or(Value::Null),
    );
    Value::Object(out)
}
