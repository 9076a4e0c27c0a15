//! JSON extraction from model output.
//!
//! Model text is not always clean JSON. Extraction runs an ordered chain of
//! strategies; each returns a tagged [`Attempt`] and the first success wins:
//! 1. direct parse of the trimmed text
//! 2. parse of the body of a Markdown code fence
//! 3. parse of the region from the first `[`/`{` to the last matching `]`/`}`

use serde_json::Value;
use tracing::debug;

/// Strategy used to pull JSON out of model text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    DirectParse,
    MarkdownFence,
    BracketRegion,
}

impl ExtractionMethod {
    /// All strategies, in the order they are tried.
    pub const CHAIN: [ExtractionMethod; 3] = [
        ExtractionMethod::DirectParse,
        ExtractionMethod::MarkdownFence,
        ExtractionMethod::BracketRegion,
    ];
}

/// Outcome of a single strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Parsed {
        method: ExtractionMethod,
        value: Value,
    },
    Failed {
        method: ExtractionMethod,
        reason: String,
    },
}

/// Successful extraction with the failures that preceded it.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub json: Value,
    pub method: ExtractionMethod,
    pub failures: Vec<(ExtractionMethod, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("No JSON found in model output ({bytes} bytes): {reasons:?}")]
    AllStrategiesFailed { bytes: usize, reasons: Vec<String> },
}

/// Run one strategy against `text`.
pub fn attempt(method: ExtractionMethod, text: &str) -> Attempt {
    let candidate = match method {
        ExtractionMethod::DirectParse => Some(text.trim().to_string()),
        ExtractionMethod::MarkdownFence => fence_body(text),
        ExtractionMethod::BracketRegion => bracket_region(text).map(str::to_string),
    };
    let Some(candidate) = candidate else {
        return Attempt::Failed {
            method,
            reason: "no candidate region".to_string(),
        };
    };
    match serde_json::from_str::<Value>(&candidate) {
        Ok(value) => Attempt::Parsed { method, value },
        Err(e) => Attempt::Failed {
            method,
            reason: e.to_string(),
        },
    }
}

/// Run the whole chain; first success wins.
pub fn extract_json(text: &str) -> Result<Extracted, ExtractionError> {
    let mut failures = Vec::new();
    for method in ExtractionMethod::CHAIN {
        match attempt(method, text) {
            Attempt::Parsed { method, value } => {
                debug!(?method, skipped = failures.len(), "Extracted JSON");
                return Ok(Extracted {
                    json: value,
                    method,
                    failures,
                });
            }
            Attempt::Failed { method, reason } => failures.push((method, reason)),
        }
    }
    Err(ExtractionError::AllStrategiesFailed {
        bytes: text.len(),
        reasons: failures
            .into_iter()
            .map(|(m, r)| format!("{m:?}: {r}"))
            .collect(),
    })
}

/// Body of the first Markdown code fence, with any language tag dropped.
/// An unterminated fence runs to the end of the text.
fn fence_body(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip the info string (e.g. "json") up to the end of the line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let after = &after[body_start..];
    let body = match after.find("```") {
        Some(end) => &after[..end],
        None => after,
    };
    let body = body.trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// From the first opening bracket to the last matching closing bracket.
fn bracket_region(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let closer = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}
