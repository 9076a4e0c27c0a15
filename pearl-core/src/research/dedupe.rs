//! Content fingerprints and dedupe partitioning.
//!
//! The fingerprint is `sha256_hex(normalize(title) + "|" + primary_source)`.
//! It is a coarse key: near-duplicate titles pointing at different primary
//! sources are not caught.

use crate::types::IdeaCandidate;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// NFC, lowercase, every non-alphanumeric char to a space, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .nfc()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fingerprint of a title and its primary source URL.
pub fn fingerprint(title: &str, primary_source: &str) -> String {
    let input = format!("{}|{}", normalize_title(title), primary_source.trim());
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Result of [`partition`].
#[derive(Debug, Clone, Default)]
pub struct DedupeOutcome {
    pub unique: Vec<IdeaCandidate>,
    pub duplicates: Vec<IdeaCandidate>,
}

/// Split `candidates` into first-seen and repeated ideas.
///
/// A candidate is a duplicate when its fingerprint is in `existing` or was
/// already seen earlier in the same batch. Input order decides the winner.
pub fn partition(candidates: Vec<IdeaCandidate>, existing: &HashSet<String>) -> DedupeOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut outcome = DedupeOutcome::default();
    for candidate in candidates {
        let fp = candidate.fingerprint();
        if existing.contains(&fp) || !seen.insert(fp) {
            outcome.duplicates.push(candidate);
        } else {
            outcome.unique.push(candidate);
        }
    }
    outcome
}
