// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deduplicator (C7): three-tier duplicate detection against a recent
//! window of previously stored errors — §4.7.

use chrono::{DateTime, Duration, Utc};
use devsup_core::{DetectedError, StoredError};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const RAPID_REPEAT_WINDOW_SECS: i64 = 5;
const RAPID_REPEAT_JACCARD: f64 = 0.80;
const SEMANTIC_JACCARD: f64 = 0.85;

#[derive(Debug, Default, Clone, Copy)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// True when `candidate` duplicates any entry in `recent` (the bounded
    /// recent window handed in by the caller — see `ErrorStore::list_recent`).
    pub fn is_duplicate(&self, candidate: &DetectedError, recent: &[StoredError], now: DateTime<Utc>) -> bool {
        recent.iter().any(|stored| {
            Self::exact_match(candidate, stored)
                || Self::rapid_repeat(candidate, stored, now)
                || Self::semantic_match(candidate, stored)
        })
    }

    fn exact_match(candidate: &DetectedError, stored: &StoredError) -> bool {
        candidate.message.trim() == stored.error.message.trim()
            && candidate.source_file == stored.error.source_file
    }

    fn rapid_repeat(candidate: &DetectedError, stored: &StoredError, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(stored.last_occurrence);
        if elapsed < Duration::zero() || elapsed > Duration::seconds(RAPID_REPEAT_WINDOW_SECS) {
            return false;
        }
        candidate.source_file == stored.error.source_file
            && candidate.line_number == stored.error.line_number
            && jaccard(&candidate.message, &stored.error.message) > RAPID_REPEAT_JACCARD
    }

    fn semantic_match(candidate: &DetectedError, stored: &StoredError) -> bool {
        if candidate.category != stored.error.category || candidate.severity != stored.error.severity {
            return false;
        }
        let same_signature = match (extract_signature(&candidate.message), extract_signature(&stored.error.message)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        same_signature || jaccard(&candidate.message, &stored.error.message) > SEMANTIC_JACCARD
    }
}

static SIGNATURE_TYPED_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(\w+Error):\s*\S+\s+(is not defined|is not a function|cannot read|cannot access)")
});
static SIGNATURE_HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| compile(r"\d{3}\s+\S+"));
static SIGNATURE_RESOLVE_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)cannot resolve|module not found|failed to resolve"));
static SIGNATURE_NETWORK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)econnrefused|enotfound|etimedout|network error"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constant dedup signature pattern is valid")
}

/// §4.7 "Signature extraction": first match wins, normalised by lowercasing
/// and replacing non-alphanumerics with `_`.
fn extract_signature(message: &str) -> Option<String> {
    for pattern in [
        &*SIGNATURE_TYPED_ERROR,
        &*SIGNATURE_HTTP_STATUS,
        &*SIGNATURE_RESOLVE_FAILURE,
        &*SIGNATURE_NETWORK,
    ] {
        if let Some(m) = pattern.find(message) {
            return Some(normalize_signature(m.as_str()));
        }
    }
    None
}

fn normalize_signature(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Jaccard word-overlap of two messages, split on whitespace and lowercased.
fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    let set_a: HashSet<String> = set_a.iter().map(|w| w.to_lowercase()).collect();
    let set_b: HashSet<String> = set_b.iter().map(|w| w.to_lowercase()).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
