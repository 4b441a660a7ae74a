// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Types produced by the detection pipeline (C3) and persisted by an
//! `ErrorStore` (§6).

use crate::pattern::{Category, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_MESSAGE_LEN: usize = 2_000;
pub const MAX_RAW_OUTPUT_LEN: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        })
    }
}

/// A single line read from a child's stream (§3, `LogLine`).
///
/// Invariant: a `LogLine` with empty trimmed `content` is never constructed
/// by the pipeline — callers filtering on `isStorable` should drop it before
/// reaching here rather than constructing an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub stream: Stream,
    pub process_id: crate::ProcessId,
}

/// An error surfaced by the detector, pre-persistence (§3, `DetectedError`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedError {
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub source_file: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub stack_trace: Option<String>,
    pub pattern_id: Option<&'static str>,
    pub raw_output: String,
    pub context: HashMap<String, String>,
}

impl DetectedError {
    /// Truncate `message` and `raw_output` to the bounds in §7, appending an
    /// ellipsis to truncated text. Idempotent.
    pub fn truncate(mut self) -> Self {
        truncate_with_ellipsis(&mut self.message, MAX_MESSAGE_LEN);
        truncate_with_ellipsis(&mut self.raw_output, MAX_RAW_OUTPUT_LEN);
        self
    }

    /// §7: an error with empty message, missing category, or missing
    /// severity is dropped. Category/severity are always set by construction
    /// in this crate (they're non-`Option` fields), so only the message
    /// check is meaningful — kept as a named predicate so call sites read
    /// like a publishability invariant rather than an ad hoc `.is_empty()`.
    pub fn is_publishable(&self) -> bool {
        !self.message.trim().is_empty()
    }
}

fn truncate_with_ellipsis(s: &mut String, max_len: usize) {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len).collect();
        *s = format!("{truncated}…");
    }
}

/// A `DetectedError` augmented by an `ErrorStore` (§3, `StoredError`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredError {
    pub error: DetectedError,
    pub hash: String,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub occurrence_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DetectedError {
        DetectedError {
            category: Category::Runtime,
            severity: Severity::Error,
            message: "boom".to_string(),
            source_file: None,
            line_number: None,
            column_number: None,
            stack_trace: None,
            pattern_id: None,
            raw_output: "boom".to_string(),
            context: HashMap::new(),
        }
    }

    #[test]
    fn truncate_leaves_short_messages_alone() {
        let e = sample().truncate();
        assert_eq!(e.message, "boom");
    }

    #[test]
    fn truncate_bounds_message_and_raw_output() {
        let mut e = sample();
        e.message = "x".repeat(MAX_MESSAGE_LEN + 50);
        e.raw_output = "y".repeat(MAX_RAW_OUTPUT_LEN + 50);
        let e = e.truncate();
        assert_eq!(e.message.chars().count(), MAX_MESSAGE_LEN + 1);
        assert!(e.message.ends_with('…'));
        assert_eq!(e.raw_output.chars().count(), MAX_RAW_OUTPUT_LEN + 1);
    }

    #[test]
    fn empty_message_is_not_publishable() {
        let mut e = sample();
        e.message = "   ".to_string();
        assert!(!e.is_publishable());
    }
}
