// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NoiseFilter & LevelClassifier (C2): `classify_level`, `is_storable`,
//! `looks_like_error` — §4.2. All indicator matching is case-insensitive.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Output,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Output => "output",
        })
    }
}

static ERROR_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(error|fatal|exception|failed|failure|crash)\b"));
static WARN_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(warn|warning|deprecated)\b"));
static DEBUG_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(debug|trace|verbose)\b"));
static INFO_INDICATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\b(info|notice)\b"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constant classifier pattern is valid")
}

/// §4.2: ordered evaluation, error > warn > debug > info > output. Empty
/// trimmed text is `output`.
pub fn classify_level(content: &str) -> Level {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Level::Output;
    }
    if ERROR_INDICATOR.is_match(trimmed) {
        Level::Error
    } else if WARN_INDICATOR.is_match(trimmed) {
        Level::Warn
    } else if DEBUG_INDICATOR.is_match(trimmed) {
        Level::Debug
    } else if INFO_INDICATOR.is_match(trimmed) {
        Level::Info
    } else {
        Level::Output
    }
}

static PURE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| compile(r"^[\s\d\[\]{}():.]*$"));
static HOT_UPDATE_CHATTER: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(hmr update|hot[- ]update|page reload|connected|connecting|disconnected)\b")
});
static COMPILE_SUCCESS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(compiled successfully|no issues found|ready in \d)\b"));
static BUILD_BOOKKEEPING: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^\s*(watching for file changes|waiting for file changes)"));
static ACCESS_LOG: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*-->\s*(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+\S+\s+\d{3}"));
static SELF_MONITORING: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(process unresponsive|healthcheck|monitoring)\b"));
static INSPECTOR_PORT_NOTICE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)default inspector port\s+\d+\s+not available"));

/// §4.2: rejects noise; anything not excluded is storable.
pub fn is_storable(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return false;
    }
    if PURE_PUNCTUATION.is_match(trimmed) {
        return false;
    }
    if HOT_UPDATE_CHATTER.is_match(trimmed)
        || COMPILE_SUCCESS.is_match(trimmed)
        || BUILD_BOOKKEEPING.is_match(trimmed)
        || ACCESS_LOG.is_match(trimmed)
        || SELF_MONITORING.is_match(trimmed)
        || INSPECTOR_PORT_NOTICE.is_match(trimmed)
    {
        return false;
    }
    true
}

const ERROR_TOKENS: &[&str] = &[
    "error:",
    "fatal:",
    "uncaught exception",
    "unhandled promise",
    "syntax error",
    "reference error",
    "type error",
    "module not found",
    "failed to compile",
    "build failed",
    "compilation failed",
    "econnrefused",
    "eaddrinuse",
    "transform failed",
    "crash:",
    "abort:",
];

/// §4.2: a stricter predicate than `classify_level`, checked against an
/// explicit token list. Gates the fallback path in `ErrorDetector`.
pub fn looks_like_error(content: &str) -> bool {
    let lower = content.to_lowercase();
    ERROR_TOKENS.iter().any(|token| lower.contains(token))
}
