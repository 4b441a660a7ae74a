// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ErrorDetector (C3): the six-step detection algorithm in §4.3.

use crate::catalogue::{Extractor, PatternRule, CATALOGUE};
use crate::classify::looks_like_error;
use devsup_core::{Category, DetectedError, Severity, Stream};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorDetector;

impl ErrorDetector {
    pub fn new() -> Self {
        Self
    }

    /// §4.3 algorithm, steps 1–6. Returns `None` when nothing was detected —
    /// never a sentinel value.
    pub fn detect(&self, chunk: &str, stream: Stream) -> Option<DetectedError> {
        for rule in CATALOGUE.iter() {
            if let Some(caps) = rule.regex.captures(chunk) {
                let mut error = build_from_rule(rule, chunk, &caps);
                error.context.insert("stream".to_string(), stream.to_string());
                tracing::debug!(pattern_id = rule.id, %stream, "matched catalogue rule");
                return Some(error);
            }
        }
        if stream == Stream::Stderr && looks_like_error(chunk) {
            let Some(mut error) = fallback_detect(chunk) else {
                tracing::trace!(%stream, "fallback path dropped chunk");
                return None;
            };
            error.context.insert("stream".to_string(), stream.to_string());
            return Some(error);
        }
        None
    }
}

fn build_from_rule(rule: &PatternRule, chunk: &str, caps: &Captures<'_>) -> DetectedError {
    let mut context = HashMap::new();
    let mut severity = rule.severity;

    let (message, raw_source_file, line_number, column_number, json_stack) = if rule.id == "client_error_json" {
        let raw_json = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let outcome = handle_client_error_json(raw_json);
        context.insert("originalJson".to_string(), raw_json.to_string());
        context.insert("source".to_string(), "CLIENT_ERROR".to_string());
        (outcome.message, outcome.source_file, outcome.line, outcome.column, outcome.stack)
    } else {
        let message = extract_message(caps, &rule.extractor);
        let source_file = extract_group_string(caps, rule.extractor.file);
        let line_number = extract_group_u32(caps, rule.extractor.line);
        let column_number = extract_group_u32(caps, rule.extractor.column);

        if rule.id == "lint_error" {
            if let Some(token) = caps.get(4) {
                severity = if token.as_str().eq_ignore_ascii_case("error") {
                    Severity::Error
                } else {
                    Severity::Warning
                };
            }
        }

        (message, source_file, line_number, column_number, None)
    };

    // §4.3 step 3 applies uniformly, regardless of which branch above
    // produced the raw source file.
    let source_file = raw_source_file.map(|s| normalize_source_file(&s));
    let stack_trace = json_stack.or_else(|| extract_stack_trace(chunk));

    DetectedError {
        category: rule.category,
        severity,
        message: clean_message(&message),
        source_file,
        line_number,
        column_number,
        stack_trace,
        pattern_id: Some(rule.id),
        raw_output: chunk.to_string(),
        context,
    }
}

fn extract_message(caps: &Captures<'_>, extractor: &Extractor) -> String {
    match extractor.message {
        Some(group) => caps.get(group).map(|m| m.as_str().to_string()).unwrap_or_default(),
        None => caps.get(0).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
    }
}

fn extract_group_string(caps: &Captures<'_>, idx: Option<usize>) -> Option<String> {
    idx.and_then(|g| caps.get(g)).map(|m| m.as_str().to_string())
}

fn extract_group_u32(caps: &Captures<'_>, idx: Option<usize>) -> Option<u32> {
    idx.and_then(|g| caps.get(g)).and_then(|m| m.as_str().parse::<u32>().ok())
}

struct ClientJsonOutcome {
    message: String,
    source_file: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    stack: Option<String>,
}

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| compile(r",\s*\}"));
static MESSAGE_SCAVENGE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?i)message['"]?\s*:?\s*['"]([^'"]+)['"]"#));
static ERROR_SCAVENGE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:Reference|Type|Syntax)?Error:\s*(.+)"));

fn clean_json_envelope(raw: &str) -> String {
    let mut s = raw.to_string();
    if let Some(idx) = s.rfind('}') {
        s.truncate(idx + 1);
    }
    s = TRAILING_COMMA.replace_all(&s, "}").into_owned();
    s = s.replace('\'', "\"");
    s = s.replace('\r', "\\r").replace('\t', "\\t").replace('\n', "\\n");
    s
}

fn json_number_as_u32(value: &serde_json::Value) -> Option<u32> {
    value.as_u64().map(|n| n as u32).or_else(|| value.as_f64().map(|f| f as u32))
}

/// Rule-specific adjustment for `client_error_json` (§4.3 step 2): clean,
/// parse, and on failure scavenge a message out of the raw text.
fn handle_client_error_json(raw: &str) -> ClientJsonOutcome {
    let cleaned = clean_json_envelope(raw);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cleaned) {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "Client error (malformed data)".to_string());
        let stack = value.get("stack").and_then(|v| v.as_str()).map(str::to_string);
        let source_file = value
            .get("source")
            .or_else(|| value.get("url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let line = value.get("lineno").and_then(json_number_as_u32);
        let column = value.get("colno").and_then(json_number_as_u32);
        return ClientJsonOutcome { message, source_file, line, column, stack };
    }

    if let Some(caps) = MESSAGE_SCAVENGE.captures(raw) {
        if let Some(m) = caps.get(1) {
            return ClientJsonOutcome {
                message: m.as_str().to_string(),
                source_file: None,
                line: None,
                column: None,
                stack: None,
            };
        }
    }
    if let Some(caps) = ERROR_SCAVENGE.captures(raw) {
        if let Some(m) = caps.get(1) {
            return ClientJsonOutcome {
                message: m.as_str().to_string(),
                source_file: None,
                line: None,
                column: None,
                stack: None,
            };
        }
    }

    ClientJsonOutcome {
        message: "Client error (malformed data)".to_string(),
        source_file: None,
        line: None,
        column: None,
        stack: None,
    }
}

const NODE_MODULES: &str = "node_modules/";
const SOURCE_ANCHORS: &[&str] = &["/src/", "/pages/", "/components/", "/lib/", "/utils/", "/app/"];

/// §4.3 step 3: strip common absolute prefixes.
fn normalize_source_file(path: &str) -> String {
    let mut p = path.trim().to_string();
    if let Some(rest) = p.strip_prefix("file://") {
        p = rest.to_string();
    } else if let Some(idx) = p.find("://") {
        if let Some(rel_slash) = p[idx + 3..].find('/') {
            p = p[idx + 3 + rel_slash..].to_string();
        }
    }
    if let Some(idx) = p.find(NODE_MODULES) {
        return p[idx..].to_string();
    }
    for anchor in SOURCE_ANCHORS {
        if let Some(idx) = p.find(anchor) {
            return p[idx + anchor.len()..].to_string();
        }
    }
    p
}

static STACK_LINE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^\s+(?:at|in) .+$"));

/// §4.3 step 4: concatenate all stack-frame-looking lines in the chunk.
fn extract_stack_trace(chunk: &str) -> Option<String> {
    let lines: Vec<&str> = STACK_LINE.find_iter(chunk).map(|m| m.as_str()).collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

static BRACKET_PREFIX: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*\[[^\]]*\]\s*"));
static ISO_DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?\s*")
});
static LEVEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^\s*\((?:ERROR|WARN|INFO|DEBUG)\):\s*"));
static AT_PREFIX: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*at\s+"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

/// §4.3 step 6: strip leading decoration, then collapse whitespace.
fn clean_message(input: &str) -> String {
    let mut s = input.trim().to_string();
    loop {
        let before = s.clone();
        s = BRACKET_PREFIX.replace(&s, "").into_owned();
        s = ISO_DATE_PREFIX.replace(&s, "").into_owned();
        s = LEVEL_PREFIX.replace(&s, "").into_owned();
        s = AT_PREFIX.replace(&s, "").into_owned();
        if s == before {
            break;
        }
    }
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// §4.3.1: lowercase substring search, first match wins.
fn infer_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if any(&["module", "import", "dependency"]) {
        Category::Dependency
    } else if any(&["syntax", "parse"]) {
        Category::Syntax
    } else if any(&["compile", "build", "transform"]) {
        Category::Compilation
    } else if any(&["memory", "heap"]) {
        Category::Memory
    } else if any(&["network", "fetch", "connection"]) {
        Category::Network
    } else if any(&["file", "path", "directory"]) {
        Category::Filesystem
    } else if any(&["port", "env", "config"]) {
        Category::Environment
    } else {
        Category::Runtime
    }
}

static SKIP_WARNING: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^warning:"));
static SKIP_STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s+at\s+"));
static SKIP_SNIPPET_MARKER: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d+\s*\|"));
static SKIP_PORT_IN_USE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)Port\s+\d+\s+is\s+in use"));
static SKIP_INSPECTOR_PORT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)Default inspector port\s+\d+\s+not available"));
static SKIP_COMPAT_DATE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)compatibility date"));
static FALLBACK_LOCATION: LazyLock<Regex> = LazyLock::new(|| compile(r"([^()\[\]:]+):(\d+)(?::(\d+))?"));

/// §4.3 step 5: only reachable for non-empty `stderr` chunks that matched no
/// catalogue rule.
fn fallback_detect(chunk: &str) -> Option<DetectedError> {
    let raw_line = chunk.lines().find(|l| !l.trim().is_empty())?;
    let candidate = raw_line.trim();

    if SKIP_WARNING.is_match(candidate)
        || SKIP_STACK_FRAME.is_match(raw_line)
        || SKIP_SNIPPET_MARKER.is_match(candidate)
        || SKIP_PORT_IN_USE.is_match(candidate)
        || SKIP_INSPECTOR_PORT.is_match(candidate)
        || SKIP_COMPAT_DATE.is_match(candidate)
    {
        return None;
    }

    let mut source_file = None;
    let mut line_number = None;
    let mut column_number = None;
    if let Some(caps) = FALLBACK_LOCATION.captures(candidate) {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if path.contains('.') || path.contains('/') {
            source_file = Some(normalize_source_file(path));
            line_number = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            column_number = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
        }
    }

    let mut context = HashMap::new();
    context.insert("fallback".to_string(), "true".to_string());

    let stack_trace =
        if chunk.lines().count() > 1 { Some(chunk.trim().to_string()) } else { None };

    Some(DetectedError {
        category: infer_category(candidate),
        severity: Severity::Error,
        message: clean_message(candidate),
        source_file,
        line_number,
        column_number,
        stack_trace,
        pattern_id: None,
        raw_output: chunk.to_string(),
        context,
    })
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constant detector pattern is valid")
}
