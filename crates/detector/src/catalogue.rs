// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pattern catalogue (C1): a read-only, priority-sorted vector of
//! `PatternRule`s built once behind a `LazyLock`, the way `oj-runbook`
//! builds `VAR_PATTERN`/`ENV_PATTERN`.
//!
//! Rule IDs are normative — tests elsewhere pin them by name.

use devsup_core::{Category, Severity};
use regex::Regex;
use std::sync::LazyLock;

/// Capture-group indices (1-based) a rule uses to pull fields out of its
/// match. `None` for `message` means "use the whole match, trimmed".
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    pub message: Option<usize>,
    pub file: Option<usize>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Extractor {
    const fn whole_match() -> Self {
        Self { message: None, file: None, line: None, column: None }
    }

    const fn message_only(group: usize) -> Self {
        Self { message: Some(group), file: None, line: None, column: None }
    }
}

pub struct PatternRule {
    pub id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub priority: i32,
    pub regex: Regex,
    pub extractor: Extractor,
}

#[allow(clippy::expect_used)]
fn rule(
    id: &'static str,
    category: Category,
    severity: Severity,
    priority: i32,
    pattern: &str,
    extractor: Extractor,
) -> PatternRule {
    let regex = Regex::new(pattern).expect("catalogue pattern is a constant, valid regex");
    PatternRule { id, category, severity, priority, regex, extractor }
}

/// Built once at first use, sorted descending by `priority` with ties
/// resolved in insertion order (§4.1).
pub static CATALOGUE: LazyLock<Vec<PatternRule>> = LazyLock::new(build_catalogue);

fn build_catalogue() -> Vec<PatternRule> {
    let mut rules = vec![
        // `out_of_memory` is listed after `fatal_generic` in §4.1 but is
        // inserted first here: both carry priority 100 and a bare
        // "FATAL ERROR: ..." heap message must resolve to the more
        // specific out-of-memory rule, not the generic fallback (stable
        // sort keeps ties in insertion order).
        rule(
            "out_of_memory",
            Category::Memory,
            Severity::Fatal,
            100,
            r"(?im)^.*(?:heap limit|out of memory|stack overflow|ENOMEM).*$",
            Extractor::whole_match(),
        ),
        rule(
            "fatal_generic",
            Category::Runtime,
            Severity::Fatal,
            100,
            r"(?i)FATAL ERROR:\s*(.+)",
            Extractor::message_only(1),
        ),
        rule(
            "uncaught_exception",
            Category::Runtime,
            Severity::Fatal,
            95,
            r"(?i)Uncaught Exception:\s*(.+)",
            Extractor::message_only(1),
        ),
        rule(
            "bundler_error_with_location",
            Category::Compilation,
            Severity::Error,
            95,
            r"(?im)^\[\w+\][^\n]*?error[^\n]*?:\s*(.+)$[\s\S]*?^\s*at\s+([^\s:()]+):(\d+):(\d+)",
            Extractor { message: Some(1), file: Some(2), line: Some(3), column: Some(4) },
        ),
        rule(
            "bundler_transform_failed",
            Category::Compilation,
            Severity::Error,
            90,
            r"(?i)Transform failed with \d+ errors?",
            Extractor::whole_match(),
        ),
        rule(
            "component_runtime_error",
            Category::Runtime,
            Severity::Error,
            90,
            r"(?i)Error in component\s+\S+\s*\(([^)]+)\):\s*(.+)",
            Extractor { message: Some(2), file: Some(1), line: None, column: None },
        ),
        rule(
            "hydration_mismatch",
            Category::Runtime,
            Severity::Error,
            90,
            r"(?i)(Hydration (?:failed|mismatch)[^\n]*)",
            Extractor::message_only(1),
        ),
        rule(
            "framework_build_failed",
            Category::Compilation,
            Severity::Error,
            90,
            r"(?i)((?:Build failed|Failed to compile)\b[^\n]*)",
            Extractor::message_only(1),
        ),
        rule(
            "js_error_with_stack",
            Category::Runtime,
            Severity::Error,
            90,
            r"(?im)^((?:Type|Reference|Range)Error:\s*.+)$[\s\S]*?^\s*at\s+(?:[^\s(]+\s*\()?([^\s():]+):(\d+):(\d+)\)?",
            Extractor { message: Some(1), file: Some(2), line: Some(3), column: Some(4) },
        ),
        rule(
            "syntax_error_with_location",
            Category::Compilation,
            Severity::Error,
            90,
            r"(?i)(SyntaxError:\s*[^\n(]+?)\s*\(([^():]+):(\d+):(\d+)\)",
            Extractor { message: Some(1), file: Some(2), line: Some(3), column: Some(4) },
        ),
        rule(
            "port_in_use",
            Category::Environment,
            Severity::Error,
            90,
            r"(?i)(EADDRINUSE[^\n]*|Port\s+\d+\s+is\s+(?:already\s+)?in use[^\n]*)",
            Extractor::message_only(1),
        ),
        rule(
            "hmr_update_failed",
            Category::Runtime,
            Severity::Error,
            85,
            r#"(?i)\[?HMR\]?\s*(?:update\s+)?[Ff]ailed to reload\s+([^\s:]+):?\s*(.*)"#,
            Extractor { message: Some(2), file: Some(1), line: None, column: None },
        ),
        rule(
            "hook_misuse",
            Category::Runtime,
            Severity::Error,
            85,
            r"(?i)(Invalid hook call[^\n]*)",
            Extractor::message_only(1),
        ),
        rule(
            "server_side_runtime",
            Category::Runtime,
            Severity::Error,
            85,
            r"(?i)(Error (?:occurred|during) (?:prerendering|server-side rendering)[^\n]*)",
            Extractor::message_only(1),
        ),
        rule(
            "ts_compile_error",
            Category::Compilation,
            Severity::Error,
            85,
            r"(?i)([^\s(][^\n(]*?)\((\d+),(\d+)\):\s*error\s+TS\d+:\s*(.+)",
            Extractor { message: Some(4), file: Some(1), line: Some(2), column: Some(3) },
        ),
        rule(
            "unhandled_rejection",
            Category::Runtime,
            Severity::Error,
            85,
            r"(?i)Unhandled (?:promise )?[Rr]ejection(?:Warning)?:?\s*(.+)",
            Extractor::message_only(1),
        ),
        rule(
            "uncaught_error",
            Category::Runtime,
            Severity::Error,
            88,
            r"(?i)Uncaught Error:\s*(.+)",
            Extractor::message_only(1),
        ),
        // `client_error_json`'s capture group 1 is the raw JSON envelope
        // text, not a message — see `ErrorDetector::handle_client_error_json`.
        rule(
            "client_error_json",
            Category::Runtime,
            Severity::Error,
            80,
            r"(?s)CLIENT_ERROR[:\s]*(\{.*)",
            Extractor { message: None, file: None, line: None, column: None },
        ),
        // `lint_error`'s capture group 4 carries the severity token
        // ("error"/"warning"), handled specially in `ErrorDetector`.
        rule(
            "lint_error",
            Category::Syntax,
            Severity::Error,
            75,
            r"(?i)([^\s:]+):(\d+):(\d+):\s*(error|warning)\s+(.+)",
            Extractor { message: Some(5), file: Some(1), line: Some(2), column: Some(3) },
        ),
        rule(
            "module_not_found",
            Category::Dependency,
            Severity::Error,
            75,
            r"(?im)^.*(?:Cannot find module|Module not found).*$",
            Extractor::whole_match(),
        ),
        rule(
            "import_resolve_failed",
            Category::Dependency,
            Severity::Error,
            73,
            r#"(?i)Failed to resolve import\s+"([^"]+)"\s+from\s+"([^"]+)""#,
            Extractor { message: None, file: Some(2), line: None, column: None },
        ),
        rule(
            "package_manifest_error",
            Category::Dependency,
            Severity::Error,
            70,
            r"(?im)^.*(?:Cannot find|Invalid) package\.json.*$",
            Extractor::whole_match(),
        ),
        rule(
            "network_generic",
            Category::Network,
            Severity::Error,
            70,
            r"(?i)(ECONNREFUSED|ENOTFOUND|ETIMEDOUT|fetch failed)[^\n]*",
            Extractor::whole_match(),
        ),
        rule(
            "console_error_generic",
            Category::Runtime,
            Severity::Error,
            40,
            r"(?im)^.*\berror\b.*$",
            Extractor::whole_match(),
        ),
        rule(
            "exception_generic",
            Category::Runtime,
            Severity::Error,
            35,
            r"(?im)^.*\bexception\b.*$",
            Extractor::whole_match(),
        ),
    ];
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_sorted_descending_with_stable_ties() {
        let ids: Vec<&str> = CATALOGUE.iter().map(|r| r.id).collect();
        for window in CATALOGUE.windows(2) {
            assert!(window[0].priority >= window[1].priority);
        }
        let oom_idx = ids.iter().position(|id| *id == "out_of_memory").expect("present");
        let fatal_idx = ids.iter().position(|id| *id == "fatal_generic").expect("present");
        assert!(oom_idx < fatal_idx, "out_of_memory must win the priority-100 tie");
    }

    #[test]
    fn every_normative_id_is_present() {
        let expected = [
            "fatal_generic",
            "out_of_memory",
            "uncaught_exception",
            "bundler_error_with_location",
            "bundler_transform_failed",
            "hmr_update_failed",
            "component_runtime_error",
            "hydration_mismatch",
            "hook_misuse",
            "framework_build_failed",
            "server_side_runtime",
            "js_error_with_stack",
            "syntax_error_with_location",
            "ts_compile_error",
            "lint_error",
            "uncaught_error",
            "unhandled_rejection",
            "client_error_json",
            "module_not_found",
            "import_resolve_failed",
            "package_manifest_error",
            "port_in_use",
            "network_generic",
            "console_error_generic",
            "exception_generic",
        ];
        let ids: Vec<&str> = CATALOGUE.iter().map(|r| r.id).collect();
        for id in expected {
            assert!(ids.contains(&id), "missing normative rule id: {id}");
        }
    }

    #[test]
    fn out_of_memory_matches_fatal_heap_message() {
        let input = "FATAL ERROR: Reached heap limit Allocation failed - JavaScript heap out of memory";
        let hit = CATALOGUE.iter().find(|r| r.regex.is_match(input));
        assert_eq!(hit.map(|r| r.id), Some("out_of_memory"));
    }

    #[test]
    fn bundler_error_with_location_matches_vite_style_trace() {
        let input = "[vite] Internal server error: Unexpected token\n    at /src/App.tsx:42:7";
        let rule = CATALOGUE.iter().find(|r| r.id == "bundler_error_with_location").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[2], "/src/App.tsx");
        assert_eq!(&caps[3], "42");
        assert_eq!(&caps[4], "7");
    }

    #[test]
    fn js_error_with_stack_matches_type_error_with_call_site() {
        let input = "TypeError: x is not a function\n    at foo (/src/a.ts:3:5)";
        let rule = CATALOGUE.iter().find(|r| r.id == "js_error_with_stack").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[2], "/src/a.ts");
        assert_eq!(&caps[3], "3");
        assert_eq!(&caps[4], "5");
    }

    #[test]
    fn port_in_use_matches_eaddrinuse() {
        let input = "Error: listen EADDRINUSE: address already in use :::3000";
        let rule = CATALOGUE.iter().find(|r| r.id == "port_in_use").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn noise_lines_match_no_rule() {
        for line in [
            "[vite] hmr update /src/App.tsx",
            "VITE v6.3.5  ready in 722 ms",
            "Default inspector port 9229 not available, using 9230 instead",
        ] {
            assert!(
                CATALOGUE.iter().all(|r| !r.regex.is_match(line)),
                "expected no rule to match noise line: {line}"
            );
        }
    }

    #[test]
    fn ts_compile_error_extracts_diagnostic_location() {
        let input = "src/foo.ts(10,5): error TS2345: Argument of type 'string' is not assignable";
        let rule = CATALOGUE.iter().find(|r| r.id == "ts_compile_error").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[1], "src/foo.ts");
        assert_eq!(&caps[2], "10");
        assert_eq!(&caps[3], "5");
    }

    #[test]
    fn lint_error_captures_severity_token_in_group_four() {
        let input = "src/foo.js:12:3: error  'x' is defined but never used";
        let rule = CATALOGUE.iter().find(|r| r.id == "lint_error").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[4], "error");
    }

    #[test]
    fn fatal_generic_matches_bare_fatal_prefix() {
        let input = "FATAL ERROR: worker pool exhausted";
        let rule = CATALOGUE.iter().find(|r| r.id == "fatal_generic").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[1], "worker pool exhausted");
    }

    #[test]
    fn uncaught_exception_matches_node_style_message() {
        let input = "Uncaught Exception: ECONNRESET while reading socket";
        let rule = CATALOGUE.iter().find(|r| r.id == "uncaught_exception").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn bundler_transform_failed_matches_esbuild_summary() {
        let input = "Transform failed with 2 errors";
        let rule = CATALOGUE.iter().find(|r| r.id == "bundler_transform_failed").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn hmr_update_failed_matches_reload_notice() {
        let input = "[HMR] Failed to reload /src/App.tsx: SyntaxError";
        let rule = CATALOGUE.iter().find(|r| r.id == "hmr_update_failed").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[1], "/src/App.tsx");
    }

    #[test]
    fn component_runtime_error_matches_named_component_with_file() {
        let input = "Error in component <Button> (/src/Button.tsx): Cannot read properties of undefined";
        let rule = CATALOGUE.iter().find(|r| r.id == "component_runtime_error").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[1], "/src/Button.tsx");
    }

    #[test]
    fn hydration_mismatch_matches_ssr_mismatch_warning() {
        let input = "Hydration failed because the initial UI does not match what was rendered on the server";
        let rule = CATALOGUE.iter().find(|r| r.id == "hydration_mismatch").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn hook_misuse_matches_invalid_hook_call() {
        let input = "Invalid hook call. Hooks can only be called inside the body of a function component";
        let rule = CATALOGUE.iter().find(|r| r.id == "hook_misuse").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn framework_build_failed_matches_build_summary() {
        let input = "Build failed with 3 errors";
        let rule = CATALOGUE.iter().find(|r| r.id == "framework_build_failed").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn server_side_runtime_matches_prerendering_failure() {
        let input = "Error occurred prerendering page \"/about\"";
        let rule = CATALOGUE.iter().find(|r| r.id == "server_side_runtime").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn syntax_error_with_location_matches_parser_diagnostic() {
        let input = "SyntaxError: Unexpected token (src/index.js:10:2)";
        let rule = CATALOGUE.iter().find(|r| r.id == "syntax_error_with_location").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[2], "src/index.js");
        assert_eq!(&caps[3], "10");
        assert_eq!(&caps[4], "2");
    }

    #[test]
    fn uncaught_error_matches_bare_error_prefix() {
        let input = "Uncaught Error: something went wrong during render";
        let rule = CATALOGUE.iter().find(|r| r.id == "uncaught_error").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[1], "something went wrong during render");
    }

    #[test]
    fn unhandled_rejection_matches_promise_rejection_warning() {
        let input = "UnhandledPromiseRejectionWarning: Error: fetch failed to complete";
        let rule = CATALOGUE.iter().find(|r| r.id == "unhandled_rejection").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn module_not_found_matches_cannot_find_module() {
        let input = "Error: Cannot find module 'lodash'";
        let rule = CATALOGUE.iter().find(|r| r.id == "module_not_found").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn import_resolve_failed_matches_quoted_specifier_and_source() {
        let input = r#"Failed to resolve import "./Button" from "src/App.tsx""#;
        let rule = CATALOGUE.iter().find(|r| r.id == "import_resolve_failed").expect("present");
        let caps = rule.regex.captures(input).expect("should match");
        assert_eq!(&caps[2], "src/App.tsx");
    }

    #[test]
    fn package_manifest_error_matches_missing_manifest() {
        let input = "Error: Cannot find package.json";
        let rule = CATALOGUE.iter().find(|r| r.id == "package_manifest_error").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn network_generic_matches_econnrefused() {
        let input = "Error: connect ECONNREFUSED 127.0.0.1:5432";
        let rule = CATALOGUE.iter().find(|r| r.id == "network_generic").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn console_error_generic_matches_bare_error_word() {
        let input = "console.error: something went wrong in the render loop";
        let rule = CATALOGUE.iter().find(|r| r.id == "console_error_generic").expect("present");
        assert!(rule.regex.is_match(input));
    }

    #[test]
    fn exception_generic_matches_bare_exception_word() {
        let input = "an exception occurred in the worker thread";
        let rule = CATALOGUE.iter().find(|r| r.id == "exception_generic").expect("present");
        assert!(rule.regex.is_match(input));
    }
}
