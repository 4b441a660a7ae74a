// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Category and severity vocabulary shared by the pattern catalogue,
//! detected errors, and stored errors. The catalogue itself — the ordered
//! `Vec<PatternRule>` with compiled regexes and extractor maps — lives in
//! `devsup-detector`, which depends on this crate for these two enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Runtime,
    Compilation,
    Syntax,
    Dependency,
    Memory,
    Network,
    Environment,
    Filesystem,
    Build,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Runtime => "runtime",
            Category::Compilation => "compilation",
            Category::Syntax => "syntax",
            Category::Dependency => "dependency",
            Category::Memory => "memory",
            Category::Network => "network",
            Category::Environment => "environment",
            Category::Filesystem => "filesystem",
            Category::Build => "build",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}
