// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RollingLog (C4): a single on-disk file keyed by instance, arbitrated by
//! the rename-on-drain protocol (§4.4, §9 Design Note "Shared mutation").

use chrono::{DateTime, Utc};
use devsup_core::Stream;
use std::io::Write;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_LINES: usize = 1_000;
const DEFAULT_MAX_BYTES: u64 = 1_048_576;
const TRIM_BYTE_FLOOR: u64 = 50_000;
const TRIM_RETENTION_RATIO: f64 = 0.7;

pub struct RollingLog {
    path: PathBuf,
    max_lines: usize,
    max_bytes: u64,
    /// Serialises `append`/`drain_and_reset`/`cleanup` against each other so
    /// the rename-to-temp protocol in `drain_and_reset` never races a
    /// concurrent write (§9: "the rolling-log file is the only shared
    /// mutable resource").
    write_lock: tokio::sync::Mutex<()>,
}

impl RollingLog {
    pub fn new(path: PathBuf) -> Self {
        Self::with_limits(path, DEFAULT_MAX_LINES, DEFAULT_MAX_BYTES)
    }

    pub fn with_limits(path: PathBuf, max_lines: usize, max_bytes: u64) -> Self {
        Self { path, max_lines, max_bytes, write_lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// §4.4 `append`: failures are swallowed — logged at `warn`, never
    /// surfaced to the caller.
    pub async fn append(&self, content: &str, stream: Stream, timestamp: DateTime<Utc>) {
        let _guard = self.write_lock.lock().await;
        let line = format!("[{}] [{stream}] {content}\n", timestamp.to_rfc3339());
        let path = self.path.clone();
        let max_lines = self.max_lines;
        let max_bytes = self.max_bytes;
        let outcome =
            tokio::task::spawn_blocking(move || append_and_maybe_trim(&path, &line, max_lines, max_bytes))
                .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "rolling log append failed"),
            Err(join_err) => tracing::warn!(%join_err, "rolling log append task panicked"),
        }
    }

    /// §4.4 `drainAndReset`: atomic against concurrent `append`.
    pub async fn drain_and_reset(&self) -> String {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || drain_and_reset_blocking(&path)).await {
            Ok(contents) => contents,
            Err(join_err) => {
                tracing::warn!(%join_err, "rolling log drain task panicked");
                String::new()
            }
        }
    }

    /// §4.4 `cleanup`: best-effort delete.
    pub async fn cleanup(&self) {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let _ = tokio::task::spawn_blocking(move || std::fs::remove_file(&path)).await;
    }
}

fn append_and_maybe_trim(path: &Path, line: &str, max_lines: usize, max_bytes: u64) -> std::io::Result<()> {
    {
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
    }
    maybe_trim(path, max_lines, max_bytes)
}

/// §4.4 trimming policy: rewrite to the last ⌊0.7·maxLines⌋ lines once
/// either size threshold is crossed. 70% avoids oscillating on every append.
fn maybe_trim(path: &Path, max_lines: usize, max_bytes: u64) -> std::io::Result<()> {
    let size = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return Ok(()),
    };

    let contents = std::fs::read_to_string(path)?;
    let line_count = contents.lines().count();
    let over_hard_limit = size > max_bytes;
    let over_soft_limit = size > TRIM_BYTE_FLOOR && line_count > max_lines;
    if !over_hard_limit && !over_soft_limit {
        return Ok(());
    }

    let keep = ((max_lines as f64) * TRIM_RETENTION_RATIO).floor() as usize;
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(keep);
    let mut rewritten = lines[start..].join("\n");
    if !rewritten.is_empty() {
        rewritten.push('\n');
    }
    std::fs::write(path, rewritten)
}

fn drain_and_reset_blocking(path: &Path) -> String {
    let mut temp_path = path.to_path_buf();
    let temp_name = format!(
        "{}.drain-tmp",
        temp_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    );
    temp_path.set_file_name(temp_name);

    match std::fs::rename(path, &temp_path) {
        Ok(()) => {
            if let Err(err) = std::fs::File::create(path) {
                tracing::warn!(%err, "failed to recreate rolling log after drain");
            }
            let contents = std::fs::read_to_string(&temp_path).unwrap_or_default();
            let _ = std::fs::remove_file(&temp_path);
            contents
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            tracing::warn!(%err, "rolling log drain rename failed");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, RollingLog) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("instance-1.log");
        (dir, RollingLog::new(path))
    }

    #[tokio::test]
    async fn append_then_drain_returns_the_appended_line() {
        let (_dir, log) = temp_log();
        log.append("hello", Stream::Stdout, Utc::now()).await;
        let drained = log.drain_and_reset().await;
        assert!(drained.contains("hello"));
        assert!(drained.contains("[stdout]"));
    }

    #[tokio::test]
    async fn drain_leaves_an_empty_file_in_place() {
        let (_dir, log) = temp_log();
        log.append("first", Stream::Stdout, Utc::now()).await;
        let _ = log.drain_and_reset().await;
        let remaining = std::fs::read_to_string(log.path()).expect("file exists");
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn drain_on_missing_file_returns_empty_string() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = RollingLog::new(dir.path().join("never-written.log"));
        assert_eq!(log.drain_and_reset().await, String::new());
    }

    #[tokio::test]
    async fn sequential_appends_and_drains_preserve_order_with_no_loss() {
        let (_dir, log) = temp_log();
        for i in 0..50 {
            log.append(&format!("line-{i}"), Stream::Stdout, Utc::now()).await;
        }
        let drained = log.drain_and_reset().await;
        let lines: Vec<&str> = drained.lines().collect();
        assert_eq!(lines.len(), 50);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.contains(&format!("line-{i}")));
        }
    }

    #[tokio::test]
    async fn trimming_keeps_roughly_seventy_percent_of_max_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trim.log");
        let log = RollingLog::with_limits(path, 100, 5_000);
        for i in 0..200 {
            log.append(&format!("padded-line-number-{i:04}"), Stream::Stdout, Utc::now()).await;
        }
        let contents = std::fs::read_to_string(log.path()).expect("file exists");
        let kept = contents.lines().count();
        assert!(kept <= 100, "expected trimming to cap line count, got {kept}");
        assert!(kept >= 60, "expected trimming to retain roughly 70 lines, got {kept}");
    }

    #[tokio::test]
    async fn cleanup_deletes_the_file() {
        let (_dir, log) = temp_log();
        log.append("hello", Stream::Stdout, Utc::now()).await;
        log.cleanup().await;
        assert!(!log.path().exists());
    }
}
