// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ErrorStore` (§6): the persistence seam between the detector and
//! whatever durability story a deployment wants. `InMemoryErrorStore` is the
//! reference implementation — bounded per-instance history, resolved here
//! rather than in the detector crate so the bound width is an operational
//! knob, not a compiled-in constant.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use devsup_core::{DetectedError, InstanceId, StoredError};
use devsup_detector::Deduplicator;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Default width of the per-instance history kept by `InMemoryErrorStore`
/// (§6: "bounded window, default last 200, newest first").
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

pub trait ErrorStore: Send + Sync {
    /// Records `error` against `instance_id`, folding it into an existing
    /// entry when the deduplicator judges it a repeat. Returns the resulting
    /// `StoredError` either way.
    fn record(&self, instance_id: &InstanceId, error: DetectedError, now: DateTime<Utc>) -> StoredError;

    /// Full per-instance history, newest first, up to the store's bound.
    fn list(&self, instance_id: &InstanceId) -> Vec<StoredError>;

    /// The `limit` most recent entries, newest first.
    fn list_recent(&self, instance_id: &InstanceId, limit: usize) -> Vec<StoredError>;

    fn clear(&self, instance_id: &InstanceId) -> Result<(), StoreError>;
}

pub struct InMemoryErrorStore {
    history_limit: usize,
    deduplicator: Deduplicator,
    entries: Arc<RwLock<HashMap<InstanceId, Vec<StoredError>>>>,
}

impl InMemoryErrorStore {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            deduplicator: Deduplicator::new(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryErrorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorStore for InMemoryErrorStore {
    fn record(&self, instance_id: &InstanceId, error: DetectedError, now: DateTime<Utc>) -> StoredError {
        let mut entries = self.entries.write();
        let history = entries.entry(instance_id.clone()).or_default();

        let duplicate_index = history
            .iter()
            .enumerate()
            .rev()
            .find(|(_, stored)| self.deduplicator.is_duplicate(&error, std::slice::from_ref(stored), now))
            .map(|(index, _)| index);

        let result = if let Some(index) = duplicate_index {
            let stored = &mut history[index];
            stored.last_occurrence = now;
            stored.occurrence_count += 1;
            stored.clone()
        } else {
            let hash = compute_hash(&error.message, error.source_file.as_deref());
            let stored = StoredError { error, hash, first_occurrence: now, last_occurrence: now, occurrence_count: 1 };
            history.push(stored.clone());
            stored
        };

        if history.len() > self.history_limit {
            let overflow = history.len() - self.history_limit;
            history.drain(0..overflow);
        }

        result
    }

    fn list(&self, instance_id: &InstanceId) -> Vec<StoredError> {
        let entries = self.entries.read();
        entries.get(instance_id).map(|history| history.iter().rev().cloned().collect()).unwrap_or_default()
    }

    fn list_recent(&self, instance_id: &InstanceId, limit: usize) -> Vec<StoredError> {
        let entries = self.entries.read();
        entries
            .get(instance_id)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn clear(&self, instance_id: &InstanceId) -> Result<(), StoreError> {
        self.entries.write().remove(instance_id);
        Ok(())
    }
}

/// §7: `sha256("{message}|{sourceFile}")`, first 16 hex characters.
fn compute_hash(message: &str, source_file: Option<&str>) -> String {
    let key = format!("{message}|{}", source_file.unwrap_or(""));
    let digest = Sha256::digest(key.as_bytes());
    format!("{digest:x}")[..16].to_string()
}
