// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle data model (§3, §4.8).

use crate::id::{InstanceId, ProcessId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `ProcessState` — see §4.8 for the full transition table. Encoded as a
/// sum type per the Design Note in §9 so illegal transitions can be caught
/// at the call site (`LifecycleController` matches exhaustively rather than
/// storing a loose string/int).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    /// Terminal: exceeded restart budget.
    Failed,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Failed)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Crashed => "crashed",
            ProcessState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Immutable input plus the mutable fields a `Supervisor` maintains over the
/// descriptor's lifetime (§3).
///
/// Invariant (enforced by `devsup-supervisor`, not representable in the type
/// system without a second owner-tracking mechanism): a `ProcessDescriptor`
/// is mutated only by the `Supervisor` that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub process_id: ProcessId,
    pub instance_id: InstanceId,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
    pub created_at: DateTime<Utc>,

    pub state: ProcessState,
    pub pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub restart_count: u32,
    pub last_error: Option<String>,
}

impl ProcessDescriptor {
    pub fn new(
        process_id: ProcessId,
        instance_id: InstanceId,
        command: impl Into<String>,
        args: Vec<String>,
        cwd: std::path::PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            process_id,
            instance_id,
            command: command.into(),
            args,
            cwd,
            created_at,
            state: ProcessState::Stopped,
            pid: None,
            start_time: None,
            end_time: None,
            exit_code: None,
            restart_count: 0,
            last_error: None,
        }
    }

    /// §3 invariant: while `state == Running`, `pid` is non-empty.
    pub fn invariants_hold(&self) -> bool {
        if self.state == ProcessState::Running {
            self.pid.is_some()
        } else {
            true
        }
    }
}
