// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! §7 error taxonomy as types.

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("process is already running")]
    AlreadyRunning,
    #[error("process is not running")]
    NotRunning,
    #[error("failed to spawn child process: {0}")]
    SpawnFailed(String),
    #[error("failed to stop child process: {0}")]
    StopFailed(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("error store is unavailable: {0}")]
    Unavailable(String),
}
