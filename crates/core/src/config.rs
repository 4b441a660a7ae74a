// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognised configuration options (§6 table). Loading these from a file
//! or CLI flags is the front-end's job, not this crate's — see
//! `devsup-cli` for the `clap` surface.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Upper bound on `restart_count` for auto-restart. Default 0.
    pub max_restarts: u32,
    /// Enable auto-restart on non-zero exit or fatal detection. Default false.
    pub restart_on_crash: bool,
    /// Delay before each auto-restart attempt. Default 0ms.
    pub restart_delay: Duration,
    /// Grace period before hard kill. Default 10s.
    pub kill_timeout: Duration,
    /// Period for the unresponsiveness watch; 0 disables it. Default 0 (disabled).
    pub health_check_interval: Duration,
    /// `LineBuffer` capacity. Default 100.
    pub error_buffer_size: usize,
    /// `RollingLog` trim target (lines kept after a rewrite is 70% of this). Default 1000.
    pub rolling_log_max_lines: usize,
    /// `RollingLog` trim trigger, in bytes. Default 1 MiB.
    pub rolling_log_max_bytes: u64,
    /// `ChunkAssembler` flush delay. Default 100ms.
    pub chunk_assembly_idle: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 0,
            restart_on_crash: false,
            restart_delay: Duration::from_millis(0),
            kill_timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_millis(0),
            error_buffer_size: 100,
            rolling_log_max_lines: 1_000,
            rolling_log_max_bytes: 1_048_576,
            chunk_assembly_idle: Duration::from_millis(100),
        }
    }
}

impl SupervisorConfig {
    pub fn health_check_enabled(&self) -> bool {
        self.health_check_interval > Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_normative_table() {
        let c = SupervisorConfig::default();
        assert_eq!(c.max_restarts, 0);
        assert!(!c.restart_on_crash);
        assert_eq!(c.restart_delay, Duration::from_millis(0));
        assert_eq!(c.kill_timeout, Duration::from_secs(10));
        assert!(!c.health_check_enabled());
        assert_eq!(c.error_buffer_size, 100);
        assert_eq!(c.rolling_log_max_lines, 1_000);
        assert_eq!(c.rolling_log_max_bytes, 1_048_576);
        assert_eq!(c.chunk_assembly_idle, Duration::from_millis(100));
    }

    #[test]
    fn health_check_enabled_tracks_nonzero_interval() {
        let mut c = SupervisorConfig::default();
        c.health_check_interval = Duration::from_secs(30);
        assert!(c.health_check_enabled());
    }
}
