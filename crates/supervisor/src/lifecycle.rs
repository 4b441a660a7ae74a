// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LifecycleController (C8): the process state machine as pure decision
//! logic, kept free of the tokio process/task plumbing so it can be tested
//! without ever spawning a real child (§4.8). `Supervisor` drives the
//! actual `tokio::process::Child` and calls into these functions at each
//! transition point.

use crate::error::SupervisorError;
use chrono::{DateTime, Utc};
use devsup_core::ProcessState;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;

/// §4.8 transition table. `Supervisor` never mutates `ProcessState` without
/// consulting this first — illegal transitions are a bug, not a runtime
/// condition to recover from. `stop(force?)` is specified as reachable
/// "from any non-`Stopped`" state, so `Starting` and `Crashed` both have an
/// edge into `Stopping` alongside `Running`.
pub fn is_valid_transition(from: ProcessState, to: ProcessState) -> bool {
    use ProcessState::*;
    matches!(
        (from, to),
        (Stopped, Starting)
            | (Starting, Running)
            | (Starting, Stopped)
            | (Starting, Stopping)
            | (Running, Stopping)
            | (Running, Crashed)
            | (Running, Stopped)
            | (Stopping, Stopped)
            | (Crashed, Starting)
            | (Crashed, Stopping)
            | (Crashed, Failed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    pub should_restart: bool,
    pub reason: &'static str,
}

/// §4.8: "If the crash policy permits (`restartOnCrash == true` AND
/// `restartCount < maxRestarts`), schedule `restart()`; otherwise transition
/// to `Failed`."
pub fn decide_restart(restart_on_crash: bool, restart_count: u32, max_restarts: u32) -> RestartDecision {
    if !restart_on_crash {
        return RestartDecision { should_restart: false, reason: "restart_on_crash is disabled" };
    }
    if restart_count >= max_restarts {
        return RestartDecision { should_restart: false, reason: "restart budget exhausted" };
    }
    RestartDecision { should_restart: true, reason: "crash policy permits another attempt" }
}

/// Sends a soft (`SIGTERM`) or hard (`SIGKILL`) termination signal.
pub fn send_stop_signal(pid: u32, force: bool) -> Result<(), SupervisorError> {
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    kill(Pid::from_raw(pid as i32), signal).map_err(|errno| SupervisorError::StopFailed(errno.to_string()))
}

/// §4.8 health watch: unresponsive once `now - lastActivity` exceeds twice
/// the configured interval. A zero interval means the watch is disabled.
pub fn is_unresponsive(last_activity: DateTime<Utc>, now: DateTime<Utc>, health_check_interval: Duration) -> bool {
    if health_check_interval.is_zero() {
        return false;
    }
    let Ok(threshold) = chrono::Duration::from_std(health_check_interval * 2) else {
        return false;
    };
    now.signed_duration_since(last_activity) > threshold
}

/// Maps a child's exit status to the state it lands in while `Running`.
pub fn state_after_exit(exit_code: Option<i32>) -> ProcessState {
    match exit_code {
        Some(0) => ProcessState::Stopped,
        _ => ProcessState::Crashed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn start_stop_cycle_is_valid() {
        assert!(is_valid_transition(ProcessState::Stopped, ProcessState::Starting));
        assert!(is_valid_transition(ProcessState::Starting, ProcessState::Running));
        assert!(is_valid_transition(ProcessState::Running, ProcessState::Stopping));
        assert!(is_valid_transition(ProcessState::Stopping, ProcessState::Stopped));
    }

    #[test]
    fn starting_from_running_is_invalid() {
        assert!(!is_valid_transition(ProcessState::Running, ProcessState::Starting));
    }

    #[test]
    fn stop_reaches_stopping_from_any_non_stopped_state() {
        assert!(is_valid_transition(ProcessState::Starting, ProcessState::Stopping));
        assert!(is_valid_transition(ProcessState::Running, ProcessState::Stopping));
        assert!(is_valid_transition(ProcessState::Crashed, ProcessState::Stopping));
    }

    #[test]
    fn stopped_has_no_outgoing_edge_to_stopping() {
        assert!(!is_valid_transition(ProcessState::Stopped, ProcessState::Stopping));
    }

    #[test]
    fn failed_is_reachable_only_from_crashed() {
        assert!(is_valid_transition(ProcessState::Crashed, ProcessState::Failed));
        assert!(!is_valid_transition(ProcessState::Stopped, ProcessState::Failed));
        assert!(!is_valid_transition(ProcessState::Running, ProcessState::Failed));
    }

    #[test]
    fn restart_denied_when_policy_disabled() {
        let decision = decide_restart(false, 0, 5);
        assert!(!decision.should_restart);
    }

    #[test]
    fn restart_denied_once_budget_is_exhausted() {
        let decision = decide_restart(true, 3, 3);
        assert!(!decision.should_restart);
    }

    #[test]
    fn restart_allowed_under_budget() {
        let decision = decide_restart(true, 2, 3);
        assert!(decision.should_restart);
    }

    #[test]
    fn zero_exit_code_lands_in_stopped() {
        assert_eq!(state_after_exit(Some(0)), ProcessState::Stopped);
    }

    #[test]
    fn nonzero_or_missing_exit_code_lands_in_crashed() {
        assert_eq!(state_after_exit(Some(1)), ProcessState::Crashed);
        assert_eq!(state_after_exit(None), ProcessState::Crashed);
    }

    #[test]
    fn health_watch_disabled_when_interval_is_zero() {
        let now = Utc::now();
        assert!(!is_unresponsive(now - ChronoDuration::hours(1), now, Duration::ZERO));
    }

    #[test]
    fn health_watch_trips_past_twice_the_interval() {
        let now = Utc::now();
        let interval = Duration::from_secs(10);
        let last_activity = now - ChronoDuration::seconds(25);
        assert!(is_unresponsive(last_activity, now, interval));
    }

    #[test]
    fn health_watch_does_not_trip_within_twice_the_interval() {
        let now = Utc::now();
        let interval = Duration::from_secs(10);
        let last_activity = now - ChronoDuration::seconds(15);
        assert!(!is_unresponsive(last_activity, now, interval));
    }
}
