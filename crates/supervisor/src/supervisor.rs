// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor (C9): wires C1–C8 together, owns the child, emits lifecycle
//! and error events, exposes the public API (§4.9).
//!
//! `Supervisor` is a cheap `Clone` handle around an `Arc<Shared<C>>`
//! (the same `Arc<parking_lot::Mutex<MaterializedState>>` shape used by
//! `engine::executor::Executor` — state lives behind plain locks
//! rather than a dedicated actor/channel layer, since every descriptor
//! mutation here is a short synchronous critical section that never holds
//! the lock across an `.await`). Cloning it and handing a clone to each
//! spawned task is how stream readers, the watchdog, and the health-watch
//! timer all reach back into the same process state.

use crate::chunk_assembler::ChunkAssembler;
use crate::error::SupervisorError;
use crate::lifecycle;
use crate::line_buffer::LineBuffer;
use crate::rolling_log::RollingLog;
use crate::store::ErrorStore;
use chrono::{DateTime, Utc};
use devsup_core::{
    Clock, DetectedError, Event, LogLine, ProcessDescriptor, ProcessState, Severity, Stream,
    SupervisorConfig, SystemClock,
};
use devsup_detector::{classify, ErrorDetector};
use parking_lot::Mutex;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const STDERR_LINE_CHANNEL_CAPACITY: usize = 256;
const STDERR_CHUNK_CHANNEL_CAPACITY: usize = 64;

/// A snapshot of the non-descriptor numbers `stats()` reports.
#[derive(Debug, Clone)]
pub struct SupervisorStats {
    pub descriptor: ProcessDescriptor,
    pub buffer_size: usize,
    pub restart_count: u32,
    pub last_activity: DateTime<Utc>,
}

struct Shared<C: Clock> {
    descriptor: Mutex<ProcessDescriptor>,
    config: SupervisorConfig,
    store: Arc<dyn ErrorStore>,
    clock: C,
    detector: ErrorDetector,
    events_tx: broadcast::Sender<Event>,
    line_buffer: Mutex<LineBuffer>,
    rolling_log: RollingLog,
    last_activity: Mutex<DateTime<Utc>>,
    stderr_line_tx: Mutex<Option<mpsc::Sender<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Serialises `start`/`stop`/`restart` against each other — each is a
    /// multi-step async sequence and only one may be in flight per
    /// supervisor at a time.
    lifecycle_lock: tokio::sync::Mutex<()>,
    exit_notify: Notify,
}

/// LifecycleController + facade (C8, C9): owns one child process end to end.
pub struct Supervisor<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn new(
        descriptor: ProcessDescriptor,
        config: SupervisorConfig,
        store: Arc<dyn ErrorStore>,
        clock: C,
        log_dir: &Path,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let log_path = log_dir.join(format!("{}-process.log", descriptor.instance_id));
        let rolling_log =
            RollingLog::with_limits(log_path, config.rolling_log_max_lines, config.rolling_log_max_bytes);
        let now = clock.utc_now();
        let buffer_capacity = config.error_buffer_size;
        Self {
            shared: Arc::new(Shared {
                descriptor: Mutex::new(descriptor),
                config,
                store,
                clock,
                detector: ErrorDetector::new(),
                events_tx,
                line_buffer: Mutex::new(LineBuffer::new(buffer_capacity)),
                rolling_log,
                last_activity: Mutex::new(now),
                stderr_line_tx: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                lifecycle_lock: tokio::sync::Mutex::new(()),
                exit_notify: Notify::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events_tx.subscribe()
    }

    pub fn describe(&self) -> ProcessDescriptor {
        self.shared.descriptor.lock().clone()
    }

    pub fn recent_lines(&self, n: usize) -> Vec<LogLine> {
        self.shared.line_buffer.lock().recent(n)
    }

    pub async fn drain_log_file(&self) -> String {
        self.shared.rolling_log.drain_and_reset().await
    }

    pub fn stats(&self) -> SupervisorStats {
        let descriptor = self.describe();
        SupervisorStats {
            buffer_size: self.shared.line_buffer.lock().len(),
            restart_count: descriptor.restart_count,
            last_activity: *self.shared.last_activity.lock(),
            descriptor,
        }
    }

    /// §4.9 `cleanup()`: cancels all timers, clears the line buffer, deletes
    /// the rolling-log file.
    pub async fn cleanup(&self) {
        self.abort_tasks();
        self.shared.line_buffer.lock().clear();
        self.shared.rolling_log.cleanup().await;
    }

    /// §4.8 `start()`.
    pub async fn start(&self) -> Result<ProcessDescriptor, SupervisorError> {
        let _guard = self.shared.lifecycle_lock.lock().await;
        {
            let descriptor = self.shared.descriptor.lock();
            if descriptor.state != ProcessState::Stopped {
                return Err(SupervisorError::AlreadyRunning);
            }
        }
        self.transition(ProcessState::Starting);

        let (command, args, cwd) = {
            let descriptor = self.shared.descriptor.lock();
            (descriptor.command.clone(), descriptor.args.clone(), descriptor.cwd.clone())
        };

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .current_dir(&cwd)
            .kill_on_drop(false)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.transition(ProcessState::Stopped);
                return Err(SupervisorError::SpawnFailed(err.to_string()));
            }
        };

        let pid = child.id().unwrap_or_default();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let now = self.shared.clock.utc_now();
        {
            let mut descriptor = self.shared.descriptor.lock();
            descriptor.state = ProcessState::Running;
            descriptor.pid = Some(pid);
            descriptor.start_time = Some(now);
            descriptor.end_time = None;
            descriptor.exit_code = None;
        }
        *self.shared.last_activity.lock() = now;

        // Emitted before any reader/watchdog task is spawned: §5 requires
        // `process_started` to precede every `error_detected`/`process_crashed`
        // for this process, and those tasks are the only source of later
        // events once running.
        let descriptor = self.describe();
        let _ = self.shared.events_tx.send(Event::ProcessStarted {
            process_id: descriptor.process_id.clone(),
            instance_id: descriptor.instance_id.clone(),
            pid,
            command: join_command(&descriptor.command, &descriptor.args),
            timestamp: now,
        });
        tracing::info!(process_id = %descriptor.process_id, pid, "process started");

        if let Some(stdout) = stdout {
            self.spawn_stdout_pipeline(stdout);
        }
        if let Some(stderr) = stderr {
            self.spawn_stderr_pipeline(stderr);
        }
        self.spawn_watchdog(child, pid);
        if self.shared.config.health_check_enabled() {
            self.spawn_health_watch();
        }

        Ok(descriptor)
    }

    /// §4.8 `stop(force?)`.
    pub async fn stop(&self, force: bool) -> Result<bool, SupervisorError> {
        let _guard = self.shared.lifecycle_lock.lock().await;
        let pid = {
            let descriptor = self.shared.descriptor.lock();
            if descriptor.state == ProcessState::Stopped {
                return Ok(false);
            }
            descriptor.pid
        };
        // Routes through `transition()` (rather than assigning `state`
        // directly) so the §4.8 table stays the single source of truth for
        // every edge `stop()` can produce, including from `Starting` or
        // `Crashed`.
        self.transition(ProcessState::Stopping);

        let Some(pid) = pid else {
            // No live child to signal (e.g. a fatal detection already moved
            // us to Crashed before the real exit arrived) — just settle.
            self.transition(ProcessState::Stopped);
            self.abort_tasks();
            return Ok(true);
        };

        if let Err(err) = lifecycle::send_stop_signal(pid, force) {
            tracing::warn!(%err, pid, "stop signal failed (process may already be gone)");
        }

        if force {
            self.wait_for_stopped().await;
        } else {
            let settled =
                tokio::time::timeout(self.shared.config.kill_timeout, self.wait_for_stopped()).await;
            if settled.is_err() {
                tracing::warn!(pid, "kill_timeout elapsed without exit, escalating to hard kill");
                if let Err(err) = lifecycle::send_stop_signal(pid, true) {
                    tracing::warn!(%err, pid, "hard kill signal failed");
                }
                self.wait_for_stopped().await;
            }
        }

        self.abort_tasks();
        Ok(true)
    }

    /// §4.8 `restart()`: `stop()` then, after `restartDelay`, `start()`.
    pub async fn restart(&self) -> Result<ProcessDescriptor, SupervisorError> {
        self.stop(false).await?;
        {
            let mut descriptor = self.shared.descriptor.lock();
            descriptor.restart_count += 1;
        }
        if !self.shared.config.restart_delay.is_zero() {
            tokio::time::sleep(self.shared.config.restart_delay).await;
        }
        self.start().await
    }

    fn transition(&self, to: ProcessState) {
        let mut descriptor = self.shared.descriptor.lock();
        if !lifecycle::is_valid_transition(descriptor.state, to) {
            tracing::warn!(from = %descriptor.state, to = %to, "ignoring illegal state transition");
            return;
        }
        descriptor.state = to;
    }

    fn abort_tasks(&self) {
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
        *self.shared.stderr_line_tx.lock() = None;
    }

    /// tokio's recommended notify-then-check ordering: obtain the `Notified`
    /// future before re-checking state, so a wakeup racing in between isn't
    /// lost.
    async fn wait_for_stopped(&self) {
        loop {
            let notified = self.shared.exit_notify.notified();
            let state = self.shared.descriptor.lock().state;
            if matches!(state, ProcessState::Stopped | ProcessState::Crashed | ProcessState::Failed) {
                return;
            }
            notified.await;
        }
    }

    fn spawn_stdout_pipeline(&self, stdout: tokio::process::ChildStdout) {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => handle.handle_raw_line(Stream::Stdout, line).await,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%err, "stdout read error");
                        break;
                    }
                }
            }
        });
        self.shared.tasks.lock().push(task);
    }

    fn spawn_stderr_pipeline(&self, stderr: tokio::process::ChildStderr) {
        let (line_tx, line_rx) = mpsc::channel::<String>(STDERR_LINE_CHANNEL_CAPACITY);
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(STDERR_CHUNK_CHANNEL_CAPACITY);
        *self.shared.stderr_line_tx.lock() = Some(line_tx);

        let reader_handle = self.clone();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => reader_handle.handle_raw_line(Stream::Stderr, line).await,
                    Ok(None) => {
                        *reader_handle.shared.stderr_line_tx.lock() = None;
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(%err, "stderr read error");
                        *reader_handle.shared.stderr_line_tx.lock() = None;
                        break;
                    }
                }
            }
        });

        let assembler = ChunkAssembler::new(self.shared.config.chunk_assembly_idle);
        let assembler_task = tokio::spawn(async move { assembler.run(line_rx, chunk_tx).await });

        let chunk_handle = self.clone();
        let chunk_task = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                chunk_handle.process_chunk(&chunk, Stream::Stderr).await;
            }
        });

        let mut tasks = self.shared.tasks.lock();
        tasks.push(reader_task);
        tasks.push(assembler_task);
        tasks.push(chunk_task);
    }

    fn spawn_watchdog(&self, mut child: tokio::process::Child, pid: u32) {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            let status = child.wait().await;
            let (exit_code, raw_signal) = match status {
                Ok(status) => (status.code(), exit_signal_name(&status)),
                Err(err) => {
                    tracing::warn!(%err, "failed to wait on child process");
                    (None, None)
                }
            };
            handle.handle_child_exit(pid, exit_code, raw_signal).await;
        });
        self.shared.tasks.lock().push(task);
    }

    fn spawn_health_watch(&self) {
        let handle = self.clone();
        let interval = self.shared.config.health_check_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                handle.check_liveness().await;
            }
        });
        self.shared.tasks.lock().push(task);
    }

    async fn check_liveness(&self) {
        let last_activity = *self.shared.last_activity.lock();
        let now = self.shared.clock.utc_now();
        if lifecycle::is_unresponsive(last_activity, now, self.shared.config.health_check_interval) {
            let process_id = self.shared.descriptor.lock().process_id.clone();
            tracing::warn!(%process_id, "health watch: process unresponsive");
            self.shared.rolling_log.append("process unresponsive: no recent activity observed", Stream::Stdout, now).await;
        }
    }

    /// §2 data flow: every split line, regardless of stream, is delivered to
    /// LineBuffer and RollingLog (gated by `isStorable`, §8 invariant 2) and
    /// stamps `last_activity` (§4.8) on any non-empty read.
    async fn handle_raw_line(&self, stream: Stream, content: String) {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            *self.shared.last_activity.lock() = self.shared.clock.utc_now();
        }
        if classify::is_storable(&content) {
            let now = self.shared.clock.utc_now();
            let process_id = self.shared.descriptor.lock().process_id.clone();
            let log_line = LogLine { content: trimmed.to_string(), timestamp: now, stream, process_id };
            self.shared.line_buffer.lock().add(log_line);
            self.shared.rolling_log.append(trimmed, stream, now).await;
        }

        match stream {
            // §2: stdout is forwarded as single-line chunks straight to the
            // detector, one read at a time.
            Stream::Stdout => self.process_chunk(trimmed, Stream::Stdout).await,
            // §4.6: stderr lines go through the ChunkAssembler first.
            Stream::Stderr => {
                let sender = self.shared.stderr_line_tx.lock().clone();
                if let Some(sender) = sender {
                    let _ = sender.send(content).await;
                }
            }
        }
    }

    async fn process_chunk(&self, chunk: &str, stream: Stream) {
        if chunk.trim().is_empty() {
            return;
        }
        if let Some(error) = self.shared.detector.detect(chunk, stream) {
            self.handle_detected_error(error).await;
        }
    }

    /// §4.7/§4.9: persist via the store (which folds duplicates internally
    /// — see `ErrorStore::record`), surface `error_detected` only for
    /// genuinely new entries, and route fatal severities into the
    /// crash/restart path (§4.8).
    async fn handle_detected_error(&self, mut error: DetectedError) {
        let (process_id, instance_id) = {
            let descriptor = self.shared.descriptor.lock();
            (descriptor.process_id.clone(), descriptor.instance_id.clone())
        };
        error.context.insert("processId".to_string(), process_id.to_string());
        error.context.insert("instanceId".to_string(), instance_id.to_string());
        let error = error.truncate();
        if !error.is_publishable() {
            tracing::warn!("dropping detected error with empty message after truncation");
            return;
        }

        let severity = error.severity;
        let category = error.category;
        let message = error.message.clone();
        let now = self.shared.clock.utc_now();

        let stored = self.shared.store.record(&instance_id, error, now);
        let is_new_error = stored.occurrence_count == 1;
        if is_new_error {
            let _ = self.shared.events_tx.send(Event::ErrorDetected {
                process_id: process_id.clone(),
                instance_id: instance_id.clone(),
                error: devsup_core::ErrorEventFields {
                    category,
                    severity,
                    message: message.clone(),
                    hash: stored.hash.clone(),
                    is_new_error,
                },
                timestamp: now,
            });
            tracing::debug!(%process_id, %category, %severity, "error detected");
        }

        {
            let mut descriptor = self.shared.descriptor.lock();
            descriptor.last_error = Some(message);
        }

        if severity == Severity::Fatal {
            let was_running = {
                let mut descriptor = self.shared.descriptor.lock();
                let was_running = descriptor.state == ProcessState::Running;
                if was_running {
                    descriptor.state = ProcessState::Crashed;
                    descriptor.end_time = Some(now);
                }
                was_running
            };
            if was_running {
                self.fire_crash_event_and_maybe_restart(None, None).await;
            }
        }
    }

    /// Reacts to the real child exiting, whether that's a graceful
    /// `stop()`, a plain zero-exit shutdown, or an unexpected crash. Ignores
    /// notifications for a `pid` that no longer matches the descriptor
    /// (stale watchdog from a process already replaced by a restart).
    async fn handle_child_exit(&self, pid: u32, exit_code: Option<i32>, raw_signal: Option<String>) {
        let prior_state = {
            let descriptor = self.shared.descriptor.lock();
            if descriptor.pid != Some(pid) {
                return;
            }
            descriptor.state
        };

        let now = self.shared.clock.utc_now();
        {
            let mut descriptor = self.shared.descriptor.lock();
            descriptor.pid = None;
            descriptor.exit_code = exit_code;
            descriptor.end_time = Some(now);
        }

        match prior_state {
            ProcessState::Stopping => {
                self.transition(ProcessState::Stopped);
                self.emit_process_stopped(exit_code, raw_signal, now);
            }
            ProcessState::Running if exit_code == Some(0) => {
                self.transition(ProcessState::Stopped);
                self.emit_process_stopped(exit_code, raw_signal, now);
            }
            ProcessState::Running => {
                self.transition(ProcessState::Crashed);
                self.fire_crash_event_and_maybe_restart(exit_code, raw_signal).await;
            }
            // Already Crashed: a fatal detection moved us there ahead of
            // the real exit. The scheduled restart (if any) owns what
            // happens next.
            _ => {}
        }

        self.shared.exit_notify.notify_waiters();
    }

    fn emit_process_stopped(&self, exit_code: Option<i32>, raw_signal: Option<String>, timestamp: DateTime<Utc>) {
        let descriptor = self.describe();
        let reason = raw_signal.unwrap_or_else(|| match exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated".to_string(),
        });
        let _ = self.shared.events_tx.send(Event::ProcessStopped {
            process_id: descriptor.process_id.clone(),
            instance_id: descriptor.instance_id.clone(),
            exit_code,
            reason,
            timestamp,
        });
        tracing::info!(process_id = %descriptor.process_id, ?exit_code, "process stopped");
    }

    /// Assumes the descriptor has already transitioned to `Crashed`; emits
    /// `process_crashed` and either schedules a restart or settles into the
    /// terminal `Failed` state (§4.8).
    async fn fire_crash_event_and_maybe_restart(&self, exit_code: Option<i32>, raw_signal: Option<String>) {
        let (process_id, instance_id, restart_count) = {
            let descriptor = self.shared.descriptor.lock();
            (descriptor.process_id.clone(), descriptor.instance_id.clone(), descriptor.restart_count)
        };
        let decision =
            lifecycle::decide_restart(self.shared.config.restart_on_crash, restart_count, self.shared.config.max_restarts);
        let now = self.shared.clock.utc_now();
        let _ = self.shared.events_tx.send(Event::ProcessCrashed {
            process_id: process_id.clone(),
            instance_id: instance_id.clone(),
            exit_code,
            signal: raw_signal,
            will_restart: decision.should_restart,
            timestamp: now,
        });
        tracing::warn!(%process_id, reason = decision.reason, will_restart = decision.should_restart, "process crashed");

        if decision.should_restart {
            let handle = self.clone();
            let task = tokio::spawn(async move {
                if let Err(err) = handle.restart().await {
                    tracing::error!(%err, "scheduled restart after crash failed");
                }
            });
            self.shared.tasks.lock().push(task);
        } else {
            self.transition(ProcessState::Failed);
        }
    }
}

fn join_command(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}

#[cfg(unix)]
fn exit_signal_name(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| format!("signal {sig}"))
}

#[cfg(not(unix))]
fn exit_signal_name(_status: &std::process::ExitStatus) -> Option<String> {
    None
}
