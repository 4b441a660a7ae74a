// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `devsupd`: a thin front-end over `devsup-supervisor` (§10). Spawns one
//! child, streams its lifecycle/error events as JSON lines to stdout, and
//! forwards Ctrl-C into a graceful stop.

use clap::Parser;
use devsup_core::{InstanceId, ProcessDescriptor, ProcessId, SupervisorConfig, SystemClock};
use devsup_supervisor::{InMemoryErrorStore, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Supervise a dev-server child process, detecting and reporting errors
/// from its output.
#[derive(Debug, Parser)]
#[command(name = "devsupd", version, about)]
struct Cli {
    /// Logical process name (stable across restarts of the same child).
    #[arg(long, default_value = "dev-server")]
    process_id: String,

    /// Working directory for the child. Defaults to the current directory.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Restart the child automatically after a crash or fatal detection.
    #[arg(long)]
    restart_on_crash: bool,

    /// Maximum number of automatic restarts before giving up.
    #[arg(long, default_value_t = 0)]
    max_restarts: u32,

    /// Delay before each automatic restart attempt, in milliseconds.
    #[arg(long, default_value_t = 0)]
    restart_delay_ms: u64,

    /// Grace period before escalating to a hard kill, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    kill_timeout_ms: u64,

    /// Unresponsiveness check period, in milliseconds. 0 disables the watch.
    #[arg(long, default_value_t = 0)]
    health_check_interval_ms: u64,

    /// The command to run, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

impl Cli {
    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            max_restarts: self.max_restarts,
            restart_on_crash: self.restart_on_crash,
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
            ..SupervisorConfig::default()
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .unwrap_or_else(std::env::temp_dir)
        .join("devsupd")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cwd = cli.cwd.clone().unwrap_or(std::env::current_dir()?);
    let log_dir = default_log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let command = cli.command[0].clone();
    let args = cli.command[1..].to_vec();
    let instance_id = InstanceId::new(uuid::Uuid::new_v4().to_string());
    let descriptor = ProcessDescriptor::new(
        ProcessId::new(cli.process_id.clone()),
        instance_id,
        command,
        args,
        cwd,
        chrono::Utc::now(),
    );

    let store = Arc::new(InMemoryErrorStore::new());
    let supervisor: Supervisor<SystemClock> =
        Supervisor::new(descriptor, cli.supervisor_config(), store, SystemClock, &log_dir);

    let mut events = supervisor.subscribe();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(%err, "failed to serialize event"),
            }
        }
    });

    let descriptor = supervisor.start().await?;
    tracing::info!(process_id = %descriptor.process_id, pid = ?descriptor.pid, "devsupd started child");

    tokio::signal::ctrl_c().await?;
    tracing::info!("ctrl-c received, stopping supervised process");
    supervisor.stop(false).await?;
    supervisor.cleanup().await;
    event_task.abort();

    Ok(())
}
