// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb daemon` - drive the bridge worker directly.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use mb_bridge::process::{force_kill, pid_alive, read_pid_file, terminate};
use mb_core::{Settings, WorkspaceLayout};

use crate::output::{format_or_json, OutputFormat};

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Run the supervised worker in the foreground until Ctrl-C
    Start,
    /// Stop a worker left behind by another host
    Stop,
    /// Report whether a worker is running for this workspace
    Status,
    /// Stop, then start in the foreground
    Restart,
}

pub async fn run(
    command: DaemonCommand,
    layout: &WorkspaceLayout,
    settings: Settings,
    format: OutputFormat,
) -> Result<()> {
    match command {
        DaemonCommand::Start => start(layout, settings).await,
        DaemonCommand::Stop => stop(layout, format).await,
        DaemonCommand::Status => status(layout, format),
        DaemonCommand::Restart => {
            stop(layout, format).await?;
            start(layout, settings).await
        }
    }
}

/// Foreground supervision: the supervisor lives as long as this process,
/// with idle shutdown and crash recovery active.
async fn start(layout: &WorkspaceLayout, settings: Settings) -> Result<()> {
    let sup = super::build_supervisor(layout, settings);
    sup.start().await?;
    println!("READY (worker pid {})", sup.diagnostics().runtime.map(|r| r.pid).unwrap_or(0));
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    let outcome = sup.stop("cli-shutdown").await;
    println!("Stopped ({outcome}).");
    Ok(())
}

/// OS-level stop for a worker whose supervisor is gone.
async fn stop(layout: &WorkspaceLayout, format: OutputFormat) -> Result<()> {
    let Some(pid) = read_pid_file(&layout.pid_path()) else {
        return format_or_json(format, &json!({"stopped": false, "reason": "not running"}), || {
            println!("No bridge worker is recorded for this workspace.")
        });
    };

    if !pid_alive(pid) {
        let _ = std::fs::remove_file(layout.pid_path());
        return format_or_json(format, &json!({"stopped": false, "reason": "already dead"}), || {
            println!("Worker {pid} is already gone; cleaned up the PID file.")
        });
    }

    terminate(pid);
    for _ in 0..30 {
        if !pid_alive(pid) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    let forced = pid_alive(pid);
    if forced {
        force_kill(pid);
    }
    let _ = std::fs::remove_file(layout.pid_path());

    format_or_json(format, &json!({"stopped": true, "pid": pid, "forced": forced}), || {
        if forced {
            println!("Worker {pid} ignored SIGTERM and was force-killed.");
        } else {
            println!("Worker {pid} stopped.");
        }
    })
}

fn status(layout: &WorkspaceLayout, format: OutputFormat) -> Result<()> {
    let pid = read_pid_file(&layout.pid_path());
    let alive = pid.map(pid_alive).unwrap_or(false);
    let lock_held = layout.lock_dir().is_dir();

    let summary = json!({
        "running": alive,
        "pid": pid,
        "lock_present": lock_held,
    });
    format_or_json(format, &summary, || match (alive, pid) {
        (true, Some(pid)) => println!("Bridge worker running (pid {pid})."),
        (false, Some(pid)) => println!("Bridge worker {pid} recorded but not running."),
        _ if lock_held => println!("No worker running; a lock directory is present."),
        _ => println!("No bridge worker running for this workspace."),
    })
}
