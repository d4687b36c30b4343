// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-first shutdown ladder.
//!
//! `shutdown` RPC raced against process exit, then OS-level terminate,
//! then force-kill. Repeated force-kills suspend daemon mode: a worker
//! that has to be SIGKILLed three times in a row is wedging on something
//! and restarting it blind only burns resources.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use mb_wire::Method;

use crate::process::{force_kill, terminate, ExitInfo};

use super::{DaemonState, Supervisor, WorkerHandle};

/// How far down the ladder a stop had to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownOutcome {
    /// Worker exited on the `shutdown` RPC; no signal was sent.
    Graceful,
    /// Worker needed SIGTERM (or `taskkill /T`).
    Escalated,
    /// Worker needed SIGKILL (or `taskkill /F /T`).
    Forced,
    /// Nothing was running.
    NoWorker,
}

impl std::fmt::Display for ShutdownOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShutdownOutcome::Graceful => "graceful",
            ShutdownOutcome::Escalated => "escalated",
            ShutdownOutcome::Forced => "forced",
            ShutdownOutcome::NoWorker => "no_worker",
        };
        f.write_str(s)
    }
}

/// Run one stop. Caller holds the transition gate, so concurrent stops
/// collapse onto this call and it is idempotent.
pub(crate) async fn run_stop(sup: &Arc<Supervisor>, reason: &str) -> ShutdownOutcome {
    if let Some(token) = sup.idle_cancel.lock().take() {
        token.cancel();
    }

    let handle = sup.worker.lock().take();
    let Some(handle) = handle else {
        // Nothing running; still release leftovers from a crash teardown.
        sup.lock.lock().release();
        let _ = std::fs::remove_file(sup.layout.pid_path());
        let state = sup.state();
        if state != DaemonState::Degraded && state != DaemonState::Stopped {
            sup.set_state(DaemonState::Stopped);
        }
        return ShutdownOutcome::NoWorker;
    };

    sup.set_state(DaemonState::Stopping);
    info!(reason, pid = handle.pid, "stopping bridge worker");

    let outcome = escalate(sup, &handle).await;

    match outcome {
        ShutdownOutcome::Graceful => {
            sup.forced.lock().consecutive = 0;
        }
        ShutdownOutcome::Forced => {
            let mut forced = sup.forced.lock();
            forced.consecutive += 1;
            if forced.consecutive >= sup.timing.forced_kill_threshold && !forced.suspended {
                forced.suspended = true;
                warn!(
                    consecutive = forced.consecutive,
                    "suspending daemon mode after repeated forced kills"
                );
            }
        }
        ShutdownOutcome::Escalated | ShutdownOutcome::NoWorker => {}
    }

    // Reject anything still pending and stop the pumps.
    let exit = handle.exit_rx.borrow().clone().unwrap_or(ExitInfo { code: None, signal: None });
    handle.mux.fail_all(&exit);
    handle.mux.shutdown();
    handle.tasks.cancel();

    sup.lock.lock().release();
    let _ = std::fs::remove_file(sup.layout.pid_path());
    sup.set_state(DaemonState::Stopped);
    info!(reason, %outcome, "bridge worker stopped");
    outcome
}

async fn escalate(sup: &Arc<Supervisor>, handle: &WorkerHandle) -> ShutdownOutcome {
    let mut exit_rx = handle.exit_rx.clone();
    if exit_rx.borrow().is_some() {
        // Already dead (crash path); nothing to escalate.
        return ShutdownOutcome::Graceful;
    }

    // Rung 1: shutdown RPC, raced against process exit. The response is
    // optional by contract; only the exit matters.
    let mux = Arc::clone(&handle.mux);
    let rpc_budget = sup.timing.graceful_shutdown_timeout;
    tokio::spawn(async move {
        let _ = mux.send_request(Method::Shutdown, serde_json::json!({}), rpc_budget).await;
    });
    if wait_for_exit(&mut exit_rx, sup.timing.graceful_shutdown_timeout).await {
        return ShutdownOutcome::Graceful;
    }

    // Rung 2: OS-level polite termination.
    warn!(pid = handle.pid, "worker ignored shutdown RPC, terminating");
    terminate(handle.pid);
    if wait_for_exit(&mut exit_rx, sup.timing.sigterm_timeout).await {
        return ShutdownOutcome::Escalated;
    }

    // Rung 3: force kill. The short wait afterwards only collects the exit
    // status; SIGKILL is not ignorable.
    warn!(pid = handle.pid, "worker ignored terminate, force-killing");
    force_kill(handle.pid);
    let _ = wait_for_exit(&mut exit_rx, Duration::from_secs(2)).await;
    ShutdownOutcome::Forced
}

async fn wait_for_exit(
    exit_rx: &mut watch::Receiver<Option<ExitInfo>>,
    timeout: Duration,
) -> bool {
    if exit_rx.borrow().is_some() {
        return true;
    }
    tokio::time::timeout(timeout, async {
        while exit_rx.changed().await.is_ok() {
            if exit_rx.borrow().is_some() {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}
