// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash handling and the bounded recovery budget.
//!
//! An unexpected exit while `Running` schedules restarts with exponential
//! backoff. Every failed startup consumes one unit of the budget; when it
//! runs out the supervisor goes `Degraded` and stays there until the user
//! acts.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::process::ExitInfo;

use super::{DaemonState, Supervisor};

/// Watch one worker generation for exit and react.
pub(crate) fn spawn_exit_watcher(
    sup: Arc<Supervisor>,
    mut exit_rx: watch::Receiver<Option<ExitInfo>>,
    generation: u64,
) {
    tokio::spawn(async move {
        loop {
            if exit_rx.borrow().is_some() {
                break;
            }
            if exit_rx.changed().await.is_err() {
                return;
            }
        }
        let exit =
            exit_rx.borrow().clone().unwrap_or(ExitInfo { code: None, signal: None });
        handle_worker_exit(&sup, generation, exit).await;
    });
}

async fn handle_worker_exit(sup: &Arc<Supervisor>, generation: u64, exit: ExitInfo) {
    // A stop() or startup teardown already took the handle; expected exits
    // are fully handled there.
    let is_current_worker = {
        let worker = sup.worker.lock();
        worker.as_ref().is_some_and(|w| w.generation == generation)
    };
    if !is_current_worker {
        return;
    }

    // Reject in-flight requests immediately; no request may outlive the
    // process, and the transition gate below may be held for a while.
    if let Some(handle) = sup.worker.lock().as_ref() {
        if handle.generation == generation {
            handle.mux.fail_all(&exit);
        }
    }

    // Serialize with start/stop, then re-check: a concurrent stop may have
    // claimed this worker while we waited.
    {
        let _gate = sup.transition.lock().await;
        let still_current = {
            let worker = sup.worker.lock();
            worker.as_ref().is_some_and(|w| w.generation == generation)
        };
        if !still_current || sup.state() != DaemonState::Running {
            // Exit during startup is reported through the handshake path.
            return;
        }
        warn!(%exit, "worker exited unexpectedly");
        teardown_after_crash(sup);
    }

    run_recovery_loop(sup).await;
}

/// Drop the dead worker's plumbing and release workspace artifacts.
fn teardown_after_crash(sup: &Arc<Supervisor>) {
    if let Some(token) = sup.idle_cancel.lock().take() {
        token.cancel();
    }
    if let Some(handle) = sup.worker.lock().take() {
        handle.mux.shutdown();
        handle.tasks.cancel();
    }
    sup.lock.lock().release();
    let _ = std::fs::remove_file(sup.layout.pid_path());
    sup.set_state(DaemonState::Crashed);
}

/// Restart with exponential backoff until the budget runs out, a start
/// succeeds, or user action supersedes recovery. Startup failures
/// themselves advance the budget counter.
async fn run_recovery_loop(sup: &Arc<Supervisor>) {
    loop {
        // Anything other than a failure state means the user intervened
        // (manual stop, manual start, degraded reset); stand down.
        if !matches!(sup.state(), DaemonState::Crashed | DaemonState::FailedStartup) {
            return;
        }

        let attempt = *sup.recovery_attempts.lock();
        if attempt >= sup.timing.max_recovery_attempts {
            warn!(attempt, "recovery budget exhausted, entering degraded state");
            sup.set_state(DaemonState::Degraded);
            return;
        }

        let delay = sup.timing.recovery_backoff(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling worker restart");
        tokio::time::sleep(delay).await;

        if !matches!(sup.state(), DaemonState::Crashed | DaemonState::FailedStartup) {
            return;
        }

        match sup.start().await {
            Ok(()) => {
                info!("worker recovered");
                return;
            }
            Err(e) => {
                warn!(reason = e.reason.as_str(), "recovery attempt failed");
                if sup.state() == DaemonState::Degraded {
                    return;
                }
            }
        }
    }
}
