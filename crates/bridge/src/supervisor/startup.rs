// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded startup: lock → spawn → handshake under one deadline.
//!
//! The sequence is a linear procedure with a deadline checkpoint before
//! each phase. Failure at any point records a `LastFailure` with the
//! captured stderr tail, tears down whatever was built, and releases the
//! lock if this attempt acquired it.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mb_core::{BridgeMode, DaemonUnavailableError, ReasonCode};
use mb_wire::{HealthResult, Method};

use crate::credential::CredentialSet;
use crate::lock::Acquire;
use crate::mux::{RequestError, RpcMux};
use crate::process::{
    force_kill, pid_alive, read_pid_file, terminate, ExitInfo, SpawnError, WorkerProcess,
};
use crate::stderr::{spawn_pump, StderrTail};
use crate::WorkerCommand;

use super::{idle, recovery, DaemonState, LastFailure, Supervisor, WorkerHandle};

/// Internal failure carrying the reason code for `LastFailure`.
pub(crate) struct StartupFailure {
    reason: ReasonCode,
    details: Option<String>,
}

impl StartupFailure {
    fn new(reason: ReasonCode, details: impl Into<String>) -> Self {
        Self { reason, details: Some(details.into()) }
    }
}

/// Run one startup attempt. Caller holds the transition gate.
pub(crate) async fn run_startup(sup: &Arc<Supervisor>) -> Result<(), DaemonUnavailableError> {
    if sup.state() == DaemonState::Degraded {
        return Err(DaemonUnavailableError::with_details(
            ReasonCode::RecoveryBudgetExhausted,
            "bridge is degraded; reload the workspace to retry",
        ));
    }
    if sup.forced.lock().suspended {
        return Err(DaemonUnavailableError::with_details(
            ReasonCode::RecoveryBudgetExhausted,
            "daemon mode suspended after repeated forced kills; a health probe must succeed first",
        ));
    }
    if !sup.settings.memory_enabled {
        return Err(DaemonUnavailableError::new(ReasonCode::DaemonDisabled));
    }

    let attempt_id = uuid::Uuid::new_v4().to_string();
    let deadline = Instant::now() + sup.timing.startup_deadline;
    let daemon_mode = sup.settings.bridge_mode == BridgeMode::Daemon;

    sup.set_state(DaemonState::Starting);
    info!(%attempt_id, daemon_mode, "starting bridge worker");

    let mut lock_acquired_here = false;
    match startup_phases(sup, deadline, daemon_mode, &mut lock_acquired_here).await {
        Ok(pid) => {
            if let Err(e) = std::fs::write(sup.layout.pid_path(), pid.to_string()) {
                warn!(error = %e, "failed to write PID file");
            }
            *sup.recovery_attempts.lock() = 0;
            sup.touch_activity();
            sup.set_state(DaemonState::Running);
            if daemon_mode {
                idle::arm_idle_timer(sup);
            }
            info!(pid, %attempt_id, "bridge worker running");
            Ok(())
        }
        Err(failure) => {
            let stderr_tail = teardown_failed_worker(sup).await;
            if lock_acquired_here {
                sup.lock.lock().release();
            }
            let _ = std::fs::remove_file(sup.layout.pid_path());

            // Lock contention is an external condition, not a crash; it
            // does not consume the recovery budget.
            let counts_against_budget = failure.reason != ReasonCode::LockHeld;
            let recovery_attempt = {
                let mut attempts = sup.recovery_attempts.lock();
                if counts_against_budget {
                    *attempts += 1;
                }
                *attempts
            };
            let degraded =
                counts_against_budget && recovery_attempt >= sup.timing.max_recovery_attempts;
            sup.set_state(if degraded {
                DaemonState::Degraded
            } else {
                DaemonState::FailedStartup
            });

            warn!(
                reason = failure.reason.as_str(),
                %attempt_id,
                recovery_attempt,
                degraded,
                details = failure.details.as_deref().unwrap_or(""),
                "bridge startup failed"
            );
            sup.record_failure(LastFailure {
                timestamp_ms: sup.epoch_ms(),
                reason: failure.reason,
                attempt_id: attempt_id.clone(),
                stderr_tail: stderr_tail.clone(),
                recovery_attempt,
                details: failure.details.clone(),
            });

            Err(DaemonUnavailableError {
                reason: failure.reason,
                attempt_id: Some(attempt_id),
                details: failure.details,
                stderr_tail,
            })
        }
    }
}

async fn startup_phases(
    sup: &Arc<Supervisor>,
    deadline: Instant,
    daemon_mode: bool,
    lock_acquired_here: &mut bool,
) -> Result<u32, StartupFailure> {
    // Phase: lock (daemon mode only; spawn mode shares nothing).
    if daemon_mode {
        check_deadline(deadline, "lock")?;
        let acquired = { sup.lock.lock().acquire(&sup.clock) };
        match acquired {
            Ok(Acquire::Acquired) => *lock_acquired_here = true,
            Ok(Acquire::Held) => {
                return Err(StartupFailure::new(
                    ReasonCode::LockHeld,
                    "another editor host owns this workspace's bridge",
                ))
            }
            Err(e) => {
                return Err(StartupFailure::new(ReasonCode::LockAcquisitionFailed, e.to_string()))
            }
        }
    }

    // Phase: spawn.
    check_deadline(deadline, "spawn")?;
    if daemon_mode {
        // Safe only now that we own the lock: any live PID on file is an
        // orphan from a host that no longer holds the workspace.
        sweep_pid_files(sup).await;
    }
    if let Err(e) = sup.layout.ensure_dirs() {
        return Err(StartupFailure::new(ReasonCode::SpawnFailed, e.to_string()));
    }

    let command = match &sup.command_override {
        Some(command) => command.clone(),
        None => WorkerCommand::resolve(&sup.layout, &sup.settings, &sup.timing)
            .await
            .map_err(map_spawn_error)?,
    };

    // A missing credential is surfaced out-of-band (throttled notification
    // at the consumer surface); the worker itself still starts and serves
    // whatever needs no provider access.
    let credentials = match sup.credentials.resolve() {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, "starting worker without provider credentials");
            CredentialSet::default()
        }
    };

    let worker = WorkerProcess::spawn(&command, &sup.layout, &sup.settings, &credentials)
        .await
        .map_err(map_spawn_error)?;

    let generation = sup.next_generation();
    let tasks = CancellationToken::new();
    let mux = RpcMux::start(worker.stdin, worker.stdout);
    let stderr_tail = StderrTail::new();
    spawn_pump(worker.stderr, stderr_tail.clone(), tasks.clone());

    let (exit_tx, exit_rx) = watch::channel(None);
    spawn_wait_task(worker.child, exit_tx);

    let pid = worker.pid;
    *sup.worker.lock() = Some(WorkerHandle {
        pid,
        mux: Arc::clone(&mux),
        stderr_tail,
        exit_rx: exit_rx.clone(),
        tasks,
        spawned_at: Instant::now(),
        generation,
    });
    recovery::spawn_exit_watcher(Arc::clone(sup), exit_rx, generation);

    // Phase: handshake.
    check_deadline(deadline, "handshake")?;
    let remaining = deadline.saturating_duration_since(Instant::now());
    let budget = sup.timing.handshake_timeout.min(remaining);
    let truncated = budget < sup.timing.handshake_timeout;

    match mux.send_request(Method::Health, serde_json::json!({}), budget).await {
        Ok(value) => match serde_json::from_value::<HealthResult>(value) {
            Ok(health) if health.is_ok() => Ok(pid),
            Ok(health) => Err(StartupFailure::new(
                ReasonCode::HandshakeFailed,
                health.error.unwrap_or_else(|| format!("worker health is {}", health.status)),
            )),
            Err(e) => Err(StartupFailure::new(
                ReasonCode::HandshakeFailed,
                format!("malformed health response: {e}"),
            )),
        },
        Err(RequestError::Timeout { .. }) => {
            // The overall deadline truncating the handshake budget means the
            // whole startup hung, not just the health check.
            let reason = if truncated {
                ReasonCode::StartupHung
            } else {
                ReasonCode::HandshakeFailed
            };
            Err(StartupFailure::new(reason, "no answer to health check"))
        }
        Err(RequestError::ProcessExited { exit }) => Err(StartupFailure::new(
            ReasonCode::HandshakeFailed,
            format!("worker exited during handshake ({exit})"),
        )),
        Err(e) => Err(StartupFailure::new(ReasonCode::HandshakeFailed, e.to_string())),
    }
}

fn check_deadline(deadline: Instant, phase: &str) -> Result<(), StartupFailure> {
    if Instant::now() >= deadline {
        Err(StartupFailure::new(
            ReasonCode::StartupTimeout,
            format!("startup deadline exceeded before {phase} phase"),
        ))
    } else {
        Ok(())
    }
}

fn map_spawn_error(error: SpawnError) -> StartupFailure {
    match error {
        SpawnError::StdioUnavailable => {
            StartupFailure::new(ReasonCode::StdioUnavailable, error.to_string())
        }
        other => StartupFailure::new(ReasonCode::SpawnFailed, other.to_string()),
    }
}

/// Startup hygiene: clear primary and legacy PID files, stopping a live
/// foreign worker first so it cannot fight the one we spawn.
async fn sweep_pid_files(sup: &Arc<Supervisor>) {
    for path in [sup.layout.pid_path(), sup.layout.legacy_pid_path()] {
        let Some(pid) = read_pid_file(&path) else {
            continue;
        };
        if pid == std::process::id() {
            continue;
        }
        if pid_alive(pid) {
            info!(pid, path = %path.display(), "live foreign worker found, terminating");
            terminate(pid);
            let deadline = Instant::now() + sup.timing.sigterm_timeout;
            while pid_alive(pid) && Instant::now() < deadline {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            if pid_alive(pid) {
                warn!(pid, "foreign worker ignored SIGTERM; leaving its PID file");
                continue;
            }
        }
        let _ = std::fs::remove_file(&path);
    }
}

/// Tear down a partially started worker; returns its stderr tail.
async fn teardown_failed_worker(sup: &Arc<Supervisor>) -> Vec<String> {
    let Some(handle) = sup.worker.lock().take() else {
        return Vec::new();
    };
    force_kill(handle.pid);
    // Let the stderr pump drain the dying worker's last lines; they are
    // the most useful part of the failure record.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.mux.shutdown();
    handle.mux.fail_all(&ExitInfo { code: None, signal: None });
    handle.tasks.cancel();
    handle.stderr_tail.snapshot()
}

fn spawn_wait_task(mut child: tokio::process::Child, exit_tx: watch::Sender<Option<ExitInfo>>) {
    tokio::spawn(async move {
        let info = match child.wait().await {
            Ok(status) => ExitInfo::from_status(&status),
            Err(_) => ExitInfo { code: None, signal: None },
        };
        let _ = exit_tx.send(Some(info));
    });
}
