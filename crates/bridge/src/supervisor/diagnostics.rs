// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostics report for the status surfaces.

use serde::Serialize;

use crate::lock::LockOwnerMetadata;

use super::{DaemonState, LastFailure, Supervisor};

#[derive(Debug, Clone, Serialize)]
pub struct RecoverySnapshot {
    pub attempts: u32,
    pub max_attempts: u32,
    pub consecutive_forced_kills: u32,
    pub daemon_suspended: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub held: bool,
    pub path: String,
    pub owner: Option<LockOwnerMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub pid: u32,
    pub uptime_ms: u64,
    pub pending_requests: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub state: DaemonState,
    pub last_failure: Option<LastFailure>,
    pub recovery: RecoverySnapshot,
    pub lock: LockInfo,
    pub runtime: Option<RuntimeInfo>,
    pub remediation: Vec<String>,
}

pub(crate) fn report(sup: &Supervisor) -> DiagnosticsReport {
    let state = sup.state();
    let last_failure = sup.last_failure();

    let recovery = {
        let forced = sup.forced.lock();
        RecoverySnapshot {
            attempts: *sup.recovery_attempts.lock(),
            max_attempts: sup.timing.max_recovery_attempts,
            consecutive_forced_kills: forced.consecutive,
            daemon_suspended: forced.suspended,
        }
    };

    let lock = {
        let keeper = sup.lock.lock();
        LockInfo {
            held: keeper.is_held(),
            path: keeper.lock_path().display().to_string(),
            owner: keeper.owner_snapshot(),
        }
    };

    let runtime = sup.worker.lock().as_ref().map(|handle| RuntimeInfo {
        pid: handle.pid,
        uptime_ms: handle.spawned_at.elapsed().as_millis() as u64,
        pending_requests: handle.mux.pending_count(),
    });

    DiagnosticsReport {
        remediation: remediation_for(state, &last_failure, recovery.daemon_suspended),
        state,
        last_failure,
        recovery,
        lock,
        runtime,
    }
}

fn remediation_for(
    state: DaemonState,
    last_failure: &Option<LastFailure>,
    suspended: bool,
) -> Vec<String> {
    let mut hints = Vec::new();

    match state {
        DaemonState::Running => {}
        DaemonState::Stopped | DaemonState::Stopping => {
            hints.push("The bridge starts on demand; no action needed.".to_string());
        }
        DaemonState::Starting => {
            hints.push("Startup in progress; check again shortly.".to_string());
        }
        DaemonState::Crashed => {
            hints.push("The worker crashed; automatic recovery is in progress.".to_string());
        }
        DaemonState::FailedStartup => {
            if let Some(failure) = last_failure {
                hints.push(failure.reason.remediation().to_string());
            }
            hints.push("Retry with `mb daemon start` once the cause is fixed.".to_string());
        }
        DaemonState::Degraded => {
            hints.push(
                "Recovery budget exhausted. Fix the underlying failure, then reload the \
                 workspace (or run `mb daemon restart`) to reset."
                    .to_string(),
            );
            if let Some(failure) = last_failure {
                hints.push(format!("Last failure: {}", failure.reason.remediation()));
            }
        }
    }

    if suspended {
        hints.push(
            "Daemon mode is suspended after repeated forced kills; a successful health probe \
             is required to resume."
                .to_string(),
        );
    }

    hints
}
