// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace exclusivity across supervisors.

#![cfg(unix)]

use mb_bridge::DaemonState;
use mb_core::{ReasonCode, WorkspaceLayout};

use crate::support::{supervisor_for, write_worker, RESPONSIVE_WORKER};

/// At no instant may two supervisors over the same workspace both be
/// `running`.
#[tokio::test]
async fn two_hosts_never_run_simultaneously() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_worker(tmp.path(), RESPONSIVE_WORKER);

    let host_a = supervisor_for(tmp.path(), &script);
    let host_b = supervisor_for(tmp.path(), &script);

    host_a.start().await.unwrap();
    let err = host_b.start().await.unwrap_err();
    assert_eq!(err.reason, ReasonCode::LockHeld);
    assert!(
        !(host_a.state() == DaemonState::Running && host_b.state() == DaemonState::Running),
        "mutual exclusion violated"
    );

    // After A releases, B can take the workspace.
    host_a.stop("handover").await;
    host_b.start().await.unwrap();
    assert_eq!(host_b.state(), DaemonState::Running);
    assert_eq!(host_a.state(), DaemonState::Stopped);

    host_b.stop("done").await;
}

/// A lock whose recorded daemon and owner are both dead is recovered by
/// exactly one subsequent acquisition.
#[tokio::test]
async fn stale_lock_from_dead_host_is_recovered() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());
    let script = write_worker(tmp.path(), RESPONSIVE_WORKER);

    // Fabricate the debris of a crashed editor host: lock directory with
    // dead owner metadata, plus a PID file pointing at a dead worker.
    std::fs::create_dir_all(layout.lock_dir()).unwrap();
    std::fs::write(
        layout.owner_meta_path(),
        serde_json::json!({
            "created_at_ms": 0,
            "extension_host_pid": 3_999_999u32,
            "instance_id": "dead-host",
            "workspace_identifier": "w"
        })
        .to_string(),
    )
    .unwrap();
    std::fs::create_dir_all(layout.state_dir()).unwrap();
    std::fs::write(layout.pid_path(), "3999999").unwrap();

    let sup = supervisor_for(tmp.path(), &script);
    sup.start().await.unwrap();
    assert_eq!(sup.state(), DaemonState::Running);

    // The lock now belongs to this process.
    let report = sup.diagnostics();
    assert!(report.lock.held);
    assert_eq!(
        report.lock.owner.unwrap().extension_host_pid,
        std::process::id(),
        "fresh owner metadata must replace the dead host's"
    );

    sup.stop("done").await;
}
