// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup, shutdown ladder and recovery scenarios.

#![cfg(unix)]

use std::time::Duration;

use mb_bridge::{DaemonState, ShutdownOutcome, Supervisor, Timing, WorkerCommand};
use mb_core::ReasonCode;

use crate::support::{fast_timing, supervisor_for, write_worker, RESPONSIVE_WORKER};

/// Worker that handshakes, then ignores shutdown RPC and SIGTERM.
const WEDGED_WORKER: &str = r#"#!/bin/sh
trap '' TERM
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"health"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"status":"ok"}}\n' "$id"
      ;;
    *) : ;;
  esac
done
while :; do sleep 1; done
"#;

/// Cold start: no lock, no PID file; one call brings everything up within
/// the startup deadline and cleans up on stop.
#[tokio::test]
async fn cold_start_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_worker(tmp.path(), RESPONSIVE_WORKER);
    let sup = supervisor_for(tmp.path(), &script);

    assert!(!sup.layout().lock_dir().exists());
    assert!(!sup.layout().pid_path().exists());

    let started = std::time::Instant::now();
    sup.start().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(30), "bounded startup");

    assert_eq!(sup.state(), DaemonState::Running);
    assert!(sup.layout().lock_dir().is_dir());
    let pid: u32 =
        std::fs::read_to_string(sup.layout().pid_path()).unwrap().trim().parse().unwrap();
    assert!(mb_bridge::process::pid_alive(pid));

    assert_eq!(sup.stop("done").await, ShutdownOutcome::Graceful);
    assert!(!sup.layout().lock_dir().exists());
    assert!(!sup.layout().pid_path().exists());
    assert!(!mb_bridge::process::pid_alive(pid));
}

/// Scenario: shutdown RPC ignored, SIGTERM ignored, SIGKILL delivered.
/// Three such cycles suspend daemon mode until a health probe succeeds.
#[tokio::test]
async fn forced_kill_ladder_suspends_daemon_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_worker(tmp.path(), WEDGED_WORKER);
    let sup = Supervisor::builder(tmp.path())
        .timing(fast_timing())
        .worker_command(WorkerCommand::explicit("/bin/sh", vec![script.display().to_string()]))
        .build();

    for cycle in 1..=3 {
        sup.start().await.unwrap();
        let pid = sup.diagnostics().runtime.unwrap().pid;
        let outcome = sup.stop("escalation-test").await;
        assert_eq!(outcome, ShutdownOutcome::Forced, "cycle {cycle} must force-kill");
        assert!(!mb_bridge::process::pid_alive(pid));
        assert_eq!(sup.diagnostics().recovery.consecutive_forced_kills, cycle);
    }

    // Daemon mode is now suspended; plain start is refused.
    let err = sup.start().await.unwrap_err();
    assert_eq!(err.reason, ReasonCode::RecoveryBudgetExhausted);
    assert!(sup.diagnostics().recovery.daemon_suspended);

    // A worker that behaves again lets the health probe resume service.
    std::fs::write(&script, RESPONSIVE_WORKER).unwrap();
    sup.probe_and_resume().await.unwrap();
    assert_eq!(sup.state(), DaemonState::Running);
    assert!(!sup.diagnostics().recovery.daemon_suspended);

    sup.stop("done").await;
}

/// Crash while running triggers backoff recovery and a fresh worker.
#[tokio::test]
async fn crashed_worker_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_worker(tmp.path(), RESPONSIVE_WORKER);
    let sup = supervisor_for(tmp.path(), &script);

    sup.start().await.unwrap();
    let first_pid = sup.diagnostics().runtime.unwrap().pid;
    mb_bridge::process::force_kill(first_pid);

    let mut recovered = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if sup.state() == DaemonState::Running
            && sup.diagnostics().runtime.map(|r| r.pid) != Some(first_pid)
        {
            recovered = true;
            break;
        }
    }
    assert!(recovered, "expected a replacement worker, state={:?}", sup.state());

    sup.stop("done").await;
}

/// The startup deadline is enforced: a worker that never handshakes fails
/// with a reason code, not a hang.
#[tokio::test]
async fn unresponsive_worker_fails_within_the_deadline() {
    let tmp = tempfile::tempdir().unwrap();
    // Swallows everything, answers nothing.
    let script = write_worker(tmp.path(), "#!/bin/sh\nwhile IFS= read -r line; do :; done\n");
    let timing = Timing {
        startup_deadline: Duration::from_millis(1500),
        handshake_timeout: Duration::from_millis(800),
        ..fast_timing()
    };
    let sup = Supervisor::builder(tmp.path())
        .timing(timing)
        .worker_command(WorkerCommand::explicit("/bin/sh", vec![script.display().to_string()]))
        .build();

    let started = std::time::Instant::now();
    let err = sup.start().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.reason, ReasonCode::HandshakeFailed);
    assert_eq!(sup.state(), DaemonState::FailedStartup);
}
