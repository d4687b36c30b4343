// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::{DaemonUnavailableError, GatewayCode, ReasonCode};

#[parameterized(
    lock_held = { ReasonCode::LockHeld, "LOCK_HELD" },
    spawn_failed = { ReasonCode::SpawnFailed, "SPAWN_FAILED" },
    startup_timeout = { ReasonCode::StartupTimeout, "STARTUP_TIMEOUT" },
    recovery_exhausted = { ReasonCode::RecoveryBudgetExhausted, "RECOVERY_BUDGET_EXHAUSTED" },
    process_exited = { ReasonCode::ProcessExited, "PROCESS_EXITED" },
)]
fn reason_codes_are_wire_stable(code: ReasonCode, wire: &str) {
    assert_eq!(code.as_str(), wire);
    // serde must agree with as_str: these identifiers cross the wire.
    assert_eq!(serde_json::to_string(&code).unwrap(), format!("\"{wire}\""));
}

#[test]
fn gateway_codes_are_wire_stable() {
    assert_eq!(GatewayCode::RateLimitExceeded.as_str(), "RATE_LIMIT_EXCEEDED");
    assert_eq!(
        serde_json::to_string(&GatewayCode::QueueFull).unwrap(),
        "\"QUEUE_FULL\"".to_string()
    );
}

#[test]
fn unavailable_error_carries_context() {
    let err = DaemonUnavailableError::with_details(ReasonCode::HandshakeFailed, "exit code 3")
        .attempt("attempt-1")
        .stderr_tail(vec!["Traceback".to_string()]);

    assert_eq!(err.reason, ReasonCode::HandshakeFailed);
    assert_eq!(err.attempt_id.as_deref(), Some("attempt-1"));
    assert_eq!(err.stderr_tail.len(), 1);
    let rendered = err.to_string();
    assert!(rendered.contains("HANDSHAKE_FAILED"));
    assert!(rendered.contains("exit code 3"));
}

#[test]
fn every_reason_has_remediation_text() {
    for code in [
        ReasonCode::DaemonDisabled,
        ReasonCode::LockHeld,
        ReasonCode::LockAcquisitionFailed,
        ReasonCode::SpawnFailed,
        ReasonCode::StdioUnavailable,
        ReasonCode::StartupTimeout,
        ReasonCode::StartupHung,
        ReasonCode::HandshakeFailed,
        ReasonCode::RecoveryBudgetExhausted,
        ReasonCode::RequestTimeout,
        ReasonCode::ProcessExited,
    ] {
        assert!(!code.remediation().is_empty());
    }
}
