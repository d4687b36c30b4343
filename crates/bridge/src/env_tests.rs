// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serial_test::serial;
use yare::parameterized;

use super::Timing;

#[test]
#[serial]
fn defaults_match_the_ladder() {
    let t = Timing::from_env();
    assert_eq!(t.startup_deadline, Duration::from_secs(30));
    assert_eq!(t.handshake_timeout, Duration::from_secs(10));
    assert_eq!(t.graceful_shutdown_timeout, Duration::from_secs(5));
    assert_eq!(t.sigterm_timeout, Duration::from_secs(3));
    assert_eq!(t.stale_lock_age, Duration::from_secs(600));
    assert_eq!(t.max_recovery_attempts, 3);
    assert_eq!(t.forced_kill_threshold, 3);
}

#[test]
#[serial]
fn env_override_applies() {
    std::env::set_var("MB_STARTUP_DEADLINE_MS", "1500");
    let t = Timing::from_env();
    std::env::remove_var("MB_STARTUP_DEADLINE_MS");
    assert_eq!(t.startup_deadline, Duration::from_millis(1500));
}

#[parameterized(
    first = { 0, 1_000 },
    second = { 1, 2_000 },
    third = { 2, 4_000 },
    capped = { 10, 30_000 },
    absurd = { 40, 30_000 },
)]
fn recovery_backoff_doubles_and_caps(attempt: u32, expected_ms: u64) {
    let t = Timing {
        recovery_backoff_base: Duration::from_secs(1),
        recovery_backoff_cap: Duration::from_secs(30),
        ..Timing::from_env()
    };
    assert_eq!(t.recovery_backoff(attempt), Duration::from_millis(expected_ms));
}
