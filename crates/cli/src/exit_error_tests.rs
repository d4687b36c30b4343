// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mb_core::{DaemonUnavailableError, ReasonCode};

use super::exit_code;

#[test]
fn daemon_unavailable_maps_to_two() {
    let error = anyhow::Error::new(DaemonUnavailableError::new(ReasonCode::LockHeld));
    assert_eq!(exit_code(&error), 2);
}

#[test]
fn bridge_unavailable_maps_to_two() {
    let error = anyhow::Error::new(mb_bridge::BridgeCallError::Unavailable(
        DaemonUnavailableError::new(ReasonCode::RecoveryBudgetExhausted),
    ));
    assert_eq!(exit_code(&error), 2);
}

#[test]
fn everything_else_maps_to_one() {
    let error = anyhow::anyhow!("plain failure");
    assert_eq!(exit_code(&error), 1);
}
