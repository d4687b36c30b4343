// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit code mapping.
//!
//! 0 = ok, 1 = generic error, 2 = daemon unavailable (reason code printed
//! with remediation so scripts can branch on it).

use mb_core::DaemonUnavailableError;

pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<DaemonUnavailableError>().is_some() {
        return 2;
    }
    if let Some(call) = error.downcast_ref::<mb_bridge::BridgeCallError>() {
        if matches!(call, mb_bridge::BridgeCallError::Unavailable(_)) {
            return 2;
        }
    }
    1
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
