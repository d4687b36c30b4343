// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable reason codes for startup, RPC and gateway failures.
//!
//! These identifiers are wire-stable: they are returned to programmatic
//! callers and recorded in diagnostics, so renaming one is a breaking
//! change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure class for daemon startup and runtime faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    DaemonDisabled,
    LockHeld,
    LockAcquisitionFailed,
    SpawnFailed,
    StdioUnavailable,
    StartupTimeout,
    StartupHung,
    HandshakeFailed,
    RecoveryBudgetExhausted,
    RequestTimeout,
    ProcessExited,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::DaemonDisabled => "DAEMON_DISABLED",
            ReasonCode::LockHeld => "LOCK_HELD",
            ReasonCode::LockAcquisitionFailed => "LOCK_ACQUISITION_FAILED",
            ReasonCode::SpawnFailed => "SPAWN_FAILED",
            ReasonCode::StdioUnavailable => "STDIO_UNAVAILABLE",
            ReasonCode::StartupTimeout => "STARTUP_TIMEOUT",
            ReasonCode::StartupHung => "STARTUP_HUNG",
            ReasonCode::HandshakeFailed => "HANDSHAKE_FAILED",
            ReasonCode::RecoveryBudgetExhausted => "RECOVERY_BUDGET_EXHAUSTED",
            ReasonCode::RequestTimeout => "REQUEST_TIMEOUT",
            ReasonCode::ProcessExited => "PROCESS_EXITED",
        }
    }

    /// Human-readable next step, surfaced in diagnostics.
    pub fn remediation(&self) -> &'static str {
        match self {
            ReasonCode::DaemonDisabled => "Enable memory for this workspace (mb memory on).",
            ReasonCode::LockHeld => {
                "Another editor window owns this workspace's bridge. Close the other window or \
                 wait for it to go idle."
            }
            ReasonCode::LockAcquisitionFailed => {
                "Check permissions on the .mb directory inside the workspace."
            }
            ReasonCode::SpawnFailed => {
                "Verify the Python interpreter (python_path setting or the managed venv) exists \
                 and is a supported version."
            }
            ReasonCode::StdioUnavailable => {
                "The worker started without usable stdio pipes; retry, and check for wrapper \
                 scripts that close stdin."
            }
            ReasonCode::StartupTimeout | ReasonCode::StartupHung => {
                "Startup exceeded its deadline. Check bridge logs (mb logs) for a stuck import \
                 or first-run download."
            }
            ReasonCode::HandshakeFailed => {
                "The worker spawned but did not answer the health check; see stderr tail in \
                 diagnostics."
            }
            ReasonCode::RecoveryBudgetExhausted => {
                "The bridge crashed repeatedly. Reload the workspace to reset recovery."
            }
            ReasonCode::RequestTimeout => "The request timed out; the worker is still running.",
            ReasonCode::ProcessExited => "The worker exited mid-request; it will be restarted.",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by every supervisor surface when the daemon cannot serve.
#[derive(Debug, Clone, Error)]
#[error("bridge unavailable ({reason}): {}", .details.as_deref().unwrap_or("no details"))]
pub struct DaemonUnavailableError {
    pub reason: ReasonCode,
    /// Correlates with the StartupAttempt that produced this failure.
    pub attempt_id: Option<String>,
    pub details: Option<String>,
    /// Bounded tail of worker stderr captured before the failure.
    pub stderr_tail: Vec<String>,
}

impl DaemonUnavailableError {
    pub fn new(reason: ReasonCode) -> Self {
        Self { reason, attempt_id: None, details: None, stderr_tail: Vec::new() }
    }

    pub fn with_details(reason: ReasonCode, details: impl Into<String>) -> Self {
        Self { reason, attempt_id: None, details: Some(details.into()), stderr_tail: Vec::new() }
    }

    pub fn attempt(mut self, attempt_id: impl Into<String>) -> Self {
        self.attempt_id = Some(attempt_id.into());
        self
    }

    pub fn stderr_tail(mut self, tail: Vec<String>) -> Self {
        self.stderr_tail = tail;
        self
    }
}

/// Admission and shaping error codes surfaced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayCode {
    AccessDisabled,
    InvalidRequest,
    RateLimitExceeded,
    QueueFull,
    BridgeTimeout,
}

impl GatewayCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayCode::AccessDisabled => "ACCESS_DISABLED",
            GatewayCode::InvalidRequest => "INVALID_REQUEST",
            GatewayCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            GatewayCode::QueueFull => "QUEUE_FULL",
            GatewayCode::BridgeTimeout => "BRIDGE_TIMEOUT",
        }
    }
}

impl std::fmt::Display for GatewayCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "reason_tests.rs"]
mod tests;
