// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized timing constants for the bridge crate.
//!
//! Every bound has an `MB_*` environment override so tests and unusual
//! deployments can shrink or stretch the ladder without a config file.

use std::time::Duration;

fn env_ms(key: &str, default_ms: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_ms))
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse::<u32>().ok()).unwrap_or(default)
}

/// All supervisor timing in one place.
#[derive(Debug, Clone)]
pub struct Timing {
    /// One deadline over lock + spawn + handshake.
    pub startup_deadline: Duration,
    /// Budget for the `health` handshake inside the startup deadline.
    pub handshake_timeout: Duration,
    /// How long the `shutdown` RPC gets before OS-level termination.
    pub graceful_shutdown_timeout: Duration,
    /// How long SIGTERM gets before force-kill.
    pub sigterm_timeout: Duration,
    /// Lock directories older than this with no metadata are sweepable.
    pub stale_lock_age: Duration,
    /// First crash-recovery backoff step; doubles per attempt.
    pub recovery_backoff_base: Duration,
    pub recovery_backoff_cap: Duration,
    pub max_recovery_attempts: u32,
    /// Consecutive forced kills before daemon mode is suspended.
    pub forced_kill_threshold: u32,
    /// Default per-request RPC timeout.
    pub request_timeout: Duration,
    /// How long to wait for the env manager while the venv is rebuilding.
    pub venv_refresh_wait: Duration,
    pub venv_refresh_poll: Duration,
    /// Overrides the configured idle timeout when set.
    pub idle_timeout_override: Option<Duration>,
}

impl Timing {
    pub fn from_env() -> Self {
        Self {
            startup_deadline: env_ms("MB_STARTUP_DEADLINE_MS", 30_000),
            handshake_timeout: env_ms("MB_HANDSHAKE_TIMEOUT_MS", 10_000),
            graceful_shutdown_timeout: env_ms("MB_GRACEFUL_SHUTDOWN_TIMEOUT_MS", 5_000),
            sigterm_timeout: env_ms("MB_SIGTERM_TIMEOUT_MS", 3_000),
            stale_lock_age: env_ms("MB_STALE_LOCK_AGE_MS", 10 * 60 * 1000),
            recovery_backoff_base: env_ms("MB_RECOVERY_BACKOFF_BASE_MS", 1_000),
            recovery_backoff_cap: env_ms("MB_RECOVERY_BACKOFF_CAP_MS", 30_000),
            max_recovery_attempts: env_u32("MB_MAX_RECOVERY_ATTEMPTS", 3),
            forced_kill_threshold: env_u32("MB_FORCED_KILL_THRESHOLD", 3),
            request_timeout: env_ms("MB_REQUEST_TIMEOUT_MS", 30_000),
            venv_refresh_wait: env_ms("MB_VENV_REFRESH_WAIT_MS", 15_000),
            venv_refresh_poll: env_ms("MB_VENV_REFRESH_POLL_MS", 250),
            idle_timeout_override: std::env::var("MB_IDLE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis),
        }
    }

    /// Exponential backoff for recovery attempt `n` (0-based), capped.
    pub fn recovery_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.recovery_backoff_base.saturating_mul(factor).min(self.recovery_backoff_cap)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
