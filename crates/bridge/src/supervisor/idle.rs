// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager-owned idle shutdown.
//!
//! The worker never self-terminates; this timer is the single authority.
//! At fire time the stop is deferred while requests are pending, background
//! operations are active, or a stop is already underway.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{DaemonState, Supervisor};

/// Arm (or re-arm) the idle timer for the current worker.
pub(crate) fn arm_idle_timer(sup: &Arc<Supervisor>) {
    let token = CancellationToken::new();
    if let Some(previous) = sup.idle_cancel.lock().replace(token.clone()) {
        previous.cancel();
    }

    let sup = Arc::clone(sup);
    tokio::spawn(async move {
        loop {
            let timeout =
                sup.timing.idle_timeout_override.unwrap_or_else(|| sup.settings.idle_timeout());
            let deadline = *sup.last_activity.lock() + timeout;
            let now = Instant::now();

            if now < deadline {
                let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep => continue,
                }
            }

            // Timer fired: decide between stopping and deferring.
            let pending = sup.pending_requests();
            let background = sup.background.active_operations();
            let stopping = sup.state() == DaemonState::Stopping;

            if pending > 0 || background > 0 || stopping {
                debug!(pending, background, stopping, "idle shutdown deferred");
                sup.touch_activity();
                continue;
            }

            info!(idle_minutes = sup.settings.daemon_idle_timeout_minutes, "idle timeout reached");
            sup.stop("idle-timeout").await;
            return;
        }
    });
}
