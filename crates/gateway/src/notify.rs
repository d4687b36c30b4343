// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-visible notifications with per-key throttling.
//!
//! Recurring conditions (missing credentials, model unavailable) must not
//! spam the user on every call; each key notifies at most once per
//! interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use mb_core::{Notifier, NotifyLevel};

/// Default minimum interval between notifications for the same key.
const DEFAULT_THROTTLE: Duration = Duration::from_secs(10 * 60);

pub struct ThrottledNotifier {
    inner: Arc<dyn Notifier>,
    min_interval: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn Notifier>, min_interval: Duration) -> Self {
        Self { inner, min_interval, last_sent: Mutex::new(HashMap::new()) }
    }

    pub fn with_default_throttle(inner: Arc<dyn Notifier>) -> Self {
        Self::new(inner, DEFAULT_THROTTLE)
    }

    /// Notify unless the same key fired within the throttle interval.
    pub fn notify(&self, key: &str, level: NotifyLevel, message: &str) {
        {
            let mut last_sent = self.last_sent.lock();
            let now = Instant::now();
            if let Some(last) = last_sent.get(key) {
                if now.duration_since(*last) < self.min_interval {
                    debug!(key, "notification suppressed by throttle");
                    return;
                }
            }
            last_sent.insert(key.to_string(), now);
        }
        self.inner.notify(level, message);
    }
}

/// Desktop notification surface. Errors are ignored; notifications are
/// best-effort by definition.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        let summary = match level {
            NotifyLevel::Info => "Membridge",
            NotifyLevel::Warning => "Membridge warning",
            NotifyLevel::Error => "Membridge error",
        };
        let _ = notify_rust::Notification::new().summary(summary).body(message).show();
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
