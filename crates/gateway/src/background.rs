// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-process background operation queue.
//!
//! The editor host normally supplies its own background-job service; this
//! implementation backs the CLI surface. Each operation is one long
//! `cognify` call against the bridge, tracked until it settles.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use mb_bridge::BridgeService;
use mb_core::{BackgroundError, BackgroundOps, OperationId};
use mb_wire::Method;

/// Concurrent cognify operations the CLI surface will carry.
const DEFAULT_MAX_ACTIVE: usize = 4;

/// Knowledge extraction over a large staged payload is slow by design.
const COGNIFY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    pub id: String,
    pub digest: String,
    pub workspace: String,
    pub started_at_ms: u64,
}

struct Inner {
    active: HashMap<String, OperationSnapshot>,
}

pub struct OpsQueue {
    bridge: Arc<dyn BridgeService>,
    max_active: usize,
    inner: Arc<Mutex<Inner>>,
}

impl OpsQueue {
    pub fn new(bridge: Arc<dyn BridgeService>) -> Arc<Self> {
        Self::with_capacity(bridge, DEFAULT_MAX_ACTIVE)
    }

    pub fn with_capacity(bridge: Arc<dyn BridgeService>, max_active: usize) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            max_active,
            inner: Arc::new(Mutex::new(Inner { active: HashMap::new() })),
        })
    }

    /// Operations currently running, for the status surface.
    pub fn snapshot(&self) -> Vec<OperationSnapshot> {
        self.inner.lock().active.values().cloned().collect()
    }
}

impl BackgroundOps for OpsQueue {
    fn active_operations(&self) -> usize {
        self.inner.lock().active.len()
    }

    fn start_operation(
        &self,
        digest: &str,
        workspace: &Path,
        payload: serde_json::Value,
    ) -> Result<OperationId, BackgroundError> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut inner = self.inner.lock();
            if inner.active.len() >= self.max_active {
                return Err(BackgroundError::QueueFull);
            }
            inner.active.insert(
                id.clone(),
                OperationSnapshot {
                    id: id.clone(),
                    digest: digest.to_string(),
                    workspace: workspace.display().to_string(),
                    started_at_ms: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64,
                },
            );
        }

        let bridge = Arc::clone(&self.bridge);
        let inner = Arc::clone(&self.inner);
        let op_id = id.clone();
        tokio::spawn(async move {
            let result = bridge.send_request(Method::Cognify, payload, COGNIFY_TIMEOUT).await;
            inner.lock().active.remove(&op_id);
            match result {
                Ok(_) => info!(operation_id = %op_id, "cognify completed"),
                Err(e) => warn!(operation_id = %op_id, error = %e, "cognify failed"),
            }
        });

        Ok(OperationId(id))
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
