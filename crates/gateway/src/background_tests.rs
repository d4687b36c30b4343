// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use mb_bridge::{BridgeCallError, BridgeService};
use mb_core::{BackgroundError, BackgroundOps};
use mb_wire::Method;

use super::OpsQueue;

/// Bridge whose cognify calls park until released.
struct ParkedBridge {
    release: Arc<tokio::sync::Semaphore>,
}

#[async_trait]
impl BridgeService for ParkedBridge {
    async fn send_request(
        &self,
        _method: Method,
        _params: serde_json::Value,
        _timeout: Duration,
    ) -> Result<serde_json::Value, BridgeCallError> {
        let permit = self
            .release
            .acquire()
            .await
            .map_err(|_| mb_bridge::RequestError::Transport("closed".to_string()))?;
        permit.forget();
        Ok(json!({"success": true}))
    }
}

fn parked() -> (Arc<ParkedBridge>, Arc<tokio::sync::Semaphore>) {
    let release = Arc::new(tokio::sync::Semaphore::new(0));
    (Arc::new(ParkedBridge { release: Arc::clone(&release) }), release)
}

#[tokio::test]
async fn operations_are_tracked_until_completion() {
    let (bridge, release) = parked();
    let queue = OpsQueue::with_capacity(bridge, 4);

    let op = queue.start_operation("abc123", Path::new("/ws"), json!({})).unwrap();
    assert_eq!(queue.active_operations(), 1);
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, op.0);
    assert_eq!(snapshot[0].digest, "abc123");

    release.add_permits(1);
    for _ in 0..100 {
        if queue.active_operations() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue.active_operations(), 0);
}

#[tokio::test]
async fn queue_capacity_is_enforced() {
    let (bridge, release) = parked();
    let queue = OpsQueue::with_capacity(bridge, 2);

    queue.start_operation("a", Path::new("/ws"), json!({})).unwrap();
    queue.start_operation("b", Path::new("/ws"), json!({})).unwrap();
    let err = queue.start_operation("c", Path::new("/ws"), json!({})).unwrap_err();
    assert!(matches!(err, BackgroundError::QueueFull));

    release.add_permits(2);
}

#[tokio::test]
async fn failed_cognify_still_clears_the_slot() {
    struct FailingBridge;
    #[async_trait]
    impl BridgeService for FailingBridge {
        async fn send_request(
            &self,
            _method: Method,
            _params: serde_json::Value,
            _timeout: Duration,
        ) -> Result<serde_json::Value, BridgeCallError> {
            Err(mb_bridge::RequestError::Transport("worker gone".to_string()).into())
        }
    }

    let queue = OpsQueue::with_capacity(Arc::new(FailingBridge), 1);
    queue.start_operation("a", Path::new("/ws"), json!({})).unwrap();

    for _ in 0..100 {
        if queue.active_operations() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue.active_operations(), 0, "slot must free on failure too");
}
