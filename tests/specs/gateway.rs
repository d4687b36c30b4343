// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end agent surface: gateway + coordinator over a real supervisor.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use mb_bridge::{BridgeService, Supervisor};
use mb_core::{Notifier, NotifyLevel, Settings};
use mb_gateway::{
    AsyncIngestCoordinator, ContextRequest, CredentialGate, Gateway, OpsQueue, ThrottledNotifier,
};
use mb_wire::{IngestMode, IngestParams};

use crate::support::{flaky_ingest_worker, supervisor_for, write_worker, RESPONSIVE_WORKER};

struct AlwaysReady;
impl CredentialGate for AlwaysReady {
    fn ready(&self) -> bool {
        true
    }
}

struct SilentNotifier;
impl Notifier for SilentNotifier {
    fn notify(&self, _level: NotifyLevel, _message: &str) {}
}

fn gateway_over(sup: &Arc<Supervisor>) -> Gateway {
    let bridge: Arc<dyn BridgeService> = Arc::new(Arc::clone(sup));
    let notifier =
        Arc::new(ThrottledNotifier::new(Arc::new(SilentNotifier), Duration::from_secs(600)));
    Gateway::new(bridge, Arc::new(AlwaysReady), notifier, Settings::default())
}

/// Cold start + retrieve: one gateway call brings the worker up, returns
/// shaped entries, and reports token usage.
#[tokio::test]
async fn cold_start_retrieve_through_the_gateway() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_worker(tmp.path(), RESPONSIVE_WORKER);
    let sup = supervisor_for(tmp.path(), &script);
    let gateway = gateway_over(&sup);

    let outcome =
        gateway.retrieve_context(ContextRequest::query("caching discussion")).await.unwrap();

    assert_eq!(outcome.total_results, 1);
    assert_eq!(outcome.entries[0].summary_text, "Used Redis, TTL=15m");
    assert_eq!(outcome.tokens_used, 4);
    assert!(!outcome.synthesized);

    // External contract field names on the wire.
    let rendered = serde_json::to_value(&outcome.entries[0]).unwrap();
    assert!(rendered.get("summaryText").is_some());

    sup.stop("done").await;
}

/// Transient staging failures retry with backoff: locked twice, staged on
/// the third attempt, cognify enqueued.
#[tokio::test]
async fn staging_retries_through_a_locked_store() {
    let tmp = tempfile::tempdir().unwrap();
    let state_file = tmp.path().join("ingest-attempts");
    let script = write_worker(tmp.path(), &flaky_ingest_worker(&state_file));
    let sup = supervisor_for(tmp.path(), &script);

    let bridge: Arc<dyn BridgeService> = Arc::new(Arc::clone(&sup));
    let ops = OpsQueue::with_capacity(Arc::clone(&bridge), 4);
    let coordinator = AsyncIngestCoordinator::new(bridge, ops, tmp.path())
        .with_backoff_base(Duration::from_millis(10));

    let params = IngestParams::summary(
        IngestMode::AddOnly,
        serde_json::json!({"topic": "caching", "decisions": ["Redis"]}),
        &tmp.path().display().to_string(),
    );
    let report = coordinator.ingest_async(params).await.unwrap();

    assert!(report.staged);
    assert!(report.success);
    assert!(report.operation_id.is_some());

    // The stub counted exactly three staging attempts.
    let attempts: u32 = std::fs::read_to_string(&state_file).unwrap().trim().parse().unwrap();
    assert_eq!(attempts, 3);

    sup.stop("done").await;
}
