// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mb_core::{Notifier, NotifyLevel};
use mb_wire::{ConfidenceLabel, RetrieveResponse};

use super::{LanguageModel, LmError, SynthesisAdapter};
use crate::notify::ThrottledNotifier;

struct StaticModel(&'static str);
#[async_trait]
impl LanguageModel for StaticModel {
    async fn complete(&self, _query: &str, _context: &str) -> Result<String, LmError> {
        Ok(self.0.to_string())
    }
}

struct BrokenModel(fn() -> LmError);
#[async_trait]
impl LanguageModel for BrokenModel {
    async fn complete(&self, _query: &str, _context: &str) -> Result<String, LmError> {
        Err((self.0)())
    }
}

/// Captures the context handed to the model.
struct ContextProbe {
    seen_len: AtomicUsize,
}
#[async_trait]
impl LanguageModel for ContextProbe {
    async fn complete(&self, _query: &str, context: &str) -> Result<String, LmError> {
        self.seen_len.store(context.len(), Ordering::SeqCst);
        Ok("answer".to_string())
    }
}

#[derive(Default)]
struct CountingNotifier {
    count: AtomicUsize,
}
impl Notifier for CountingNotifier {
    fn notify(&self, _level: NotifyLevel, _message: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn notifier() -> (Arc<ThrottledNotifier>, Arc<CountingNotifier>) {
    let counter = Arc::new(CountingNotifier::default());
    let throttled = Arc::new(ThrottledNotifier::new(
        Arc::clone(&counter) as Arc<dyn Notifier>,
        Duration::from_secs(600),
    ));
    (throttled, counter)
}

fn v2_response(context: &str) -> RetrieveResponse {
    RetrieveResponse {
        success: true,
        contract_version: Some("2.0".to_string()),
        graph_context: Some(context.to_string()),
        graph_context_char_count: Some(context.len() as u64),
        ..RetrieveResponse::default()
    }
}

#[tokio::test]
async fn answer_becomes_single_high_confidence_record() {
    let (throttled, _) = notifier();
    let adapter =
        SynthesisAdapter::new(Arc::new(StaticModel("We use Redis with a 15m TTL.")), throttled);

    let outcome = adapter.synthesize("cache?", &v2_response("redis -> ttl")).await;
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.score, 1.0);
    assert_eq!(record.confidence_label, Some(ConfidenceLabel::SynthesizedHigh));
    assert_eq!(record.summary_text, "We use Redis with a 15m TTL.");
    assert!(!outcome.truncated);
}

#[tokio::test]
async fn sentinel_yields_empty_result() {
    let (throttled, counter) = notifier();
    let adapter = SynthesisAdapter::new(
        Arc::new(StaticModel("No relevant context.")),
        throttled,
    );

    let outcome = adapter.synthesize("unrelated?", &v2_response("nodes")).await;
    assert!(outcome.records.is_empty());
    // Declining is a normal outcome, not a user-facing problem.
    assert_eq!(counter.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unavailable_model_notifies_once_and_degrades() {
    let (throttled, counter) = notifier();
    let adapter = SynthesisAdapter::new(
        Arc::new(BrokenModel(|| LmError::Unavailable("not signed in".to_string()))),
        throttled,
    );

    for _ in 0..3 {
        let outcome = adapter.synthesize("q", &v2_response("ctx")).await;
        assert!(outcome.records.is_empty());
    }
    assert_eq!(counter.count.load(Ordering::SeqCst), 1, "throttled to one notification");
}

#[tokio::test]
async fn other_errors_degrade_silently() {
    let (throttled, counter) = notifier();
    let adapter = SynthesisAdapter::new(
        Arc::new(BrokenModel(|| LmError::Other("model hiccup".to_string()))),
        throttled,
    );

    let outcome = adapter.synthesize("q", &v2_response("ctx")).await;
    assert!(outcome.records.is_empty());
    assert_eq!(counter.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_context_is_truncated_and_flagged() {
    let (throttled, _) = notifier();
    let probe = Arc::new(ContextProbe { seen_len: AtomicUsize::new(0) });
    let adapter = SynthesisAdapter::new(Arc::clone(&probe) as Arc<dyn LanguageModel>, throttled);

    let huge = "n".repeat(100_000);
    let outcome = adapter.synthesize("q", &v2_response(&huge)).await;
    assert!(outcome.truncated);
    assert_eq!(probe.seen_len.load(Ordering::SeqCst), 24_000);
    assert_eq!(outcome.records.len(), 1);
}
