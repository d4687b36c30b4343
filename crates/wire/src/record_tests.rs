// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use yare::parameterized;

use super::{ConfidenceLabel, DateValue, RecordStatus, RetrievalRecord, RetrieveResponse};

#[test]
fn enriched_record_discriminated_on_topic_id() {
    let enriched: RetrievalRecord = serde_json::from_value(json!({
        "summary_text": "Chose Redis with 15m TTL",
        "topic": "caching",
        "topic_id": "top-42",
        "status": "Active",
        "score": 0.91,
        "created_at": 1738000000000_i64,
        "decisions": ["Redis", "TTL 15m"],
        "tokens": 18
    }))
    .unwrap();

    assert!(enriched.is_enriched());
    assert_eq!(enriched.status, Some(RecordStatus::Active));
    assert_eq!(enriched.created_at, Some(DateValue::EpochMs(1738000000000)));

    let legacy: RetrievalRecord = serde_json::from_value(json!({
        "summary_text": "Used Redis, TTL=15m",
        "score": 0.52
    }))
    .unwrap();

    assert!(!legacy.is_enriched());
    assert!(legacy.status.is_none());
    assert!(legacy.topic_id.is_none());
}

#[test]
fn date_value_accepts_both_shapes() {
    let iso: DateValue = serde_json::from_value(json!("2026-07-30T08:00:00Z")).unwrap();
    assert_eq!(iso, DateValue::Text("2026-07-30T08:00:00Z".to_string()));

    let epoch: DateValue = serde_json::from_value(json!(1738000000000_i64)).unwrap();
    assert_eq!(epoch, DateValue::EpochMs(1738000000000));
}

#[test]
fn synthesized_record_shape() {
    let record = RetrievalRecord::synthesized("The team chose Redis.");
    assert_eq!(record.score, 1.0);
    assert_eq!(record.confidence_label, Some(ConfidenceLabel::SynthesizedHigh));
    assert!(!record.is_enriched());

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["confidence_label"], "synthesized_high");
}

#[parameterized(
    missing = { None, 1 },
    legacy = { Some("1.0"), 1 },
    v2 = { Some("2.0"), 2 },
    v2_minor = { Some("2.1"), 2 },
    junk = { Some("next"), 1 },
)]
fn contract_major_parses(version: Option<&str>, expected: u32) {
    let resp = RetrieveResponse {
        contract_version: version.map(String::from),
        ..RetrieveResponse::default()
    };
    assert_eq!(resp.contract_major(), expected);
}

#[test]
fn synthesis_gate_needs_v2_and_context() {
    let with_context = RetrieveResponse {
        contract_version: Some("2.0".to_string()),
        graph_context: Some("node: caching …".to_string()),
        ..RetrieveResponse::default()
    };
    assert!(with_context.wants_synthesis());

    let v1_context = RetrieveResponse {
        contract_version: Some("1.0".to_string()),
        graph_context: Some("node: caching …".to_string()),
        ..RetrieveResponse::default()
    };
    assert!(!v1_context.wants_synthesis());

    let blank_context = RetrieveResponse {
        contract_version: Some("2.0".to_string()),
        graph_context: Some("   ".to_string()),
        ..RetrieveResponse::default()
    };
    assert!(!blank_context.wants_synthesis());
}
