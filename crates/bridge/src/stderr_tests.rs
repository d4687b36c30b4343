// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use yare::parameterized;

use super::{classify, spawn_pump, strip_ansi, LineClass, StderrTail};

#[parameterized(
    structured_warning = { r#"{"levelname":"WARNING","message":"slow query"}"#, LineClass::Warn, "slow query" },
    structured_critical = { r#"{"levelname":"CRITICAL","message":"store corrupt"}"#, LineClass::Error, "store corrupt" },
    structured_info = { r#"{"level":"INFO","message":"ready"}"#, LineClass::Debug, "ready" },
    legacy_error_json = { r#"[ERROR]{"message":"boom"}"#, LineClass::Error, "boom" },
    legacy_warning_text = { "[WARNING] disk nearly full", LineClass::Warn, "disk nearly full" },
    legacy_progress = { "[PROGRESS] embedding 40%", LineClass::Progress, "embedding 40%" },
    plain_print = { "loading model weights", LineClass::Debug, "loading model weights" },
    json_without_level = { r#"{"message":"hello"}"#, LineClass::Debug, "hello" },
)]
fn classification(line: &str, class: LineClass, message: &str) {
    let (got_class, got_message) = classify(line);
    assert_eq!(got_class, class);
    assert_eq!(got_message, message);
}

#[test]
fn ansi_sequences_are_stripped() {
    assert_eq!(strip_ansi("\u{1b}[31merror:\u{1b}[0m boom"), "error: boom");
    assert_eq!(strip_ansi("plain"), "plain");
    assert_eq!(strip_ansi("\u{1b}[2K\u{1b}[1Gspinner"), "spinner");
}

#[test]
fn tail_ring_is_bounded() {
    let tail = StderrTail::new();
    for i in 0..200 {
        tail.push(format!("line {i}"));
    }
    let snapshot = tail.snapshot();
    assert_eq!(snapshot.len(), 50);
    assert_eq!(snapshot.first().unwrap(), "line 150");
    assert_eq!(snapshot.last().unwrap(), "line 199");
}

#[tokio::test]
async fn pump_collects_lines_and_redacts() {
    let (mut writer, reader) = tokio::io::duplex(4096);
    let tail = StderrTail::new();
    let cancel = CancellationToken::new();
    let handle = spawn_pump(reader, tail.clone(), cancel);

    writer
        .write_all(b"[WARNING] retrying with LLM_API_KEY=sk-secret-key-12345\npartial")
        .await
        .unwrap();
    drop(writer);
    handle.await.unwrap();

    let snapshot = tail.snapshot();
    // The trailing fragment without a newline is flushed at EOF.
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot[0].contains("LLM_API_KEY=[REDACTED]"));
    assert!(!snapshot[0].contains("sk-secret-key"));
    assert_eq!(snapshot[1], "partial");
}

#[tokio::test]
async fn pump_stops_on_cancellation() {
    let (_writer, reader) = tokio::io::duplex(4096);
    let tail = StderrTail::new();
    let cancel = CancellationToken::new();
    let handle = spawn_pump(reader, tail, cancel.clone());

    cancel.cancel();
    handle.await.unwrap();
}
