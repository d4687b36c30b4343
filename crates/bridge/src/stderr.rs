// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker stderr handling: level-mapped forwarding and a bounded tail.
//!
//! The worker logs three ways: structured JSON lines (its logging config),
//! legacy bracket markers from older releases, and raw prints from
//! third-party libraries. All are streamed line by line, stripped of ANSI
//! escapes, redacted, forwarded at a mapped level, and kept in a small
//! ring so startup failures can attach the recent tail.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mb_core::truncate_for_log;

/// Lines retained for `LastFailure.stderr_tail`.
const TAIL_CAPACITY: usize = 50;

/// Longest stderr line we will buffer before truncating mid-line.
const MAX_LINE_BYTES: usize = 256 * 1024;

/// Shared ring of the most recent worker stderr lines (post-redaction).
#[derive(Clone)]
pub struct StderrTail {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl StderrTail {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(VecDeque::with_capacity(TAIL_CAPACITY))) }
    }

    fn push(&self, line: String) {
        let mut ring = self.inner.lock();
        if ring.len() == TAIL_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().iter().cloned().collect()
    }
}

impl Default for StderrTail {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a stderr line lands in our log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Error,
    Warn,
    Progress,
    Debug,
}

/// Spawn the pump task. Runs until stderr closes or the token fires.
pub fn spawn_pump<R>(stderr: R, tail: StderrTail, cancel: CancellationToken) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(pump(stderr, tail, cancel))
}

async fn pump<R>(mut stderr: R, tail: StderrTail, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut chunk = [0u8; 8192];
    let mut line_buf: Vec<u8> = Vec::new();

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stderr.read(&mut chunk) => read,
        };

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };

        let mut rest = &chunk[..n];
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            line_buf.extend_from_slice(&rest[..pos]);
            handle_line(&line_buf, &tail);
            line_buf.clear();
            rest = &rest[pos + 1..];
        }
        line_buf.extend_from_slice(rest);
        if line_buf.len() > MAX_LINE_BYTES {
            // Flush the oversized fragment as its own line rather than
            // letting a runaway progress bar grow the buffer.
            handle_line(&line_buf, &tail);
            line_buf.clear();
        }
    }

    if !line_buf.is_empty() {
        handle_line(&line_buf, &tail);
    }
}

fn handle_line(raw: &[u8], tail: &StderrTail) {
    let line = String::from_utf8_lossy(raw);
    let clean = strip_ansi(line.trim_end());
    if clean.is_empty() {
        return;
    }

    let (class, message) = classify(&clean);
    let message = truncate_for_log(&message);

    match class {
        LineClass::Error => error!(target: "mb_bridge::worker", "{message}"),
        LineClass::Warn => warn!(target: "mb_bridge::worker", "{message}"),
        LineClass::Progress => info!(target: "mb_bridge::worker", "{message}"),
        LineClass::Debug => debug!(target: "mb_bridge::worker", "{message}"),
    }

    tail.push(message);
}

/// Map a stderr line to a log class and extract its message.
fn classify(line: &str) -> (LineClass, String) {
    // Structured JSON log lines from the worker's logging config.
    if line.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            let level = value
                .get("levelname")
                .or_else(|| value.get("level"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| line.to_string());
            let class = match level {
                "CRITICAL" | "ERROR" => LineClass::Error,
                "WARNING" => LineClass::Warn,
                _ => LineClass::Debug,
            };
            return (class, message);
        }
    }

    // Legacy bracket markers from pre-structured worker releases.
    if let Some(rest) = line.strip_prefix("[ERROR]") {
        return (LineClass::Error, legacy_payload(rest));
    }
    if let Some(rest) = line.strip_prefix("[WARNING]") {
        return (LineClass::Warn, legacy_payload(rest));
    }
    if let Some(rest) = line.strip_prefix("[PROGRESS]") {
        return (LineClass::Progress, legacy_payload(rest));
    }

    (LineClass::Debug, line.to_string())
}

/// `[ERROR]{"message": "boom"}` → `boom`; otherwise the trimmed remainder.
fn legacy_payload(rest: &str) -> String {
    let rest = rest.trim();
    if rest.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(rest) {
            if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    rest.to_string()
}

/// Remove CSI escape sequences (`ESC [ … final-byte`).
fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameters and intermediates end at the final byte (@–~).
                for seq in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&seq) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[path = "stderr_tests.rs"]
mod tests;
