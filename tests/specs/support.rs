// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stub workers and builders shared by the spec scenarios.

#![cfg(unix)]
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mb_bridge::{Supervisor, Timing, WorkerCommand};

/// Answers health/retrieve/ingest/shutdown like a healthy worker.
pub const RESPONSIVE_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"health"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"status":"ok","version":"1.0.0","uptime_ms":5}}\n' "$id"
      ;;
    *'"method":"shutdown"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{}}\n' "$id"
      exit 0
      ;;
    *'"method":"retrieve"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"success":true,"contract_version":"1.0","results":[{"summary_text":"Used Redis, TTL=15m","score":0.9,"tokens":4}],"result_count":1,"filtered_count":0,"total_tokens":4}}\n' "$id"
      ;;
    *'"method":"ingest"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"success":true,"staged":true,"ingested_chars":64}}\n' "$id"
      ;;
    *)
      printf '{"jsonrpc":"2.0","id":"%s","result":{}}\n' "$id"
      ;;
  esac
done
"#;

/// Ingest fails with a locked store twice (counter in STATE_FILE), then
/// succeeds. Everything else behaves like the responsive worker.
pub fn flaky_ingest_worker(state_file: &Path) -> String {
    format!(
        r#"#!/bin/sh
STATE="{state}"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"health"'*)
      printf '{{"jsonrpc":"2.0","id":"%s","result":{{"status":"ok"}}}}\n' "$id"
      ;;
    *'"method":"shutdown"'*)
      printf '{{"jsonrpc":"2.0","id":"%s","result":{{}}}}\n' "$id"
      exit 0
      ;;
    *'"method":"ingest"'*)
      n=$(cat "$STATE" 2>/dev/null || echo 0)
      n=$((n+1))
      printf '%s' "$n" > "$STATE"
      if [ "$n" -le 2 ]; then
        printf '{{"jsonrpc":"2.0","id":"%s","result":{{"success":false,"error":"database is locked"}}}}\n' "$id"
      else
        printf '{{"jsonrpc":"2.0","id":"%s","result":{{"success":true,"staged":true}}}}\n' "$id"
      fi
      ;;
    *)
      printf '{{"jsonrpc":"2.0","id":"%s","result":{{}}}}\n' "$id"
      ;;
  esac
done
"#,
        state = state_file.display()
    )
}

pub fn write_worker(dir: &Path, content: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("worker.sh");
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn fast_timing() -> Timing {
    Timing {
        startup_deadline: Duration::from_secs(10),
        handshake_timeout: Duration::from_secs(3),
        graceful_shutdown_timeout: Duration::from_millis(500),
        sigterm_timeout: Duration::from_millis(300),
        recovery_backoff_base: Duration::from_millis(10),
        recovery_backoff_cap: Duration::from_millis(40),
        ..Timing::from_env()
    }
}

pub fn supervisor_for(root: &Path, script: &Path) -> Arc<Supervisor> {
    Supervisor::builder(root)
        .timing(fast_timing())
        .worker_command(WorkerCommand::explicit("/bin/sh", vec![script.display().to_string()]))
        .build()
}
