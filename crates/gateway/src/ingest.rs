// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-phase ingestion: fast staging, then background cognify.
//!
//! Staging is a synchronous `ingest` call in add-only mode with bounded
//! retry on transient store contention. Once data is persisted, the
//! long-running knowledge extraction is handed to the background service;
//! a failed handoff is reported, not retried, because the data is already
//! safe.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use mb_bridge::{BridgeCallError, BridgeService, RequestError};
use mb_core::{BackgroundOps, OperationId};
use mb_wire::{IngestMode, IngestOutcome, IngestParams, Method};

/// Staging retries after the initial attempt.
pub const STAGING_MAX_RETRIES: u32 = 2;

/// Serialized payloads above this size fail before any I/O.
pub const PAYLOAD_LIMIT_CHARS: usize = 100_000;

const STAGING_TIMEOUT: Duration = Duration::from_secs(30);
const SYNC_INGEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Structured worker error codes that indicate a transient condition.
const RETRYABLE_CODES: &[&str] =
    &["EBUSY", "EAGAIN", "ETIMEDOUT", "ECONNRESET", "LOCK_ERROR", "TEMPORARY_FAILURE"];

/// Message fragments (lowercase) that indicate a transient condition.
/// Extend this allowlist as new transient shapes are observed; never
/// invert it.
const RETRYABLE_PATTERNS: &[&str] = &[
    "database is locked",
    "lock already held",
    "resource busy",
    "connection reset",
    "timeout exceeded",
    "temporarily unavailable",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("payload too large: {chars} chars (limit {PAYLOAD_LIMIT_CHARS})")]
    PayloadTooLarge { chars: usize },

    #[error("staging failed: {0}")]
    Staging(String),

    #[error(transparent)]
    Bridge(#[from] BridgeCallError),
}

/// What the caller learns about an ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub staged: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a synchronous ingest timed out: the worker may still
    /// finish, so this is not a true failure.
    pub may_complete_in_background: bool,
}

pub struct AsyncIngestCoordinator {
    bridge: Arc<dyn BridgeService>,
    background: Arc<dyn BackgroundOps>,
    workspace: PathBuf,
    backoff_base: Duration,
}

impl AsyncIngestCoordinator {
    pub fn new(
        bridge: Arc<dyn BridgeService>,
        background: Arc<dyn BackgroundOps>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bridge,
            background,
            workspace: workspace.into(),
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Stage-then-cognify. Returns once the data is staged; knowledge
    /// extraction continues in the background under `operation_id`.
    pub async fn ingest_async(&self, params: IngestParams) -> Result<IngestReport, IngestError> {
        let params = IngestParams { mode: IngestMode::AddOnly, ..params };
        let payload = check_payload(&params)?;

        // Phase 1: stage, retrying transient store contention.
        let mut attempt = 0u32;
        loop {
            match self.stage(&payload).await {
                Ok(outcome) if outcome.success => {
                    debug!(attempt, chars = outcome.ingested_chars, "staging succeeded");
                    break;
                }
                Ok(outcome) => {
                    let error = outcome.error.clone().unwrap_or_else(|| "unknown".to_string());
                    if is_retryable(outcome.error_code.as_deref(), Some(&error))
                        && attempt < STAGING_MAX_RETRIES
                    {
                        let delay = self.backoff(attempt);
                        warn!(attempt, %error, delay_ms = delay.as_millis() as u64, "transient staging failure, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(IngestError::Staging(error));
                }
                Err(e) => {
                    if is_retryable_call(&e) && attempt < STAGING_MAX_RETRIES {
                        let delay = self.backoff(attempt);
                        warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "transient bridge failure, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        // Phase 2: hand the staged payload to the background service.
        let digest = payload_digest(&payload);
        match self.background.start_operation(&digest, &self.workspace, payload) {
            Ok(OperationId(id)) => {
                info!(operation_id = %id, "cognify enqueued");
                Ok(IngestReport {
                    staged: true,
                    success: true,
                    operation_id: Some(id),
                    error: None,
                    may_complete_in_background: false,
                })
            }
            Err(e) => {
                // Data is persisted; only post-processing is missing.
                warn!(error = %e, "cognify enqueue failed after successful staging");
                Ok(IngestReport {
                    staged: true,
                    success: false,
                    operation_id: None,
                    error: Some(e.to_string()),
                    may_complete_in_background: false,
                })
            }
        }
    }

    /// One-shot synchronous ingestion (decision records, manual capture).
    /// No retry loop; a timeout is reported as possibly-still-running.
    pub async fn ingest_sync(&self, params: IngestParams) -> Result<IngestReport, IngestError> {
        let params = IngestParams { mode: IngestMode::Sync, ..params };
        let payload = check_payload(&params)?;

        match self.bridge.send_request(Method::Ingest, payload, SYNC_INGEST_TIMEOUT).await {
            Ok(value) => {
                let outcome: IngestOutcome = serde_json::from_value(value)
                    .map_err(|e| IngestError::Staging(format!("malformed ingest result: {e}")))?;
                if outcome.success {
                    Ok(IngestReport {
                        staged: outcome.staged.unwrap_or(false),
                        success: true,
                        operation_id: None,
                        error: None,
                        may_complete_in_background: false,
                    })
                } else {
                    Err(IngestError::Staging(
                        outcome.error.unwrap_or_else(|| "ingestion failed".to_string()),
                    ))
                }
            }
            Err(e) if e.is_timeout() => {
                info!("synchronous ingest timed out; worker may still complete it");
                Ok(IngestReport {
                    staged: false,
                    success: false,
                    operation_id: None,
                    error: None,
                    may_complete_in_background: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stage(&self, payload: &serde_json::Value) -> Result<IngestOutcome, BridgeCallError> {
        let value =
            self.bridge.send_request(Method::Ingest, payload.clone(), STAGING_TIMEOUT).await?;
        serde_json::from_value(value)
            .map_err(|e| RequestError::Transport(format!("malformed ingest result: {e}")).into())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

fn check_payload(params: &IngestParams) -> Result<serde_json::Value, IngestError> {
    let payload = serde_json::to_value(params)
        .map_err(|e| IngestError::Staging(format!("unserializable payload: {e}")))?;
    let chars = payload.to_string().chars().count();
    if chars > PAYLOAD_LIMIT_CHARS {
        return Err(IngestError::PayloadTooLarge { chars });
    }
    Ok(payload)
}

/// Classify a worker-reported failure as transient.
fn is_retryable(code: Option<&str>, message: Option<&str>) -> bool {
    if let Some(code) = code {
        if RETRYABLE_CODES.iter().any(|c| code.eq_ignore_ascii_case(c)) {
            return true;
        }
    }
    if let Some(message) = message {
        let lowered = message.to_lowercase();
        return RETRYABLE_PATTERNS.iter().any(|p| lowered.contains(p));
    }
    false
}

/// Classify a transport-level failure as transient. RPC timeouts retry;
/// a dead or unavailable daemon does not (recovery owns that).
fn is_retryable_call(error: &BridgeCallError) -> bool {
    match error {
        BridgeCallError::Request(RequestError::Timeout { .. }) => true,
        BridgeCallError::Request(RequestError::Worker(worker)) => {
            is_retryable(None, Some(&worker.message))
        }
        _ => false,
    }
}

fn payload_digest(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
