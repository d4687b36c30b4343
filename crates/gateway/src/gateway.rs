// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission control and response shaping for agent consumers.
//!
//! Admission is checked in a fixed order: credentials, query, rate window,
//! queue capacity. Dispatch is strict FIFO with a bounded number of
//! requests in flight; a freed slot always goes to the oldest queued
//! caller.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mb_bridge::{BridgeCallError, BridgeService, CredentialResolver};
use mb_core::{GatewayCode, NotifyLevel, ReasonCode, Settings};
use mb_wire::{
    ConfidenceLabel, DateValue, Method, RecordStatus, RetrievalRecord, RetrieveParams,
    RetrieveResponse,
};

use crate::notify::ThrottledNotifier;
use crate::synthesis::SynthesisAdapter;

/// Sliding rate-limit window.
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Records at or below this score are noise; exactly 0.0 is the
/// synthesized-answer sentinel and passes.
const SCORE_FLOOR: f64 = 0.01;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether provider credentials are available for bridge calls.
pub trait CredentialGate: Send + Sync {
    fn ready(&self) -> bool;
}

impl CredentialGate for CredentialResolver {
    fn ready(&self) -> bool {
        self.has_any()
    }
}

/// Admission or bridge failure, with a stable code for programmatic
/// callers.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct GatewayError {
    pub code: GatewayCode,
    pub message: String,
}

impl GatewayError {
    fn new(code: GatewayCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// One retrieval request from an agent consumer.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub query: String,
    pub session_id: Option<String>,
    /// Caller-side cancellation; checked before dispatch, not mid-flight.
    pub cancel: Option<CancellationToken>,
}

impl ContextRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self { query: query.into(), session_id: None, cancel: None }
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

/// External record contract, projected from the wire shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub summary_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_label: Option<ConfidenceLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

impl ContextEntry {
    fn from_record(record: RetrievalRecord) -> Self {
        Self {
            summary_text: record.summary_text,
            text: record.text,
            topic: record.topic,
            topic_id: record.topic_id,
            plan_id: record.plan_id,
            session_id: record.session_id,
            status: record.status,
            created_at: record.created_at.and_then(date_to_iso),
            source_created_at: record.source_created_at.and_then(date_to_iso),
            updated_at: record.updated_at.and_then(date_to_iso),
            score: record.score,
            final_score: record.final_score,
            confidence_label: record.confidence_label,
            decisions: record.decisions,
            rationale: record.rationale,
            open_questions: record.open_questions,
            next_steps: record.next_steps,
            references: record.references,
            tokens: record.tokens,
        }
    }
}

/// Shaped retrieval result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveOutcome {
    pub entries: Vec<ContextEntry>,
    pub total_results: usize,
    pub tokens_used: u64,
    pub synthesized: bool,
}

struct QueueEntry {
    id: u64,
    queued_at: Instant,
    permit_tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct AdmissionState {
    in_flight: usize,
    queue: VecDeque<QueueEntry>,
    /// Dispatch timestamps inside the sliding window.
    window: VecDeque<Instant>,
    next_queue_id: u64,
}

pub struct Gateway {
    bridge: Arc<dyn BridgeService>,
    credentials: Arc<dyn CredentialGate>,
    notifier: Arc<ThrottledNotifier>,
    synthesis: Option<Arc<SynthesisAdapter>>,
    settings: Settings,
    request_timeout: Duration,
    state: Mutex<AdmissionState>,
}

impl Gateway {
    pub fn new(
        bridge: Arc<dyn BridgeService>,
        credentials: Arc<dyn CredentialGate>,
        notifier: Arc<ThrottledNotifier>,
        settings: Settings,
    ) -> Self {
        Self {
            bridge,
            credentials,
            notifier,
            synthesis: None,
            settings: settings.clamped(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: Mutex::new(AdmissionState::default()),
        }
    }

    pub fn with_synthesis(mut self, adapter: Arc<SynthesisAdapter>) -> Self {
        self.synthesis = Some(adapter);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Requests currently executing plus queued.
    pub fn load(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.in_flight, state.queue.len())
    }

    /// Retrieve graph-ranked context for a query.
    pub async fn retrieve_context(
        &self,
        request: ContextRequest,
    ) -> Result<RetrieveOutcome, GatewayError> {
        if !self.credentials.ready() {
            // The prompt to configure credentials goes through the
            // notification surface, throttled; the call itself fails fast.
            self.notifier.notify(
                "credentials-missing",
                NotifyLevel::Warning,
                "Memory retrieval needs an LLM credential. Run `mb secret set llm_api_key`.",
            );
            return Err(GatewayError::new(
                GatewayCode::InvalidRequest,
                "no LLM credential configured; run `mb secret set llm_api_key`",
            ));
        }

        if request.query.trim().is_empty() {
            return Err(GatewayError::new(GatewayCode::InvalidRequest, "query must not be empty"));
        }

        if request.cancelled() {
            return Err(GatewayError::new(
                GatewayCode::InvalidRequest,
                "request cancelled before dispatch",
            ));
        }

        if let Some(permit_rx) = self.admit()? {
            self.await_permit(&request, permit_rx).await?;
        }

        if request.cancelled() {
            self.finish();
            return Err(GatewayError::new(
                GatewayCode::InvalidRequest,
                "request cancelled before dispatch",
            ));
        }

        let result = self.execute(&request).await;
        self.finish();
        result
    }

    /// Admission decision. `None` = run now, `Some(rx)` = wait for a slot.
    fn admit(&self) -> Result<Option<oneshot::Receiver<()>>, GatewayError> {
        let mut state = self.state.lock();
        let now = Instant::now();

        while state.window.front().is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW) {
            state.window.pop_front();
        }
        if state.window.len() >= self.settings.rate_limit_per_minute as usize {
            return Err(GatewayError::new(
                GatewayCode::RateLimitExceeded,
                format!(
                    "rate limit of {} requests/minute reached",
                    self.settings.rate_limit_per_minute
                ),
            ));
        }

        if state.in_flight < self.settings.max_concurrent_requests {
            state.in_flight += 1;
            state.window.push_back(now);
            return Ok(None);
        }

        if state.queue.len() >= self.settings.max_queue_size {
            return Err(GatewayError::new(
                GatewayCode::QueueFull,
                format!("request queue is full ({} waiting)", state.queue.len()),
            ));
        }

        let (permit_tx, permit_rx) = oneshot::channel();
        let id = state.next_queue_id;
        state.next_queue_id += 1;
        state.queue.push_back(QueueEntry { id, queued_at: now, permit_tx });
        debug!(queue_id = id, depth = state.queue.len(), "request queued");
        Ok(Some(permit_rx))
    }

    async fn await_permit(
        &self,
        request: &ContextRequest,
        mut permit_rx: oneshot::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let granted = match &request.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        // If the grant raced the cancellation, give the slot
                        // back; otherwise dropping the receiver passes it on.
                        if permit_rx.try_recv().is_ok() {
                            self.finish();
                        }
                        return Err(GatewayError::new(
                            GatewayCode::InvalidRequest,
                            "request cancelled while queued",
                        ));
                    }
                    granted = &mut permit_rx => granted,
                }
            }
            None => permit_rx.await,
        };
        granted.map_err(|_| {
            GatewayError::new(GatewayCode::InvalidRequest, "gateway shut down while queued")
        })
    }

    /// Release a slot and dispatch the oldest queued caller.
    fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        while let Some(entry) = state.queue.pop_front() {
            let waited_ms = entry.queued_at.elapsed().as_millis() as u64;
            if entry.permit_tx.send(()).is_ok() {
                state.in_flight += 1;
                state.window.push_back(Instant::now());
                debug!(queue_id = entry.id, waited_ms, "dispatching queued request");
                break;
            }
            // Receiver gone (caller cancelled); try the next one.
        }
    }

    async fn execute(&self, request: &ContextRequest) -> Result<RetrieveOutcome, GatewayError> {
        let params = RetrieveParams {
            query: request.query.clone(),
            max_results: self.settings.max_context_results,
            max_tokens: self.settings.max_context_tokens,
            half_life_days: self.settings.ranking_half_life_days,
            include_superseded: false,
            top_k: self.settings.search_top_k,
            wide_search_top_k: self.settings.wide_search_top_k,
            triplet_distance_penalty: self.settings.triplet_distance_penalty,
            session_id: request.session_id.clone(),
        };
        let params = serde_json::to_value(params)
            .map_err(|e| GatewayError::new(GatewayCode::InvalidRequest, e.to_string()))?;

        let value = self
            .bridge
            .send_request(Method::Retrieve, params, self.request_timeout)
            .await
            .map_err(map_bridge_error)?;

        let response: RetrieveResponse = serde_json::from_value(value).map_err(|e| {
            GatewayError::new(GatewayCode::InvalidRequest, format!("malformed bridge response: {e}"))
        })?;

        if !response.success {
            return Err(GatewayError::new(
                GatewayCode::InvalidRequest,
                response.error.unwrap_or_else(|| "retrieval failed".to_string()),
            ));
        }

        let (records, synthesized) = match (&self.synthesis, response.wants_synthesis()) {
            (Some(adapter), true) => {
                let outcome = adapter.synthesize(&request.query, &response).await;
                (outcome.records, true)
            }
            _ => (response.results.unwrap_or_default(), false),
        };

        Ok(shape(records, synthesized))
    }
}

fn shape(records: Vec<RetrievalRecord>, synthesized: bool) -> RetrieveOutcome {
    let before = records.len();
    let entries: Vec<ContextEntry> = records
        .into_iter()
        .filter(|r| r.score > SCORE_FLOOR || r.score == 0.0)
        .map(ContextEntry::from_record)
        .collect();
    if entries.len() < before {
        debug!(dropped = before - entries.len(), "suppressed low-score records");
    }

    let tokens_used = entries.iter().filter_map(|e| e.tokens).sum();
    RetrieveOutcome { total_results: entries.len(), tokens_used, entries, synthesized }
}

fn map_bridge_error(error: BridgeCallError) -> GatewayError {
    match &error {
        BridgeCallError::Request(e) if e.is_timeout() => {
            GatewayError::new(GatewayCode::BridgeTimeout, error.to_string())
        }
        BridgeCallError::Unavailable(unavailable)
            if unavailable.reason == ReasonCode::DaemonDisabled =>
        {
            GatewayError::new(GatewayCode::AccessDisabled, error.to_string())
        }
        _ => {
            warn!(error = %error, "bridge call failed");
            GatewayError::new(GatewayCode::InvalidRequest, error.to_string())
        }
    }
}

fn date_to_iso(value: DateValue) -> Option<String> {
    match value {
        DateValue::EpochMs(ms) => {
            chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
        }
        DateValue::Text(text) => Some(text),
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
