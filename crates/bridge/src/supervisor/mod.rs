// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: single authoritative owner of the worker lifecycle.
//!
//! Combines the lock keeper, worker process and RPC mux behind one state
//! machine. All state transitions are serialized through one async gate so
//! concurrent `start()` callers share a single in-flight startup and
//! `stop()` is idempotent.

mod diagnostics;
mod idle;
mod recovery;
mod shutdown;
mod startup;

pub use diagnostics::{DiagnosticsReport, LockInfo, RecoverySnapshot, RuntimeInfo};
pub use shutdown::ShutdownOutcome;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mb_core::{
    BackgroundOps, Clock, DaemonUnavailableError, FileSecretStore, ReasonCode, SecretStore,
    Settings, SystemClock, WorkspaceLayout,
};
use mb_wire::{HealthResult, IngestOutcome, IngestParams, Method, RetrieveParams, RetrieveResponse};

use crate::credential::CredentialResolver;
use crate::env::Timing;
use crate::lock::LockKeeper;
use crate::mux::RpcMux;
use crate::process::ExitInfo;
use crate::service::{BridgeCallError, BridgeService};
use crate::stderr::StderrTail;
use crate::WorkerCommand;

/// Lifecycle state of the supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    FailedStartup,
    /// Recovery budget exhausted; sticky until explicit user action.
    Degraded,
}

/// Record of the most recent startup or runtime failure.
#[derive(Debug, Clone, Serialize)]
pub struct LastFailure {
    pub timestamp_ms: u64,
    pub reason: ReasonCode,
    pub attempt_id: String,
    pub stderr_tail: Vec<String>,
    pub recovery_attempt: u32,
    pub details: Option<String>,
}

/// Forced-kill bookkeeping for the shutdown ladder.
#[derive(Debug, Default)]
pub(crate) struct ForcedKillState {
    pub(crate) consecutive: u32,
    /// Set when consecutive forced kills reach the threshold; start() is
    /// refused until a health probe succeeds.
    pub(crate) suspended: bool,
}

/// A live worker and its attendant tasks.
pub(crate) struct WorkerHandle {
    pub(crate) pid: u32,
    pub(crate) mux: Arc<RpcMux<ChildStdin>>,
    pub(crate) stderr_tail: StderrTail,
    pub(crate) exit_rx: watch::Receiver<Option<ExitInfo>>,
    /// Cancels the stderr pump and mux reader.
    pub(crate) tasks: CancellationToken,
    pub(crate) spawned_at: Instant,
    /// Distinguishes successive workers so the exit watcher of a replaced
    /// worker cannot touch its successor.
    pub(crate) generation: u64,
}

pub struct Supervisor {
    /// Self-reference so `&self` methods can hand an owner to spawned
    /// tasks (idle timer, exit watcher, recovery loop).
    pub(crate) self_ref: Weak<Supervisor>,
    pub(crate) layout: WorkspaceLayout,
    pub(crate) settings: Settings,
    pub(crate) timing: Timing,
    pub(crate) clock: SystemClock,
    /// Explicit worker command; set by tests and the spawn-mode CLI.
    pub(crate) command_override: Option<WorkerCommand>,
    pub(crate) credentials: CredentialResolver,
    pub(crate) background: Arc<dyn BackgroundOps>,

    pub(crate) state: Mutex<DaemonState>,
    /// Serializes start/stop/restart; concurrent callers collapse onto the
    /// transition in flight.
    pub(crate) transition: tokio::sync::Mutex<()>,
    pub(crate) worker: Mutex<Option<WorkerHandle>>,
    pub(crate) generation: AtomicU64,
    pub(crate) last_failure: Mutex<Option<LastFailure>>,
    pub(crate) recovery_attempts: Mutex<u32>,
    pub(crate) forced: Mutex<ForcedKillState>,
    pub(crate) lock: Mutex<LockKeeper>,
    pub(crate) last_activity: Mutex<Instant>,
    pub(crate) idle_cancel: Mutex<Option<CancellationToken>>,
}

/// Builder for a supervisor over one workspace.
pub struct SupervisorBuilder {
    layout: WorkspaceLayout,
    settings: Settings,
    timing: Timing,
    command: Option<WorkerCommand>,
    store: Option<Arc<dyn SecretStore>>,
    background: Option<Arc<dyn BackgroundOps>>,
}

impl SupervisorBuilder {
    pub fn new(workspace_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            layout: WorkspaceLayout::new(workspace_root),
            settings: Settings::default(),
            timing: Timing::from_env(),
            command: None,
            store: None,
            background: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings.clamped();
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Explicit worker command (bypasses interpreter resolution).
    pub fn worker_command(mut self, command: WorkerCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn background(mut self, background: Arc<dyn BackgroundOps>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn build(self) -> Arc<Supervisor> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileSecretStore::new(self.layout.secrets_path())));
        let background =
            self.background.unwrap_or_else(|| Arc::new(mb_core::capability::NullBackgroundOps));
        let lock = LockKeeper::new(self.layout.clone(), &self.timing);

        Arc::new_cyclic(|self_ref| Supervisor {
            self_ref: self_ref.clone(),
            layout: self.layout,
            settings: self.settings,
            timing: self.timing,
            clock: SystemClock,
            command_override: self.command,
            credentials: CredentialResolver::new(store),
            background,
            state: Mutex::new(DaemonState::Stopped),
            transition: tokio::sync::Mutex::new(()),
            worker: Mutex::new(None),
            generation: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            recovery_attempts: Mutex::new(0),
            forced: Mutex::new(ForcedKillState::default()),
            lock: Mutex::new(lock),
            last_activity: Mutex::new(Instant::now()),
            idle_cancel: Mutex::new(None),
        })
    }
}

impl Supervisor {
    pub fn builder(workspace_root: impl Into<std::path::PathBuf>) -> SupervisorBuilder {
        SupervisorBuilder::new(workspace_root)
    }

    pub fn state(&self) -> DaemonState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: DaemonState) {
        *self.state.lock() = state;
    }

    pub fn last_failure(&self) -> Option<LastFailure> {
        self.last_failure.lock().clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Requests currently in flight against the worker.
    pub fn pending_requests(&self) -> usize {
        self.worker.lock().as_ref().map(|w| w.mux.pending_count()).unwrap_or(0)
    }

    pub(crate) fn touch_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The owning Arc; `None` only while the supervisor is being dropped.
    fn strong(&self) -> Option<Arc<Supervisor>> {
        self.self_ref.upgrade()
    }

    /// Start the worker. Concurrent callers share one in-flight startup.
    pub async fn start(&self) -> Result<(), DaemonUnavailableError> {
        let Some(this) = self.strong() else {
            return Err(DaemonUnavailableError::with_details(
                ReasonCode::SpawnFailed,
                "supervisor is shutting down",
            ));
        };
        let _gate = self.transition.lock().await;
        if self.state() == DaemonState::Running {
            return Ok(());
        }
        startup::run_startup(&this).await
    }

    /// Stop the worker via the graceful-first ladder. Idempotent.
    pub async fn stop(&self, reason: &str) -> ShutdownOutcome {
        let Some(this) = self.strong() else {
            return ShutdownOutcome::NoWorker;
        };
        let _gate = self.transition.lock().await;
        shutdown::run_stop(&this, reason).await
    }

    pub async fn restart(&self) -> Result<(), DaemonUnavailableError> {
        self.stop("restart").await;
        self.start().await
    }

    /// Leave `Degraded` and clear the recovery budget. User action only.
    pub fn reset_degraded(&self) {
        let mut state = self.state.lock();
        if *state == DaemonState::Degraded {
            *state = DaemonState::Stopped;
        }
        drop(state);
        *self.recovery_attempts.lock() = 0;
        let mut forced = self.forced.lock();
        forced.consecutive = 0;
        forced.suspended = false;
        info!("degraded state cleared by user action");
    }

    /// One-shot health probe that lifts daemon-mode suspension on success.
    pub async fn probe_and_resume(&self) -> Result<(), DaemonUnavailableError> {
        {
            let mut forced = self.forced.lock();
            if !forced.suspended {
                return Ok(());
            }
            // Lift tentatively; restored below if the probe fails.
            forced.suspended = false;
        }
        match self.start().await {
            Ok(()) => {
                self.forced.lock().consecutive = 0;
                info!("daemon mode resumed after successful health probe");
                Ok(())
            }
            Err(e) => {
                self.forced.lock().suspended = true;
                Err(e)
            }
        }
    }

    /// Dispatch one request, starting the worker on demand.
    pub async fn request(
        &self,
        method: Method,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeCallError> {
        if !self.settings.memory_enabled {
            return Err(DaemonUnavailableError::new(ReasonCode::DaemonDisabled).into());
        }

        if self.state() != DaemonState::Running {
            self.start().await?;
        }

        let mux = {
            let worker = self.worker.lock();
            match worker.as_ref() {
                Some(handle) => Arc::clone(&handle.mux),
                None => {
                    return Err(DaemonUnavailableError::with_details(
                        ReasonCode::ProcessExited,
                        "worker slot empty after startup",
                    )
                    .into())
                }
            }
        };

        self.touch_activity();
        let result = mux.send_request(method, params, timeout).await;
        self.touch_activity();

        if self.settings.bridge_mode == mb_core::BridgeMode::Spawn {
            // Non-daemon mode: one worker per call.
            self.stop("spawn-complete").await;
        }

        result.map_err(Into::into)
    }

    pub async fn health(&self) -> Result<HealthResult, BridgeCallError> {
        let value = self
            .request(Method::Health, serde_json::json!({}), self.timing.handshake_timeout)
            .await?;
        parse_result(value)
    }

    pub async fn ingest(
        &self,
        params: IngestParams,
        timeout: Duration,
    ) -> Result<IngestOutcome, BridgeCallError> {
        let params = serde_json::to_value(params)
            .map_err(|e| crate::mux::RequestError::Transport(e.to_string()))?;
        let value = self.request(Method::Ingest, params, timeout).await?;
        parse_result(value)
    }

    pub async fn retrieve(
        &self,
        params: RetrieveParams,
    ) -> Result<RetrieveResponse, BridgeCallError> {
        let params = serde_json::to_value(params)
            .map_err(|e| crate::mux::RequestError::Transport(e.to_string()))?;
        let value = self.request(Method::Retrieve, params, self.timing.request_timeout).await?;
        parse_result(value)
    }

    pub async fn cognify(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeCallError> {
        self.request(Method::Cognify, params, self.timing.request_timeout).await
    }

    pub async fn visualize(&self) -> Result<serde_json::Value, BridgeCallError> {
        self.request(Method::Visualize, serde_json::json!({}), self.timing.request_timeout).await
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        diagnostics::report(self)
    }

    pub(crate) fn record_failure(&self, failure: LastFailure) {
        *self.last_failure.lock() = Some(failure);
    }

    pub(crate) fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

fn parse_result<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, BridgeCallError> {
    serde_json::from_value(value)
        .map_err(|e| crate::mux::RequestError::Transport(format!("malformed result: {e}")).into())
}

/// Supervisor-as-a-service for gateway consumers.
#[async_trait::async_trait]
impl BridgeService for Arc<Supervisor> {
    async fn send_request(
        &self,
        method: Method,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeCallError> {
        self.request(method, params, timeout).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
