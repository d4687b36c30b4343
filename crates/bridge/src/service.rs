// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability seam between the supervisor and its consumers.
//!
//! The gateway and ingest coordinator talk to the bridge through this
//! trait; tests substitute fakes without spawning a worker.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use mb_core::DaemonUnavailableError;
use mb_wire::Method;

use crate::mux::RequestError;

/// Why a bridge call failed: the daemon could not serve at all, or the
/// individual request faulted.
#[derive(Debug, Error)]
pub enum BridgeCallError {
    #[error(transparent)]
    Unavailable(#[from] DaemonUnavailableError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

impl BridgeCallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeCallError::Request(e) if e.is_timeout())
    }
}

/// One method call against the worker, with the daemon started on demand.
#[async_trait]
pub trait BridgeService: Send + Sync {
    async fn send_request(
        &self,
        method: Method,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeCallError>;
}
