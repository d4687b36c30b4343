// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC multiplexing over the worker's stdio.
//!
//! One writer, one reader task, and a pending map keyed by request id.
//! Every outgoing request resolves exactly once: with the worker's
//! response, with a timeout, or with a process-exit error. Nothing stays
//! pending past worker death.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mb_wire::{decode_line, encode_line, Method, ProtocolError, RequestId, RpcError, RpcRequest, RpcResponse};

use crate::process::ExitInfo;

/// Longest stdout line we will buffer. Anything longer is discarded up to
/// the next newline; a response that large is malformed by contract.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Per-request failure.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{method} request timed out after {}ms; worker still running", .after.as_millis())]
    Timeout { method: Method, after: Duration },

    #[error("worker exited mid-request ({exit})")]
    ProcessExited { exit: ExitInfo },

    #[error(transparent)]
    Worker(#[from] RpcError),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout { .. })
    }
}

struct PendingEntry {
    method: Method,
    tx: oneshot::Sender<Result<serde_json::Value, RequestError>>,
}

/// The multiplexer. Generic over the stdin writer so tests can run it
/// against in-memory pipes.
pub struct RpcMux<W> {
    stdin: tokio::sync::Mutex<W>,
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    cancel: CancellationToken,
}

impl<W> RpcMux<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create the mux and spawn its reader task over `stdout`.
    pub fn start<R>(stdin: W, stdout: R) -> std::sync::Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mux = std::sync::Arc::new(Self {
            stdin: tokio::sync::Mutex::new(stdin),
            pending: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        });
        tokio::spawn(read_loop(std::sync::Arc::clone(&mux), stdout));
        mux
    }

    /// Send one request and await its correlated response.
    pub async fn send_request(
        &self,
        method: Method,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, RequestError> {
        let id = RequestId::fresh();
        let request = RpcRequest::new(id.clone(), method, params);
        let line = encode_line(&request).map_err(|e| RequestError::Transport(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), PendingEntry { method, tx });

        {
            let mut stdin = self.stdin.lock().await;
            let write = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            };
            if let Err(e) = write.await {
                self.pending.lock().remove(&id);
                return Err(RequestError::Transport(e.to_string()));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a value: the mux is being torn down.
            Ok(Err(_closed)) => {
                Err(RequestError::Transport("response channel closed".to_string()))
            }
            Err(_elapsed) => {
                // Deregister so a late response for this id is dropped.
                self.pending.lock().remove(&id);
                Err(RequestError::Timeout { method, after: timeout })
            }
        }
    }

    /// Requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Reject every pending request with a process-exit error.
    pub fn fail_all(&self, exit: &ExitInfo) {
        let drained: Vec<(RequestId, PendingEntry)> = self.pending.lock().drain().collect();
        for (id, entry) in drained {
            debug!(%id, method = %entry.method, "rejecting pending request on worker exit");
            let _ = entry.tx.send(Err(RequestError::ProcessExited { exit: exit.clone() }));
        }
    }

    /// Stop the reader task. Pending requests are not touched; callers
    /// follow up with [`fail_all`](Self::fail_all).
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn resolve(&self, response: RpcResponse) {
        let entry = self.pending.lock().remove(&response.id);
        match entry {
            Some(entry) => {
                let outcome = response.into_result().map_err(RequestError::Worker);
                let _ = entry.tx.send(outcome);
            }
            None => {
                // Either a timed-out request's late answer or an id we never
                // issued. Both are dropped by contract.
                debug!(id = %response.id, "response for unknown or expired request id");
            }
        }
    }
}

/// Reader task: split stdout into lines, bound the buffer, resolve frames.
async fn read_loop<W, R>(mux: std::sync::Arc<RpcMux<W>>, mut stdout: R)
where
    W: AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    let cancel = mux.cancel.clone();
    let mut chunk = [0u8; 8192];
    let mut line_buf: Vec<u8> = Vec::new();
    let mut discarding = false;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stdout.read(&mut chunk) => read,
        };

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "worker stdout read failed");
                break;
            }
        };

        let mut rest = &chunk[..n];
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            if discarding {
                discarding = false;
            } else {
                line_buf.extend_from_slice(&rest[..pos]);
                handle_line(&mux, &line_buf);
            }
            line_buf.clear();
            rest = &rest[pos + 1..];
        }

        if !discarding {
            line_buf.extend_from_slice(rest);
            if line_buf.len() > MAX_LINE_BYTES {
                warn!(bytes = line_buf.len(), "discarding oversized worker stdout line");
                line_buf.clear();
                discarding = true;
            }
        }
    }
}

fn handle_line<W>(mux: &RpcMux<W>, raw: &[u8])
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let line = String::from_utf8_lossy(raw);
    if line.trim().is_empty() {
        return;
    }
    match decode_line(&line) {
        Ok(response) => mux.resolve(response),
        Err(ProtocolError::NotAResponse(desc)) => {
            debug!(%desc, "ignoring non-response worker stdout line");
        }
        Err(e) => {
            debug!(error = %e, "ignoring undecodable worker stdout line");
        }
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
