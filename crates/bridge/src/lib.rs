// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mb-bridge: supervision of the out-of-process memory worker.
//!
//! The worker (the "bridge") owns graph and vector search; this crate owns
//! everything around it: workspace-exclusive locking, interpreter
//! resolution and spawn, JSON-RPC multiplexing over stdio, bounded startup,
//! idle shutdown, the graceful-first termination ladder, and crash recovery
//! with a bounded budget.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod credential;
pub mod env;
pub mod lock;
pub mod mux;
pub mod process;
pub mod service;
pub mod stderr;
pub mod supervisor;

pub use credential::{CredentialError, CredentialResolver, CredentialSet};
pub use env::Timing;
pub use lock::{Acquire, LockKeeper, LockOwnerMetadata};
pub use mux::{RequestError, RpcMux};
pub use process::{ExitInfo, SpawnError, WorkerCommand, WorkerProcess};
pub use service::{BridgeCallError, BridgeService};
pub use stderr::StderrTail;
pub use supervisor::{
    DaemonState, DiagnosticsReport, LastFailure, LockInfo, RecoverySnapshot, RuntimeInfo,
    ShutdownOutcome, Supervisor, SupervisorBuilder,
};
