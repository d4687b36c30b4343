// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mb-gateway: the admission layer between agent consumers and the bridge.
//!
//! Programmatic callers do not talk to the supervisor directly; they go
//! through the gateway, which bounds concurrency and request rate, shapes
//! worker records into the external contract, and runs the two-phase
//! ingestion and synthesized-answer paths.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod background;
pub mod gateway;
pub mod ingest;
pub mod notify;
pub mod synthesis;

pub use background::{OperationSnapshot, OpsQueue};
pub use gateway::{ContextEntry, ContextRequest, CredentialGate, Gateway, GatewayError, RetrieveOutcome};
pub use ingest::{AsyncIngestCoordinator, IngestError, IngestReport};
pub use notify::{DesktopNotifier, ThrottledNotifier};
pub use synthesis::{LanguageModel, LmError, SynthesisAdapter, SynthesisOutcome};
