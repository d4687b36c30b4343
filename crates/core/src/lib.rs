// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mb-core: shared foundation for the membridge workspace.
//!
//! Holds the pieces every other crate leans on: the clock abstraction,
//! editor-host settings with clamping, stable reason codes, sensitive-data
//! redaction, the on-disk workspace layout, and the capability traits the
//! supervisor and gateway are injected with.

pub mod capability;
pub mod clock;
pub mod paths;
pub mod reason;
pub mod redact;
pub mod settings;

pub use capability::{
    BackgroundError, BackgroundOps, FileSecretStore, NoopNotifier, Notifier, NotifyLevel,
    NullBackgroundOps, OperationId, SecretStore,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use paths::WorkspaceLayout;
pub use reason::{DaemonUnavailableError, GatewayCode, ReasonCode};
pub use redact::{redact, truncate_capture, truncate_for_log};
pub use settings::{BridgeMode, LogLevel, Settings};
