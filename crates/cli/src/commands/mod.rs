// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod background;
pub mod daemon;
pub mod ingest;
pub mod init;
pub mod logs;
pub mod memory;
pub mod retrieve;
pub mod secret;
pub mod status;

use std::sync::Arc;

use mb_bridge::Supervisor;
use mb_core::{Settings, WorkspaceLayout};

/// Build a supervisor for one CLI invocation.
pub(crate) fn build_supervisor(
    layout: &WorkspaceLayout,
    settings: Settings,
) -> Arc<Supervisor> {
    Supervisor::builder(layout.root()).settings(settings).build()
}
