// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb ingest` - synchronous one-shot conversation capture.

use std::sync::Arc;

use anyhow::Result;

use mb_bridge::BridgeService;
use mb_core::{NullBackgroundOps, Settings, WorkspaceLayout};
use mb_gateway::AsyncIngestCoordinator;
use mb_wire::{IngestMode, IngestParams};

use crate::output::{format_or_json, OutputFormat};

pub async fn run(
    layout: &WorkspaceLayout,
    settings: Settings,
    user: &str,
    assistant: &str,
    importance: f64,
    format: OutputFormat,
) -> Result<()> {
    let sup = super::build_supervisor(layout, settings);
    let bridge: Arc<dyn BridgeService> = Arc::new(Arc::clone(&sup));
    let coordinator =
        AsyncIngestCoordinator::new(bridge, Arc::new(NullBackgroundOps), layout.root());

    let workspace = layout.root().display().to_string();
    let params = IngestParams::messages(IngestMode::Sync, user, assistant, importance, &workspace);

    let result = coordinator.ingest_sync(params).await;
    sup.stop("cli-exit").await;

    let report = result?;
    format_or_json(format, &report, || {
        if report.success {
            println!("Captured.");
        } else if report.may_complete_in_background {
            println!("Capture is taking a while; it may still complete in the background.");
        } else {
            println!("Capture failed: {}", report.error.as_deref().unwrap_or("unknown"));
        }
    })
}
