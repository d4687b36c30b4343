// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb retrieve` - graph-ranked context through the gateway.

use std::sync::Arc;

use anyhow::Result;

use mb_bridge::{BridgeService, CredentialResolver};
use mb_core::{FileSecretStore, Settings, WorkspaceLayout};
use mb_gateway::{ContextRequest, DesktopNotifier, Gateway, ThrottledNotifier};

use crate::output::{format_or_json, OutputFormat};

pub async fn run(
    layout: &WorkspaceLayout,
    settings: Settings,
    query: &str,
    session: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let sup = super::build_supervisor(layout, settings.clone());
    let bridge: Arc<dyn BridgeService> = Arc::new(Arc::clone(&sup));
    let credentials =
        Arc::new(CredentialResolver::new(Arc::new(FileSecretStore::new(layout.secrets_path()))));
    let notifier = Arc::new(ThrottledNotifier::with_default_throttle(Arc::new(DesktopNotifier)));
    let gateway = Gateway::new(bridge, credentials, notifier, settings);

    let request =
        ContextRequest { query: query.to_string(), session_id: session, cancel: None };
    let result = gateway.retrieve_context(request).await;
    sup.stop("cli-exit").await;

    let outcome = result.map_err(|e| anyhow::anyhow!("{e}"))?;
    format_or_json(format, &outcome, || {
        if outcome.entries.is_empty() {
            println!("No relevant context.");
            return;
        }
        for entry in &outcome.entries {
            let score = entry.final_score.unwrap_or(entry.score);
            println!("[{score:.2}] {}", entry.summary_text);
            if let Some(topic) = &entry.topic {
                println!("        topic: {topic}");
            }
        }
        println!("{} result(s), ~{} tokens", outcome.total_results, outcome.tokens_used);
    })
}
