// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed parameter and result payloads for the worker methods.

use serde::{Deserialize, Serialize};

/// `health` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResult {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Ingestion mode: full synchronous pipeline, or staging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestMode {
    #[serde(rename = "sync")]
    Sync,
    #[serde(rename = "add-only")]
    AddOnly,
}

/// `ingest` params. Either a structured summary or a raw message pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestParams {
    pub mode: IngestMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    pub workspace_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl IngestParams {
    pub fn summary(mode: IngestMode, summary: serde_json::Value, workspace: &str) -> Self {
        Self {
            mode,
            summary_json: Some(summary),
            user_message: None,
            assistant_message: None,
            importance: None,
            workspace_path: workspace.to_string(),
            session_id: None,
        }
    }

    pub fn messages(
        mode: IngestMode,
        user: &str,
        assistant: &str,
        importance: f64,
        workspace: &str,
    ) -> Self {
        Self {
            mode,
            summary_json: None,
            user_message: Some(user.to_string()),
            assistant_message: Some(assistant.to_string()),
            importance: Some(importance),
            workspace_path: workspace.to_string(),
            session_id: None,
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// `ingest` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_chars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured error code (EBUSY, LOCK_ERROR, …) when the worker can
    /// classify its own failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_duration_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_metrics: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// `retrieve` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveParams {
    pub query: String,
    pub max_results: usize,
    pub max_tokens: u32,
    pub half_life_days: f64,
    pub include_superseded: bool,
    pub top_k: u32,
    pub wide_search_top_k: u32,
    pub triplet_distance_penalty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
