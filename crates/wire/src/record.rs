// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retrieval result records.
//!
//! Two record generations share one wire shape: enriched conversation
//! summaries carry `topic_id` and the structured metadata fields; legacy
//! memory records carry only text and score. Consumers discriminate on
//! `topic_id` presence rather than a version tag.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an enriched summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Superseded,
    DecisionRecord,
}

/// How the record's answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    /// Single model-synthesized answer over graph context; always score 1.0.
    SynthesizedHigh,
    Normal,
}

/// A date as the worker sends it: epoch milliseconds or an ISO string.
/// The gateway normalizes both to ISO-8601 on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    EpochMs(i64),
    Text(String),
}

/// One retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRecord {
    #[serde(default)]
    pub summary_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_created_at: Option<DateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateValue>,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_label: Option<ConfidenceLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_questions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

impl RetrievalRecord {
    /// Enriched summaries carry a topic id; legacy memories do not.
    pub fn is_enriched(&self) -> bool {
        self.topic_id.is_some()
    }

    /// Minimal record used for synthesized answers.
    pub fn synthesized(summary_text: impl Into<String>) -> Self {
        Self {
            summary_text: summary_text.into(),
            text: None,
            topic: None,
            topic_id: None,
            plan_id: None,
            session_id: None,
            status: None,
            created_at: None,
            source_created_at: None,
            updated_at: None,
            score: 1.0,
            final_score: Some(1.0),
            confidence_label: Some(ConfidenceLabel::SynthesizedHigh),
            decisions: None,
            rationale: None,
            open_questions: None,
            next_steps: None,
            references: None,
            tokens: None,
        }
    }
}

/// `retrieve` result envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RetrievalRecord>>,
    /// Raw graph context for client-side synthesis; contract v2+.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_context_char_count: Option<u64>,
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub filtered_count: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrieveResponse {
    /// Major component of `contract_version` ("2.1" → 2). Absent or
    /// unparseable versions count as 1 (the pre-versioned contract).
    pub fn contract_major(&self) -> u32 {
        self.contract_version
            .as_deref()
            .and_then(|v| v.split('.').next())
            .and_then(|major| major.parse().ok())
            .unwrap_or(1)
    }

    /// The synthesized-answer path applies when the worker handed back raw
    /// graph context under a v2+ contract.
    pub fn wants_synthesis(&self) -> bool {
        self.contract_major() >= 2
            && self.graph_context.as_deref().is_some_and(|ctx| !ctx.trim().is_empty())
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
