// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthesized-answer post-processing for v2 retrieval responses.
//!
//! When the worker returns raw graph context instead of finished records,
//! an editor-provided language model condenses it into one answer, tagged
//! `synthesized_high` with score 1.0. The model can also decline with the
//! no-relevant-context sentinel, which yields an empty result rather than
//! a made-up answer.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use mb_core::NotifyLevel;
use mb_wire::{RetrievalRecord, RetrieveResponse};

use crate::notify::ThrottledNotifier;

/// Exact answer the model gives when the context does not cover the query.
pub const NO_CONTEXT_SENTINEL: &str = "no relevant context";

/// Context budget for the model window, in characters.
const MAX_CONTEXT_CHARS: usize = 24_000;

/// Editor-provided language model capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, query: &str, context: &str) -> Result<String, LmError>;
}

#[derive(Debug, Error)]
pub enum LmError {
    /// No model is available right now (not installed, not signed in).
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    #[error("synthesis failed: {0}")]
    Other(String),
}

/// Result of one synthesis pass.
#[derive(Debug)]
pub struct SynthesisOutcome {
    /// Zero records (sentinel or failure) or exactly one synthesized record.
    pub records: Vec<RetrievalRecord>,
    /// Whether the graph context was cut down to fit the model window.
    pub truncated: bool,
}

pub struct SynthesisAdapter {
    model: Arc<dyn LanguageModel>,
    notifier: Arc<ThrottledNotifier>,
}

impl SynthesisAdapter {
    pub fn new(model: Arc<dyn LanguageModel>, notifier: Arc<ThrottledNotifier>) -> Self {
        Self { model, notifier }
    }

    /// Produce a synthesized answer from a v2 response's graph context.
    /// Every failure mode degrades to an empty result; retrieval never
    /// fails because synthesis did.
    pub async fn synthesize(&self, query: &str, response: &RetrieveResponse) -> SynthesisOutcome {
        let context = response.graph_context.as_deref().unwrap_or_default();
        let (context, truncated) = bound_context(context);
        if truncated {
            debug!(
                original_chars = response.graph_context_char_count.unwrap_or(0),
                kept_chars = context.len(),
                "graph context truncated to model window"
            );
        }

        match self.model.complete(query, context).await {
            Ok(answer) => {
                let trimmed = answer.trim();
                if trimmed.to_lowercase().contains(NO_CONTEXT_SENTINEL) {
                    debug!("model reported no relevant context");
                    return SynthesisOutcome { records: Vec::new(), truncated };
                }
                SynthesisOutcome {
                    records: vec![RetrievalRecord::synthesized(trimmed)],
                    truncated,
                }
            }
            Err(LmError::Unavailable(reason)) => {
                self.notifier.notify(
                    "lm-unavailable",
                    NotifyLevel::Warning,
                    "Answer synthesis is unavailable; falling back to raw results next time.",
                );
                warn!(%reason, "language model unavailable for synthesis");
                SynthesisOutcome { records: Vec::new(), truncated }
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed");
                SynthesisOutcome { records: Vec::new(), truncated }
            }
        }
    }
}

/// Cut the context at the window budget, on a char boundary.
fn bound_context(context: &str) -> (&str, bool) {
    if context.len() <= MAX_CONTEXT_CHARS {
        return (context, false);
    }
    let mut cut = MAX_CONTEXT_CHARS;
    while cut > 0 && !context.is_char_boundary(cut) {
        cut -= 1;
    }
    (&context[..cut], true)
}

#[cfg(test)]
#[path = "synthesis_tests.rs"]
mod tests;
