// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution for the worker environment.
//!
//! The worker authenticates against the LLM provider itself; this side only
//! vends credentials into its environment at spawn time. Resolution walks a
//! fallback chain per provider:
//!
//! ```text
//! 1. Environment variable (LLM_API_KEY / OPENAI_API_KEY)
//! 2. Editor secret store
//! 3. ~/.membridge/credentials.json
//! ```
//!
//! Provider errors keep their identity end-to-end: a rate-limited vend is
//! not an auth failure, and callers surface them differently.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use mb_core::SecretStore;

/// Secret-store keys, shared with the CLI `secret` commands.
pub const LLM_KEY_NAME: &str = "llm_api_key";
pub const OPENAI_KEY_NAME: &str = "openai_api_key";

/// A resolved credential and the env var the worker reads it from.
#[derive(Clone)]
pub enum Credential {
    LlmApiKey(String),
    OpenAiApiKey(String),
}

impl Credential {
    pub fn to_env_pair(&self) -> (&'static str, &str) {
        match self {
            Credential::LlmApiKey(key) => ("LLM_API_KEY", key),
            Credential::OpenAiApiKey(key) => ("OPENAI_API_KEY", key),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never render key material, even in debug output.
        match self {
            Credential::LlmApiKey(_) => f.write_str("Credential::LlmApiKey([REDACTED])"),
            Credential::OpenAiApiKey(_) => f.write_str("Credential::OpenAiApiKey([REDACTED])"),
        }
    }
}

/// Credentials injected into the worker environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    credentials: Vec<Credential>,
}

impl CredentialSet {
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn env_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.credentials.iter().map(Credential::to_env_pair)
    }
}

/// Vend failures, preserving the store's own error classes.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no LLM credential configured; set one with `mb secret set {LLM_KEY_NAME}`")]
    Missing,

    #[error("secret store error: {0}")]
    Store(#[from] std::io::Error),
}

/// Walks the fallback chain against the injected secret store.
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Resolve every available credential. `Missing` only when the primary
    /// LLM key is absent everywhere; the OpenAI key is optional.
    pub fn resolve(&self) -> Result<CredentialSet, CredentialError> {
        let mut credentials = Vec::new();

        match self.lookup(LLM_KEY_NAME, "LLM_API_KEY")? {
            Some(key) => credentials.push(Credential::LlmApiKey(key)),
            None => return Err(CredentialError::Missing),
        }

        if let Some(key) = self.lookup(OPENAI_KEY_NAME, "OPENAI_API_KEY")? {
            credentials.push(Credential::OpenAiApiKey(key));
        }

        Ok(CredentialSet { credentials })
    }

    /// True when a retrieve/ingest call could authenticate. Used by the
    /// gateway's first admission check; does not error on store faults.
    pub fn has_any(&self) -> bool {
        self.lookup(LLM_KEY_NAME, "LLM_API_KEY").map(|k| k.is_some()).unwrap_or(false)
    }

    fn lookup(&self, store_key: &str, env_key: &str) -> Result<Option<String>, CredentialError> {
        // 1. Environment variable
        if let Ok(value) = std::env::var(env_key) {
            if !value.is_empty() {
                return Ok(Some(value));
            }
        }

        // 2. Secret store
        if let Some(value) = self.store.get(store_key)? {
            if !value.is_empty() {
                return Ok(Some(value));
            }
        }

        // 3. Legacy credentials file
        Ok(read_credentials_file(store_key))
    }
}

/// Read a key from `~/.membridge/credentials.json`.
fn read_credentials_file(key: &str) -> Option<String> {
    let path = home_dir()?.join(".membridge").join("credentials.json");
    let content = std::fs::read_to_string(&path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(|s| s.to_string())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
