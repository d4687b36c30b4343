// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb secret` - file-backed secret store management.

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

use mb_core::{FileSecretStore, SecretStore, WorkspaceLayout};

use crate::output::{format_or_json, OutputFormat};

#[derive(Subcommand)]
pub enum SecretCommand {
    /// Store a secret (value read from stdin when not given)
    Set {
        /// Key, e.g. llm_api_key or openai_api_key
        key: String,
        /// Value; prefer piping via stdin to keep it out of shell history
        value: Option<String>,
    },
    /// Remove a stored secret
    Clear { key: String },
}

pub fn run(command: SecretCommand, layout: &WorkspaceLayout, format: OutputFormat) -> Result<()> {
    let store = FileSecretStore::new(layout.secrets_path());
    match command {
        SecretCommand::Set { key, value } => {
            let value = match value {
                Some(value) => value,
                None => read_value_from_stdin()?,
            };
            anyhow::ensure!(!value.is_empty(), "refusing to store an empty secret");
            store.set(&key, &value).context("failed to write secret store")?;
            format_or_json(format, &json!({"set": key}), || {
                println!("Stored secret '{key}'.");
            })
        }
        SecretCommand::Clear { key } => {
            store.delete(&key).context("failed to update secret store")?;
            format_or_json(format, &json!({"cleared": key}), || {
                println!("Cleared secret '{key}'.");
            })
        }
    }
}

fn read_value_from_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).context("failed to read secret from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
