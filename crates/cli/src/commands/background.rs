// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb background-status` - background operations in this process.
//!
//! Cognify jobs belong to the session that enqueued them; a fresh CLI
//! process therefore usually reports an empty list. The command exists so
//! scripted surfaces share one status shape with the editor host.

use anyhow::Result;
use serde_json::json;

use crate::output::{format_or_json, OutputFormat};

pub fn run(format: OutputFormat) -> Result<()> {
    let operations: Vec<serde_json::Value> = Vec::new();
    format_or_json(format, &json!({"active": operations.len(), "operations": operations}), || {
        println!("No background operations in this session.");
    })
}
