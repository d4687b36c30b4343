// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb logs` - tail the newest bridge log file.

use anyhow::{Context, Result};

use mb_core::WorkspaceLayout;

pub fn run(layout: &WorkspaceLayout, limit: usize) -> Result<()> {
    let logs_dir = layout.logs_dir();
    if !logs_dir.is_dir() {
        println!("No logs yet ({}).", logs_dir.display());
        return Ok(());
    }

    let mut files: Vec<_> = std::fs::read_dir(&logs_dir)
        .context("failed to read log directory")?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .collect();
    files.sort_by_key(|entry| {
        entry.metadata().and_then(|m| m.modified()).unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let Some(newest) = files.last() else {
        println!("No logs yet ({}).", logs_dir.display());
        return Ok(());
    };

    let content = std::fs::read_to_string(newest.path()).context("failed to read log file")?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(limit);
    for line in &lines[start..] {
        println!("{line}");
    }
    Ok(())
}
