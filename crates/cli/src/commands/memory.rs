// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb memory` - flip the workspace memory master switch.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

use mb_core::{Settings, WorkspaceLayout};

use crate::output::{format_or_json, OutputFormat};

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Enable workspace memory
    On,
    /// Disable workspace memory (bridge surfaces report DAEMON_DISABLED)
    Off,
    /// Flip the current setting
    Toggle,
}

pub fn run(command: MemoryCommand, layout: &WorkspaceLayout, format: OutputFormat) -> Result<()> {
    let config_path = layout.config_path();
    let mut settings = Settings::load(&config_path)?;

    settings.memory_enabled = match command {
        MemoryCommand::On => true,
        MemoryCommand::Off => false,
        MemoryCommand::Toggle => !settings.memory_enabled,
    };

    layout.ensure_dirs().context("failed to create workspace state directory")?;
    let content = toml::to_string_pretty(&settings).context("failed to render config")?;
    std::fs::write(&config_path, content).context("failed to write config")?;

    format_or_json(format, &json!({"memory_enabled": settings.memory_enabled}), || {
        if settings.memory_enabled {
            println!("Workspace memory is on.");
        } else {
            println!("Workspace memory is off.");
        }
    })
}
