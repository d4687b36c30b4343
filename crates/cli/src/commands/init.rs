// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb init` - create the workspace layout and default config.

use anyhow::{Context, Result};
use serde_json::json;

use mb_core::{Settings, WorkspaceLayout};

use crate::output::{format_or_json, OutputFormat};

pub fn run(layout: &WorkspaceLayout, format: OutputFormat) -> Result<()> {
    layout.ensure_dirs().context("failed to create workspace state directory")?;

    let config_path = layout.config_path();
    let created_config = if config_path.exists() {
        false
    } else {
        let content =
            toml::to_string_pretty(&Settings::default()).context("failed to render config")?;
        std::fs::write(&config_path, content).context("failed to write config")?;
        true
    };

    let summary = json!({
        "workspace": layout.workspace_identifier(),
        "state_dir": layout.state_dir(),
        "config": config_path,
        "config_created": created_config,
    });
    format_or_json(format, &summary, || {
        println!("Initialized workspace memory in {}", layout.state_dir().display());
        if created_config {
            println!("Wrote default config to {}", config_path.display());
        } else {
            println!("Config already present at {}", config_path.display());
        }
    })
}
