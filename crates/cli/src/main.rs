// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb` - workspace memory bridge CLI.
//!
//! Thin command surface over the supervisor: every command builds a
//! supervisor for one workspace, performs its operation, and exits. The
//! long-lived deployment of the supervisor lives inside the editor host;
//! this binary exists for setup, diagnostics and scripted use.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mb_core::{Settings, WorkspaceLayout};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "mb", version, about = "Workspace memory bridge")]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the .mb workspace layout and a default config
    Init,
    /// Show the supervisor diagnostics report
    Status,
    /// Manage the bridge daemon
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },
    /// Manage stored secrets
    Secret {
        #[command(subcommand)]
        command: commands::secret::SecretCommand,
    },
    /// Enable, disable or toggle workspace memory
    Memory {
        #[command(subcommand)]
        command: commands::memory::MemoryCommand,
    },
    /// Retrieve graph-ranked context for a query
    Retrieve {
        query: String,
        /// Opaque session identifier forwarded to the worker
        #[arg(long)]
        session: Option<String>,
    },
    /// Capture a conversation exchange synchronously
    Ingest {
        #[arg(long)]
        user: String,
        #[arg(long)]
        assistant: String,
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
    },
    /// Show background operations started by this process
    BackgroundStatus,
    /// Print the tail of the newest bridge log
    Logs {
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Text };

    let workspace = cli
        .workspace
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let layout = WorkspaceLayout::new(workspace);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(cli, layout, format));
    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(exit_error::exit_code(&error));
    }
}

async fn run(cli: Cli, layout: WorkspaceLayout, format: OutputFormat) -> Result<()> {
    let settings = Settings::load(&layout.config_path())?;
    init_tracing(&layout, &settings);

    match cli.command {
        Command::Init => commands::init::run(&layout, format),
        Command::Status => commands::status::run(&layout, settings, format),
        Command::Daemon { command } => {
            commands::daemon::run(command, &layout, settings, format).await
        }
        Command::Secret { command } => commands::secret::run(command, &layout, format),
        Command::Memory { command } => commands::memory::run(command, &layout, format),
        Command::Retrieve { query, session } => {
            commands::retrieve::run(&layout, settings, &query, session, format).await
        }
        Command::Ingest { user, assistant, importance } => {
            commands::ingest::run(&layout, settings, &user, &assistant, importance, format).await
        }
        Command::BackgroundStatus => commands::background::run(format),
        Command::Logs { limit } => commands::logs::run(&layout, limit),
    }
}

/// Stderr logging honoring the configured level; optional file layer into
/// the workspace log directory when debug logging is on.
fn init_tracing(layout: &WorkspaceLayout, settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter()));

    if settings.debug_logging && layout.logs_dir().exists() {
        let appender = tracing_appender::rolling::daily(layout.logs_dir(), "mb-cli.log");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(appender)
            .with_ansi(false)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
