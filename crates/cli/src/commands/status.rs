// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mb status` - supervisor diagnostics report.

use anyhow::Result;

use mb_core::{Settings, WorkspaceLayout};

use crate::output::{format_or_json, OutputFormat};

pub fn run(layout: &WorkspaceLayout, settings: Settings, format: OutputFormat) -> Result<()> {
    let sup = super::build_supervisor(layout, settings);
    let report = sup.diagnostics();

    format_or_json(format, &report, || {
        println!("State:      {:?}", report.state);
        println!(
            "Lock:       {} ({})",
            if report.lock.held { "held by this process" } else { "not held" },
            report.lock.path
        );
        if let Some(owner) = &report.lock.owner {
            println!(
                "Lock owner: pid {} instance {} workspace {}",
                owner.extension_host_pid, owner.instance_id, owner.workspace_identifier
            );
        }
        if let Some(runtime) = &report.runtime {
            println!(
                "Worker:     pid {} up {}s, {} pending request(s)",
                runtime.pid,
                runtime.uptime_ms / 1000,
                runtime.pending_requests
            );
        }
        if let Some(failure) = &report.last_failure {
            println!("Last failure: {} ({})", failure.reason, failure.attempt_id);
            if let Some(details) = &failure.details {
                println!("  {details}");
            }
            for line in &failure.stderr_tail {
                println!("  stderr: {line}");
            }
        }
        println!(
            "Recovery:   {}/{} attempts, {} consecutive forced kill(s){}",
            report.recovery.attempts,
            report.recovery.max_attempts,
            report.recovery.consecutive_forced_kills,
            if report.recovery.daemon_suspended { ", daemon suspended" } else { "" }
        );
        for hint in &report.remediation {
            println!("Hint:       {hint}");
        }
    })
}
