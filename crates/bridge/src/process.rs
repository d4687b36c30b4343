// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process spawning: interpreter resolution, version gate, env
//! augmentation, and OS-level termination.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use mb_core::{Settings, WorkspaceLayout};

use crate::credential::CredentialSet;
use crate::env::Timing;

/// Supported interpreter range: CPython 3.10 through 3.13.
const MIN_MINOR: u32 = 10;
const MAX_MINOR: u32 = 13;

/// Module the interpreter runs as the bridge entry point.
const BRIDGE_MODULE: &str = "mb_bridge";

/// Exit description delivered to the mux and recovery logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: &std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(status);
        #[cfg(not(unix))]
        let signal = None;
        Self { code: status.code(), signal }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "signal {sig}"),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

/// Spawn failures, each mapped to a startup reason code by the supervisor.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no usable interpreter: {0}")]
    InterpreterNotFound(String),

    #[error("interpreter {} reports unsupported version {version} (need 3.{MIN_MINOR}-3.{MAX_MINOR}); point python_path at a supported interpreter", .path.display())]
    UnsupportedVersion { path: PathBuf, version: String },

    #[error("interpreter {} version check failed: {message}", .path.display())]
    VersionCheckFailed { path: PathBuf, message: String },

    #[error("failed to spawn worker: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker started without usable stdio pipes")]
    StdioUnavailable,
}

/// Fully resolved command for the worker.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Skip the `--version` gate (used when the command is not an
    /// interpreter, e.g. a stub in tests).
    pub skip_version_gate: bool,
}

impl WorkerCommand {
    /// Resolve the interpreter and build the daemon-mode command line.
    pub async fn resolve(
        layout: &WorkspaceLayout,
        settings: &Settings,
        timing: &Timing,
    ) -> Result<Self, SpawnError> {
        let program = resolve_interpreter(layout, settings, timing).await?;
        Ok(Self {
            program,
            args: vec!["-m".to_string(), BRIDGE_MODULE.to_string(), "--daemon".to_string()],
            skip_version_gate: false,
        })
    }

    /// Explicit command, bypassing resolution and the version gate.
    pub fn explicit(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, skip_version_gate: true }
    }
}

/// A spawned worker with its stdio split out.
pub struct WorkerProcess {
    pub pid: u32,
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

impl WorkerProcess {
    /// Version-gate the interpreter (once per command) and spawn the worker
    /// rooted at the workspace with unbuffered output and credentials in
    /// the environment.
    pub async fn spawn(
        command: &WorkerCommand,
        layout: &WorkspaceLayout,
        settings: &Settings,
        credentials: &CredentialSet,
    ) -> Result<Self, SpawnError> {
        if !command.skip_version_gate {
            check_interpreter_version(&command.program).await?;
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(layout.root())
            .env("PYTHONUNBUFFERED", "1")
            .env("MB_WORKSPACE", layout.root())
            .env("MB_DAEMON_MODE", "1")
            .env("MB_DEBUG", if settings.debug_logging { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        for (key, value) in credentials.env_pairs() {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id().ok_or(SpawnError::StdioUnavailable)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        match (stdin, stdout, stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => {
                info!(pid, program = %command.program.display(), "worker spawned");
                Ok(Self { pid, child, stdin, stdout, stderr })
            }
            _ => {
                // Should not happen with piped stdio, but a half-spawned
                // worker must not linger.
                let _ = child.start_kill();
                Err(SpawnError::StdioUnavailable)
            }
        }
    }
}

/// Resolution order: explicit setting, managed venv (waiting out an
/// in-progress refresh), then the platform default chain.
async fn resolve_interpreter(
    layout: &WorkspaceLayout,
    settings: &Settings,
    timing: &Timing,
) -> Result<PathBuf, SpawnError> {
    if let Some(explicit) = &settings.python_path {
        if explicit.exists() {
            return Ok(explicit.clone());
        }
        return Err(SpawnError::InterpreterNotFound(format!(
            "configured python_path {} does not exist",
            explicit.display()
        )));
    }

    let venv_python = layout.venv_python();
    if venv_python.exists() {
        return Ok(venv_python);
    }

    // The env manager may be rebuilding the venv right now; give it a
    // bounded chance to finish instead of falling through to a system
    // interpreter with the wrong packages.
    if layout.venv_refresh_marker().exists() {
        debug!("venv refresh in progress, waiting");
        let deadline = tokio::time::Instant::now() + timing.venv_refresh_wait;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(timing.venv_refresh_poll).await;
            if venv_python.exists() {
                return Ok(venv_python);
            }
        }
        return Err(SpawnError::InterpreterNotFound(
            "managed environment refresh did not finish in time".to_string(),
        ));
    }

    for candidate in platform_fallback_chain() {
        if let Some(path) = which(candidate) {
            return Ok(path);
        }
    }

    Err(SpawnError::InterpreterNotFound(
        "no python interpreter on PATH and no managed environment".to_string(),
    ))
}

fn platform_fallback_chain() -> &'static [&'static str] {
    if cfg!(windows) {
        &["python", "py"]
    } else {
        &["python3", "python"]
    }
}

/// Minimal PATH search; avoids shelling out for a lookup we do once.
fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

/// Run `<python> --version` once and require a supported range.
async fn check_interpreter_version(path: &Path) -> Result<(), SpawnError> {
    let output = Command::new(path)
        .arg("--version")
        .output()
        .await
        .map_err(|e| SpawnError::VersionCheckFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    // Old interpreters print the version on stderr.
    let raw = if output.stdout.is_empty() { &output.stderr } else { &output.stdout };
    let text = String::from_utf8_lossy(raw);
    let version = text.trim();

    match parse_python_minor(version) {
        Some(minor) if (MIN_MINOR..=MAX_MINOR).contains(&minor) => Ok(()),
        Some(_) => Err(SpawnError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: version.to_string(),
        }),
        None => Err(SpawnError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: if version.is_empty() { "<no output>".to_string() } else { version.to_string() },
        }),
    }
}

/// `"Python 3.12.4"` → `Some(12)`.
fn parse_python_minor(version: &str) -> Option<u32> {
    let rest = version.strip_prefix("Python ")?;
    let mut parts = rest.split('.');
    let major: u32 = parts.next()?.trim().parse().ok()?;
    if major != 3 {
        return None;
    }
    parts.next()?.trim().parse().ok()
}

/// Signal-zero liveness probe.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid_i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn pid_alive(pid: u32) -> bool {
    // tasklist exits 0 and prints the image name when the PID exists.
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Polite termination: SIGTERM on unix, `taskkill /T` on windows.
#[cfg(unix)]
pub fn terminate(pid: u32) {
    if let Ok(pid_i32) = i32::try_from(pid) {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid_i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .output();
}

/// Force kill: SIGKILL on unix, `taskkill /F /T` on windows.
#[cfg(unix)]
pub fn force_kill(pid: u32) {
    if let Ok(pid_i32) = i32::try_from(pid) {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid_i32),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
}

#[cfg(not(unix))]
pub fn force_kill(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F", "/T"])
        .output();
}

/// Read a decimal PID from a file; `None` on missing or malformed content.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    match content.trim().parse() {
        Ok(pid) => Some(pid),
        Err(_) => {
            warn!(path = %path.display(), "ignoring malformed PID file");
            None
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
