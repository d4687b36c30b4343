// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability traits the editor host injects into the supervisor and
//! gateway.
//!
//! Host collaborators (secret storage, notifications, the background-job
//! service) arrive as small trait objects so the core never links against a
//! particular editor surface and tests can substitute fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Editor-host secret storage.
///
/// Values are credential material; implementations must not log them and
/// must not write them to world-readable files.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> std::io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> std::io::Result<()>;
    fn delete(&self, key: &str) -> std::io::Result<()>;
}

/// File-backed secret store for the CLI surface. JSON map, 0600 on unix.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> std::io::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, content)?;
        restrict_permissions(&self.path)
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn delete(&self, key: &str) -> std::io::Result<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// User-visible notification surface.
///
/// Implementations must be cheap and non-blocking; throttling is layered on
/// top of this trait, not inside implementations.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Notifier that drops everything. Used by headless surfaces and tests.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _level: NotifyLevel, _message: &str) {}
}

/// Identifier for a long-running background operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationId(pub String);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Background-operation service errors.
#[derive(Debug, Clone, Error)]
pub enum BackgroundError {
    #[error("background operation queue is full")]
    QueueFull,

    #[error("background operation service unavailable: {0}")]
    Unavailable(String),
}

/// The external long-running job service.
///
/// The supervisor consults `active_operations` before idle shutdown; the
/// ingest coordinator enqueues cognify jobs through `start_operation`.
pub trait BackgroundOps: Send + Sync {
    fn active_operations(&self) -> usize;

    fn start_operation(
        &self,
        digest: &str,
        workspace: &Path,
        payload: serde_json::Value,
    ) -> Result<OperationId, BackgroundError>;
}

/// Absent background service: never busy, cannot run anything.
#[derive(Debug, Clone, Default)]
pub struct NullBackgroundOps;

impl BackgroundOps for NullBackgroundOps {
    fn active_operations(&self) -> usize {
        0
    }

    fn start_operation(
        &self,
        _digest: &str,
        _workspace: &Path,
        _payload: serde_json::Value,
    ) -> Result<OperationId, BackgroundError> {
        Err(BackgroundError::Unavailable("no background service configured".to_string()))
    }
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
