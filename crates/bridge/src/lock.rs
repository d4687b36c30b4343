// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-exclusive lock for the bridge daemon.
//!
//! Atomic directory creation is the exclusivity primitive: the editor host
//! that creates `daemon.lock/` owns the workspace's worker slot, across all
//! editor processes sharing the directory. Owner metadata inside the lock
//! is advisory; it exists for stale detection and diagnostics, and a failed
//! metadata write never invalidates a held lock.

use std::io::ErrorKind;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mb_core::{Clock, WorkspaceLayout};

use crate::env::Timing;
use crate::process::{pid_alive, read_pid_file};

/// Outcome of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    /// Another live instance owns the lock; the caller must not spawn.
    Held,
}

/// Metadata written into the lock directory on acquisition.
///
/// Never contains absolute paths: the workspace is identified by basename
/// only so lock contents stay shareable in bug reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwnerMetadata {
    pub created_at_ms: u64,
    pub extension_host_pid: u32,
    /// Fresh UUID per acquisition, used only for log correlation.
    pub instance_id: String,
    pub workspace_identifier: String,
}

/// Why a lock was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaleReason {
    OwnerPidDead,
    MetadataMissingAndOld,
}

impl StaleReason {
    fn as_str(&self) -> &'static str {
        match self {
            StaleReason::OwnerPidDead => "owner_pid_dead",
            StaleReason::MetadataMissingAndOld => "metadata_missing_and_old",
        }
    }
}

pub struct LockKeeper {
    layout: WorkspaceLayout,
    stale_age: Duration,
    /// UUID for this keeper; becomes `instance_id` in owner metadata.
    instance_id: String,
    held: bool,
}

impl LockKeeper {
    pub fn new(layout: WorkspaceLayout, timing: &Timing) -> Self {
        Self {
            layout,
            stale_age: timing.stale_lock_age,
            instance_id: uuid::Uuid::new_v4().to_string(),
            held: false,
        }
    }

    /// True iff this instance created the lock and has not released it.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Current owner metadata, if readable. For diagnostics only.
    pub fn owner_snapshot(&self) -> Option<LockOwnerMetadata> {
        let content = std::fs::read_to_string(self.layout.owner_meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Acquire the workspace lock.
    ///
    /// On contention, performs stale-lock recovery at most once: if the
    /// recorded daemon and owner are both dead (or the metadata is
    /// missing and the directory old), the lock is swept and `mkdir`
    /// retried exactly once.
    pub fn acquire(&mut self, clock: &impl Clock) -> std::io::Result<Acquire> {
        if self.held {
            return Ok(Acquire::Acquired);
        }

        match self.try_create(clock) {
            Ok(()) => return Ok(Acquire::Acquired),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }

        // Contended. One bounded recovery pass, then give up.
        match self.stale_reason(clock) {
            Some(reason) => {
                info!(
                    reason = reason.as_str(),
                    instance_id = %self.instance_id,
                    "sweeping stale lock"
                );
                std::fs::remove_dir_all(self.layout.lock_dir())?;
                match self.try_create(clock) {
                    Ok(()) => Ok(Acquire::Acquired),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        // Another instance won the retry; that is a valid
                        // outcome of a lock fight, not an error.
                        self.log_contention(clock);
                        Ok(Acquire::Held)
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                self.log_contention(clock);
                Ok(Acquire::Held)
            }
        }
    }

    fn try_create(&mut self, clock: &impl Clock) -> std::io::Result<()> {
        let lock_dir = self.layout.lock_dir();
        if let Some(parent) = lock_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir(&lock_dir)?;
        self.held = true;

        // Metadata is advisory; the mkdir already won us the lock.
        let metadata = LockOwnerMetadata {
            created_at_ms: clock.epoch_ms(),
            extension_host_pid: std::process::id(),
            instance_id: self.instance_id.clone(),
            workspace_identifier: self.layout.workspace_identifier(),
        };
        if let Err(e) = self.write_owner_metadata(&metadata) {
            warn!(error = %e, "lock acquired but owner metadata write failed");
        }
        Ok(())
    }

    fn write_owner_metadata(&self, metadata: &LockOwnerMetadata) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(metadata).map_err(std::io::Error::other)?;
        // Write-then-rename so a reader never sees a torn owner.json.
        let tmp = self.layout.lock_dir().join("owner.json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, self.layout.owner_meta_path())
    }

    /// Stale iff the daemon PID is gone/dead AND the owner host is gone
    /// (dead PID, or unreadable metadata on a sufficiently old directory).
    fn stale_reason(&self, clock: &impl Clock) -> Option<StaleReason> {
        if self.held {
            // Never judge our own lock stale.
            return None;
        }

        let daemon_pid = read_pid_file(&self.layout.pid_path());
        if let Some(pid) = daemon_pid {
            if pid_alive(pid) {
                return None;
            }
        }

        match self.owner_snapshot() {
            Some(owner) => {
                if pid_alive(owner.extension_host_pid) {
                    None
                } else {
                    Some(StaleReason::OwnerPidDead)
                }
            }
            None => {
                // No metadata to consult; only age makes this safe to sweep.
                if self.lock_age(clock).is_some_and(|age| age > self.stale_age) {
                    Some(StaleReason::MetadataMissingAndOld)
                } else {
                    None
                }
            }
        }
    }

    fn lock_age(&self, _clock: &impl Clock) -> Option<Duration> {
        let meta = std::fs::metadata(self.layout.lock_dir()).ok()?;
        meta.modified().ok()?.elapsed().ok()
    }

    fn log_contention(&self, clock: &impl Clock) {
        let owner = self.owner_snapshot();
        let owner_pid = owner.as_ref().map(|o| o.extension_host_pid);
        debug!(
            instance_id = %self.instance_id,
            owner_instance_id = owner.as_ref().map(|o| o.instance_id.as_str()).unwrap_or("?"),
            owner_pid = owner_pid.unwrap_or(0),
            owner_pid_alive = owner_pid.map(pid_alive).unwrap_or(false),
            lock_age_ms = self.lock_age(clock).map(|a| a.as_millis() as u64).unwrap_or(0),
            extension_host_pid = std::process::id(),
            "workspace lock held by another instance"
        );
    }

    /// Best-effort release; idempotent. Only removes a lock we created.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        if let Err(e) = std::fs::remove_dir_all(self.layout.lock_dir()) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, "failed to remove lock directory");
            }
        }
    }

    pub fn lock_path(&self) -> std::path::PathBuf {
        self.layout.lock_dir()
    }
}

impl Drop for LockKeeper {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
