// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use mb_core::{SystemClock, WorkspaceLayout};

use super::{Acquire, LockKeeper, LockOwnerMetadata};
use crate::env::Timing;

fn keeper(layout: &WorkspaceLayout) -> LockKeeper {
    LockKeeper::new(layout.clone(), &Timing::from_env())
}

fn keeper_with_stale_age(layout: &WorkspaceLayout, age: Duration) -> LockKeeper {
    let timing = Timing { stale_lock_age: age, ..Timing::from_env() };
    LockKeeper::new(layout.clone(), &timing)
}

/// Dead PID far above any real pid_max.
const DEAD_PID: u32 = 3_999_999;

#[test]
fn acquire_writes_owner_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());
    let mut lock = keeper(&layout);

    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
    assert!(lock.is_held());
    assert!(layout.lock_dir().is_dir());

    let owner = lock.owner_snapshot().unwrap();
    assert_eq!(owner.extension_host_pid, std::process::id());
    assert_eq!(owner.instance_id, lock.instance_id());
    assert_eq!(owner.workspace_identifier, layout.workspace_identifier());
    // Owner metadata must never leak the absolute workspace path.
    assert!(!owner.workspace_identifier.contains('/'));
}

#[test]
fn second_keeper_sees_held_while_owner_alive() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    let mut first = keeper(&layout);
    assert_eq!(first.acquire(&SystemClock).unwrap(), Acquire::Acquired);

    // Owner metadata points at this (live) process, so no sweep happens.
    let mut second = keeper(&layout);
    assert_eq!(second.acquire(&SystemClock).unwrap(), Acquire::Held);
    assert!(!second.is_held());
    assert!(layout.lock_dir().is_dir(), "contender must not delete a live lock");
}

#[test]
fn acquire_release_acquire_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());
    let mut lock = keeper(&layout);

    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
    lock.release();
    assert!(!lock.is_held());
    assert!(!layout.lock_dir().exists());

    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
}

#[test]
fn release_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());
    let mut lock = keeper(&layout);

    lock.acquire(&SystemClock).unwrap();
    lock.release();
    lock.release();
    assert!(!layout.lock_dir().exists());
}

#[test]
fn acquire_is_idempotent_while_held() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());
    let mut lock = keeper(&layout);

    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
}

#[test]
fn dead_owner_lock_is_recovered() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    // Simulate a crashed host: lock dir + metadata + pid file, all dead.
    std::fs::create_dir_all(layout.lock_dir()).unwrap();
    let owner = LockOwnerMetadata {
        created_at_ms: 0,
        extension_host_pid: DEAD_PID,
        instance_id: "dead-instance".to_string(),
        workspace_identifier: "w".to_string(),
    };
    std::fs::write(layout.owner_meta_path(), serde_json::to_string(&owner).unwrap()).unwrap();
    std::fs::write(layout.pid_path(), DEAD_PID.to_string()).unwrap();

    let mut lock = keeper(&layout);
    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);

    // Fresh metadata replaced the dead owner's.
    let owner = lock.owner_snapshot().unwrap();
    assert_eq!(owner.extension_host_pid, std::process::id());
}

#[test]
fn live_daemon_pid_blocks_recovery_even_with_dead_owner() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    std::fs::create_dir_all(layout.lock_dir()).unwrap();
    let owner = LockOwnerMetadata {
        created_at_ms: 0,
        extension_host_pid: DEAD_PID,
        instance_id: "other".to_string(),
        workspace_identifier: "w".to_string(),
    };
    std::fs::write(layout.owner_meta_path(), serde_json::to_string(&owner).unwrap()).unwrap();
    // Daemon PID file points at a live process (this one).
    std::fs::write(layout.pid_path(), std::process::id().to_string()).unwrap();

    let mut lock = keeper(&layout);
    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Held);
}

#[test]
fn corrupt_metadata_on_fresh_lock_is_not_swept() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    std::fs::create_dir_all(layout.lock_dir()).unwrap();
    std::fs::write(layout.owner_meta_path(), "{ not json").unwrap();

    // Default stale age (10 min) far exceeds the directory's age.
    let mut lock = keeper(&layout);
    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Held);
    assert!(layout.lock_dir().is_dir());
}

#[test]
fn corrupt_metadata_past_age_threshold_is_swept() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    std::fs::create_dir_all(layout.lock_dir()).unwrap();
    std::fs::write(layout.owner_meta_path(), "{ not json").unwrap();

    // Zero threshold makes any directory "old".
    let mut lock = keeper_with_stale_age(&layout, Duration::ZERO);
    assert_eq!(lock.acquire(&SystemClock).unwrap(), Acquire::Acquired);
}

#[test]
fn drop_releases_the_lock() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(tmp.path());

    {
        let mut lock = keeper(&layout);
        lock.acquire(&SystemClock).unwrap();
        assert!(layout.lock_dir().is_dir());
    }
    assert!(!layout.lock_dir().exists());
}
