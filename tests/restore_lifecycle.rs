//! End-to-end lifecycle of the restore manager against real backup files.
//!
//! Exercises the invariants a remote operator relies on: one live job at
//! a time, newest-wins replay, observable counters and outcomes, and a
//! manager that always returns to `uninitialized` after a reap.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tempfile::TempDir;

use emberdb::backlog::LogEntry;
use emberdb::restore::{RestoreErrorKind, RestoreManager};
use emberdb::store::{ApplyOutcome, MemStore, StoreAdapter};

/// (vbucket, checkpoint, seq, op, key, cas, value)
type BackupRow<'a> = (u16, u32, u32, &'a str, &'a str, u64, &'a [u8]);

fn build_backup(path: &Path, rows: &[BackupRow<'_>]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE cpoint_state \
             (vbucket_id INTEGER, cpoint_id INTEGER, state TEXT); \
         CREATE TABLE cpoint_op \
             (vbucket_id INTEGER, cpoint_id INTEGER, seq INTEGER, \
              op TEXT, key TEXT, flg INTEGER, exp INTEGER, \
              cas INTEGER, val BLOB);",
    )
    .unwrap();

    let mut checkpoints = std::collections::HashSet::new();
    for &(vbucket, cpoint, seq, op, key, cas, val) in rows {
        if checkpoints.insert((vbucket, cpoint)) {
            conn.execute(
                "INSERT INTO cpoint_state VALUES (?1, ?2, 'closed')",
                rusqlite::params![vbucket, cpoint],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO cpoint_op VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7)",
            rusqlite::params![vbucket, cpoint, seq, op, key, cas as i64, val],
        )
        .unwrap();
    }
}

fn stat_map<S: StoreAdapter + 'static>(manager: &RestoreManager<S>) -> HashMap<String, String> {
    let mut stats = HashMap::new();
    manager.stats(&mut |key, value| {
        stats.insert(key.to_string(), value.to_string());
    });
    stats
}

fn wait_until_finished<S: StoreAdapter + 'static>(manager: &RestoreManager<S>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while manager.is_running() {
        assert!(Instant::now() < deadline, "restore worker never finished");
        std::thread::yield_now();
    }
}

/// Holds every apply until the gate is opened; used to pin the worker in
/// `running` deterministically.
struct GatedStore {
    inner: MemStore,
    open: Mutex<bool>,
    turnstile: Condvar,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemStore::new(1024),
            open: Mutex::new(false),
            turnstile: Condvar::new(),
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.turnstile.notify_all();
    }
}

impl StoreAdapter for GatedStore {
    fn apply_unless_present(&self, entry: &LogEntry) -> ApplyOutcome {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.turnstile.wait(open).unwrap();
        }
        drop(open);
        self.inner.apply_unless_present(entry)
    }
}

#[test]
fn test_newest_closed_checkpoint_wins() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(
        &path,
        &[
            (0, 2, 1, "m", "a", 200, b"v2"),
            (0, 1, 1, "m", "a", 100, b"v1"),
            (0, 1, 2, "m", "b", 101, b"w1"),
        ],
    );

    let store = Arc::new(MemStore::new(1024));
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();
    wait_until_finished(&manager);

    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("zombie"));
    assert_eq!(stats.get("number_restored").map(String::as_str), Some("2"));
    assert_eq!(stats.get("number_skipped").map(String::as_str), Some("1"));
    assert_eq!(stats.get("number_busy").map(String::as_str), Some("0"));
    assert_eq!(stats.get("outcome").map(String::as_str), Some("completed"));
    assert_eq!(stats.get("file").map(String::as_str), path.to_str());

    // Checkpoint 2's value for "a" won; checkpoint 1's was shadowed.
    assert_eq!(store.get(0, b"a").unwrap().value, b"v2");
    assert_eq!(store.get(0, b"b").unwrap().value, b"w1");

    manager.wait().unwrap();
    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("uninitialized"));
    assert!(!stats.contains_key("file"));
}

#[test]
fn test_every_closed_row_is_accounted_for() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    let rows: Vec<(String, u64)> = (0..50)
        .map(|i| (format!("key-{}", i % 17), i as u64))
        .collect();
    let built: Vec<BackupRow<'_>> = rows
        .iter()
        .enumerate()
        .map(|(i, (key, cas))| (0u16, 1u32, i as u32, "m", key.as_str(), *cas, b"v".as_slice()))
        .collect();
    build_backup(&path, &built);

    let manager = RestoreManager::new(MemStore::new(1024));
    manager.initialize(&path).unwrap();
    manager.start().unwrap();
    wait_until_finished(&manager);

    let stats = stat_map(&manager);
    let restored: u64 = stats.get("number_restored").unwrap().parse().unwrap();
    let skipped: u64 = stats.get("number_skipped").unwrap().parse().unwrap();
    assert_eq!(restored + skipped, 50);
    assert_eq!(restored, 17);

    manager.wait().unwrap();
}

#[test]
fn test_stats_before_initialize_only_report_state() {
    let manager = RestoreManager::new(MemStore::new(1024));
    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("uninitialized"));
    assert!(!stats.contains_key("file"));
    assert!(!stats.contains_key("number_restored"));
    assert!(!stats.contains_key("terminate"));
}

#[test]
fn test_start_before_initialize_is_a_state_error() {
    let manager = RestoreManager::new(MemStore::new(1024));
    let err = manager.start().unwrap_err();
    assert_eq!(err.kind(), RestoreErrorKind::InvalidState);
    assert_eq!(err.message(), "you need to call initialize before start");
}

#[test]
fn test_initialize_rejects_missing_file() {
    let dir = TempDir::new().unwrap();
    let manager = RestoreManager::new(MemStore::new(1024));
    let err = manager
        .initialize(&dir.path().join("absent.mbb"))
        .unwrap_err();
    assert_eq!(err.kind(), RestoreErrorKind::NotFound);
}

#[test]
fn test_initialize_while_running_is_a_state_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(&path, &[(0, 1, 1, "m", "k", 1, b"v")]);

    let store = Arc::new(GatedStore::new());
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();

    // The worker is parked inside the gated apply, so the manager is in
    // starting or running; both must refuse a second job.
    let err = manager.initialize(&path).unwrap_err();
    assert_eq!(err.kind(), RestoreErrorKind::InvalidState);
    assert!(manager.is_running());

    store.release();
    manager.wait().unwrap();
    assert!(!manager.is_running());
}

#[test]
fn test_abort_during_replay_yields_aborted_outcome() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    // Two rows: the worker blocks on the first apply, observes the flag
    // before the second.
    build_backup(
        &path,
        &[(0, 1, 2, "m", "first", 2, b"x"), (0, 1, 1, "m", "second", 1, b"y")],
    );

    let store = Arc::new(GatedStore::new());
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();

    manager.abort();
    let stats = stat_map(&manager);
    assert_eq!(stats.get("terminate").map(String::as_str), Some("true"));

    store.release();
    manager.wait().unwrap();

    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("uninitialized"));
    assert_eq!(stats.get("outcome").map(String::as_str), Some("aborted"));
}

#[test]
fn test_data_error_reports_failed_outcome() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(
        &path,
        &[
            (0, 2, 1, "m", "good", 3, b"x"),
            // Out of range for an 8-vbucket store; fatal mid-stream.
            (900, 1, 2, "m", "poison", 2, b"y"),
            (0, 1, 1, "m", "after", 1, b"z"),
        ],
    );

    let store = Arc::new(MemStore::new(8));
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();
    wait_until_finished(&manager);

    let stats = stat_map(&manager);
    assert_eq!(stats.get("outcome").map(String::as_str), Some("failed"));
    assert!(stats.get("last_error").unwrap().contains("vbucket 900"));
    // Replay stopped at the poison row.
    assert_eq!(stats.get("number_restored").map(String::as_str), Some("1"));
    assert!(store.get(0, b"after").is_none());

    manager.wait().unwrap();
}

#[test]
fn test_manager_can_be_reused_across_backups() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("incr-1.mbb");
    let second = dir.path().join("incr-2.mbb");
    build_backup(&first, &[(0, 1, 1, "m", "a", 1, b"one")]);
    build_backup(&second, &[(0, 1, 1, "m", "b", 2, b"two")]);

    let store = Arc::new(MemStore::new(1024));
    let manager = RestoreManager::new(store.clone());

    for path in [&first, &second] {
        manager.initialize(path).unwrap();
        manager.start().unwrap();
        manager.wait().unwrap();
    }

    assert_eq!(store.get(0, b"a").unwrap().value, b"one");
    assert_eq!(store.get(0, b"b").unwrap().value, b"two");
}

#[test]
fn test_zombie_is_reaped_by_the_next_initialize() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(&path, &[(0, 1, 1, "m", "k", 1, b"v")]);

    let manager = RestoreManager::new(MemStore::new(1024));
    manager.initialize(&path).unwrap();
    manager.start().unwrap();
    wait_until_finished(&manager);

    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("zombie"));

    // No explicit wait(): initialize reaps the finished worker itself.
    manager.initialize(&path).unwrap();
    let stats = stat_map(&manager);
    assert_eq!(stats.get("state").map(String::as_str), Some("initialized"));
    assert_eq!(stats.get("number_restored").map(String::as_str), Some("0"));
}

#[test]
fn test_delete_rows_restore_as_tombstones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(
        &path,
        &[
            (0, 2, 1, "d", "gone", 5, b""),
            (0, 1, 1, "m", "gone", 1, b"stale"),
        ],
    );

    let store = Arc::new(MemStore::new(1024));
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();
    manager.wait().unwrap();

    let row = store.get(0, b"gone").unwrap();
    assert_eq!(row.op, emberdb::backlog::LogOp::Delete);
    assert_eq!(row.cas, 5);
}

#[test]
fn test_concurrent_stats_never_block_on_replay() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incr.mbb");
    build_backup(&path, &[(0, 1, 1, "m", "k", 1, b"v")]);

    let store = Arc::new(GatedStore::new());
    let manager = RestoreManager::new(store.clone());
    manager.initialize(&path).unwrap();
    manager.start().unwrap();

    // The worker is parked inside an apply with no manager lock held;
    // stats must come back immediately.
    let started = Instant::now();
    let stats = stat_map(&manager);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(stats.contains_key("state"));
    assert_eq!(stats.get("number_restored").map(String::as_str), Some("0"));

    store.release();
    manager.wait().unwrap();
}
