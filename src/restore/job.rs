//! One restore job, bound to one backup file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters are atomic so `stats` can read them while the worker thread
/// advances them; they only ever grow during a run.
pub struct RestoreJob {
    file: PathBuf,
    restored: AtomicU64,
    skipped: AtomicU64,
    busy_retries: AtomicU64,
}

impl RestoreJob {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            restored: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            busy_retries: AtomicU64::new(0),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Rows the store accepted.
    pub fn restored(&self) -> u64 {
        self.restored.load(Ordering::Relaxed)
    }

    /// Rows shadowed by a newer value the store had already taken.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Transient log-store contention events; none of them consumed a row.
    pub fn busy_retries(&self) -> u64 {
        self.busy_retries.load(Ordering::Relaxed)
    }

    pub(crate) fn note_restored(&self) {
        self.restored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_busy_retry(&self) {
        self.busy_retries.fetch_add(1, Ordering::Relaxed);
    }
}
