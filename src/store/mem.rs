//! In-process store adapter.
//!
//! Backs the engine harness and the test suite. Keys are scoped by
//! vbucket; deletions are recorded as tombstone rows so a newer delete
//! shadows an older set the same way a newer set would.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::backlog::{LogEntry, LogOp};
use crate::sync::atomic::store_if_greater;

use super::adapter::{ApplyOutcome, StoreAdapter};

/// What a restore wrote for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredRow {
    pub op: LogOp,
    pub value: Vec<u8>,
    pub flags: u32,
    pub expiry: u32,
    pub cas: u64,
}

pub struct MemStore {
    slots: Mutex<HashMap<(u16, Vec<u8>), RestoredRow>>,
    /// Vbucket ids at or above this bound are rejected.
    max_vbuckets: u16,
    /// Highest cas accepted so far; raised monotonically.
    high_cas: AtomicU64,
}

impl MemStore {
    pub fn new(max_vbuckets: u16) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            max_vbuckets,
            high_cas: AtomicU64::new(0),
        }
    }

    pub fn get(&self, vbucket: u16, key: &[u8]) -> Option<RestoredRow> {
        self.lock_slots().get(&(vbucket, key.to_vec())).cloned()
    }

    /// Rows accepted so far, tombstones included.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }

    pub fn high_cas(&self) -> u64 {
        self.high_cas.load(Ordering::SeqCst)
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<(u16, Vec<u8>), RestoredRow>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StoreAdapter for MemStore {
    fn apply_unless_present(&self, entry: &LogEntry) -> ApplyOutcome {
        if entry.vbucket >= self.max_vbuckets {
            return ApplyOutcome::Failed;
        }

        let mut slots = self.lock_slots();
        match slots.entry((entry.vbucket, entry.key.clone())) {
            Entry::Occupied(_) => ApplyOutcome::AlreadyPresent,
            Entry::Vacant(slot) => {
                slot.insert(RestoredRow {
                    op: entry.op,
                    value: entry.value.clone(),
                    flags: entry.flags,
                    expiry: entry.expiry,
                    cas: entry.cas,
                });
                store_if_greater(&self.high_cas, entry.cas);
                ApplyOutcome::Applied
            }
        }
    }
}
