//! Busy-wait mutual exclusion over a single atomic flag.
//!
//! Useful when contention is rare and the critical section is O(1).
//! Never hold the guard across I/O or any call that can block.

use std::sync::atomic::{AtomicBool, Ordering};

/// A lighter-weight, smaller lock than a mutex.
pub struct SpinLock {
    locked: AtomicBool,
}

/// Releases the lock on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the lock is acquired.
    ///
    /// Waits on a plain load between acquisition attempts so contending
    /// threads do not hammer the cache line with failed exchanges.
    pub fn lock(&self) -> SpinGuard<'_> {
        while !self.try_acquire() {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        SpinGuard { lock: self }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
