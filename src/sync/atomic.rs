//! Lock-free update helpers.
//!
//! Each helper is a load / compare / compare-and-swap loop that retries
//! against the freshest observed value until the update either succeeds or
//! its condition stops holding. They express monotonic watermarks and
//! guarded handoffs without taking a lock.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// A primitive atomic cell the helpers below can drive.
pub trait CasCell {
    type Value: Copy + PartialOrd + PartialEq;

    fn load(&self) -> Self::Value;

    /// On failure returns the value actually observed.
    fn compare_exchange(
        &self,
        current: Self::Value,
        new: Self::Value,
    ) -> Result<Self::Value, Self::Value>;
}

macro_rules! impl_cas_cell {
    ($atomic:ty, $prim:ty) => {
        impl CasCell for $atomic {
            type Value = $prim;

            fn load(&self) -> $prim {
                <$atomic>::load(self, Ordering::SeqCst)
            }

            fn compare_exchange(&self, current: $prim, new: $prim) -> Result<$prim, $prim> {
                <$atomic>::compare_exchange(self, current, new, Ordering::SeqCst, Ordering::SeqCst)
            }
        }
    };
}

impl_cas_cell!(AtomicU32, u32);
impl_cas_cell!(AtomicU64, u64);
impl_cas_cell!(AtomicUsize, usize);
impl_cas_cell!(AtomicI64, i64);

/// Raise `cell` to `candidate` unless it already holds something bigger.
pub fn store_if_greater<C: CasCell>(cell: &C, candidate: C::Value) {
    let mut current = cell.load();
    while candidate > current {
        match cell.compare_exchange(current, candidate) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Lower `cell` to `candidate` unless it already holds something smaller.
pub fn store_if_less<C: CasCell>(cell: &C, candidate: C::Value) {
    let mut current = cell.load();
    while candidate < current {
        match cell.compare_exchange(current, candidate) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Swap `new` into `cell` unless the current value equals `sentinel`.
///
/// Returns the last value observed: the caller can tell a refused swap
/// (the return equals `sentinel`) from a successful one.
pub fn swap_unless<C: CasCell>(cell: &C, sentinel: C::Value, new: C::Value) -> C::Value {
    loop {
        let current = cell.load();
        if current == sentinel {
            return current;
        }
        if cell.compare_exchange(current, new).is_ok() {
            return current;
        }
    }
}
