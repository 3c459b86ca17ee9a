//! Concurrency primitives for cross-thread handoff
//!
//! This is the leaf layer the restore subsystem builds on:
//!
//! - [`SpinLock`]: busy-wait mutual exclusion for critical sections that
//!   are a pointer swap plus a counter update, nothing more.
//! - [`SharedHandle`] / [`UniqueHandle`]: intrusive atomically-counted
//!   ownership handles. The count's transition to zero is the unique
//!   destruction trigger and fires exactly once, no matter how many
//!   threads raced to drop their copies.
//! - [`atomic`]: compare-and-swap retry helpers for monotonic watermarks
//!   and guarded value handoffs.

pub mod atomic;
mod handle;
mod spinlock;

pub use handle::{SharedHandle, UniqueHandle};
pub use spinlock::{SpinGuard, SpinLock};
