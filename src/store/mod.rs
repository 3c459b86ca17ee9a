//! The conditional-apply contract restore drives
//!
//! Replay hands rows to the store newest-first, so the store only ever
//! has to answer one question: has this key already been touched during
//! the restore? The first accepted write per (vbucket, key) is by
//! construction the most recent one; everything after it is redundant and
//! must be skipped, not overwritten.

mod adapter;
mod mem;

pub use adapter::{ApplyOutcome, StoreAdapter};
pub use mem::{MemStore, RestoredRow};
