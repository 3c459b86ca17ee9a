//! Store-side application contract.

use crate::backlog::LogEntry;

/// Result of one conditional apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The row was accepted; nothing newer existed for its key.
    Applied,
    /// A newer value for the key was already applied.
    AlreadyPresent,
    /// The store rejected the row outright. Fatal to the job.
    Failed,
}

/// The single operation the engine exposes to restore.
///
/// Implementations must tolerate concurrent calls: live client traffic
/// keeps hitting the store while a restore is in progress.
pub trait StoreAdapter: Send + Sync {
    fn apply_unless_present(&self, entry: &LogEntry) -> ApplyOutcome;
}

impl<T: StoreAdapter + ?Sized> StoreAdapter for std::sync::Arc<T> {
    fn apply_unless_present(&self, entry: &LogEntry) -> ApplyOutcome {
        (**self).apply_unless_present(entry)
    }
}
