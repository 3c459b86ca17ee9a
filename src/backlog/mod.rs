//! Incremental checkpoint backup logs
//!
//! A backup file is a SQLite database written by the backup tooling. It
//! carries two tables this module consumes read-only:
//!
//! - a checkpoint-state table keyed by (vbucket, checkpoint) with a status
//!   column; only checkpoints recorded as `closed` are visible to replay
//! - a checkpoint-operation table keyed by (vbucket, checkpoint, sequence)
//!   carrying the operation code, key, flags, expiry, cas and value
//!
//! Rows are streamed in replay order: checkpoint id descending, then
//! sequence descending, so the most recently closed mutation for a key is
//! seen first. Transient lock contention inside the file is surfaced as a
//! [`LogStep::Busy`] step, not an error.

mod entry;
mod errors;
mod reader;

pub use entry::{LogEntry, LogOp};
pub use errors::LogError;
pub use reader::{BackupLog, EntrySource, LogStep, ReplayCursor};
