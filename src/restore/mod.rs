//! Online restore of incremental checkpoint backups
//!
//! Replays a backup log into the live store without stopping the server.
//! An external trigger binds a job to a backup file (`initialize`), spawns
//! the dedicated worker thread (`start`), and later observes or reclaims
//! the job (`stats`, `wait`). The worker streams the log's closed
//! checkpoints newest-first through the store's conditional apply, so
//! re-applying a backup is idempotent: the first accepted write for a key
//! is the most recent one, and everything older is skipped.

mod errors;
mod job;
mod manager;
mod replayer;

pub use errors::{RestoreError, RestoreErrorKind, RestoreResult};
pub use job::RestoreJob;
pub use manager::{JobOutcome, RestoreManager, RestoreState};
pub use replayer::{ReplayOutcome, Replayer};
