//! The log-replay engine.
//!
//! Drives one backup log against the store, row by row, newest mutation
//! first. Because of that ordering, the first write the store accepts for
//! any key is definitionally the most recent one; every later row for the
//! same key is redundant and counts as skipped. Nothing is ever applied
//! twice from the same source row.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::backlog::{BackupLog, EntrySource, LogEntry, LogStep};
use crate::store::{ApplyOutcome, StoreAdapter};

use super::errors::{RestoreError, RestoreResult};
use super::job::RestoreJob;

/// How a replay run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every row in the log was presented to the store.
    Completed,
    /// The cancellation flag was observed; remaining rows were left alone.
    Aborted,
}

pub struct Replayer;

impl Replayer {
    /// Replay the job's backup file into `store`.
    ///
    /// Opening or preparing the log fails with an I/O error and leaves the
    /// job with zero applied rows.
    pub fn process<S: StoreAdapter>(
        job: &RestoreJob,
        store: &S,
        cancel: &AtomicBool,
    ) -> RestoreResult<ReplayOutcome> {
        let log = BackupLog::open(job.file())?;
        let mut cursor = log.cursor();
        Self::run(&mut cursor, store, job, cancel)
    }

    /// Drive `source` until it ends, fails, or cancellation is observed.
    ///
    /// Exposed at this granularity so the loop can be exercised against a
    /// scripted source. The cancellation flag is polled once per step; a
    /// row already handed to the store is never un-applied.
    pub fn run<L: EntrySource + ?Sized, S: StoreAdapter>(
        source: &mut L,
        store: &S,
        job: &RestoreJob,
        cancel: &AtomicBool,
    ) -> RestoreResult<ReplayOutcome> {
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(ReplayOutcome::Aborted);
            }
            match source.next_step()? {
                LogStep::Entry(entry) => Self::apply(&entry, store, job)?,
                LogStep::Busy => job.note_busy_retry(),
                LogStep::End => return Ok(ReplayOutcome::Completed),
            }
        }
    }

    fn apply<S: StoreAdapter>(
        entry: &LogEntry,
        store: &S,
        job: &RestoreJob,
    ) -> RestoreResult<()> {
        match store.apply_unless_present(entry) {
            ApplyOutcome::Applied => {
                job.note_restored();
                Ok(())
            }
            ApplyOutcome::AlreadyPresent => {
                job.note_skipped();
                Ok(())
            }
            ApplyOutcome::Failed => Err(RestoreError::data(format!(
                "store refused a row for vbucket {}",
                entry.vbucket
            ))),
        }
    }
}
