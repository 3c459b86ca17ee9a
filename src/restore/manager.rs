//! The restore job state machine.
//!
//! At most one job and one worker thread are live per manager. All public
//! operations may be called from any thread; transitions and the job slot
//! are serialized through one mutex, and that mutex is never held across
//! the replay loop, so `stats` never waits on backup-log I/O.
//!
//! The worker reaches the shared control block through a [`SharedHandle`]
//! clone and the job through a [`UniqueHandle`] clone created under the
//! manager lock; the job clone is the worker's borrow and ends when the
//! worker's terminal transition has been published.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{Builder, JoinHandle};

use crate::observability::Logger;
use crate::store::StoreAdapter;
use crate::sync::{SharedHandle, UniqueHandle};

use super::errors::{RestoreError, RestoreResult};
use super::job::RestoreJob;
use super::replayer::{ReplayOutcome, Replayer};

/// Lifecycle of the manager.
///
/// `Zombie` is terminal-but-reapable: the worker has finished but has not
/// been joined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Uninitialized,
    Initialized,
    Starting,
    Running,
    Zombie,
}

impl RestoreState {
    pub fn as_str(self) -> &'static str {
        match self {
            RestoreState::Uninitialized => "uninitialized",
            RestoreState::Initialized => "initialized",
            RestoreState::Starting => "starting",
            RestoreState::Running => "running",
            RestoreState::Zombie => "zombie",
        }
    }
}

/// How the most recent run ended. Recorded at the worker's terminal
/// transition so failure is observable instead of being inferred from
/// counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Aborted,
    Failed { code: &'static str, message: String },
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Aborted => "aborted",
            JobOutcome::Failed { .. } => "failed",
        }
    }
}

struct Inner {
    state: RestoreState,
    job: Option<UniqueHandle<RestoreJob>>,
    worker: Option<JoinHandle<()>>,
    outcome: Option<JobOutcome>,
}

struct ControlBlock<S> {
    inner: Mutex<Inner>,
    /// Signalled when a reap finishes; late `wait` callers park here.
    reaped: Condvar,
    /// The shared cancellation flag `abort` raises.
    cancel: AtomicBool,
    store: S,
}

impl<S> ControlBlock<S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn transition(inner: &mut Inner, next: RestoreState) {
    Logger::info(
        "RESTORE_STATE",
        &[("from", inner.state.as_str()), ("to", next.as_str())],
    );
    inner.state = next;
}

pub struct RestoreManager<S> {
    control: SharedHandle<ControlBlock<S>>,
}

impl<S: StoreAdapter + 'static> RestoreManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            control: SharedHandle::new(ControlBlock {
                inner: Mutex::new(Inner {
                    state: RestoreState::Uninitialized,
                    job: None,
                    worker: None,
                    outcome: None,
                }),
                reaped: Condvar::new(),
                cancel: AtomicBool::new(false),
                store,
            }),
        }
    }

    /// Bind a new job to `path`.
    ///
    /// Allowed from `Uninitialized`, or from `Zombie`, which reaps the
    /// finished worker first. Any other state is busy.
    pub fn initialize(&self, path: &Path) -> RestoreResult<()> {
        if !path.exists() {
            return Err(RestoreError::not_found(path));
        }

        self.with_control(|control| {
            let mut inner = control.lock();
            match inner.state {
                RestoreState::Uninitialized => {}
                RestoreState::Zombie => reap_zombie(&mut inner)?,
                _ => {
                    return Err(RestoreError::invalid_state(
                        "restore manager is not idle",
                    ))
                }
            }

            debug_assert!(inner.job.is_none());
            inner.job = Some(UniqueHandle::new(RestoreJob::new(path)));
            inner.outcome = None;
            control.cancel.store(false, Ordering::SeqCst);
            transition(&mut inner, RestoreState::Initialized);
            Ok(())
        })
    }

    /// Spawn the worker thread for the bound job.
    pub fn start(&self) -> RestoreResult<()> {
        self.with_control(|control| {
            let mut inner = control.lock();

            let job = match (&inner.state, &inner.job) {
                (RestoreState::Initialized, Some(job)) => job.clone(),
                (_, None) => {
                    return Err(RestoreError::invalid_state(
                        "you need to call initialize before start",
                    ))
                }
                _ => {
                    return Err(RestoreError::invalid_state(
                        "restore is already running",
                    ))
                }
            };

            transition(&mut inner, RestoreState::Starting);

            let control_for_worker = self.control.clone();
            let spawned = Builder::new()
                .name("ember-restore".to_string())
                .spawn(move || worker_main(control_for_worker, job));

            match spawned {
                Ok(handle) => {
                    inner.worker = Some(handle);
                    Ok(())
                }
                Err(err) => {
                    inner.job = None;
                    transition(&mut inner, RestoreState::Uninitialized);
                    Err(RestoreError::thread_io(
                        "failed to spawn restore worker",
                        err,
                    ))
                }
            }
        })
    }

    /// Raise the shared cancellation flag.
    ///
    /// Non-blocking; the worker observes the flag at its next row
    /// boundary, so termination is prompt but not immediate.
    pub fn abort(&self) {
        self.control.with(|control| {
            control.cancel.store(true, Ordering::SeqCst);
        });
    }

    /// Join the worker, free the job, and return to `Uninitialized`.
    ///
    /// Idempotent. The join happens outside the manager lock so the
    /// worker's own terminal transition can never deadlock against it;
    /// concurrent callers park until the reaping thread is done.
    pub fn wait(&self) -> RestoreResult<()> {
        self.with_control(|control| {
            let mut inner = control.lock();
            loop {
                match inner.state {
                    RestoreState::Uninitialized | RestoreState::Initialized => return Ok(()),
                    _ => {}
                }

                if let Some(worker) = inner.worker.take() {
                    drop(inner);
                    let joined = worker.join();

                    inner = control.lock();
                    inner.job = None;
                    transition(&mut inner, RestoreState::Uninitialized);
                    control.reaped.notify_all();

                    return joined
                        .map_err(|_| RestoreError::thread("restore worker panicked"));
                }

                // Another caller holds the join handle; wait for its reap.
                inner = control
                    .reaped
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        })
    }

    /// True while a worker thread exists and has not finished.
    pub fn is_running(&self) -> bool {
        self.control
            .with(|control| {
                matches!(
                    control.lock().state,
                    RestoreState::Starting | RestoreState::Running
                )
            })
            .unwrap_or(false)
    }

    /// Emit the `restore` stat group.
    ///
    /// Safe from any thread at any time; holds the manager lock only long
    /// enough to read the state, the counters, and the flag.
    pub fn stats(&self, emit: &mut dyn FnMut(&str, &str)) {
        let emitted = self.control.with(|control| {
            let inner = control.lock();
            emit("state", inner.state.as_str());

            if let Some(job) = &inner.job {
                let file = job.file().display().to_string();
                emit("file", &file);
                emit("number_busy", &job.busy_retries().to_string());
                emit("number_skipped", &job.skipped().to_string());
                emit("number_restored", &job.restored().to_string());
                let terminate = control.cancel.load(Ordering::SeqCst);
                emit("terminate", if terminate { "true" } else { "false" });
            }

            if let Some(outcome) = &inner.outcome {
                emit("outcome", outcome.as_str());
                if let JobOutcome::Failed { message, .. } = outcome {
                    emit("last_error", message);
                }
            }
        });

        if emitted.is_none() {
            emit("state", RestoreState::Uninitialized.as_str());
        }
    }

    fn with_control<R>(
        &self,
        f: impl FnOnce(&ControlBlock<S>) -> RestoreResult<R>,
    ) -> RestoreResult<R> {
        match self.control.with(f) {
            Some(result) => result,
            None => Err(RestoreError::invalid_state("restore manager is shut down")),
        }
    }
}

impl<S> Drop for RestoreManager<S> {
    fn drop(&mut self) {
        // Join any worker before the control block goes away, then detach
        // the slot so late clones observe an empty handle.
        if let Some(handle) = self
            .control
            .with(|control| control.lock().worker.take())
            .flatten()
        {
            let _ = handle.join();
        }
        self.control.replace(None);
    }
}

/// Join a worker that already reached `Zombie` and free its job.
///
/// Safe to perform under the manager lock: the worker published its
/// terminal transition before the state became visible as `Zombie`, so
/// the join cannot wait on anything that needs the lock.
fn reap_zombie(inner: &mut Inner) -> RestoreResult<()> {
    if let Some(worker) = inner.worker.take() {
        worker
            .join()
            .map_err(|_| RestoreError::thread("restore worker panicked"))?;
    }
    inner.job = None;
    transition(inner, RestoreState::Uninitialized);
    Ok(())
}

/// Worker-thread entry point.
fn worker_main<S: StoreAdapter>(
    control: SharedHandle<ControlBlock<S>>,
    job: UniqueHandle<RestoreJob>,
) {
    control.with(|control| {
        {
            let mut inner = control.lock();
            transition(&mut inner, RestoreState::Running);
        }

        // The replay loop runs with no manager lock held.
        let outcome = match Replayer::process(&*job, &control.store, &control.cancel) {
            Ok(ReplayOutcome::Completed) => JobOutcome::Completed,
            Ok(ReplayOutcome::Aborted) => JobOutcome::Aborted,
            Err(err) => {
                Logger::error(
                    "RESTORE_FAILED",
                    &[("code", err.kind().code()), ("error", err.message())],
                );
                JobOutcome::Failed {
                    code: err.kind().code(),
                    message: err.message().to_string(),
                }
            }
        };

        let mut inner = control.lock();
        Logger::info(
            "RESTORE_FINISHED",
            &[
                ("outcome", outcome.as_str()),
                ("restored", &job.restored().to_string()),
                ("skipped", &job.skipped().to_string()),
                ("busy", &job.busy_retries().to_string()),
            ],
        );
        inner.outcome = Some(outcome);
        transition(&mut inner, RestoreState::Zombie);
    });
    // The job clone drops here: the worker's borrow ends only after the
    // terminal transition is visible to reapers.
}
