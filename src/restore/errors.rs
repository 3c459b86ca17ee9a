//! Restore error model.
//!
//! Every fallible restore operation reports a structured error: a kind
//! with a stable code, a human-readable message, and the underlying cause
//! when there is one. No failure mode is hidden behind a plain string.

use std::error::Error;
use std::fmt;
use std::path::Path;

use crate::backlog::LogError;

/// What went wrong, at the granularity callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorKind {
    /// The backup path does not exist.
    NotFound,
    /// The operation is not allowed in the manager's current state.
    InvalidState,
    /// The backup log could not be opened or queried.
    Io,
    /// The store rejected a row; the job was aborted.
    Data,
    /// The worker thread could not be spawned or joined.
    Thread,
}

impl RestoreErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            RestoreErrorKind::NotFound => "EMBER_RESTORE_NOT_FOUND",
            RestoreErrorKind::InvalidState => "EMBER_RESTORE_INVALID_STATE",
            RestoreErrorKind::Io => "EMBER_RESTORE_IO",
            RestoreErrorKind::Data => "EMBER_RESTORE_DATA",
            RestoreErrorKind::Thread => "EMBER_RESTORE_THREAD",
        }
    }
}

impl fmt::Display for RestoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug)]
pub struct RestoreError {
    kind: RestoreErrorKind,
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl RestoreError {
    fn new(
        kind: RestoreErrorKind,
        message: impl Into<String>,
        source: Option<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source,
        }
    }

    pub fn not_found(path: &Path) -> Self {
        Self::new(
            RestoreErrorKind::NotFound,
            format!("backup file not found: {}", path.display()),
            None,
        )
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::InvalidState, message, None)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::Data, message, None)
    }

    pub fn thread(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::Thread, message, None)
    }

    pub fn thread_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(RestoreErrorKind::Thread, message, Some(Box::new(source)))
    }

    pub fn kind(&self) -> RestoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LogError> for RestoreError {
    fn from(err: LogError) -> Self {
        Self::new(
            RestoreErrorKind::Io,
            "backup log unavailable",
            Some(Box::new(err)),
        )
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

pub type RestoreResult<T> = Result<T, RestoreError>;
