//! Backup-log error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure opening or querying a backup log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open backup log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("backup log query failed: {source}")]
    Query {
        #[source]
        source: rusqlite::Error,
    },
}

impl LogError {
    pub fn open(path: &Path, source: rusqlite::Error) -> Self {
        LogError::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn query(source: rusqlite::Error) -> Self {
        LogError::Query { source }
    }
}
