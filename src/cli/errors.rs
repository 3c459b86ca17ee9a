//! Restore-tool error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::ClientError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("backup file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot resolve an absolute path for {}: {source}", .path.display())]
    BadPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("backup path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type CliResult<T> = Result<T, CliError>;
