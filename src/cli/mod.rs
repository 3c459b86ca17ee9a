//! Command-line restore tool
//!
//! A thin remote client: it connects to a running engine's management
//! port and drives the restore subsystem over the binary protocol. All
//! safety checks happen server-side; any non-success answer is fatal to
//! the tool.

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run;
pub use errors::{CliError, CliResult};
