//! Observability for the restore subsystem
//!
//! One synchronous structured logger. Log lines are JSON objects with the
//! event name first and the remaining fields in deterministic order, so
//! output is both machine-parseable and diffable.

mod logger;

pub use logger::{Logger, Severity};
