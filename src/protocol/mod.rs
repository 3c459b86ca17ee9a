//! Binary wire protocol for remote restore control
//!
//! Requests and responses share a fixed 24-byte header followed by the
//! key and body bytes, all integers in network byte order. Three
//! operations matter to restore:
//!
//! - start-restore: the absolute backup path travels as the key
//! - finalize-restore: empty frame, status-only answer
//! - stat: optional stat-group name as the key; the server answers with
//!   zero or more key/value frames and terminates the stream with an
//!   empty-key frame
//!
//! The server's connection-handling side lives elsewhere; this module is
//! the codec plus the thin blocking client the management tool uses.

mod client;
mod frame;

pub use client::{ClientError, RestoreClient};
pub use frame::{FrameError, Opcode, Request, Response, Status, HEADER_LEN};
