//! ember-restore entry point
//!
//! A minimal entrypoint: parse arguments, dispatch to the CLI module,
//! exit non-zero on failure. All logic lives in `cli`.

use emberdb::cli;
use emberdb::observability::Logger;

fn main() {
    if let Err(e) = cli::run() {
        Logger::fatal("RESTORE_TOOL_FAILED", &[("error", &e.to_string())]);
        std::process::exit(1);
    }
}
