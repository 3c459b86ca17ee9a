//! Restore-tool command implementations.

use std::fs;
use std::thread;
use std::time::Duration;

use crate::config::Configuration;
use crate::observability::Logger;
use crate::protocol::RestoreClient;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    let config = Configuration::new();
    if let Some(path) = &cli.config {
        config.load_file(path)?;
    }

    let host = cli.host.clone().unwrap_or_else(|| config.restore_host());
    let port = cli.port.unwrap_or_else(|| config.restore_port());
    let mut client = RestoreClient::connect(&host, port)?;

    match cli.command {
        Command::Start { file } => {
            if !file.exists() {
                return Err(CliError::FileNotFound(file));
            }
            // The server opens the file itself, so it needs a path that
            // is absolute on its side of the socket.
            let absolute = fs::canonicalize(&file).map_err(|source| CliError::BadPath {
                path: file.clone(),
                source,
            })?;
            let path = absolute
                .to_str()
                .ok_or_else(|| CliError::NonUtf8Path(absolute.clone()))?;

            client.start_restore(path)?;
            Logger::info("RESTORE_REQUESTED", &[("file", path), ("host", &host)]);
            println!("restore started from {}", path);
        }

        Command::Status { count, interval_ms } => {
            let count = count.unwrap_or_else(|| config.restore_poll_count()).max(1);
            let interval = interval_ms
                .unwrap_or_else(|| config.restore_poll_interval_ms())
                .max(1);

            for round in 0..count {
                for (key, value) in client.stats("restore")? {
                    println!("STAT {} {}", key, value);
                }
                if round + 1 < count {
                    thread::sleep(Duration::from_millis(interval));
                }
            }
        }

        Command::Finalize => {
            client.finalize_restore()?;
            println!("server left restore mode");
        }
    }

    Ok(())
}
