//! Thin blocking client for remote restore control.

use std::io::{Read, Write};
use std::net::TcpStream;

use thiserror::Error;

use super::frame::{Opcode, Request, Response, ResponseHeader, Status, HEADER_LEN};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("i/o error talking to the server: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame from the server: {0}")]
    Frame(#[from] super::frame::FrameError),

    /// The server answered with a non-success status.
    #[error("{context}: {status}{}", fmt_detail(.detail))]
    Rejected {
        context: &'static str,
        status: Status,
        detail: String,
    },
}

fn fmt_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}

/// One connection to the engine's management port.
pub struct RestoreClient {
    stream: TcpStream,
}

impl RestoreClient {
    pub fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port)).map_err(|source| ClientError::Connect {
            host: host.to_string(),
            port,
            source,
        })?;
        Ok(Self { stream })
    }

    /// Ask the server to begin restoring from `path`.
    ///
    /// The path must be absolute from the server's point of view; the
    /// caller resolves it before sending.
    pub fn start_restore(&mut self, path: &str) -> Result<(), ClientError> {
        self.round_trip(Opcode::StartRestore, path.as_bytes(), "failed to start restore")?;
        Ok(())
    }

    /// Tell the server the restore cycle is over.
    pub fn finalize_restore(&mut self) -> Result<(), ClientError> {
        self.round_trip(
            Opcode::FinalizeRestore,
            b"",
            "failed to leave restore mode",
        )?;
        Ok(())
    }

    /// Fetch one stat group.
    ///
    /// The server streams key/value frames and closes the group with an
    /// empty-key frame.
    pub fn stats(&mut self, group: &str) -> Result<Vec<(String, String)>, ClientError> {
        self.send(&Request::new(Opcode::Stat, group.as_bytes()))?;

        let mut lines = Vec::new();
        loop {
            let response = self.read_response()?;
            if !response.status.is_success() {
                return Err(Self::rejected("failed to fetch stats", response));
            }
            if response.key.is_empty() {
                return Ok(lines);
            }
            lines.push((
                String::from_utf8_lossy(&response.key).into_owned(),
                String::from_utf8_lossy(&response.value).into_owned(),
            ));
        }
    }

    fn round_trip(
        &mut self,
        opcode: Opcode,
        key: &[u8],
        context: &'static str,
    ) -> Result<Response, ClientError> {
        self.send(&Request::new(opcode, key))?;
        let response = self.read_response()?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(Self::rejected(context, response))
        }
    }

    fn rejected(context: &'static str, response: Response) -> ClientError {
        ClientError::Rejected {
            context,
            status: response.status,
            detail: String::from_utf8_lossy(&response.value).into_owned(),
        }
    }

    fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        self.stream.write_all(&request.encode())?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let header = ResponseHeader::decode(&header)?;

        let mut body = vec![0u8; header.body_len];
        self.stream.read_exact(&mut body)?;
        Ok(header.split_body(body)?)
    }
}
