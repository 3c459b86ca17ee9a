//! Frame encoding and decoding.
//!
//! Header layout, offsets in bytes:
//!
//! ```text
//!  0     magic            1  request 0x80 / response 0x81
//!  1     opcode           1
//!  2     key length       2  big-endian
//!  4     extras length    1
//!  5     data type        1
//!  6     status/vbucket   2  big-endian; status in responses
//!  8     body length      4  big-endian; extras + key + value
//! 12     opaque           4
//! 16     cas              8
//! ```

use thiserror::Error;

pub const HEADER_LEN: usize = 24;

pub const MAGIC_REQUEST: u8 = 0x80;
pub const MAGIC_RESPONSE: u8 = 0x81;

/// Operations the restore tool issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Stat = 0x10,
    StartRestore = 0x91,
    FinalizeRestore = 0x92,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Response status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    KeyNotFound,
    NotSupported,
    InternalError,
    Other(u16),
}

impl Status {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => Status::Success,
            0x0001 => Status::KeyNotFound,
            0x0083 => Status::NotSupported,
            0x0084 => Status::InternalError,
            other => Status::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Status::Success => 0x0000,
            Status::KeyNotFound => 0x0001,
            Status::NotSupported => 0x0083,
            Status::InternalError => 0x0084,
            Status::Other(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::KeyNotFound => f.write_str("not found"),
            Status::NotSupported => f.write_str("not supported"),
            Status::InternalError => f.write_str("internal error"),
            Status::Other(code) => write!(f, "unknown error 0x{:04x}", code),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid response magic byte 0x{0:02x}")]
    BadMagic(u8),

    #[error("frame key length {key} exceeds body length {body}")]
    KeyOverflow { key: usize, body: usize },
}

/// A request frame. The operations restore uses carry no extras and no
/// value, so the body is exactly the key.
#[derive(Debug, Clone)]
pub struct Request {
    pub opcode: Opcode,
    pub key: Vec<u8>,
    pub opaque: u32,
}

impl Request {
    pub fn new(opcode: Opcode, key: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            key: key.into(),
            opaque: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let key_len = self.key.len() as u16;
        let body_len = self.key.len() as u32;

        let mut frame = Vec::with_capacity(HEADER_LEN + self.key.len());
        frame.push(MAGIC_REQUEST);
        frame.push(self.opcode.as_u8());
        frame.extend_from_slice(&key_len.to_be_bytes());
        frame.push(0); // extras length
        frame.push(0); // data type
        frame.extend_from_slice(&0u16.to_be_bytes()); // vbucket
        frame.extend_from_slice(&body_len.to_be_bytes());
        frame.extend_from_slice(&self.opaque.to_be_bytes());
        frame.extend_from_slice(&0u64.to_be_bytes()); // cas
        frame.extend_from_slice(&self.key);
        frame
    }
}

/// A decoded response frame.
#[derive(Debug, Clone)]
pub struct Response {
    pub opcode: u8,
    pub status: Status,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Header fields the client needs before it can read the body.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_len: usize,
    pub extras_len: usize,
    pub status: Status,
    pub body_len: usize,
}

impl ResponseHeader {
    pub fn decode(header: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        if header[0] != MAGIC_RESPONSE {
            return Err(FrameError::BadMagic(header[0]));
        }
        Ok(Self {
            opcode: header[1],
            key_len: u16::from_be_bytes([header[2], header[3]]) as usize,
            extras_len: header[4] as usize,
            status: Status::from_code(u16::from_be_bytes([header[6], header[7]])),
            body_len: u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize,
        })
    }

    /// Split a fully read body into key and value.
    pub fn split_body(self, body: Vec<u8>) -> Result<Response, FrameError> {
        let key_end = self.extras_len + self.key_len;
        if key_end > body.len() {
            return Err(FrameError::KeyOverflow {
                key: key_end,
                body: body.len(),
            });
        }
        let key = body[self.extras_len..key_end].to_vec();
        let value = body[key_end..].to_vec();
        Ok(Response {
            opcode: self.opcode,
            status: self.status,
            key,
            value,
        })
    }
}
