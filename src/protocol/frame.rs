//! Frame Codec Module
//!
//! Fixed-width 128-byte request and response frames.
//!
//! # Request layout
//! ```text
//! Insert:      'I' | key[63] | value[56] | inserted_at[6, BE] | ttl_seconds[2, BE]
//! Get/Remove:  cmd | key[127]
//! ```
//!
//! # Response layout
//! ```text
//! status[1] | payload[56] | reserved[71]
//! ```
//! `status` is `A` (ack), `V` (value), `M` (miss) or `E` (error). Text fields are
//! ASCII and zero-padded. Fields longer than their width are rejected when
//! encoding a request; they are never truncated.

use crate::cache::{Clock, SystemClock};
use crate::error::{EncodingError, ProtocolError};

// == Layout Constants ==
/// Size of every frame on the wire, in both directions
pub const FRAME_SIZE: usize = 128;
/// Width of the command / status byte
pub const COMMAND_WIDTH: usize = 1;
/// Maximum key length accepted by an Insert request
pub const INSERT_KEY_WIDTH: usize = 63;
/// Maximum key length accepted by a Get or Remove request
pub const LOOKUP_KEY_WIDTH: usize = 127;
/// Maximum value length
pub const VALUE_WIDTH: usize = 56;
/// Width of the big-endian insertion timestamp
pub const TIMESTAMP_WIDTH: usize = 6;
/// Width of the big-endian TTL
pub const TTL_WIDTH: usize = 2;
/// Width of the response payload
pub const RESPONSE_PAYLOAD_WIDTH: usize = 56;

const INSERT_KEY: usize = COMMAND_WIDTH;
const INSERT_VALUE: usize = INSERT_KEY + INSERT_KEY_WIDTH;
const INSERT_TIMESTAMP: usize = INSERT_VALUE + VALUE_WIDTH;
const INSERT_TTL: usize = INSERT_TIMESTAMP + TIMESTAMP_WIDTH;
const RESPONSE_PAYLOAD: usize = COMMAND_WIDTH;
const RESPONSE_PAYLOAD_END: usize = RESPONSE_PAYLOAD + RESPONSE_PAYLOAD_WIDTH;

const STATUS_ACK: u8 = b'A';
const STATUS_VALUE: u8 = b'V';
const STATUS_MISS: u8 = b'M';
const STATUS_ERROR: u8 = b'E';

/// One fixed-width unit on the wire.
pub type Frame = [u8; FRAME_SIZE];

// == Command ==
/// Request discriminant carried in the first byte of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Insert,
    Get,
    Remove,
}

impl Command {
    /// Wire byte for this command.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Insert => b'I',
            Command::Get => b'G',
            Command::Remove => b'R',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Insert => "insert",
            Command::Get => "get",
            Command::Remove => "remove",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'I' => Ok(Command::Insert),
            b'G' => Ok(Command::Get),
            b'R' => Ok(Command::Remove),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

// == Request ==
/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Insert {
        key: String,
        value: String,
        /// Client-side UNIX seconds, low 48 bits on the wire
        inserted_at: u64,
        ttl_seconds: u16,
    },
    Get {
        key: String,
    },
    Remove {
        key: String,
    },
}

impl Request {
    /// Builds an Insert request stamped with the current time.
    pub fn insert(key: impl Into<String>, value: impl Into<String>, ttl_seconds: u16) -> Self {
        Request::Insert {
            key: key.into(),
            value: value.into(),
            inserted_at: SystemClock.now(),
            ttl_seconds,
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Request::Get { key: key.into() }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Request::Remove { key: key.into() }
    }

    pub fn command(&self) -> Command {
        match self {
            Request::Insert { .. } => Command::Insert,
            Request::Get { .. } => Command::Get,
            Request::Remove { .. } => Command::Remove,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Request::Insert { key, .. } | Request::Get { key } | Request::Remove { key } => key,
        }
    }

    // == Encode ==
    /// Encodes the request into exactly [`FRAME_SIZE`] bytes.
    ///
    /// Fails if the key is empty, if the key or value is non-ASCII,
    /// contains NUL, or exceeds its fixed width, or if the value ends with
    /// `\n` (readers strip one trailing line terminator from responses).
    pub fn encode(&self) -> Result<Frame, EncodingError> {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = self.command().as_byte();

        match self {
            Request::Insert {
                key,
                value,
                inserted_at,
                ttl_seconds,
            } => {
                write_text(&mut frame[INSERT_KEY..INSERT_VALUE], "key", key, false)?;
                if value.ends_with('\n') {
                    return Err(EncodingError::TrailingNewline { field: "value" });
                }
                write_text(&mut frame[INSERT_VALUE..INSERT_TIMESTAMP], "value", value, true)?;
                frame[INSERT_TIMESTAMP..INSERT_TTL]
                    .copy_from_slice(&inserted_at.to_be_bytes()[8 - TIMESTAMP_WIDTH..]);
                frame[INSERT_TTL..].copy_from_slice(&ttl_seconds.to_be_bytes());
            }
            Request::Get { key } | Request::Remove { key } => {
                write_text(&mut frame[COMMAND_WIDTH..], "key", key, false)?;
            }
        }

        Ok(frame)
    }

    // == Decode ==
    /// Decodes a request frame received by the engine.
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        match Command::try_from(frame[0])? {
            Command::Insert => {
                let key = read_text(&frame[INSERT_KEY..INSERT_VALUE], "key")?;
                let value = read_text(&frame[INSERT_VALUE..INSERT_TIMESTAMP], "value")?;
                if value.ends_with('\n') {
                    return Err(ProtocolError::InvalidField {
                        field: "value",
                        reason: "trailing line terminator",
                    });
                }

                let mut timestamp = [0u8; 8];
                timestamp[8 - TIMESTAMP_WIDTH..]
                    .copy_from_slice(&frame[INSERT_TIMESTAMP..INSERT_TTL]);
                let ttl_seconds = u16::from_be_bytes([frame[INSERT_TTL], frame[INSERT_TTL + 1]]);

                Ok(Request::Insert {
                    key: non_empty_key(key)?,
                    value,
                    inserted_at: u64::from_be_bytes(timestamp),
                    ttl_seconds,
                })
            }
            Command::Get => Ok(Request::Get {
                key: non_empty_key(read_text(&frame[COMMAND_WIDTH..], "key")?)?,
            }),
            Command::Remove => Ok(Request::Remove {
                key: non_empty_key(read_text(&frame[COMMAND_WIDTH..], "key")?)?,
            }),
        }
    }
}

// == Response ==
/// A response frame sent by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Insert or Remove completed
    Ack,
    /// Get found a live entry
    Value(String),
    /// Get found nothing, or only an expired entry
    Miss,
    /// Request could not be processed
    Error(String),
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Ack => "ack",
            Response::Value(_) => "value",
            Response::Miss => "miss",
            Response::Error(_) => "error",
        }
    }

    /// Encodes the response into exactly [`FRAME_SIZE`] bytes.
    ///
    /// Error messages are cut at [`RESPONSE_PAYLOAD_WIDTH`] bytes and any
    /// non-ASCII character is replaced with `?`.
    pub fn encode(&self) -> Frame {
        let mut frame = [0u8; FRAME_SIZE];

        let (status, payload) = match self {
            Response::Ack => (STATUS_ACK, None),
            Response::Value(value) => (STATUS_VALUE, Some(value.as_str())),
            Response::Miss => (STATUS_MISS, None),
            Response::Error(message) => (STATUS_ERROR, Some(message.as_str())),
        };

        frame[0] = status;
        if let Some(text) = payload {
            let slots = &mut frame[RESPONSE_PAYLOAD..RESPONSE_PAYLOAD_END];
            for (slot, byte) in slots.iter_mut().zip(text.bytes()) {
                *slot = if byte.is_ascii() && byte != 0 { byte } else { b'?' };
            }
        }

        frame
    }

    /// Decodes a response frame, stripping padding and one trailing line terminator.
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        let payload = || -> Result<String, ProtocolError> {
            let text = read_text(&frame[RESPONSE_PAYLOAD..RESPONSE_PAYLOAD_END], "payload")?;
            Ok(strip_line_terminator(text))
        };

        match frame[0] {
            STATUS_ACK => Ok(Response::Ack),
            STATUS_VALUE => Ok(Response::Value(payload()?)),
            STATUS_MISS => Ok(Response::Miss),
            STATUS_ERROR => Ok(Response::Error(payload()?)),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

// == Codec Functions ==
/// Encodes an Insert request stamped with the current time.
pub fn encode_insert(key: &str, value: &str, ttl_seconds: u16) -> Result<Frame, EncodingError> {
    Request::insert(key, value, ttl_seconds).encode()
}

pub fn encode_get(key: &str) -> Result<Frame, EncodingError> {
    Request::get(key).encode()
}

pub fn encode_remove(key: &str) -> Result<Frame, EncodingError> {
    Request::remove(key).encode()
}

pub fn decode_response(frame: &Frame) -> Result<Response, ProtocolError> {
    Response::decode(frame)
}

// == Field Helpers ==
fn write_text(
    slot: &mut [u8],
    field: &'static str,
    text: &str,
    allow_empty: bool,
) -> Result<(), EncodingError> {
    if text.is_empty() && !allow_empty {
        return Err(EncodingError::Empty { field });
    }
    if !text.is_ascii() {
        return Err(EncodingError::NonAscii { field });
    }
    if text.bytes().any(|b| b == 0) {
        return Err(EncodingError::ContainsNul { field });
    }
    if text.len() > slot.len() {
        return Err(EncodingError::TooLong {
            field,
            len: text.len(),
            max: slot.len(),
        });
    }

    slot[..text.len()].copy_from_slice(text.as_bytes());
    Ok(())
}

fn read_text(bytes: &[u8], field: &'static str) -> Result<String, ProtocolError> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = &bytes[..end];

    if text.contains(&0) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "embedded NUL byte",
        });
    }
    if !text.is_ascii() {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "non-ASCII byte",
        });
    }

    // ASCII is always valid UTF-8
    Ok(text.iter().map(|&b| b as char).collect())
}

fn non_empty_key(key: String) -> Result<String, ProtocolError> {
    if key.is_empty() {
        return Err(ProtocolError::InvalidField {
            field: "key",
            reason: "empty",
        });
    }
    Ok(key)
}

fn strip_line_terminator(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}
