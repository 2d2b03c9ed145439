//! Error types for the cache engine and client session
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Encoding Error ==
/// A key or value that cannot be placed in a request frame.
///
/// Raised on the client before any byte is written to the channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Field contains a byte outside the 7-bit ASCII range
    #[error("{field} contains non-ASCII data")]
    NonAscii { field: &'static str },

    /// Field contains a NUL byte, which is reserved for padding
    #[error("{field} contains a NUL byte")]
    ContainsNul { field: &'static str },

    /// Field is longer than its fixed width
    #[error("{field} is {len} bytes, maximum is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Key is empty
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// Value ends with `\n`, which a reader strips from the response
    #[error("{field} ends with a line terminator")]
    TrailingNewline { field: &'static str },
}

// == Protocol Error ==
/// A frame that does not follow the wire protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Request command byte is not `I`, `G` or `R`
    #[error("unknown command byte 0x{0:02x}")]
    UnknownCommand(u8),

    /// Response status byte is not `A`, `V`, `M` or `E`
    #[error("unknown response status 0x{0:02x}")]
    UnknownStatus(u8),

    /// A decoded field holds bytes it may not hold
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// The stream ended in the middle of a frame
    #[error("stream ended with a partial frame of {len} bytes")]
    TruncatedFrame { len: usize },

    /// The engine answered with a response of the wrong kind
    #[error("unexpected {got} response to {command} request")]
    UnexpectedResponse {
        command: &'static str,
        got: &'static str,
    },
}

// == Cache Error Enum ==
/// Unified error type for the cache client and engine.
///
/// A miss is not an error: `get` returns `Ok(None)` for absent or expired keys.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Request rejected locally before it was sent
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Frame did not follow the protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Engine answered with an error frame
    #[error("Rejected by engine: {0}")]
    Rejected(String),

    /// No response arrived within the configured window
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Channel was closed, by request or by the engine exiting
    #[error("Connection closed")]
    ConnectionClosed,

    /// Session has not been started
    #[error("Session not started")]
    NotStarted,

    /// Channel was torn down after a timeout and must be restarted
    #[error("Channel poisoned by an earlier timeout; restart the session")]
    Poisoned,

    /// I/O error on the channel or while spawning the engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache crate.
pub type Result<T> = std::result::Result<T, CacheError>;
