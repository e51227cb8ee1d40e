//! # Protocol Errors
//!
//! Failures raised while decoding meta protocol responses.

use thiserror::Error;

/// Result alias for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Response bytes that do not match the meta protocol grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Status line contained no return code at all.
    #[error("empty status line")]
    EmptyStatusLine,
    /// Status line started with a token that is not a known return code.
    #[error("unknown return code in status line: {0:?}")]
    UnknownReturnCode(String),
    /// Known return code that is not valid for the command that was sent.
    #[error("unexpected return code {0} for this command")]
    UnexpectedReturnCode(&'static str),
    /// `VA` line carried a missing or non-numeric size token.
    #[error("invalid value size in status line: {0:?}")]
    InvalidSize(String),
    /// Data block was not followed by CRLF.
    #[error("data block missing CRLF terminator")]
    MissingTerminator,
    /// Buffer ended before a complete response was available.
    #[error("incomplete response")]
    Incomplete,
}
