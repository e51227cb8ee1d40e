//! # Client Errors

use mkv_common::ProtocolError;
use thiserror::Error;

/// Result type for the async client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by connections and the pool.
///
/// Absence is not an error: misses and store refusals come back as values.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid transport or pool settings, raised at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Response bytes did not match the meta protocol grammar.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Connect, write or read failure on the socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Server closed the socket before a full response arrived.
    #[error("connection closed by server")]
    ConnectionClosed,
    /// Configured connect or I/O deadline elapsed.
    #[error("operation timed out")]
    Timeout,
    /// JSON (de)serialization failed in a convenience call.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
