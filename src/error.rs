//! NNTP error types

use thiserror::Error;

use crate::store::StoreError;

/// NNTP protocol and connection errors
///
/// Protocol-level problems (unknown verb, bad argument, missing group) are
/// not errors: handlers answer them with a numeric reply and the session
/// continues. This enum covers the conditions that end a session.
#[derive(Error, Debug)]
pub enum NntpError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during handshake or secure I/O
    #[error("TLS error: {0}")]
    Tls(String),

    /// Read or write deadline expired
    #[error("Connection timeout")]
    Timeout,

    /// Peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Line exceeded the configured maximum length
    #[error("Line exceeds maximum length of {0} bytes")]
    LineTooLong(usize),

    /// Multi-line data block exceeded the configured maximum size
    #[error("Data block exceeds maximum size of {0} bytes")]
    DataTooLarge(usize),

    /// Compressed stream could not be inflated or deflated
    #[error("Compression error: {0}")]
    Compression(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl NntpError {
    /// Whether the session should terminate without attempting a final reply.
    ///
    /// Transport and framing failures mean the socket can no longer be
    /// trusted; only store failures get a best-effort `403` first.
    pub fn is_silent(&self) -> bool {
        !matches!(self, NntpError::Store(_))
    }
}

/// Result type alias using NntpError
pub type Result<T> = std::result::Result<T, NntpError>;
