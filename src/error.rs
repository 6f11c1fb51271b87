//! Error types for gpsd client operations
//!
//! This module defines the error taxonomy of the client: failures to reach
//! the daemon, failures of an established report stream, and malformed
//! report frames. Each is a distinct type so callers can pick a recovery
//! policy per category.

use thiserror::Error;

use crate::client::{ConnectionState, Endpoint};

/// Main error type for gpsd client operations
#[derive(Debug, Error)]
pub enum GpsdClientError {
    /// The daemon could not be reached
    ///
    /// Fatal to that `open` attempt. Callers may retry with backoff.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The report stream failed while reading
    ///
    /// The connection is unusable afterwards. The recommended policy is to
    /// close the client and open a new one.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// A report frame could not be decoded
    ///
    /// The frame boundary is intact, so the caller may skip the frame
    /// and keep reading.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A control request could not be written to the daemon
    #[error("failed to send request to gpsd: {0}")]
    Send(#[source] std::io::Error),

    /// The connection was used after it failed
    ///
    /// This is a usage error. It is returned before touching the transport.
    #[error("connection is {0:?}, expected Open")]
    InvalidState(ConnectionState),
}

impl GpsdClientError {
    /// Returns true if reading may continue on the same connection
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GpsdClientError::Decode(_))
    }
}

/// Failure to establish a connection to the daemon
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The service is neither a port number nor a known service name
    #[error("unknown service name {0:?}")]
    UnknownService(String),

    /// Name resolution of the host failed
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// Name resolution succeeded but produced no addresses
    #[error("no addresses found for {0}")]
    NoAddress(Endpoint),

    /// Every resolved address refused or failed the connection
    ///
    /// `source` is the transport error of the last attempt and carries
    /// the OS error code.
    #[error("no gpsd running or network error at {endpoint}: {source}")]
    Unreachable {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the report stream
#[derive(Debug, Error)]
pub enum ReadError {
    /// The daemon closed the connection, or it was closed locally
    #[error("connection closed by gpsd")]
    Closed,

    /// The transport reported an error
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or unrecognizable report frame
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not a valid JSON report
    #[error("malformed report frame: {source}")]
    Json {
        /// The offending frame, without its line terminator
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    /// The frame exceeded the maximum frame length before a newline was seen
    #[error("report frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },
}
