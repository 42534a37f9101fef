//! # Error Types
//!
//! Error handling for the relay protocol core.
//!
//! This module defines the two error layers of the crate:
//!
//! - [`ProtocolError`]: the crate-wide error returned by the Atom codec,
//!   the configuration loader and everything layered above the raw sockets.
//! - [`SockError`]: the closed transport taxonomy produced by the TCP
//!   client and server paths. It mirrors the conditions a peer connection
//!   can actually hit (refused, reset, timeout, resolution failures, ...)
//!   and nothing else, so callers can match exhaustively.
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use relay_protocol::error::Result;
//! use relay_protocol::core::atom::Atom;
//!
//! fn tagged(value: i32) -> Result<Atom> {
//!     // Names longer than four characters are rejected here.
//!     Atom::with_int("chan", value)
//! }
//!
//! assert!(tagged(7144).is_ok());
//! ```

use std::io;
use thiserror::Error;

/// Closed taxonomy of transport failures.
///
/// Mirrors the set of conditions a client connect/read/write or a server
/// bind can report. `Net` is the catch-all for transport failures not
/// covered by a more specific case. The "no error" state is represented by
/// the absence of a value (`Option<SockError>`), not by a variant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockError {
    #[error("Send or receive timed out")]
    Timeout,

    #[error("Connection aborted")]
    ConnAborted,

    #[error("Connection reset by peer")]
    ConnReset,

    #[error("Connection refused")]
    ConnRefused,

    #[error("Invalid address")]
    Address,

    #[error("Host not found")]
    HostNotFound,

    #[error("Network interface not found")]
    InterfaceNotFound,

    #[error("No address found")]
    NoAddressFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Name resolution failed")]
    Dns,

    #[error("Network error")]
    Net,
}

impl SockError {
    /// Translate an `io::Error` from the socket layer into the closed
    /// taxonomy. Anything without a more specific case collapses to `Net`.
    pub fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SockError::Timeout,
            io::ErrorKind::ConnectionAborted => SockError::ConnAborted,
            io::ErrorKind::ConnectionReset => SockError::ConnReset,
            io::ErrorKind::ConnectionRefused => SockError::ConnRefused,
            io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput => SockError::Address,
            _ => SockError::Net,
        }
    }
}

/// Primary error type for codec, stream and service operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Socket error: {0}")]
    Socket(#[from] SockError),

    /// Atom name was empty or longer than four characters.
    #[error("Invalid atom name: {0:?}")]
    InvalidName(String),

    /// The stream ended before a complete atom could be read.
    #[error("Truncated stream while decoding atom")]
    Truncated,

    /// The stream stopped accepting bytes mid-encode.
    #[error("Short write while encoding atom")]
    ShortWrite,

    /// A decoded tree exceeded the configured nesting depth.
    #[error("Atom nesting deeper than {0} levels")]
    DepthLimit(usize),

    /// A decode call exceeded its total byte budget.
    #[error("Atom decode exceeded {0} byte budget")]
    SizeLimit(usize),

    #[error("Stream closed")]
    StreamClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
