//! # relay-protocol
//!
//! Transport and protocol core for a peer-to-peer media-relay node.
//!
//! Peers exchange structured control and media messages as "Atom" trees:
//! named nodes that are either ordered lists of child atoms or opaque
//! byte leaves, framed on the wire as a 4-byte name, a little-endian
//! length field whose high bit discriminates list from data, and the
//! payload. This crate owns that wire contract and the blocking TCP
//! plumbing that carries it.
//!
//! ## Components
//! - [`core`]: the Atom data model and its hardened binary codec
//! - [`transport`]: the [`transport::ByteStream`] seam, the in-memory
//!   stream, and the TCP client/server with the closed error taxonomy
//! - [`service`]: the node/channel façade the relay state machine (out
//!   of scope here) composes with the codec and transport
//! - [`config`]: TOML node configuration
//! - [`error`]: crate-wide error types
//!
//! ## Example
//! ```rust
//! use relay_protocol::core::atom::Atom;
//! use relay_protocol::transport::MemoryStream;
//!
//! let mut hello = Atom::list("helo").unwrap();
//! hello.push_child(Atom::with_string("agnt", "relay-protocol").unwrap());
//! hello.push_child(Atom::with_short("port", 7144).unwrap());
//!
//! let mut buf = MemoryStream::new();
//! hello.write_to(&mut buf).unwrap();
//! let echoed = Atom::read_from(&mut buf).unwrap();
//! assert_eq!(echoed, hello);
//! ```
//!
//! ## Concurrency model
//! Blocking I/O with one worker thread per in-flight server connection,
//! capped by the listener's client limit. Client reads and writes block
//! up to a fixed 3-second timeout. There is no async runtime in this
//! crate.

pub mod config;
pub mod core;
pub mod error;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::NodeConfig;
pub use crate::core::atom::{Atom, AtomName, AtomValue};
pub use crate::core::codec::DecodeLimits;
pub use crate::error::{ProtocolError, Result, SockError};
pub use crate::service::{Channel, ChannelStatus, ContentSink, RelayNode};
pub use crate::transport::{
    last_sock_error, ByteStream, MemoryStream, SockFamily, TcpClient, TcpServer,
};
