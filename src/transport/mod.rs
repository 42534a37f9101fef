//! # Transport Layer
//!
//! The byte-stream seam and the blocking TCP transports built on it.
//!
//! ## Components
//! - **ByteStream**: minimal duplex channel every transport implements
//! - **MemoryStream**: in-memory implementation for tests and replay
//! - **TcpClient**: connecting socket with fixed timeouts and the closed
//!   error taxonomy
//! - **TcpServer**: accept loop plus bounded worker pool, one handler
//!   invocation per connection
//!
//! Within one connection, reads and writes happen exactly in the order
//! they are issued. Nothing is ordered across connections.

pub mod server;
pub mod stream;
pub mod tcp;

pub use server::TcpServer;
pub use stream::{ByteStream, MemoryStream};
pub use tcp::{last_sock_error, SockFamily, TcpClient, SOCKET_TIMEOUT};
