//! Blocking TCP client socket.
//!
//! [`TcpClient`] resolves a hostname, filters the resolved addresses by
//! protocol family, connects with fixed 3-second send/receive timeouts
//! and maps every transport failure into the closed [`SockError`]
//! taxonomy. It exposes itself as a [`ByteStream`] so the Atom codec can
//! run over it directly.
//!
//! Fallible operations return their error inline *and* record it in a
//! thread-local last-error cell (cleared again on every success). The
//! cell exists for callers ported from the original per-thread error
//! convention; new code should just match on the `Result`.

use crate::error::{ProtocolError, Result, SockError};
use crate::transport::stream::ByteStream;
use std::cell::Cell;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// Fixed send/receive timeout applied to every client connection.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

/// Protocol family filter applied to resolved addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SockFamily {
    /// Accept the first usable address of either family.
    #[default]
    Any,
    /// IPv4 only.
    Inet,
    /// IPv6 only.
    Inet6,
}

impl SockFamily {
    fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            SockFamily::Any => true,
            SockFamily::Inet => addr.is_ipv4(),
            SockFamily::Inet6 => addr.is_ipv6(),
        }
    }
}

thread_local! {
    static LAST_SOCK_ERROR: Cell<Option<SockError>> = const { Cell::new(None) };
}

/// The last socket error recorded on the calling thread, or `None` after
/// a successful operation. Each thread observes only its own slot.
pub fn last_sock_error() -> Option<SockError> {
    LAST_SOCK_ERROR.get()
}

pub(crate) fn record_sock_result(err: Option<SockError>) {
    LAST_SOCK_ERROR.set(err);
}

/// Resolve `host:port` and pick the first non-wildcard address matching
/// `family`.
///
/// A malformed host is an [`SockError::Address`]; any other lookup
/// failure is reported as [`SockError::Dns`], since the resolver does
/// not say which stage of the lookup failed. Port 0 names no service and
/// is rejected before the lookup.
pub(crate) fn resolve(
    family: SockFamily,
    host: &str,
    port: u16,
) -> std::result::Result<SocketAddr, SockError> {
    if port == 0 {
        return Err(SockError::ServiceNotFound);
    }
    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidInput {
            SockError::Address
        } else {
            SockError::Dns
        }
    })?;

    let mut resolved_any = false;
    for addr in addrs {
        resolved_any = true;
        if family.matches(&addr) && !addr.ip().is_unspecified() {
            return Ok(addr);
        }
    }
    if resolved_any {
        // Addresses came back, none usable for the requested family.
        Err(SockError::InterfaceNotFound)
    } else {
        Err(SockError::NoAddressFound)
    }
}

/// A connected TCP client socket with fixed timeouts.
#[derive(Debug)]
pub struct TcpClient {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
}

impl TcpClient {
    /// Resolve `host`, filter by `family` and connect.
    ///
    /// The 3-second send and receive timeouts are applied before the
    /// socket is handed back. On failure the error is also recorded in
    /// the thread-local cell and no socket exists.
    pub fn connect(
        family: SockFamily,
        host: &str,
        port: u16,
    ) -> std::result::Result<Self, SockError> {
        match Self::try_connect(family, host, port) {
            Ok(client) => {
                record_sock_result(None);
                debug!(host, port, "connected");
                Ok(client)
            }
            Err(err) => {
                record_sock_result(Some(err));
                debug!(host, port, error = %err, "connect failed");
                Err(err)
            }
        }
    }

    fn try_connect(
        family: SockFamily,
        host: &str,
        port: u16,
    ) -> std::result::Result<Self, SockError> {
        let addr = resolve(family, host, port)?;
        let stream = TcpStream::connect(addr).map_err(|e| SockError::from_io(&e))?;
        Self::configure(stream, addr)
    }

    /// Wrap an already-accepted connection (server side), applying the
    /// same timeouts as the connect path.
    pub(crate) fn from_accepted(stream: TcpStream) -> std::result::Result<Self, SockError> {
        let peer = stream.peer_addr().map_err(|e| SockError::from_io(&e))?;
        Self::configure(stream, peer)
    }

    fn configure(stream: TcpStream, peer: SocketAddr) -> std::result::Result<Self, SockError> {
        stream
            .set_read_timeout(Some(SOCKET_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(SOCKET_TIMEOUT)))
            .map_err(|e| SockError::from_io(&e))?;
        Ok(TcpClient {
            stream: Some(stream),
            peer: Some(peer),
        })
    }

    /// Peer address, while the socket is open.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Blocking read bounded by the receive timeout. `Ok(0)` is a
    /// graceful peer close, not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, SockError> {
        let Some(stream) = self.stream.as_mut() else {
            record_sock_result(Some(SockError::Net));
            return Err(SockError::Net);
        };
        match stream.read(buf) {
            Ok(n) => {
                record_sock_result(None);
                trace!(bytes = n, "read");
                Ok(n)
            }
            Err(e) => {
                let err = SockError::from_io(&e);
                record_sock_result(Some(err));
                Err(err)
            }
        }
    }

    /// Blocking write bounded by the send timeout.
    pub fn write(&mut self, buf: &[u8]) -> std::result::Result<usize, SockError> {
        let Some(stream) = self.stream.as_mut() else {
            record_sock_result(Some(SockError::Net));
            return Err(SockError::Net);
        };
        match stream.write(buf) {
            Ok(n) => {
                record_sock_result(None);
                trace!(bytes = n, "write");
                Ok(n)
            }
            Err(e) => {
                let err = SockError::from_io(&e);
                record_sock_result(Some(err));
                Err(err)
            }
        }
    }

    /// Shut down and release the connection. Idempotent; an already
    /// closed transport is not an error.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            if let Some(peer) = self.peer {
                debug!(%peer, "closed");
            }
        }
        self.peer = None;
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl ByteStream for TcpClient {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        TcpClient::read(self, buf).map_err(ProtocolError::Socket)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        TcpClient::write(self, buf).map_err(ProtocolError::Socket)
    }

    fn close(&mut self) {
        TcpClient::close(self);
    }
}
