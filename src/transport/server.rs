//! Multi-client blocking TCP listener.
//!
//! [`TcpServer`] binds an interface, then runs one accept thread plus a
//! fixed pool of worker threads. Accepted connections are handed to the
//! pool over a FIFO queue; each worker wraps its connection in a
//! [`TcpClient`] (same fixed timeouts as the connect path), runs the
//! user handler, and closes the socket when the handler returns.
//!
//! [`TcpServer::close`] only stops accepting: handlers already running
//! are never cancelled and finish on their own.

use crate::error::SockError;
use crate::transport::tcp::{record_sock_result, resolve, SockFamily, TcpClient};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Poll interval of the accept loop while checking for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Per-connection handler. State the C API passed as a `void*` argument
/// lives in the closure's captures instead.
pub type Handler = dyn Fn(&mut TcpClient) + Send + Sync + 'static;

/// A listening TCP server with a bounded worker pool.
pub struct TcpServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl TcpServer {
    /// Bind `interface:port` (wildcard when no interface is given) and
    /// start accepting. Returns as soon as the listener is bound; all
    /// accepting and handling happens on background threads.
    ///
    /// `max_clients` bounds how many handlers run concurrently; further
    /// accepted connections wait in FIFO order for a free worker.
    pub fn bind<F>(
        family: SockFamily,
        interface: Option<&str>,
        port: u16,
        max_clients: usize,
        handler: F,
    ) -> std::result::Result<Self, SockError>
    where
        F: Fn(&mut TcpClient) + Send + Sync + 'static,
    {
        match Self::try_bind(family, interface, port, max_clients, handler) {
            Ok(server) => {
                record_sock_result(None);
                Ok(server)
            }
            Err(err) => {
                record_sock_result(Some(err));
                Err(err)
            }
        }
    }

    fn try_bind<F>(
        family: SockFamily,
        interface: Option<&str>,
        port: u16,
        max_clients: usize,
        handler: F,
    ) -> std::result::Result<Self, SockError>
    where
        F: Fn(&mut TcpClient) + Send + Sync + 'static,
    {
        let listener = match interface {
            Some(host) => {
                let addr = resolve(family, host, port)?;
                TcpListener::bind(addr).map_err(|e| SockError::from_io(&e))?
            }
            None => {
                let wildcard: SocketAddr = match family {
                    SockFamily::Inet6 => (std::net::Ipv6Addr::UNSPECIFIED, port).into(),
                    _ => (std::net::Ipv4Addr::UNSPECIFIED, port).into(),
                };
                TcpListener::bind(wildcard).map_err(|e| SockError::from_io(&e))?
            }
        };
        let local_addr = listener.local_addr().map_err(|e| SockError::from_io(&e))?;
        // Non-blocking accept so the loop can observe shutdown.
        listener
            .set_nonblocking(true)
            .map_err(|e| SockError::from_io(&e))?;

        info!(%local_addr, max_clients, "listening");

        let handler: Arc<Handler> = Arc::new(handler);
        let (conn_tx, conn_rx) = mpsc::channel::<TcpStream>();
        let conn_rx = Arc::new(Mutex::new(conn_rx));

        let mut workers = Vec::with_capacity(max_clients.max(1));
        for i in 0..max_clients.max(1) {
            let rx = Arc::clone(&conn_rx);
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("relay-worker-{i}"))
                .spawn(move || worker_loop(&rx, handler.as_ref()))
                .map_err(|e| SockError::from_io(&e))?;
            workers.push(worker);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let accept_thread = thread::Builder::new()
            .name("relay-accept".to_string())
            .spawn(move || accept_loop(&listener, &conn_tx, &shutdown_flag))
            .map_err(|e| SockError::from_io(&e))?;

        Ok(TcpServer {
            local_addr,
            shutdown,
            accept_thread: Some(accept_thread),
            workers,
        })
    }

    /// The bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections and release the listening socket.
    ///
    /// Idempotent. In-flight handlers keep running on their workers; the
    /// pool drains once they return and the queue is empty.
    pub fn close(&mut self) {
        if self.accept_thread.is_none() {
            return;
        }
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(accept) = self.accept_thread.take() {
            let _ = accept.join();
        }
        // Workers exit on their own when the queue closes; dropping the
        // handles leaves in-flight handlers untouched.
        self.workers.clear();
        record_sock_result(None);
        info!(local_addr = %self.local_addr, "stopped listening");
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(
    listener: &TcpListener,
    conn_tx: &mpsc::Sender<TcpStream>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                if conn_tx.send(stream).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    // Dropping conn_tx closes the queue and lets idle workers exit.
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<TcpStream>>, handler: &Handler) {
    loop {
        // Hold the lock only while dequeueing so the pool drains FIFO.
        let stream = {
            let guard = match rx.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            guard.recv()
        };
        match stream {
            Ok(stream) => match TcpClient::from_accepted(stream) {
                Ok(mut client) => {
                    handler(&mut client);
                    client.close();
                }
                Err(err) => warn!(error = %err, "dropping unusable connection"),
            },
            // Queue closed: server shut down and no work is left.
            Err(_) => return,
        }
    }
}
