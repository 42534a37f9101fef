#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Live-socket tests: client/server over loopback with ephemeral ports.

use relay_protocol::{last_sock_error, Atom, SockError, SockFamily, TcpClient, TcpServer};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grab a loopback port with no listener behind it.
fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn read_exact(client: &mut TcpClient, want: usize) -> Vec<u8> {
    let mut out = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = client.read(&mut out[filled..]).expect("read failed");
        assert!(n > 0, "peer closed before {want} bytes arrived");
        filled += n;
    }
    out
}

#[test]
fn test_connect_refused() {
    let port = dead_port();
    let result = TcpClient::connect(SockFamily::Any, "127.0.0.1", port);
    assert!(matches!(result, Err(SockError::ConnRefused)));
    assert_eq!(last_sock_error(), Some(SockError::ConnRefused));
}

#[test]
fn test_connect_resolution_failures() {
    let err = TcpClient::connect(SockFamily::Any, "no-such-host.invalid", 7144).unwrap_err();
    assert!(matches!(err, SockError::Dns | SockError::NoAddressFound));
    assert_eq!(last_sock_error(), Some(err));
    assert!(matches!(
        TcpClient::connect(SockFamily::Inet6, "127.0.0.1", 7144),
        Err(SockError::InterfaceNotFound)
    ));
    assert!(matches!(
        TcpClient::connect(SockFamily::Any, "localhost", 0),
        Err(SockError::ServiceNotFound)
    ));
}

#[test]
fn test_echo_then_eof() {
    let mut server = TcpServer::bind(SockFamily::Any, Some("127.0.0.1"), 0, 4, |client| {
        let mut buf = [0u8; 6];
        let mut filled = 0;
        while filled < buf.len() {
            match client.read(&mut buf[filled..]) {
                Ok(0) | Err(_) => return,
                Ok(n) => filled += n,
            }
        }
        let _ = client.write(&buf);
        // Returning closes the connection; the client sees EOF next.
    })
    .expect("bind failed");
    let port = server.local_addr().port();

    let mut client = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();
    assert_eq!(last_sock_error(), None);
    assert_eq!(client.write(b"Hello\n").unwrap(), 6);

    let echoed = read_exact(&mut client, 6);
    assert_eq!(&echoed, b"Hello\n");
    assert_eq!(last_sock_error(), None);

    // The handler returned and its socket was closed: graceful EOF.
    let mut rest = [0u8; 16];
    assert_eq!(client.read(&mut rest).unwrap(), 0);

    client.close();
    client.close(); // idempotent
    server.close();
}

#[test]
fn test_atom_exchange_over_tcp() {
    let mut server = TcpServer::bind(SockFamily::Any, Some("127.0.0.1"), 0, 2, |client| {
        // Decode one atom from the peer and echo it back encoded.
        if let Ok(atom) = Atom::read_from(client) {
            let _ = atom.write_to(client);
        }
    })
    .expect("bind failed");
    let port = server.local_addr().port();

    let mut request = Atom::list("helo").unwrap();
    request.push_child(Atom::with_string("agnt", "relay-protocol").unwrap());
    request.push_child(Atom::with_short("port", port as i16).unwrap());
    request.push_child(Atom::with_int("ver", 1218).unwrap());

    let mut client = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();
    request.write_to(&mut client).unwrap();
    let reply = Atom::read_from(&mut client).unwrap();
    assert_eq!(reply, request);

    server.close();
}

#[test]
fn test_server_close_stops_accepting_but_not_handlers() {
    let served = Arc::new(AtomicUsize::new(0));
    let served_in_handler = Arc::clone(&served);

    let mut server = TcpServer::bind(SockFamily::Any, Some("127.0.0.1"), 0, 2, move |client| {
        // Simulate a long-running relay handler.
        std::thread::sleep(Duration::from_millis(300));
        let _ = client.write(b"done");
        served_in_handler.fetch_add(1, Ordering::SeqCst);
    })
    .expect("bind failed");
    let port = server.local_addr().port();

    let mut client = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();
    // Give the accept loop time to hand the connection to a worker.
    std::thread::sleep(Duration::from_millis(100));

    server.close();

    // The in-flight handler finishes and its reply still arrives.
    let reply = read_exact(&mut client, 4);
    assert_eq!(&reply, b"done");
    assert_eq!(served.load(Ordering::SeqCst), 1);

    // New connections are no longer accepted.
    assert!(TcpClient::connect(SockFamily::Any, "127.0.0.1", port).is_err());
}

#[test]
fn test_worker_pool_serves_connections_beyond_capacity() {
    let served = Arc::new(AtomicUsize::new(0));
    let served_in_handler = Arc::clone(&served);

    // One worker; the second connection queues FIFO behind the first.
    let mut server = TcpServer::bind(SockFamily::Any, Some("127.0.0.1"), 0, 1, move |client| {
        let mut buf = [0u8; 1];
        if matches!(client.read(&mut buf), Ok(1)) {
            let _ = client.write(&buf);
            served_in_handler.fetch_add(1, Ordering::SeqCst);
        }
    })
    .expect("bind failed");
    let port = server.local_addr().port();

    let mut first = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();
    let mut second = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();

    first.write(b"a").unwrap();
    second.write(b"b").unwrap();

    assert_eq!(read_exact(&mut first, 1), b"a");
    assert_eq!(read_exact(&mut second, 1), b"b");
    assert_eq!(served.load(Ordering::SeqCst), 2);

    server.close();
}

#[test]
fn test_read_times_out_after_three_seconds() {
    let mut server = TcpServer::bind(SockFamily::Any, Some("127.0.0.1"), 0, 1, |client| {
        // Never write; keep the connection open past the client timeout.
        let mut buf = [0u8; 1];
        let _ = client.read(&mut buf);
        std::thread::sleep(Duration::from_millis(3500));
    })
    .expect("bind failed");
    let port = server.local_addr().port();

    let mut client = TcpClient::connect(SockFamily::Any, "127.0.0.1", port).unwrap();
    let start = Instant::now();
    let mut buf = [0u8; 1];
    let result = client.read(&mut buf);
    assert_eq!(result, Err(SockError::Timeout));
    assert_eq!(last_sock_error(), Some(SockError::Timeout));
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(2500), "timed out too early: {waited:?}");
    assert!(waited < Duration::from_secs(10), "timed out too late: {waited:?}");

    server.close();
}
