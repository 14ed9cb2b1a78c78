//! Integration tests for registered entries answering socket traffic.
//!
//! Nothing here reaches the network: every registry disallows forwarding so a
//! miss surfaces as `MockError::NoMatch`.

use mockwire::{
    mock_namespace, Connector, Entry, Location, MockError, MockScope, MockSocket, Registry, Socket,
};
use std::sync::Arc;
use std::thread;

fn offline_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry.set_allow_network(false);
    registry
}

fn open(scope: &MockScope, host: &str, port: u16) -> MockSocket {
    scope
        .connector()
        .create_connection((host, port), None)
        .unwrap()
}

#[test]
fn test_multi_call_expectation_sticks_on_last_response() {
    let scope = MockScope::enter(offline_registry(), Some(mock_namespace!()), None).unwrap();
    scope.registry().register_entry(Entry::new(
        ("api.example.com", 443),
        ["OK\r\n", "RETRY\r\n", "DONE\r\n"],
    ));

    let mut socket = open(&scope, "api.example.com", 443);
    let mut answers = Vec::new();
    for attempt in 0..4 {
        socket.sendall(format!("poll {attempt}\r\n").as_bytes()).unwrap();
        answers.push(String::from_utf8(socket.recv(1024).unwrap()).unwrap());
    }

    assert_eq!(answers, vec!["OK\r\n", "RETRY\r\n", "DONE\r\n", "DONE\r\n"]);
    let history = scope.registry().requests();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].payload.as_ref(), b"poll 3\r\n");
}

#[test]
fn test_reset_drops_entries_and_history() {
    let scope = MockScope::enter(offline_registry(), None, None).unwrap();
    scope
        .registry()
        .register_entry(Entry::single(("localhost", 6379), "+PONG\r\n"));

    let mut socket = open(&scope, "localhost", 6379);
    socket.sendall(b"PING\r\n").unwrap();
    assert_eq!(socket.recv(64).unwrap(), b"+PONG\r\n");

    scope.registry().reset();

    assert!(scope.registry().last_request().is_none());
    let err = socket.sendall(b"PING\r\n").unwrap_err();
    assert!(matches!(err, MockError::NoMatch(_)));
}

#[test]
fn test_predicates_route_by_payload() {
    let scope = MockScope::enter(offline_registry(), None, None).unwrap();
    scope.registry().register([
        Entry::single(("localhost", 8080), "HTTP/1.1 201 Created\r\n\r\n")
            .with_matcher(|payload: &[u8]| payload.starts_with(b"POST ")),
        Entry::single(("localhost", 8080), "HTTP/1.1 200 OK\r\n\r\n"),
    ]);

    let mut socket = open(&scope, "localhost", 8080);
    socket.sendall(b"POST /items HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(socket.recv(1024).unwrap(), b"HTTP/1.1 201 Created\r\n");

    socket.sendall(b"GET /items HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(socket.recv(1024).unwrap(), b"HTTP/1.1 200 OK\r\n");
}

#[test]
fn test_locations_are_distinct_by_port() {
    let scope = MockScope::enter(offline_registry(), None, None).unwrap();
    scope
        .registry()
        .register_entry(Entry::single(("localhost", 80), "plain"));

    let mut socket = open(&scope, "localhost", 8080);
    assert!(matches!(
        socket.sendall(b"x"),
        Err(MockError::NoMatch(ref location)) if *location == Location::new("localhost", 8080)
    ));
}

#[test]
fn test_tls_style_peer_certificate() {
    let scope = MockScope::enter(offline_registry(), None, None).unwrap();
    let mut socket = open(&scope, "93.184.216.34", 443);
    socket.set_server_hostname("www.example.com");

    let cert = socket.peer_cert().unwrap();
    assert!(cert.matches_host("www.example.com"));
    assert!(cert.expires_at().unwrap() > chrono::Utc::now());
}

#[test]
fn test_sockets_share_registry_across_threads() {
    let scope = MockScope::enter(offline_registry(), None, None).unwrap();
    scope
        .registry()
        .register_entry(Entry::single(("localhost", 5432), "ready\n"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let connector = scope.connector();
            thread::spawn(move || {
                let mut socket = connector
                    .create_connection(("localhost", 5432), None)
                    .unwrap();
                socket.sendall(format!("client {i}").as_bytes()).unwrap();
                socket.recv(64).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"ready\n");
    }
    assert_eq!(scope.registry().requests().len(), 4);
}

#[test]
fn test_scope_namespace_names_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let scope = MockScope::enter(
        offline_registry(),
        Some(mock_namespace!()),
        Some(dir.path().to_path_buf()),
    )
    .unwrap();

    assert_eq!(
        scope.registry().session_path().unwrap(),
        dir.path()
            .join("entries.test_scope_namespace_names_session_file.json")
    );
}
